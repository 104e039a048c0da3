//! Lowering from the AST to three-address code.

use super::{Instruction, Label, Operand, TacFunction, TacProgram};
use crate::ast::*;
use crate::stack::ensure_sufficient_stack;
use std::collections::HashMap;

/// Lower every function of a program
pub fn lower_program(program: &Program) -> TacProgram {
    let mut lowering = Lowering::new();
    let functions = program.functions.iter().map(|func| lowering.lower_function(func)).collect();
    log::debug!(
        "lowered {} functions using {} temporaries and {} labels",
        program.functions.len(),
        lowering.next_temp,
        lowering.next_label
    );
    TacProgram { functions }
}

struct Lowering {
    next_temp: usize,
    next_label: usize,
    code: Vec<Instruction>,
    /// Source name to listing name, innermost scope last
    scopes: Vec<HashMap<String, String>>,
    /// Declarations seen so far per source name in the current function
    declared: HashMap<String, usize>,
}

impl Lowering {
    fn new() -> Self {
        Lowering {
            next_temp: 0,
            next_label: 0,
            code: Vec::new(),
            scopes: Vec::new(),
            declared: HashMap::new(),
        }
    }

    fn lower_function(&mut self, func: &FunctionDef) -> TacFunction {
        self.scopes = vec![HashMap::new()];
        self.declared.clear();

        let params = func.params.iter().map(|param| self.declare(param)).collect();
        self.lower_statements(&func.body);

        self.scopes.clear();
        TacFunction {
            name: func.name.clone(),
            params,
            code: std::mem::take(&mut self.code),
        }
    }

    fn new_temp(&mut self) -> Operand {
        let temp = Operand::Temp(self.next_temp);
        self.next_temp += 1;
        temp
    }

    fn new_label(&mut self) -> Label {
        let label = Label(self.next_label);
        self.next_label += 1;
        label
    }

    fn emit(&mut self, instruction: Instruction) {
        self.code.push(instruction);
    }

    /// Bind `name` in the innermost scope; a second declaration in the same
    /// function gets a distinct listing name.
    fn declare(&mut self, name: &str) -> String {
        let count = self.declared.entry(name.to_string()).or_insert(0);
        let renamed = if *count == 0 {
            name.to_string()
        } else {
            format!("{}.{}", name, count)
        };
        *count += 1;

        if let Some(scope) = self.scopes.last_mut() {
            scope.insert(name.to_string(), renamed.clone());
        }
        renamed
    }

    fn resolve(&self, name: &str) -> Operand {
        let renamed = self
            .scopes
            .iter()
            .rev()
            .find_map(|scope| scope.get(name))
            .cloned()
            .unwrap_or_else(|| name.to_string());
        Operand::Name(renamed)
    }

    fn lower_scoped(&mut self, statements: &[Statement]) {
        self.scopes.push(HashMap::new());
        self.lower_statements(statements);
        self.scopes.pop();
    }

    fn lower_statements(&mut self, statements: &[Statement]) {
        for stmt in statements {
            self.lower_statement(stmt);
        }
    }

    fn lower_statement(&mut self, stmt: &Statement) {
        ensure_sufficient_stack(|| self.lower_statement_inner(stmt))
    }

    fn lower_statement_inner(&mut self, stmt: &Statement) {
        match stmt {
            Statement::Declare(name) => {
                self.declare(name);
            }
            Statement::Assign { name, value } => {
                let src = self.lower_expression(value);
                let dest = self.resolve(name);
                self.emit(Instruction::Copy { dest, src });
            }
            Statement::If { condition, then_branch, else_branch } => {
                let cond = self.lower_expression(condition);
                if else_branch.is_empty() {
                    let end = self.new_label();
                    self.emit(Instruction::IfFalse { cond, target: end });
                    self.lower_scoped(then_branch);
                    self.emit(Instruction::Label(end));
                } else {
                    let otherwise = self.new_label();
                    let end = self.new_label();
                    self.emit(Instruction::IfFalse { cond, target: otherwise });
                    self.lower_scoped(then_branch);
                    self.emit(Instruction::Goto(end));
                    self.emit(Instruction::Label(otherwise));
                    self.lower_scoped(else_branch);
                    self.emit(Instruction::Label(end));
                }
            }
            Statement::While { condition, body } => {
                let start = self.new_label();
                let end = self.new_label();
                self.emit(Instruction::Label(start));
                let cond = self.lower_expression(condition);
                self.emit(Instruction::IfFalse { cond, target: end });
                self.lower_scoped(body);
                self.emit(Instruction::Goto(start));
                self.emit(Instruction::Label(end));
            }
            Statement::Block(statements) => self.lower_scoped(statements),
            Statement::Return(expr) => {
                let value = self.lower_expression(expr);
                self.emit(Instruction::Return(value));
            }
            Statement::Expression(expr) => {
                self.lower_expression(expr);
            }
        }
    }

    /// Emit the code computing `expr` and return the operand holding it
    fn lower_expression(&mut self, expr: &Expression) -> Operand {
        ensure_sufficient_stack(|| self.lower_expression_inner(expr))
    }

    fn lower_expression_inner(&mut self, expr: &Expression) -> Operand {
        match expr {
            Expression::Literal(n) => Operand::Const(*n),
            Expression::Variable(name) => self.resolve(name),
            Expression::Binary { left, op: BinaryOp::And, right } => self.lower_logical(left, right, true),
            Expression::Binary { left, op: BinaryOp::Or, right } => self.lower_logical(left, right, false),
            Expression::Binary { left, op, right } => {
                let left = self.lower_expression(left);
                let right = self.lower_expression(right);
                let dest = self.new_temp();
                self.emit(Instruction::Binary {
                    dest: dest.clone(),
                    left,
                    op: *op,
                    right,
                });
                dest
            }
            Expression::Unary { op, expr } => {
                let operand = self.lower_expression(expr);
                let dest = self.new_temp();
                self.emit(Instruction::Unary {
                    dest: dest.clone(),
                    op: *op,
                    operand,
                });
                dest
            }
            Expression::Call { name, args } => {
                let args: Vec<Operand> = args.iter().map(|arg| self.lower_expression(arg)).collect();
                let argc = args.len();
                for arg in args {
                    self.emit(Instruction::Param(arg));
                }
                let dest = self.new_temp();
                self.emit(Instruction::Call {
                    dest: dest.clone(),
                    function: name.clone(),
                    argc,
                });
                dest
            }
        }
    }

    /// `&&` (`is_and`) or `||` with the right operand behind a jump.
    /// The result temporary is written on both paths.
    fn lower_logical(&mut self, left: &Expression, right: &Expression, is_and: bool) -> Operand {
        let left = self.lower_expression(left);
        let decided = self.new_label();
        let end = self.new_label();

        let jump = |cond: Operand| {
            if is_and {
                Instruction::IfFalse { cond, target: decided }
            } else {
                Instruction::IfTrue { cond, target: decided }
            }
        };

        self.emit(jump(left));
        let right = self.lower_expression(right);
        self.emit(jump(right));

        let (fallthrough, short) = if is_and { (1, 0) } else { (0, 1) };
        let dest = self.new_temp();
        self.emit(Instruction::Copy {
            dest: dest.clone(),
            src: Operand::Const(fallthrough),
        });
        self.emit(Instruction::Goto(end));
        self.emit(Instruction::Label(decided));
        self.emit(Instruction::Copy {
            dest: dest.clone(),
            src: Operand::Const(short),
        });
        self.emit(Instruction::Label(end));
        dest
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_source;
    use pretty_assertions::assert_eq;

    fn listing(source: &str) -> String {
        lower_program(&parse_source(source).unwrap()).to_string()
    }

    #[test]
    fn test_expression_temporaries() {
        let expected = "\
function main():
    t0 = 2 * 3
    t1 = 1 + t0
    x = t1
    return x
end function main
";
        assert_eq!(listing("int main() { int x = 1 + 2 * 3; return x; }"), expected);
    }

    #[test]
    fn test_if_and_call() {
        let source = "int f(int n) { if (n < 2) return 1; return n * f(n - 1); }";
        let expected = "\
function f(n):
    t0 = n < 2
    ifFalse t0 goto L0
    return 1
L0:
    t1 = n - 1
    param t1
    t2 = call f, 1
    t3 = n * t2
    return t3
end function f
";
        assert_eq!(listing(source), expected);
    }

    #[test]
    fn test_if_else_labels() {
        let source = "int main() { int x; if (x) { x = 1; } else { x = 2; } return x; }";
        let expected = "\
function main():
    ifFalse x goto L0
    x = 1
    goto L1
L0:
    x = 2
L1:
    return x
end function main
";
        assert_eq!(listing(source), expected);
    }

    #[test]
    fn test_while_with_short_circuit_condition() {
        let source = "int main() { int i = 0; while (i < 3 && i != 5) { i = i + 1; } return i; }";
        let expected = "\
function main():
    i = 0
L0:
    t0 = i < 3
    ifFalse t0 goto L2
    t1 = i != 5
    ifFalse t1 goto L2
    t2 = 1
    goto L3
L2:
    t2 = 0
L3:
    ifFalse t2 goto L1
    t3 = i + 1
    i = t3
    goto L0
L1:
    return i
end function main
";
        assert_eq!(listing(source), expected);
    }

    #[test]
    fn test_logical_or_jumps_on_true() {
        let tac = lower_program(&parse_source("int main() { int a = 0; return a || 1; }").unwrap());
        let code = &tac.function("main").unwrap().code;
        assert_eq!(
            code[1],
            Instruction::IfTrue {
                cond: Operand::Name("a".to_string()),
                target: Label(0),
            }
        );
        assert_eq!(code.last(), Some(&Instruction::Return(Operand::Temp(0))));
    }

    #[test]
    fn test_shadowed_locals_get_distinct_names() {
        let source = "int main() { int x = 1; { int x = 2; x = x + 1; } return x; }";
        let expected = "\
function main():
    x = 1
    x.1 = 2
    t0 = x.1 + 1
    x.1 = t0
    return x
end function main
";
        assert_eq!(listing(source), expected);
    }

    #[test]
    fn test_for_loop_lowering() {
        let source = "int main() { int s = 0; for (int i = 0; i < 3; i = i + 1) s = s + i; return s; }";
        let expected = "\
function main():
    s = 0
    i = 0
L0:
    t0 = i < 3
    ifFalse t0 goto L1
    t1 = s + i
    s = t1
    t2 = i + 1
    i = t2
    goto L0
L1:
    return s
end function main
";
        assert_eq!(listing(source), expected);
    }

    #[test]
    fn test_numbering_is_program_wide() {
        let tac = lower_program(&parse_source(include_str!("../../demos/factorial.c")).unwrap());
        assert_eq!(tac.functions.len(), 2);

        let temps: Vec<usize> = tac
            .functions
            .iter()
            .flat_map(|f| f.code.iter())
            .filter_map(|i| match i.dest() {
                Some(Operand::Temp(n)) => Some(*n),
                _ => None,
            })
            .collect();
        assert_eq!(temps, (0..temps.len()).collect::<Vec<_>>());
    }

    #[test]
    fn test_long_chain_lowers() {
        let source = format!("int main() {{ return 1{}; }}", "+1".repeat(100_000));
        let tac = lower_program(&parse_source(&source).unwrap());
        assert_eq!(tac.len(), 100_001);
    }
}
