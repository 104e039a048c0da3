//! Static semantic checks over a parsed program.
//!
//! The checker reports every problem it can find without running the
//! program. Scoping mirrors the evaluator: branch bodies, loop bodies and
//! blocks each open a scope, and a function body shares its root scope with
//! the parameters.

use crate::ast::*;
use crate::stack::ensure_sufficient_stack;
use std::collections::{HashMap, HashSet};
use thiserror::Error;

/// Semantic errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SemanticError {
    #[error("function '{0}' is defined more than once")]
    DuplicateFunction(String),

    #[error("parameter '{param}' of '{function}' is declared more than once")]
    DuplicateParameter { function: String, param: String },

    #[error("variable '{name}' is already declared in this scope (in '{function}')")]
    Redeclaration { function: String, name: String },

    #[error("use of undeclared variable '{name}' in '{function}'")]
    UndeclaredVariable { function: String, name: String },

    #[error("call to undefined function '{name}' in '{function}'")]
    UndefinedFunction { function: String, name: String },

    #[error("'{name}' expects {expected} arguments, got {got} (in '{function}')")]
    ArityMismatch {
        function: String,
        name: String,
        expected: usize,
        got: usize,
    },

    #[error("entry point '{0}' is not defined")]
    MissingEntryPoint(String),
}

/// Semantic checker for minic programs
pub struct Checker {
    entry: String,
    /// Parameter count of every defined function
    signatures: HashMap<String, usize>,
    scopes: Vec<HashSet<String>>,
    current_function: String,
    errors: Vec<SemanticError>,
}

impl Checker {
    pub fn new() -> Self {
        Checker::with_entry("main")
    }

    pub fn with_entry(entry: &str) -> Self {
        Checker {
            entry: entry.to_string(),
            signatures: HashMap::new(),
            scopes: Vec::new(),
            current_function: String::new(),
            errors: Vec::new(),
        }
    }

    /// Check a complete program
    pub fn check_program(&mut self, program: &Program) -> Result<(), Vec<SemanticError>> {
        self.errors.clear();
        self.signatures.clear();

        // First pass: register all function signatures
        for func in &program.functions {
            if self.signatures.insert(func.name.clone(), func.params.len()).is_some() {
                self.errors.push(SemanticError::DuplicateFunction(func.name.clone()));
            }
        }

        if !self.signatures.contains_key(&self.entry) {
            self.errors.push(SemanticError::MissingEntryPoint(self.entry.clone()));
        }

        // Second pass: check function bodies
        for func in &program.functions {
            self.check_function(func);
        }

        log::debug!("semantic check finished with {} errors", self.errors.len());
        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(self.errors.clone())
        }
    }

    fn check_function(&mut self, func: &FunctionDef) {
        self.current_function = func.name.clone();
        self.scopes = vec![HashSet::new()];

        for param in &func.params {
            if !self.declare_name(param) {
                self.errors.push(SemanticError::DuplicateParameter {
                    function: func.name.clone(),
                    param: param.clone(),
                });
            }
        }

        self.check_statements(&func.body);
        self.scopes.clear();
    }

    fn check_scoped(&mut self, statements: &[Statement]) {
        self.scopes.push(HashSet::new());
        self.check_statements(statements);
        self.scopes.pop();
    }

    fn check_statements(&mut self, statements: &[Statement]) {
        for stmt in statements {
            self.check_statement(stmt);
        }
    }

    fn check_statement(&mut self, stmt: &Statement) {
        ensure_sufficient_stack(|| self.check_statement_inner(stmt))
    }

    fn check_statement_inner(&mut self, stmt: &Statement) {
        match stmt {
            Statement::Declare(name) => {
                if !self.declare_name(name) {
                    self.errors.push(SemanticError::Redeclaration {
                        function: self.current_function.clone(),
                        name: name.clone(),
                    });
                }
            }
            Statement::Assign { name, value } => {
                self.check_expression(value);
                self.require_declared(name);
            }
            Statement::If { condition, then_branch, else_branch } => {
                self.check_expression(condition);
                self.check_scoped(then_branch);
                self.check_scoped(else_branch);
            }
            Statement::While { condition, body } => {
                self.check_expression(condition);
                self.check_scoped(body);
            }
            Statement::Block(statements) => self.check_scoped(statements),
            Statement::Return(expr) | Statement::Expression(expr) => self.check_expression(expr),
        }
    }

    fn check_expression(&mut self, expr: &Expression) {
        ensure_sufficient_stack(|| self.check_expression_inner(expr))
    }

    fn check_expression_inner(&mut self, expr: &Expression) {
        match expr {
            Expression::Literal(_) => {}
            Expression::Variable(name) => self.require_declared(name),
            Expression::Binary { left, right, .. } => {
                self.check_expression(left);
                self.check_expression(right);
            }
            Expression::Unary { expr, .. } => self.check_expression(expr),
            Expression::Call { name, args } => {
                for arg in args {
                    self.check_expression(arg);
                }
                match self.signatures.get(name) {
                    None => self.errors.push(SemanticError::UndefinedFunction {
                        function: self.current_function.clone(),
                        name: name.clone(),
                    }),
                    Some(&expected) if expected != args.len() => {
                        self.errors.push(SemanticError::ArityMismatch {
                            function: self.current_function.clone(),
                            name: name.clone(),
                            expected,
                            got: args.len(),
                        })
                    }
                    Some(_) => {}
                }
            }
        }
    }

    /// Returns false if `name` already exists in the innermost scope
    fn declare_name(&mut self, name: &str) -> bool {
        match self.scopes.last_mut() {
            Some(scope) => scope.insert(name.to_string()),
            None => true,
        }
    }

    fn require_declared(&mut self, name: &str) {
        if !self.scopes.iter().any(|scope| scope.contains(name)) {
            self.errors.push(SemanticError::UndeclaredVariable {
                function: self.current_function.clone(),
                name: name.to_string(),
            });
        }
    }
}

impl Default for Checker {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_source;
    use pretty_assertions::assert_eq;

    fn check(source: &str) -> Result<(), Vec<SemanticError>> {
        let program = parse_source(source).unwrap();
        Checker::new().check_program(&program)
    }

    #[test]
    fn test_sample_programs_are_clean() {
        assert_eq!(check(include_str!("../../demos/factorial.c")), Ok(()));
        assert_eq!(check(include_str!("../../demos/nested.c")), Ok(()));
    }

    #[test]
    fn test_reports_all_errors() {
        let source = r#"
            int f(int a, int a) { return a; }
            int f() { return 0; }
            int main() {
                int x;
                int x;
                y = 1;
                return g(x) + f(1, 2, 3);
            }
        "#;

        let errors = check(source).unwrap_err();
        assert_eq!(
            errors,
            vec![
                SemanticError::DuplicateFunction("f".to_string()),
                SemanticError::DuplicateParameter {
                    function: "f".to_string(),
                    param: "a".to_string(),
                },
                SemanticError::Redeclaration {
                    function: "main".to_string(),
                    name: "x".to_string(),
                },
                SemanticError::UndeclaredVariable {
                    function: "main".to_string(),
                    name: "y".to_string(),
                },
                SemanticError::UndefinedFunction {
                    function: "main".to_string(),
                    name: "g".to_string(),
                },
                SemanticError::ArityMismatch {
                    function: "main".to_string(),
                    name: "f".to_string(),
                    expected: 0,
                    got: 3,
                },
            ]
        );
    }

    #[test]
    fn test_block_locals_do_not_escape() {
        let errors = check("int main() { if (1) { int t = 1; } return t; }").unwrap_err();
        assert_eq!(
            errors,
            vec![SemanticError::UndeclaredVariable {
                function: "main".to_string(),
                name: "t".to_string(),
            }]
        );
    }

    #[test]
    fn test_shadowing_is_allowed() {
        assert_eq!(check("int main() { int x = 1; { int x = 2; } while (x) { int x = 0; } return x; }"), Ok(()));
    }

    #[test]
    fn test_missing_entry_point() {
        let errors = check("int helper() { return 0; }").unwrap_err();
        assert_eq!(errors, vec![SemanticError::MissingEntryPoint("main".to_string())]);

        let program = parse_source("int helper() { return 0; }").unwrap();
        assert_eq!(Checker::with_entry("helper").check_program(&program), Ok(()));
    }

    #[test]
    fn test_deep_nesting() {
        let source = format!("int main() {{ int x = 0; {}return x{};{} }}", "{".repeat(10_000), "+x".repeat(100_000), "}".repeat(10_000));
        assert_eq!(check(&source), Ok(()));

        let source = format!("int main() {{ return 1{}; }}", "+y".repeat(50_000));
        assert_eq!(check(&source).unwrap_err().len(), 50_000);
    }
}
