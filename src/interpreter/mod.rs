pub mod config;
pub mod environment;
pub mod frame;
pub mod value;

use crate::ast::*;
use config::ReturnPolicy;
use environment::Environment;
use frame::{CallFrame, CallStack};
use crate::stack::ensure_sufficient_stack;
use std::collections::HashMap;

pub use config::EvalConfig;
pub use value::{EvalError, Value};

/// Result of executing a statement list
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlOutcome {
    /// Ran to the end
    Normal,
    /// Hit `return`; unwinds to the enclosing call
    Returned(Value),
}

/// Function definitions by name, read-only once evaluation starts
#[derive(Debug, Clone, Default)]
pub struct FunctionTable {
    functions: HashMap<String, FunctionDef>,
}

impl FunctionTable {
    pub fn new() -> Self {
        FunctionTable {
            functions: HashMap::new(),
        }
    }

    /// Register every function of a parsed program
    pub fn from_program(program: &Program) -> Result<Self, EvalError> {
        let mut table = FunctionTable::new();
        for func in &program.functions {
            table.register(func.clone())?;
        }
        Ok(table)
    }

    pub fn register(&mut self, func: FunctionDef) -> Result<(), EvalError> {
        if self.functions.contains_key(&func.name) {
            return Err(EvalError::DuplicateFunction(func.name));
        }
        self.functions.insert(func.name.clone(), func);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&FunctionDef> {
        self.functions.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.functions.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.functions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }
}

/// Tree-walking evaluator over a function table
pub struct Interpreter<'a> {
    functions: &'a FunctionTable,
    config: EvalConfig,
    call_stack: CallStack,
}

impl<'a> Interpreter<'a> {
    pub fn new(functions: &'a FunctionTable, config: EvalConfig) -> Self {
        let call_stack = CallStack::new(config.max_call_depth);
        Interpreter {
            functions,
            config,
            call_stack,
        }
    }

    /// Call `entry` with no arguments and return its result
    pub fn run(&mut self, entry: &str) -> Result<Value, EvalError> {
        if !self.functions.contains(entry) {
            return Err(EvalError::MissingEntryPoint(entry.to_string()));
        }
        let result = self.call_function(entry, &[]);
        if let Err(ref err) = result {
            log::debug!("run of '{}' failed: {}", entry, err);
        }
        result
    }

    /// Current number of active calls
    pub fn call_depth(&self) -> usize {
        self.call_stack.depth()
    }

    /// Call a function with already-evaluated arguments
    pub fn call_function(&mut self, name: &str, args: &[Value]) -> Result<Value, EvalError> {
        let functions = self.functions;
        let func = functions
            .get(name)
            .ok_or_else(|| EvalError::UndefinedFunction(name.to_string()))?;

        if func.params.len() != args.len() {
            return Err(EvalError::ArityMismatch {
                name: name.to_string(),
                expected: func.params.len(),
                got: args.len(),
            });
        }

        self.call_stack.enter(name)?;
        log::trace!("call {}({:?}) at depth {}", name, args, self.call_stack.depth());

        let result = ensure_sufficient_stack(|| self.invoke(func, args));

        self.call_stack.exit();
        result
    }

    /// Run a function body in a fresh frame
    fn invoke(&mut self, func: &FunctionDef, args: &[Value]) -> Result<Value, EvalError> {
        let mut frame = CallFrame::new(&func.name, &func.params, args)?;

        match self.execute(&func.body, &mut frame.env)? {
            ControlOutcome::Returned(value) => Ok(value),
            ControlOutcome::Normal => match self.config.return_policy {
                ReturnPolicy::ImplicitZero => Ok(Value(0)),
                ReturnPolicy::Strict => Err(EvalError::MissingReturn(frame.function)),
            },
        }
    }

    /// Execute statements in order in the current scope
    pub fn execute(&mut self, statements: &[Statement], env: &mut Environment) -> Result<ControlOutcome, EvalError> {
        for stmt in statements {
            if let ControlOutcome::Returned(value) = self.execute_statement(stmt, env)? {
                return Ok(ControlOutcome::Returned(value));
            }
        }
        Ok(ControlOutcome::Normal)
    }

    /// Execute statements inside a nested scope; the scope is popped on every exit path
    fn execute_scoped(&mut self, statements: &[Statement], env: &mut Environment) -> Result<ControlOutcome, EvalError> {
        env.push_scope();
        let outcome = self.execute(statements, env);
        env.pop_scope();
        outcome
    }

    /// Execute a statement; nested blocks recurse through here
    fn execute_statement(&mut self, stmt: &Statement, env: &mut Environment) -> Result<ControlOutcome, EvalError> {
        ensure_sufficient_stack(|| self.execute_statement_inner(stmt, env))
    }

    fn execute_statement_inner(&mut self, stmt: &Statement, env: &mut Environment) -> Result<ControlOutcome, EvalError> {
        match stmt {
            Statement::Declare(name) => {
                env.define(name)?;
                Ok(ControlOutcome::Normal)
            }
            Statement::Assign { name, value } => {
                let value = self.evaluate(value, env)?;
                env.assign(name, value)?;
                Ok(ControlOutcome::Normal)
            }
            Statement::If { condition, then_branch, else_branch } => {
                let branch = if self.evaluate(condition, env)?.is_truthy() {
                    then_branch
                } else {
                    else_branch
                };
                self.execute_scoped(branch, env)
            }
            Statement::While { condition, body } => {
                while self.evaluate(condition, env)?.is_truthy() {
                    if let ControlOutcome::Returned(value) = self.execute_scoped(body, env)? {
                        return Ok(ControlOutcome::Returned(value));
                    }
                }
                Ok(ControlOutcome::Normal)
            }
            Statement::Block(statements) => self.execute_scoped(statements, env),
            Statement::Return(expr) => {
                let value = self.evaluate(expr, env)?;
                Ok(ControlOutcome::Returned(value))
            }
            Statement::Expression(expr) => {
                self.evaluate(expr, env)?;
                Ok(ControlOutcome::Normal)
            }
        }
    }

    /// Evaluate an expression
    pub fn evaluate(&mut self, expr: &Expression, env: &Environment) -> Result<Value, EvalError> {
        ensure_sufficient_stack(|| self.evaluate_inner(expr, env))
    }

    fn evaluate_inner(&mut self, expr: &Expression, env: &Environment) -> Result<Value, EvalError> {
        match expr {
            Expression::Literal(n) => Ok(Value(*n)),
            Expression::Variable(name) => env.lookup(name),
            Expression::Binary { left, op, right } => {
                let left_val = self.evaluate(left, env)?;
                if op.is_short_circuit() {
                    return self.evaluate_logical(left_val, *op, right, env);
                }
                let right_val = self.evaluate(right, env)?;
                evaluate_binary_op(left_val, *op, right_val)
            }
            Expression::Unary { op, expr } => {
                let val = self.evaluate(expr, env)?;
                Ok(evaluate_unary_op(*op, val))
            }
            Expression::Call { name, args } => {
                let arg_vals = args
                    .iter()
                    .map(|a| self.evaluate(a, env))
                    .collect::<Result<Vec<_>, _>>()?;
                self.call_function(name, &arg_vals)
            }
        }
    }

    /// `&&` and `||`; the right operand only runs when the left does not decide
    fn evaluate_logical(&mut self, left: Value, op: BinaryOp, right: &Expression, env: &Environment) -> Result<Value, EvalError> {
        match (op, left.is_truthy()) {
            (BinaryOp::And, false) => Ok(Value::FALSE),
            (BinaryOp::Or, true) => Ok(Value::TRUE),
            _ => Ok(Value::from_bool(self.evaluate(right, env)?.is_truthy())),
        }
    }
}

pub(crate) fn evaluate_unary_op(op: UnaryOp, value: Value) -> Value {
    match op {
        UnaryOp::Negate => value.wrapping_neg(),
        UnaryOp::Not => Value::from_bool(!value.is_truthy()),
    }
}

/// Apply a strict (non short-circuit) binary operator
pub(crate) fn evaluate_binary_op(left: Value, op: BinaryOp, right: Value) -> Result<Value, EvalError> {
    match op {
        BinaryOp::Add => Ok(left.wrapping_add(right)),
        BinaryOp::Subtract => Ok(left.wrapping_sub(right)),
        BinaryOp::Multiply => Ok(left.wrapping_mul(right)),
        BinaryOp::Divide => left.checked_div(right),
        BinaryOp::Modulo => left.checked_rem(right),
        BinaryOp::Equal => Ok(Value::from_bool(left == right)),
        BinaryOp::NotEqual => Ok(Value::from_bool(left != right)),
        BinaryOp::Less => Ok(Value::from_bool(left < right)),
        BinaryOp::LessEq => Ok(Value::from_bool(left <= right)),
        BinaryOp::Greater => Ok(Value::from_bool(left > right)),
        BinaryOp::GreaterEq => Ok(Value::from_bool(left >= right)),
        BinaryOp::And => Ok(Value::from_bool(left.is_truthy() && right.is_truthy())),
        BinaryOp::Or => Ok(Value::from_bool(left.is_truthy() || right.is_truthy())),
    }
}

/// Run `entry` with the default configuration
pub fn run(functions: &FunctionTable, entry: &str) -> Result<Value, EvalError> {
    run_with_config(functions, entry, &EvalConfig::default())
}

/// Run `entry` with an explicit configuration
pub fn run_with_config(functions: &FunctionTable, entry: &str, config: &EvalConfig) -> Result<Value, EvalError> {
    log::debug!("running '{}' over {} functions", entry, functions.len());
    Interpreter::new(functions, config.clone()).run(entry)
}
