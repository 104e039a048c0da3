/// Abstract Syntax Tree definitions for the minic C subset

use crate::stack::ensure_sufficient_stack;
use std::fmt;
use std::mem;

/// Binary operators
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,      // +
    Subtract, // -
    Multiply, // *
    Divide,   // /
    Modulo,   // %
    Equal,    // ==
    NotEqual, // !=
    Less,     // <
    LessEq,   // <=
    Greater,  // >
    GreaterEq, // >=
    And,      // &&
    Or,       // ||
}

/// Unary operators
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Negate, // -
    Not,    // !
}

/// An expression node
///
/// `Clone`, `PartialEq` and `Debug` are written out by hand so that long
/// operator chains do not exhaust the native stack; `Drop` is iterative.
pub enum Expression {
    /// Integer literal
    Literal(i32),

    /// Variable reference
    Variable(String),

    /// Binary operation
    Binary {
        left: Box<Expression>,
        op: BinaryOp,
        right: Box<Expression>,
    },

    /// Unary operation
    Unary {
        op: UnaryOp,
        expr: Box<Expression>,
    },

    /// Call of a named function
    Call {
        name: String,
        args: Vec<Expression>,
    },
}

impl Expression {
    pub fn literal(value: i32) -> Self {
        Expression::Literal(value)
    }

    pub fn variable(name: &str) -> Self {
        Expression::Variable(name.to_string())
    }

    pub fn binary(left: Expression, op: BinaryOp, right: Expression) -> Self {
        Expression::Binary {
            left: Box::new(left),
            op,
            right: Box::new(right),
        }
    }

    pub fn unary(op: UnaryOp, expr: Expression) -> Self {
        Expression::Unary {
            op,
            expr: Box::new(expr),
        }
    }

    pub fn call(name: &str, args: Vec<Expression>) -> Self {
        Expression::Call {
            name: name.to_string(),
            args,
        }
    }
}

/// A statement
pub enum Statement {
    /// Variable declaration without a value: int x;
    Declare(String),

    /// Assignment: x = expr;
    Assign {
        name: String,
        value: Expression,
    },

    /// if (cond) { ... } else { ... }
    If {
        condition: Expression,
        then_branch: Vec<Statement>,
        else_branch: Vec<Statement>,
    },

    /// while (cond) { ... }
    While {
        condition: Expression,
        body: Vec<Statement>,
    },

    /// Nested compound statement with its own scope
    Block(Vec<Statement>),

    /// Return statement
    Return(Expression),

    /// Expression statement
    Expression(Expression),
}

impl Statement {
    pub fn assign(name: &str, value: Expression) -> Self {
        Statement::Assign {
            name: name.to_string(),
            value,
        }
    }
}

/// Subtrees detached from a node that is being dropped
#[derive(Default)]
struct Detached {
    exprs: Vec<Expression>,
    stmts: Vec<Statement>,
}

impl Detached {
    /// Drop everything pending without recursing into child nodes
    fn drain(&mut self) {
        loop {
            if let Some(mut expr) = self.exprs.pop() {
                expr.detach_children(self);
            } else if let Some(mut stmt) = self.stmts.pop() {
                stmt.detach_children(self);
            } else {
                break;
            }
        }
    }
}

impl Expression {
    fn detach_children(&mut self, out: &mut Detached) {
        match self {
            Expression::Literal(_) | Expression::Variable(_) => {}
            Expression::Binary { left, right, .. } => {
                out.exprs.push(mem::replace(&mut **left, Expression::Literal(0)));
                out.exprs.push(mem::replace(&mut **right, Expression::Literal(0)));
            }
            Expression::Unary { expr, .. } => {
                out.exprs.push(mem::replace(&mut **expr, Expression::Literal(0)));
            }
            Expression::Call { args, .. } => out.exprs.append(args),
        }
    }

    fn is_leaf(&self) -> bool {
        matches!(self, Expression::Literal(_) | Expression::Variable(_))
    }
}

impl Statement {
    fn detach_children(&mut self, out: &mut Detached) {
        match self {
            Statement::Declare(_) => {}
            Statement::Assign { value, .. } | Statement::Return(value) | Statement::Expression(value) => {
                if !value.is_leaf() {
                    out.exprs.push(mem::replace(value, Expression::Literal(0)));
                }
            }
            Statement::If { condition, then_branch, else_branch } => {
                if !condition.is_leaf() {
                    out.exprs.push(mem::replace(condition, Expression::Literal(0)));
                }
                out.stmts.append(then_branch);
                out.stmts.append(else_branch);
            }
            Statement::While { condition, body } => {
                if !condition.is_leaf() {
                    out.exprs.push(mem::replace(condition, Expression::Literal(0)));
                }
                out.stmts.append(body);
            }
            Statement::Block(statements) => out.stmts.append(statements),
        }
    }
}

impl Drop for Expression {
    fn drop(&mut self) {
        if self.is_leaf() {
            return;
        }
        let mut pending = Detached::default();
        self.detach_children(&mut pending);
        pending.drain();
    }
}

impl Drop for Statement {
    fn drop(&mut self) {
        let mut pending = Detached::default();
        self.detach_children(&mut pending);
        pending.drain();
    }
}

impl Clone for Expression {
    fn clone(&self) -> Self {
        ensure_sufficient_stack(|| match self {
            Expression::Literal(n) => Expression::Literal(*n),
            Expression::Variable(name) => Expression::Variable(name.clone()),
            Expression::Binary { left, op, right } => Expression::Binary {
                left: left.clone(),
                op: *op,
                right: right.clone(),
            },
            Expression::Unary { op, expr } => Expression::Unary {
                op: *op,
                expr: expr.clone(),
            },
            Expression::Call { name, args } => Expression::Call {
                name: name.clone(),
                args: args.clone(),
            },
        })
    }
}

impl Clone for Statement {
    fn clone(&self) -> Self {
        ensure_sufficient_stack(|| match self {
            Statement::Declare(name) => Statement::Declare(name.clone()),
            Statement::Assign { name, value } => Statement::Assign {
                name: name.clone(),
                value: value.clone(),
            },
            Statement::If { condition, then_branch, else_branch } => Statement::If {
                condition: condition.clone(),
                then_branch: then_branch.clone(),
                else_branch: else_branch.clone(),
            },
            Statement::While { condition, body } => Statement::While {
                condition: condition.clone(),
                body: body.clone(),
            },
            Statement::Block(statements) => Statement::Block(statements.clone()),
            Statement::Return(expr) => Statement::Return(expr.clone()),
            Statement::Expression(expr) => Statement::Expression(expr.clone()),
        })
    }
}

impl PartialEq for Expression {
    fn eq(&self, other: &Self) -> bool {
        ensure_sufficient_stack(|| match (self, other) {
            (Expression::Literal(a), Expression::Literal(b)) => a == b,
            (Expression::Variable(a), Expression::Variable(b)) => a == b,
            (
                Expression::Binary { left: l1, op: o1, right: r1 },
                Expression::Binary { left: l2, op: o2, right: r2 },
            ) => o1 == o2 && l1 == l2 && r1 == r2,
            (Expression::Unary { op: o1, expr: e1 }, Expression::Unary { op: o2, expr: e2 }) => o1 == o2 && e1 == e2,
            (Expression::Call { name: n1, args: a1 }, Expression::Call { name: n2, args: a2 }) => n1 == n2 && a1 == a2,
            _ => false,
        })
    }
}

impl PartialEq for Statement {
    fn eq(&self, other: &Self) -> bool {
        ensure_sufficient_stack(|| match (self, other) {
            (Statement::Declare(a), Statement::Declare(b)) => a == b,
            (Statement::Assign { name: n1, value: v1 }, Statement::Assign { name: n2, value: v2 }) => {
                n1 == n2 && v1 == v2
            }
            (
                Statement::If { condition: c1, then_branch: t1, else_branch: e1 },
                Statement::If { condition: c2, then_branch: t2, else_branch: e2 },
            ) => c1 == c2 && t1 == t2 && e1 == e2,
            (Statement::While { condition: c1, body: b1 }, Statement::While { condition: c2, body: b2 }) => {
                c1 == c2 && b1 == b2
            }
            (Statement::Block(a), Statement::Block(b)) => a == b,
            (Statement::Return(a), Statement::Return(b)) => a == b,
            (Statement::Expression(a), Statement::Expression(b)) => a == b,
            _ => false,
        })
    }
}

impl fmt::Debug for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        ensure_sufficient_stack(|| match self {
            Expression::Literal(n) => f.debug_tuple("Literal").field(n).finish(),
            Expression::Variable(name) => f.debug_tuple("Variable").field(name).finish(),
            Expression::Binary { left, op, right } => f
                .debug_struct("Binary")
                .field("left", left)
                .field("op", op)
                .field("right", right)
                .finish(),
            Expression::Unary { op, expr } => f.debug_struct("Unary").field("op", op).field("expr", expr).finish(),
            Expression::Call { name, args } => f.debug_struct("Call").field("name", name).field("args", args).finish(),
        })
    }
}

impl fmt::Debug for Statement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        ensure_sufficient_stack(|| match self {
            Statement::Declare(name) => f.debug_tuple("Declare").field(name).finish(),
            Statement::Assign { name, value } => f.debug_struct("Assign").field("name", name).field("value", value).finish(),
            Statement::If { condition, then_branch, else_branch } => f
                .debug_struct("If")
                .field("condition", condition)
                .field("then_branch", then_branch)
                .field("else_branch", else_branch)
                .finish(),
            Statement::While { condition, body } => f
                .debug_struct("While")
                .field("condition", condition)
                .field("body", body)
                .finish(),
            Statement::Block(statements) => f.debug_tuple("Block").field(statements).finish(),
            Statement::Return(expr) => f.debug_tuple("Return").field(expr).finish(),
            Statement::Expression(expr) => f.debug_tuple("Expression").field(expr).finish(),
        })
    }
}

/// A function definition. Parameters and the return value are all `int`.
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionDef {
    pub name: String,
    pub params: Vec<String>,
    pub body: Vec<Statement>,
}

impl FunctionDef {
    pub fn new(name: &str, params: &[&str], body: Vec<Statement>) -> Self {
        FunctionDef {
            name: name.to_string(),
            params: params.iter().map(|p| p.to_string()).collect(),
            body,
        }
    }
}

/// A complete translation unit
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Program {
    pub functions: Vec<FunctionDef>,
}

impl Program {
    pub fn new() -> Self {
        Program {
            functions: Vec::new(),
        }
    }

    pub fn function(&self, name: &str) -> Option<&FunctionDef> {
        self.functions.iter().find(|f| f.name == name)
    }
}

impl BinaryOp {
    /// Whether the right operand may be skipped
    pub fn is_short_circuit(self) -> bool {
        matches!(self, BinaryOp::And | BinaryOp::Or)
    }
}

impl fmt::Display for BinaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BinaryOp::Add => write!(f, "+"),
            BinaryOp::Subtract => write!(f, "-"),
            BinaryOp::Multiply => write!(f, "*"),
            BinaryOp::Divide => write!(f, "/"),
            BinaryOp::Modulo => write!(f, "%"),
            BinaryOp::Equal => write!(f, "=="),
            BinaryOp::NotEqual => write!(f, "!="),
            BinaryOp::Less => write!(f, "<"),
            BinaryOp::LessEq => write!(f, "<="),
            BinaryOp::Greater => write!(f, ">"),
            BinaryOp::GreaterEq => write!(f, ">="),
            BinaryOp::And => write!(f, "&&"),
            BinaryOp::Or => write!(f, "||"),
        }
    }
}

impl fmt::Display for UnaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UnaryOp::Negate => write!(f, "-"),
            UnaryOp::Not => write!(f, "!"),
        }
    }
}
