use std::fmt;
use thiserror::Error;

/// The single runtime datum: a C `int`, fixed at 32 bits.
///
/// Arithmetic on values wraps on overflow. Conditions use C truthiness:
/// zero is false, anything else is true.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Value(pub i32);

impl Value {
    pub const FALSE: Value = Value(0);
    pub const TRUE: Value = Value(1);

    /// `1` for true, `0` for false
    pub fn from_bool(b: bool) -> Self {
        if b { Value::TRUE } else { Value::FALSE }
    }

    /// Check if value is truthy
    pub fn is_truthy(self) -> bool {
        self.0 != 0
    }

    pub fn wrapping_add(self, rhs: Value) -> Value {
        Value(self.0.wrapping_add(rhs.0))
    }

    pub fn wrapping_sub(self, rhs: Value) -> Value {
        Value(self.0.wrapping_sub(rhs.0))
    }

    pub fn wrapping_mul(self, rhs: Value) -> Value {
        Value(self.0.wrapping_mul(rhs.0))
    }

    pub fn wrapping_neg(self) -> Value {
        Value(self.0.wrapping_neg())
    }

    /// Truncating division; `i32::MIN / -1` wraps to `i32::MIN`
    pub fn checked_div(self, rhs: Value) -> Result<Value, EvalError> {
        if rhs.0 == 0 {
            return Err(EvalError::DivisionByZero);
        }
        Ok(Value(self.0.wrapping_div(rhs.0)))
    }

    /// Remainder with the sign of the dividend; `i32::MIN % -1` is 0
    pub fn checked_rem(self, rhs: Value) -> Result<Value, EvalError> {
        if rhs.0 == 0 {
            return Err(EvalError::DivisionByZero);
        }
        Ok(Value(self.0.wrapping_rem(rhs.0)))
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value(n)
    }
}

impl From<Value> for i32 {
    fn from(v: Value) -> Self {
        v.0
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Runtime errors. Any of these aborts the current run.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EvalError {
    #[error("undefined variable '{0}'")]
    UndefinedVariable(String),

    #[error("variable '{0}' is already declared in this scope")]
    Redeclaration(String),

    #[error("undefined function '{0}'")]
    UndefinedFunction(String),

    #[error("function '{name}' expects {expected} arguments, got {got}")]
    ArityMismatch {
        name: String,
        expected: usize,
        got: usize,
    },

    #[error("division by zero")]
    DivisionByZero,

    #[error("entry point '{0}' is not defined")]
    MissingEntryPoint(String),

    #[error("call depth limit of {depth} exceeded")]
    StackOverflow { depth: usize },

    #[error("function '{0}' reached the end of its body without returning a value")]
    MissingReturn(String),

    #[error("function '{0}' is defined more than once")]
    DuplicateFunction(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truthiness() {
        assert!(!Value(0).is_truthy());
        assert!(Value(1).is_truthy());
        assert!(Value(-7).is_truthy());
        assert_eq!(Value::from_bool(true), Value(1));
        assert_eq!(Value::from_bool(false), Value(0));
    }

    #[test]
    fn test_wrapping_arithmetic() {
        assert_eq!(Value(i32::MAX).wrapping_add(Value(1)), Value(i32::MIN));
        assert_eq!(Value(i32::MIN).wrapping_sub(Value(1)), Value(i32::MAX));
        assert_eq!(Value(65536).wrapping_mul(Value(65536)), Value(0));
        assert_eq!(Value(i32::MIN).wrapping_neg(), Value(i32::MIN));
    }

    #[test]
    fn test_division() {
        assert_eq!(Value(7).checked_div(Value(2)), Ok(Value(3)));
        assert_eq!(Value(-7).checked_div(Value(2)), Ok(Value(-3)));
        assert_eq!(Value(-7).checked_rem(Value(2)), Ok(Value(-1)));
        assert_eq!(Value(i32::MIN).checked_div(Value(-1)), Ok(Value(i32::MIN)));
        assert_eq!(Value(i32::MIN).checked_rem(Value(-1)), Ok(Value(0)));
        assert_eq!(Value(1).checked_div(Value(0)), Err(EvalError::DivisionByZero));
        assert_eq!(Value(1).checked_rem(Value(0)), Err(EvalError::DivisionByZero));
    }

    #[test]
    fn test_error_messages() {
        let err = EvalError::ArityMismatch {
            name: "f".to_string(),
            expected: 1,
            got: 2,
        };
        assert_eq!(err.to_string(), "function 'f' expects 1 arguments, got 2");
        assert_eq!(EvalError::UndefinedVariable("x".to_string()).to_string(), "undefined variable 'x'");
    }
}
