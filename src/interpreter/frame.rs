//! Call frames and the live call stack.
//!
//! Each function invocation owns a `CallFrame` holding its scope chain. The
//! `CallStack` records which functions are active and enforces the depth
//! limit, so runaway recursion surfaces as `EvalError::StackOverflow`
//! instead of a host fault.

use super::environment::Environment;
use super::value::{EvalError, Value};

/// One active function invocation.
#[derive(Debug)]
pub struct CallFrame {
    pub function: String,
    pub env: Environment,
}

impl CallFrame {
    /// Create a frame whose root scope binds each parameter to its argument.
    ///
    /// Arguments must already be evaluated in the caller's environment.
    pub fn new(function: &str, params: &[String], args: &[Value]) -> Result<Self, EvalError> {
        let mut env = Environment::new();
        for (param, arg) in params.iter().zip(args) {
            env.define_value(param, *arg)?;
        }
        Ok(CallFrame {
            function: function.to_string(),
            env,
        })
    }
}

/// Names of the active frames, innermost last, plus the depth limit.
#[derive(Debug, Clone)]
pub struct CallStack {
    frames: Vec<String>,
    max_depth: Option<usize>,
}

impl CallStack {
    /// `max_depth` of `None` means unlimited
    pub fn new(max_depth: Option<usize>) -> Self {
        CallStack {
            frames: Vec::new(),
            max_depth,
        }
    }

    /// Record entry into `function`. The frame is not pushed on overflow.
    pub fn enter(&mut self, function: &str) -> Result<(), EvalError> {
        if let Some(max) = self.max_depth {
            if self.frames.len() >= max {
                log::warn!(
                    "call depth limit {} reached entering '{}'; innermost frames: {}",
                    max,
                    function,
                    self.backtrace().into_iter().take(8).collect::<Vec<_>>().join(" <- ")
                );
                return Err(EvalError::StackOverflow { depth: max });
            }
        }
        self.frames.push(function.to_string());
        Ok(())
    }

    /// Record exit from the innermost frame
    pub fn exit(&mut self) {
        debug_assert!(!self.frames.is_empty(), "CallStack::exit() on empty stack");
        self.frames.pop();
    }

    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Active function names, most recent call first
    pub fn backtrace(&self) -> Vec<String> {
        self.frames.iter().rev().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_enter_and_exit() {
        let mut stack = CallStack::new(Some(3));
        stack.enter("main").unwrap();
        stack.enter("f").unwrap();
        assert_eq!(stack.depth(), 2);
        assert_eq!(stack.backtrace(), vec!["f".to_string(), "main".to_string()]);

        stack.exit();
        stack.exit();
        assert!(stack.is_empty());
    }

    #[test]
    fn test_overflow_does_not_push() {
        let mut stack = CallStack::new(Some(2));
        stack.enter("a").unwrap();
        stack.enter("a").unwrap();
        assert_eq!(stack.enter("a"), Err(EvalError::StackOverflow { depth: 2 }));
        assert_eq!(stack.depth(), 2);
    }

    #[test]
    fn test_unlimited() {
        let mut stack = CallStack::new(None);
        for _ in 0..50_000 {
            stack.enter("deep").unwrap();
        }
        assert_eq!(stack.depth(), 50_000);
    }

    #[test]
    fn test_frame_binds_parameters() {
        let params = vec!["a".to_string(), "b".to_string()];
        let frame = CallFrame::new("add", &params, &[Value(1), Value(2)]).unwrap();
        assert_eq!(frame.env.lookup("a"), Ok(Value(1)));
        assert_eq!(frame.env.lookup("b"), Ok(Value(2)));
    }

    #[test]
    fn test_duplicate_parameter_names() {
        let params = vec!["a".to_string(), "a".to_string()];
        let err = CallFrame::new("dup", &params, &[Value(1), Value(2)]).unwrap_err();
        assert_eq!(err, EvalError::Redeclaration("a".to_string()));
    }
}
