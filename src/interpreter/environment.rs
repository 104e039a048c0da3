use std::collections::HashMap;
use super::value::{Value, EvalError};

/// Scope chain for one call frame.
///
/// Scopes are stored outermost first; lookups walk them in reverse. A
/// binding holding `None` was declared but never assigned.
#[derive(Debug, Clone)]
pub struct Environment {
    scopes: Vec<HashMap<String, Option<Value>>>,
}

impl Environment {
    /// Create an environment with a single empty scope
    pub fn new() -> Self {
        Environment {
            scopes: vec![HashMap::new()],
        }
    }

    /// Open a nested scope
    pub fn push_scope(&mut self) {
        self.scopes.push(HashMap::new());
        log::trace!("push scope (depth {})", self.scopes.len());
    }

    /// Close the innermost scope, dropping its bindings
    pub fn pop_scope(&mut self) {
        debug_assert!(self.scopes.len() > 1, "popped the root scope of a frame");
        if self.scopes.len() > 1 {
            self.scopes.pop();
        }
        log::trace!("pop scope (depth {})", self.scopes.len());
    }

    /// Number of live scopes
    pub fn depth(&self) -> usize {
        self.scopes.len()
    }

    /// Declare an uninitialized variable in the current scope
    pub fn define(&mut self, name: &str) -> Result<(), EvalError> {
        self.insert(name, None)
    }

    /// Declare a variable with an initial value in the current scope
    pub fn define_value(&mut self, name: &str, value: Value) -> Result<(), EvalError> {
        self.insert(name, Some(value))
    }

    fn insert(&mut self, name: &str, value: Option<Value>) -> Result<(), EvalError> {
        let scope = self.innermost_mut();
        if scope.contains_key(name) {
            return Err(EvalError::Redeclaration(name.to_string()));
        }
        scope.insert(name.to_string(), value);
        Ok(())
    }

    /// Get a variable's value (searches innermost to outermost)
    pub fn lookup(&self, name: &str) -> Result<Value, EvalError> {
        self.scopes
            .iter()
            .rev()
            .find_map(|scope| scope.get(name))
            .copied()
            .flatten()
            .ok_or_else(|| EvalError::UndefinedVariable(name.to_string()))
    }

    /// Assign to the innermost existing binding of `name`
    pub fn assign(&mut self, name: &str, value: Value) -> Result<(), EvalError> {
        match self.scopes.iter_mut().rev().find_map(|scope| scope.get_mut(name)) {
            Some(slot) => {
                *slot = Some(value);
                Ok(())
            }
            None => Err(EvalError::UndefinedVariable(name.to_string())),
        }
    }

    fn innermost_mut(&mut self) -> &mut HashMap<String, Option<Value>> {
        if self.scopes.is_empty() {
            self.scopes.push(HashMap::new());
        }
        let last = self.scopes.len() - 1;
        &mut self.scopes[last]
    }
}

impl Default for Environment {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_define_assign_lookup() {
        let mut env = Environment::new();
        env.define("x").unwrap();
        env.assign("x", Value(5)).unwrap();
        assert_eq!(env.lookup("x"), Ok(Value(5)));
    }

    #[test]
    fn test_uninitialized_read_fails() {
        let mut env = Environment::new();
        env.define("x").unwrap();
        assert_eq!(env.lookup("x"), Err(EvalError::UndefinedVariable("x".to_string())));
        assert_eq!(env.define("x"), Err(EvalError::Redeclaration("x".to_string())));
        assert_eq!(env.assign("x", Value(2)), Ok(()));
    }

    #[test]
    fn test_undefined() {
        let mut env = Environment::new();
        assert_eq!(env.lookup("y"), Err(EvalError::UndefinedVariable("y".to_string())));
        assert_eq!(env.assign("y", Value(1)), Err(EvalError::UndefinedVariable("y".to_string())));
    }

    #[test]
    fn test_redeclaration_only_in_same_scope() {
        let mut env = Environment::new();
        env.define("x").unwrap();
        assert_eq!(env.define("x"), Err(EvalError::Redeclaration("x".to_string())));

        env.push_scope();
        assert_eq!(env.define("x"), Ok(()));
    }

    #[test]
    fn test_shadowing_leaves_outer_binding_intact() {
        let mut env = Environment::new();
        env.define_value("x", Value(1)).unwrap();

        env.push_scope();
        env.define_value("x", Value(2)).unwrap();
        env.assign("x", Value(3)).unwrap();
        assert_eq!(env.lookup("x"), Ok(Value(3)));
        env.pop_scope();

        assert_eq!(env.lookup("x"), Ok(Value(1)));
    }

    #[test]
    fn test_assign_reaches_outer_scope() {
        let mut env = Environment::new();
        env.define_value("count", Value(0)).unwrap();

        env.push_scope();
        env.assign("count", Value(4)).unwrap();
        assert_eq!(env.depth(), 2);
        env.pop_scope();

        assert_eq!(env.depth(), 1);
        assert_eq!(env.lookup("count"), Ok(Value(4)));
    }

    #[test]
    fn test_inner_bindings_dropped_on_pop() {
        let mut env = Environment::new();
        env.push_scope();
        env.define_value("tmp", Value(9)).unwrap();
        env.pop_scope();
        assert_eq!(env.lookup("tmp"), Err(EvalError::UndefinedVariable("tmp".to_string())));
        assert_eq!(env.define("tmp"), Ok(()));
    }
}
