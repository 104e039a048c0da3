/// Default ceiling on nested function calls
pub const DEFAULT_MAX_CALL_DEPTH: usize = 10_000;

/// What a call yields when its body ends without `return`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReturnPolicy {
    /// Falling off the end returns 0
    #[default]
    ImplicitZero,
    /// Falling off the end is `EvalError::MissingReturn`
    Strict,
}

/// Evaluation settings, fixed for the duration of a run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EvalConfig {
    /// `None` disables the limit; the native stack still grows on demand
    pub max_call_depth: Option<usize>,
    pub return_policy: ReturnPolicy,
}

impl EvalConfig {
    pub fn with_max_call_depth(mut self, max_call_depth: Option<usize>) -> Self {
        self.max_call_depth = max_call_depth;
        self
    }

    pub fn with_return_policy(mut self, return_policy: ReturnPolicy) -> Self {
        self.return_policy = return_policy;
        self
    }
}

impl Default for EvalConfig {
    fn default() -> Self {
        EvalConfig {
            max_call_depth: Some(DEFAULT_MAX_CALL_DEPTH),
            return_policy: ReturnPolicy::default(),
        }
    }
}
