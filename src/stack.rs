//! Native stack growth for the recursive passes.
//!
//! Parsing, checking, lowering and evaluation all recurse once per level of
//! source nesting. Each recursive entry point runs through
//! [`ensure_sufficient_stack`], which switches to a freshly allocated stack
//! segment when the current one is nearly exhausted.

/// Minimum stack space to keep available before recursing.
const RED_ZONE: usize = 128 * 1024;

/// Stack space to allocate when growing.
const STACK_PER_RECURSION: usize = 1024 * 1024;

/// Run `f`, growing the native stack first if it is close to exhausted.
#[inline]
pub fn ensure_sufficient_stack<R>(f: impl FnOnce() -> R) -> R {
    stacker::maybe_grow(RED_ZONE, STACK_PER_RECURSION, f)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn depth(n: u32) -> u32 {
        if n == 0 {
            0
        } else {
            ensure_sufficient_stack(|| depth(n - 1) + 1)
        }
    }

    #[test]
    fn test_deep_recursion_grows_stack() {
        assert_eq!(depth(200_000), 200_000);
    }
}
