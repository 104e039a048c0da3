//! minic: a tree-walking evaluator for a small C subset.
//!
//! The pipeline is lexer → parser → (optional) checker → [`FunctionTable`] →
//! [`run`]. Values are 32-bit signed integers with wrapping arithmetic. The
//! [`tac`] module lowers a parsed program to three-address code for
//! inspection.

pub mod ast;
pub mod checker;
pub mod cli;
pub mod interpreter;
pub mod lexer;
pub mod parser;
pub mod stack;
pub mod tac;

pub use interpreter::config::{EvalConfig, ReturnPolicy};
pub use interpreter::{run, run_with_config, ControlOutcome, EvalError, FunctionTable, Interpreter, Value};
