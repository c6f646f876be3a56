//! # Script Executor
//!
//! Runs parsed statements against a [`ScriptContext`].
//!
//! ## Layout
//!
//! - `types`: values, the expression AST, shared numeric semantics, the context
//! - `expressions`: the tree-walking evaluator and the [`RuntimeContext`] seam
//! - `builtins`: `Math`, `JSON`, string and array methods, constructors
//! - `interp`: [`Interpreter`], binding a context to services and cancellation
//! - `evaluate`: evaluator selection and the expression cache
//! - `statements`: assignment, loop, conditional, function and try executors

pub mod builtins;
pub mod errors;
pub mod evaluate;
pub mod expressions;
pub mod interp;
pub mod services;
pub mod statements;
pub mod types;

#[cfg(test)]
mod tests;

pub use errors::{ErrorInfo, ScriptError};
pub use evaluate::ExpressionCache;
pub use expressions::{eval_expr, EvalResult, RuntimeContext};
pub use interp::Interpreter;
pub use services::Services;
pub use statements::{execute_statements, Control};
pub use types::{ContextDelta, Expr, ScriptContext, Val};
