//! Core types for the script executor
//!
//! Organized into separate modules by concern:
//! - `ast`: expression syntax tree
//! - `values`: runtime value types
//! - `ops`: operator semantics shared by both evaluators
//! - `context`: the mutable per-render script context

pub mod ast;
pub mod context;
pub mod ops;
pub mod values;

pub use ast::{ArrowBody, BinaryOp, Expr, LogicalOp, TemplatePart, UnaryOp};
pub use context::{ContextDelta, FunctionBody, SavedBindings, ScriptContext, UserFunction};
pub use values::{Closure, Val};
