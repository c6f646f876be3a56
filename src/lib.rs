//! # Tessera
//!
//! An embedded engine for templates with script blocks. Template text is
//! split into `<% … %>` blocks, the blocks are analyzed for the variables
//! they share, independent blocks run in parallel, and each block's output
//! replaces it in the rendered text.
//!
//! Expressions are evaluated by a tree walker or, for arithmetic and logic,
//! by a small bytecode compiler and stack VM.

pub mod bytecode;
pub mod cli;
pub mod config;
pub mod engine;
pub mod executor;
pub mod host;
pub mod parser;
pub mod scheduler;
pub mod template;

pub use config::{EngineConfig, EvaluatorMode};
pub use engine::{RenderOutcome, TemplateEngine, TemplateEngineBuilder};
pub use executor::{ScriptContext, ScriptError, Val};
pub use host::{CancellationChecker, ExecutionTrace, FrontmatterAccess, ModuleExecutor};
