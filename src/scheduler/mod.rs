//! # Block Scheduling
//!
//! Decides which template blocks can run at the same time.
//!
//! - `registry`: which calls have outside effects and which are pure
//! - `analysis`: per-block reads, writes and barrier flag
//! - `plan`: greedy packing of independent blocks into phases

pub mod analysis;
pub mod plan;
pub mod registry;

#[cfg(test)]
mod tests;

pub use analysis::{BlockAnalysis, DependencyAnalyzer};
pub use plan::{create_execution_plan, ExecutionPlan, Phase};
pub use registry::FunctionRegistry;
