//! Host interfaces
//!
//! The engine consumes module functions, document frontmatter, cancellation
//! and tracing through these traits. Trivial implementations ship for tests
//! and the CLI.

use serde_json::json;
use std::collections::BTreeMap;
use std::io::Write;
use std::sync::Mutex;
use tokio_util::sync::CancellationToken;

use crate::executor::errors::{self, ScriptError};
use crate::executor::types::Val;
use crate::template::BlockKind;

/* ===================== Modules ===================== */

/// Executes `tp.<module>.<function>(...)` calls.
pub trait ModuleExecutor: Send + Sync {
    fn execute_module_function(
        &self,
        module: &str,
        function: &str,
        args: &[Val],
    ) -> Result<Val, ScriptError>;
}

/// Module executor that knows no modules
#[derive(Debug, Default, Clone, Copy)]
pub struct NoModules;

impl ModuleExecutor for NoModules {
    fn execute_module_function(
        &self,
        module: &str,
        function: &str,
        _args: &[Val],
    ) -> Result<Val, ScriptError> {
        Err(ScriptError::runtime(
            errors::UNKNOWN_FUNCTION,
            format!("Unknown module function: {}.{}", module, function),
        ))
    }
}

/* ===================== Frontmatter ===================== */

/// Read access to the document's metadata.
pub trait FrontmatterAccess: Send + Sync {
    /// Value at a dotted path (`"author.name"`)
    fn get_value(&self, path: &str) -> Option<Val>;
    fn get_all(&self) -> BTreeMap<String, Val>;
}

/// Frontmatter held in memory
#[derive(Debug, Default, Clone)]
pub struct MapFrontmatter {
    values: BTreeMap<String, Val>,
}

impl MapFrontmatter {
    pub fn new(values: BTreeMap<String, Val>) -> Self {
        Self { values }
    }

    /// Build from a JSON object; anything else yields empty frontmatter.
    pub fn from_json(json: &serde_json::Value) -> Self {
        match Val::from_json(json) {
            Val::Obj(values) => Self { values },
            _ => Self::default(),
        }
    }
}

impl FrontmatterAccess for MapFrontmatter {
    fn get_value(&self, path: &str) -> Option<Val> {
        let mut segments = path.split('.');
        let mut current = self.values.get(segments.next()?)?;
        for segment in segments {
            current = match current {
                Val::Obj(map) => map.get(segment)?,
                Val::List(items) => items.get(segment.parse::<usize>().ok()?)?,
                _ => return None,
            };
        }
        Some(current.clone())
    }

    fn get_all(&self) -> BTreeMap<String, Val> {
        self.values.clone()
    }
}

/* ===================== Cancellation ===================== */

/// Polled cooperatively inside loops and between blocks.
pub trait CancellationChecker: Send + Sync {
    fn check_cancelled(&self) -> Result<(), ScriptError>;
}

impl CancellationChecker for CancellationToken {
    fn check_cancelled(&self) -> Result<(), ScriptError> {
        if self.is_cancelled() {
            Err(ScriptError::Cancelled)
        } else {
            Ok(())
        }
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NeverCancelled;

impl CancellationChecker for NeverCancelled {
    fn check_cancelled(&self) -> Result<(), ScriptError> {
        Ok(())
    }
}

/* ===================== Tracing ===================== */

/// Observer for block execution, used by debuggers.
///
/// Every method defaults to a no-op.
pub trait ExecutionTrace: Send + Sync {
    fn block_started(&self, _block: usize, _kind: BlockKind, _code: &str) {}

    fn block_finished(&self, _block: usize, _output: &str) {}

    fn line(&self, _block: usize, _line: usize, _statement: &str) {}

    /// Whether [`ExecutionTrace::variables`] should receive snapshots
    fn wants_snapshots(&self) -> bool {
        false
    }

    fn variables(&self, _block: usize, _variables: &BTreeMap<String, Val>) {}
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NoTrace;

impl ExecutionTrace for NoTrace {}

/// Writes one JSON object per trace event.
pub struct JsonTrace<W: Write + Send> {
    out: Mutex<W>,
    snapshots: bool,
}

impl<W: Write + Send> JsonTrace<W> {
    pub fn new(out: W) -> Self {
        Self {
            out: Mutex::new(out),
            snapshots: true,
        }
    }

    pub fn without_snapshots(mut self) -> Self {
        self.snapshots = false;
        self
    }

    pub fn into_inner(self) -> W {
        match self.out.into_inner() {
            Ok(w) => w,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn emit(&self, event: serde_json::Value) {
        let Ok(mut out) = self.out.lock() else {
            return;
        };
        if let Err(e) = writeln!(out, "{}", event) {
            tracing::warn!(error = %e, "Failed to write trace event");
        }
    }
}

impl<W: Write + Send> ExecutionTrace for JsonTrace<W> {
    fn block_started(&self, block: usize, kind: BlockKind, code: &str) {
        self.emit(json!({ "event": "block_started", "block": block, "kind": kind, "code": code }));
    }

    fn block_finished(&self, block: usize, output: &str) {
        self.emit(json!({ "event": "block_finished", "block": block, "output": output }));
    }

    fn line(&self, block: usize, line: usize, statement: &str) {
        self.emit(json!({ "event": "line", "block": block, "line": line, "statement": statement }));
    }

    fn wants_snapshots(&self) -> bool {
        self.snapshots
    }

    fn variables(&self, block: usize, variables: &BTreeMap<String, Val>) {
        let vars: serde_json::Map<String, serde_json::Value> = variables
            .iter()
            .map(|(k, v)| (k.clone(), v.to_json()))
            .collect();
        self.emit(json!({ "event": "variables", "block": block, "variables": vars }));
    }
}
