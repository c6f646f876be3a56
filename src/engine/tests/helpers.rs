//! Test helpers for engine tests

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use crate::config::EngineConfig;
use crate::engine::{RenderOutcome, TemplateEngine};
use crate::executor::{ScriptError, Val};
use crate::host::{CancellationChecker, ExecutionTrace, ModuleExecutor};
use crate::template::BlockKind;

pub fn sequential_config() -> EngineConfig {
    EngineConfig {
        parallel: false,
        ..EngineConfig::default()
    }
}

/// Render to completion with the default engine
pub async fn render(template: &str) -> String {
    render_with(&TemplateEngine::default(), template).await
}

pub async fn render_with(engine: &TemplateEngine, template: &str) -> String {
    match engine.render_to_end(template).await {
        RenderOutcome::Completed(output) => output,
        RenderOutcome::Cancelled => panic!("render cancelled: {}", template),
    }
}

/// Reports cancellation once it has been polled `remaining` times
pub struct CancelAfter {
    remaining: AtomicUsize,
}

impl CancelAfter {
    pub fn new(polls: usize) -> Self {
        Self {
            remaining: AtomicUsize::new(polls),
        }
    }
}

impl CancellationChecker for CancelAfter {
    fn check_cancelled(&self) -> Result<(), ScriptError> {
        let before = self
            .remaining
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1));
        match before {
            Ok(_) => Ok(()),
            Err(_) => Err(ScriptError::Cancelled),
        }
    }
}

/// Collects trace events as strings
#[derive(Default)]
pub struct RecordingTrace {
    pub events: Mutex<Vec<String>>,
    pub snapshots: Mutex<Vec<BTreeMap<String, Val>>>,
}

impl RecordingTrace {
    pub fn events(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }
}

impl ExecutionTrace for RecordingTrace {
    fn block_started(&self, block: usize, kind: BlockKind, _code: &str) {
        self.events
            .lock()
            .unwrap()
            .push(format!("start {} {:?}", block, kind));
    }

    fn block_finished(&self, block: usize, output: &str) {
        self.events
            .lock()
            .unwrap()
            .push(format!("finish {} {:?}", block, output));
    }

    fn wants_snapshots(&self) -> bool {
        true
    }

    fn variables(&self, _block: usize, variables: &BTreeMap<String, Val>) {
        self.snapshots.lock().unwrap().push(variables.clone());
    }
}

/// Answers every module call with the number of calls made so far
#[derive(Default)]
pub struct CountingModules {
    pub calls: AtomicUsize,
}

impl ModuleExecutor for CountingModules {
    fn execute_module_function(
        &self,
        _module: &str,
        _function: &str,
        _args: &[Val],
    ) -> Result<Val, ScriptError> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(Val::Int(n as i64))
    }
}
