//! # Template Engine
//!
//! Renders a template end to end: blocks are extracted, analyzed and packed
//! into phases, then every phase runs against one shared [`ScriptContext`].
//!
//! Every block runs on a blocking task. Parallel phases give each block its
//! own fork of the context; the forks' changes are merged back in template
//! order once every task of the phase has finished. Sequential phases move
//! the shared context into each block's task and back.
//!
//! Rendering never fails: faults become inline markers, and cancellation
//! yields [`RenderOutcome::Cancelled`].

pub mod modules;
pub mod runner;

#[cfg(test)]
mod tests;

use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::config::EngineConfig;
use crate::executor::{ScriptContext, Services};
use crate::host::{CancellationChecker, ExecutionTrace, FrontmatterAccess, ModuleExecutor, NeverCancelled};
use crate::scheduler::{create_execution_plan, BlockAnalysis, DependencyAnalyzer, ExecutionPlan, FunctionRegistry};
use crate::template::{parse_template, ParsedTemplate, TemplateBlock};

pub use modules::BuiltinModules;
pub use runner::{run_block, BlockOutcome};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenderOutcome {
    Completed(String),
    Cancelled,
}

impl RenderOutcome {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, RenderOutcome::Cancelled)
    }

    pub fn into_output(self) -> Option<String> {
        match self {
            RenderOutcome::Completed(output) => Some(output),
            RenderOutcome::Cancelled => None,
        }
    }
}

/// Marker for a render that observed cancellation
struct Cancelled;

/* ===================== Builder ===================== */

#[derive(Default)]
pub struct TemplateEngineBuilder {
    config: Option<EngineConfig>,
    modules: Option<Arc<dyn ModuleExecutor>>,
    frontmatter: Option<Arc<dyn FrontmatterAccess>>,
    trace: Option<Arc<dyn ExecutionTrace>>,
    registry: Option<FunctionRegistry>,
}

impl TemplateEngineBuilder {
    pub fn config(mut self, config: EngineConfig) -> Self {
        self.config = Some(config);
        self
    }

    pub fn modules(mut self, modules: Arc<dyn ModuleExecutor>) -> Self {
        self.modules = Some(modules);
        self
    }

    pub fn frontmatter(mut self, frontmatter: Arc<dyn FrontmatterAccess>) -> Self {
        self.frontmatter = Some(frontmatter);
        self
    }

    pub fn trace(mut self, trace: Arc<dyn ExecutionTrace>) -> Self {
        self.trace = Some(trace);
        self
    }

    /// Replace the default function registry (built from the module root)
    pub fn registry(mut self, registry: FunctionRegistry) -> Self {
        self.registry = Some(registry);
        self
    }

    pub fn build(self) -> TemplateEngine {
        let mut services = Services::new(self.config.unwrap_or_default());
        if let Some(modules) = self.modules {
            services = services.with_modules(modules);
        }
        if let Some(frontmatter) = self.frontmatter {
            services = services.with_frontmatter(frontmatter);
        }
        if let Some(trace) = self.trace {
            services = services.with_trace(trace);
        }
        if let Some(registry) = self.registry {
            services = services.with_registry(registry);
        }
        TemplateEngine {
            services: Arc::new(services),
        }
    }
}

/* ===================== Engine ===================== */

pub struct TemplateEngine {
    services: Arc<Services>,
}

impl TemplateEngine {
    pub fn new(config: EngineConfig) -> Self {
        Self::builder().config(config).build()
    }

    pub fn builder() -> TemplateEngineBuilder {
        TemplateEngineBuilder::default()
    }

    pub fn config(&self) -> &EngineConfig {
        &self.services.config
    }

    pub fn services(&self) -> &Services {
        &self.services
    }

    /// A fresh context with this engine's accumulator name
    pub fn new_context(&self) -> ScriptContext {
        ScriptContext::new(self.services.config.accumulator.clone())
    }

    pub fn analyze(&self, blocks: &[TemplateBlock]) -> Vec<BlockAnalysis> {
        let services = &self.services;
        DependencyAnalyzer::new(&services.registry, &services.config.accumulator).analyze_template(blocks)
    }

    /// The phase plan a render of `template` would follow.
    pub fn plan(&self, template: &str) -> ExecutionPlan {
        self.plan_blocks(&parse_template(template).blocks)
    }

    fn plan_blocks(&self, blocks: &[TemplateBlock]) -> ExecutionPlan {
        if self.services.config.parallel {
            create_execution_plan(&self.analyze(blocks))
        } else {
            ExecutionPlan::sequential(blocks.len())
        }
    }

    pub async fn render(&self, template: &str, cancel: Arc<dyn CancellationChecker>) -> RenderOutcome {
        self.render_with_context(template, self.new_context(), cancel).await.0
    }

    /// Render with no way to cancel
    pub async fn render_to_end(&self, template: &str) -> RenderOutcome {
        self.render(template, Arc::new(NeverCancelled)).await
    }

    /// Render starting from `ctx`; returns the context as the render left it.
    pub async fn render_with_context(
        &self,
        template: &str,
        ctx: ScriptContext,
        cancel: Arc<dyn CancellationChecker>,
    ) -> (RenderOutcome, ScriptContext) {
        let span = info_span!("render", id = %Uuid::new_v4());
        self.render_inner(template, ctx, cancel).instrument(span).await
    }

    async fn render_inner(
        &self,
        template: &str,
        ctx: ScriptContext,
        cancel: Arc<dyn CancellationChecker>,
    ) -> (RenderOutcome, ScriptContext) {
        let parsed = parse_template(template);
        let plan = self.plan_blocks(&parsed.blocks);
        info!(
            blocks = parsed.blocks.len(),
            phases = plan.phases.len(),
            parallel_phases = plan.parallel_phases(),
            "Rendering template"
        );

        let shared = Arc::new(Mutex::new(ctx));
        let mut outputs = vec![String::new(); parsed.blocks.len()];
        let result = self.run_plan(&parsed, &plan, &shared, &cancel, &mut outputs).await;

        let ctx = match Arc::try_unwrap(shared) {
            Ok(ctx) => ctx.into_inner(),
            Err(shared) => shared.lock().await.clone(),
        };
        match result {
            Ok(()) => (RenderOutcome::Completed(parsed.assemble(&outputs)), ctx),
            Err(Cancelled) => {
                info!("Render cancelled");
                (RenderOutcome::Cancelled, ctx)
            }
        }
    }

    async fn run_plan(
        &self,
        parsed: &ParsedTemplate,
        plan: &ExecutionPlan,
        shared: &Arc<Mutex<ScriptContext>>,
        cancel: &Arc<dyn CancellationChecker>,
        outputs: &mut [String],
    ) -> Result<(), Cancelled> {
        for (n, phase) in plan.phases.iter().enumerate() {
            if cancel.check_cancelled().is_err() {
                return Err(Cancelled);
            }
            debug!(phase = n, blocks = ?phase.blocks, parallel = phase.parallel, "Starting phase");
            if phase.parallel {
                self.run_parallel(parsed, &phase.blocks, shared, cancel, outputs).await?;
            } else {
                self.run_sequential(parsed, &phase.blocks, shared, cancel, outputs).await?;
            }
        }
        Ok(())
    }

    async fn run_sequential(
        &self,
        parsed: &ParsedTemplate,
        blocks: &[usize],
        shared: &Arc<Mutex<ScriptContext>>,
        cancel: &Arc<dyn CancellationChecker>,
        outputs: &mut [String],
    ) -> Result<(), Cancelled> {
        for &i in blocks {
            if cancel.check_cancelled().is_err() {
                return Err(Cancelled);
            }
            let mut shared_ctx = shared.lock().await;
            let mut ctx = std::mem::replace(&mut *shared_ctx, self.new_context());
            let services = Arc::clone(&self.services);
            let block = parsed.blocks[i].clone();
            let cancel = Arc::clone(cancel);

            let joined = tokio::task::spawn_blocking(move || {
                let outcome = run_block(&services, &mut ctx, &block, &*cancel);
                (outcome, ctx)
            })
            .await;

            match joined {
                Ok((outcome, ctx)) => {
                    *shared_ctx = ctx;
                    match outcome {
                        BlockOutcome::Output(text) => outputs[i] = text,
                        BlockOutcome::Cancelled => return Err(Cancelled),
                    }
                }
                // the context moved into the failed task is lost
                Err(err) => {
                    warn!(block = i, error = %err, "Block task failed");
                    outputs[i] = format!("[Error: {}]", err);
                }
            }
        }
        Ok(())
    }

    async fn run_parallel(
        &self,
        parsed: &ParsedTemplate,
        blocks: &[usize],
        shared: &Arc<Mutex<ScriptContext>>,
        cancel: &Arc<dyn CancellationChecker>,
        outputs: &mut [String],
    ) -> Result<(), Cancelled> {
        let base = shared.lock().await.fork();

        let handles: Vec<_> = blocks
            .iter()
            .map(|&i| {
                let services = Arc::clone(&self.services);
                let block = parsed.blocks[i].clone();
                let cancel = Arc::clone(cancel);
                let mut fork = base.fork();
                tokio::task::spawn_blocking(move || {
                    let outcome = run_block(&services, &mut fork, &block, &*cancel);
                    (outcome, fork)
                })
            })
            .collect();

        let mut finished = Vec::with_capacity(handles.len());
        for handle in handles {
            finished.push(handle.await);
        }

        let mut ctx = shared.lock().await;
        let mut cancelled = false;
        for (&i, joined) in blocks.iter().zip(finished) {
            match joined {
                Ok((BlockOutcome::Output(text), fork)) => {
                    if ctx.return_requested() {
                        debug!(block = i, "Discarding block that ran alongside a return");
                        continue;
                    }
                    ctx.apply(fork.delta_from(&base));
                    outputs[i] = text;
                }
                Ok((BlockOutcome::Cancelled, _)) => cancelled = true,
                Err(err) => {
                    warn!(block = i, error = %err, "Block task failed");
                    outputs[i] = format!("[Error: {}]", err);
                }
            }
        }

        if cancelled {
            Err(Cancelled)
        } else {
            Ok(())
        }
    }
}

impl Default for TemplateEngine {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}
