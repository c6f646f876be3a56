//! Shared, read-only engine services
//!
//! One [`Services`] value is built per engine and shared by every block of
//! every render, including blocks running on blocking threads.

use std::sync::Arc;

use super::evaluate::ExpressionCache;
use crate::config::EngineConfig;
use crate::host::{ExecutionTrace, FrontmatterAccess, MapFrontmatter, ModuleExecutor, NoModules, NoTrace};
use crate::parser::{StatementClassifier, StatementParser};
use crate::scheduler::FunctionRegistry;

pub struct Services {
    pub config: EngineConfig,
    pub modules: Arc<dyn ModuleExecutor>,
    pub frontmatter: Arc<dyn FrontmatterAccess>,
    pub trace: Arc<dyn ExecutionTrace>,
    pub registry: FunctionRegistry,
    pub parser: StatementParser,
    pub expressions: ExpressionCache,
}

impl Services {
    pub fn new(config: EngineConfig) -> Self {
        let classifier = Arc::new(StatementClassifier::new(
            config.accumulator.clone(),
            config.classifier_cache_capacity,
        ));
        Self {
            modules: Arc::new(NoModules),
            frontmatter: Arc::new(MapFrontmatter::default()),
            trace: Arc::new(NoTrace),
            registry: FunctionRegistry::new(config.module_root.clone()),
            parser: StatementParser::new(classifier).with_max_depth(config.max_nesting_depth),
            expressions: ExpressionCache::new(config.expression_cache_capacity, config.evaluator),
            config,
        }
    }

    pub fn with_modules(mut self, modules: Arc<dyn ModuleExecutor>) -> Self {
        self.modules = modules;
        self
    }

    pub fn with_frontmatter(mut self, frontmatter: Arc<dyn FrontmatterAccess>) -> Self {
        self.frontmatter = frontmatter;
        self
    }

    pub fn with_trace(mut self, trace: Arc<dyn ExecutionTrace>) -> Self {
        self.trace = trace;
        self
    }

    pub fn with_registry(mut self, registry: FunctionRegistry) -> Self {
        self.registry = registry;
        self
    }
}

impl Default for Services {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}
