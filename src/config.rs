//! Engine configuration
//!
//! Resolution order, later sources winning:
//!
//! 1. built-in defaults
//! 2. a TOML file (explicit path, or `TESSERA_CONFIG_PATH`)
//! 3. `TESSERA_*` environment variables (`TESSERA_MAX_LOOP_ITERATIONS=500`)
//! 4. values set on the builder
//!
//! A `.env` file in the working directory is loaded before reading the
//! environment.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::parser::classify::DEFAULT_CLASSIFIER_CAPACITY;
use crate::parser::statements::DEFAULT_MAX_NESTING;

pub const ENV_PREFIX: &str = "TESSERA";
pub const CONFIG_PATH_ENV: &str = "TESSERA_CONFIG_PATH";

/// Which evaluator runs expressions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum EvaluatorMode {
    #[default]
    TreeWalking,
    /// Compile to bytecode where possible, tree-walk the rest
    Bytecode,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub evaluator: EvaluatorMode,
    /// Variable collecting execution-block output
    pub accumulator: String,
    /// Identifier under which host modules are reachable
    pub module_root: String,
    pub classifier_cache_capacity: usize,
    pub expression_cache_capacity: usize,
    /// Iterations after which a loop stops
    pub max_loop_iterations: usize,
    /// Loops past the small-loop threshold poll cancellation this often
    pub cancellation_check_interval: usize,
    pub small_loop_threshold: usize,
    /// Run independent blocks concurrently
    pub parallel: bool,
    pub max_call_depth: usize,
    pub max_nesting_depth: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            evaluator: EvaluatorMode::TreeWalking,
            accumulator: "tR".to_string(),
            module_root: "tp".to_string(),
            classifier_cache_capacity: DEFAULT_CLASSIFIER_CAPACITY,
            expression_cache_capacity: 1024,
            max_loop_iterations: 10_000,
            cancellation_check_interval: 1000,
            small_loop_threshold: 100,
            parallel: true,
            max_call_depth: 64,
            max_nesting_depth: DEFAULT_MAX_NESTING,
        }
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigError {
    #[error("'{field}' must be a valid identifier, got '{value}'")]
    InvalidIdentifier { field: &'static str, value: String },

    #[error("'{field}' must be greater than zero")]
    Zero { field: &'static str },
}

impl EngineConfig {
    pub fn builder() -> EngineConfigBuilder {
        EngineConfigBuilder::default()
    }

    /// Defaults, then `TESSERA_CONFIG_PATH` if set, then the environment.
    pub fn load() -> Result<Self> {
        Self::builder().build()
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        use crate::parser::scanner::is_identifier;

        if !is_identifier(&self.accumulator) {
            return Err(ConfigError::InvalidIdentifier {
                field: "accumulator",
                value: self.accumulator.clone(),
            });
        }
        if !is_identifier(&self.module_root) {
            return Err(ConfigError::InvalidIdentifier {
                field: "module_root",
                value: self.module_root.clone(),
            });
        }
        for (field, value) in [
            ("max_loop_iterations", self.max_loop_iterations),
            ("cancellation_check_interval", self.cancellation_check_interval),
            ("max_call_depth", self.max_call_depth),
            ("max_nesting_depth", self.max_nesting_depth),
        ] {
            if value == 0 {
                return Err(ConfigError::Zero { field });
            }
        }
        Ok(())
    }

    /// The effective configuration as TOML
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).context("Failed to render configuration as TOML")
    }
}

/* ===================== Builder ===================== */

#[derive(Debug, Default)]
pub struct EngineConfigBuilder {
    config_path: Option<PathBuf>,
    use_env: Option<bool>,
    evaluator: Option<EvaluatorMode>,
    accumulator: Option<String>,
    max_loop_iterations: Option<usize>,
    parallel: Option<bool>,
}

impl EngineConfigBuilder {
    pub fn config_path(mut self, path: Option<PathBuf>) -> Self {
        self.config_path = path;
        self
    }

    /// Skip `.env` and `TESSERA_*` variables (tests)
    pub fn without_env(mut self) -> Self {
        self.use_env = Some(false);
        self
    }

    pub fn evaluator(mut self, evaluator: EvaluatorMode) -> Self {
        self.evaluator = Some(evaluator);
        self
    }

    pub fn accumulator(mut self, name: impl Into<String>) -> Self {
        self.accumulator = Some(name.into());
        self
    }

    pub fn max_loop_iterations(mut self, limit: usize) -> Self {
        self.max_loop_iterations = Some(limit);
        self
    }

    pub fn parallel(mut self, parallel: bool) -> Self {
        self.parallel = Some(parallel);
        self
    }

    pub fn build(self) -> Result<EngineConfig> {
        let use_env = self.use_env.unwrap_or(true);
        if use_env {
            // A missing .env is not an error
            let _ = dotenvy::dotenv();
        }

        let path = self.config_path.or_else(|| {
            use_env
                .then(|| std::env::var(CONFIG_PATH_ENV).ok())
                .flatten()
                .map(PathBuf::from)
        });

        let defaults = config::Config::try_from(&EngineConfig::default())
            .context("Failed to build default configuration")?;
        let mut builder = config::Config::builder().add_source(defaults);
        if let Some(path) = &path {
            tracing::debug!(path = %path.display(), "Loading configuration file");
            builder = builder.add_source(config::File::from(path.clone()).required(true));
        }
        if use_env {
            builder = builder.add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .try_parsing(true),
            );
        }

        let mut config: EngineConfig = builder
            .build()
            .context("Failed to load configuration")?
            .try_deserialize()
            .context("Invalid configuration")?;

        if let Some(evaluator) = self.evaluator {
            config.evaluator = evaluator;
        }
        if let Some(accumulator) = self.accumulator {
            config.accumulator = accumulator;
        }
        if let Some(limit) = self.max_loop_iterations {
            config.max_loop_iterations = limit;
        }
        if let Some(parallel) = self.parallel {
            config.parallel = parallel;
        }

        config.validate()?;
        Ok(config)
    }
}
