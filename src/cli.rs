use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use crate::bytecode;
use crate::config::{EngineConfig, EvaluatorMode};
use crate::engine::{BuiltinModules, RenderOutcome, TemplateEngine};
use crate::host::{JsonTrace, MapFrontmatter};
use crate::template::parse_template;

#[derive(Parser)]
#[command(name = "tessera")]
#[command(about = "Tessera - render templates with embedded scripts", long_about = None)]
pub struct Cli {
    /// Path to config file (overrides TESSERA_CONFIG_PATH)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Render a template file to stdout
    Render {
        /// Template file
        file: PathBuf,

        /// Frontmatter values as a JSON object
        #[arg(long)]
        frontmatter: Option<String>,

        /// Expression evaluator
        #[arg(long, value_enum)]
        evaluator: Option<EvaluatorMode>,

        /// Run every block on its own, in order
        #[arg(long)]
        sequential: bool,

        /// Write JSON-lines execution events to stderr
        #[arg(long)]
        trace: bool,
    },

    /// Print the execution plan of a template as JSON
    Plan {
        /// Template file
        file: PathBuf,

        /// Include the per-block analysis
        #[arg(long)]
        analysis: bool,
    },

    /// Compile an expression and print its bytecode
    Disasm {
        /// Expression source
        expression: String,
    },

    /// Print the effective configuration as TOML
    Config,
}

/// Run the CLI by parsing process arguments
pub async fn run_cli() -> Result<()> {
    let cli = Cli::parse();
    run_cli_with_args(cli).await
}

/// Run the CLI with provided arguments
pub async fn run_cli_from_args(args: Vec<String>) -> Result<()> {
    let cli = Cli::parse_from(args);
    run_cli_with_args(cli).await
}

async fn run_cli_with_args(cli: Cli) -> Result<()> {
    let builder = EngineConfig::builder().config_path(cli.config.clone());

    match cli.command {
        Commands::Render {
            file,
            frontmatter,
            evaluator,
            sequential,
            trace,
        } => {
            let mut builder = builder;
            if let Some(evaluator) = evaluator {
                builder = builder.evaluator(evaluator);
            }
            if sequential {
                builder = builder.parallel(false);
            }
            let config = builder.build()?;

            let template = std::fs::read_to_string(&file)
                .with_context(|| format!("Failed to read template {}", file.display()))?;

            let mut engine = TemplateEngine::builder()
                .config(config)
                .modules(Arc::new(BuiltinModules::new().with_file(&file)));
            if let Some(json) = frontmatter {
                let value: serde_json::Value =
                    serde_json::from_str(&json).context("Frontmatter must be valid JSON")?;
                if !value.is_object() {
                    bail!("Frontmatter must be a JSON object");
                }
                engine = engine.frontmatter(Arc::new(MapFrontmatter::from_json(&value)));
            }
            if trace {
                engine = engine.trace(Arc::new(JsonTrace::new(std::io::stderr())));
            }
            let engine = engine.build();

            let token = CancellationToken::new();
            let on_interrupt = token.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    on_interrupt.cancel();
                }
            });

            match engine.render(&template, Arc::new(token)).await {
                RenderOutcome::Completed(output) => print!("{}", output),
                RenderOutcome::Cancelled => bail!("Render cancelled"),
            }
        }

        Commands::Plan { file, analysis } => {
            let config = builder.build()?;
            let template = std::fs::read_to_string(&file)
                .with_context(|| format!("Failed to read template {}", file.display()))?;
            let engine = TemplateEngine::new(config);

            let plan = engine.plan(&template);
            let out = if analysis {
                let blocks = engine.analyze(&parse_template(&template).blocks);
                serde_json::json!({ "plan": plan, "blocks": blocks })
            } else {
                serde_json::to_value(&plan)?
            };
            println!("{}", serde_json::to_string_pretty(&out)?);
        }

        Commands::Disasm { expression } => {
            let program = bytecode::compile(&expression)
                .with_context(|| format!("Cannot compile '{}'", expression))?;
            print!("{}", program.disassemble());
        }

        Commands::Config => {
            let config = builder.build()?;
            print!("{}", config.to_toml()?);
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_render_arguments() {
        let cli = Cli::parse_from([
            "tessera",
            "render",
            "note.md",
            "--evaluator",
            "bytecode",
            "--sequential",
        ]);
        match cli.command {
            Commands::Render {
                file,
                evaluator,
                sequential,
                trace,
                ..
            } => {
                assert_eq!(file, PathBuf::from("note.md"));
                assert_eq!(evaluator, Some(EvaluatorMode::Bytecode));
                assert!(sequential);
                assert!(!trace);
            }
            _ => panic!("expected render"),
        }
    }

    #[test]
    fn test_global_config_flag() {
        let cli = Cli::parse_from(["tessera", "disasm", "1 + 2", "--config", "engine.toml"]);
        assert_eq!(cli.config, Some(PathBuf::from("engine.toml")));
        assert!(matches!(cli.command, Commands::Disasm { .. }));
    }
}
