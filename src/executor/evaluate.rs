//! Expression dispatch
//!
//! Parsed ASTs and compiled bytecode are cached by expression text. With the
//! bytecode evaluator selected, expressions inside the compilable subset run
//! on the VM and everything else falls back to the tree walker.

use lru::LruCache;
use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex};

use super::errors::ScriptError;
use super::expressions::{eval_expr, EvalResult};
use super::interp::Interpreter;
use super::types::Expr;
use crate::bytecode::{self, BytecodeProgram};
use crate::config::EvaluatorMode;
use crate::parser::parse_expression;

/// Everything derived from one expression's source text
#[derive(Debug)]
pub struct CompiledExpression {
    pub ast: Expr,
    /// `None` when the evaluator is tree-walking or the text is not compilable
    pub program: Option<BytecodeProgram>,
}

pub struct ExpressionCache {
    mode: EvaluatorMode,
    /// Oldest-inserted entries are evicted first; `None` disables caching
    entries: Option<Mutex<LruCache<String, Arc<CompiledExpression>>>>,
}

impl ExpressionCache {
    pub fn new(capacity: usize, mode: EvaluatorMode) -> Self {
        Self {
            mode,
            entries: NonZeroUsize::new(capacity).map(|cap| Mutex::new(LruCache::new(cap))),
        }
    }

    pub fn mode(&self) -> EvaluatorMode {
        self.mode
    }

    /// Parse (and maybe compile) `source`, reusing a cached result.
    pub fn compile(&self, source: &str) -> Result<Arc<CompiledExpression>, ScriptError> {
        let key = source.trim();
        let cached = self
            .entries
            .as_ref()
            .and_then(|c| c.lock().ok().and_then(|c| c.peek(key).cloned()));
        if let Some(hit) = cached {
            return Ok(hit);
        }

        let ast = parse_expression(key)?;
        let program = match self.mode {
            EvaluatorMode::TreeWalking => None,
            EvaluatorMode::Bytecode => match bytecode::compile(key) {
                Ok(program) => Some(program),
                Err(e) => {
                    tracing::trace!(expression = %key, reason = %e, "Falling back to tree-walking");
                    None
                }
            },
        };

        let compiled = Arc::new(CompiledExpression { ast, program });
        if let Some(Ok(mut cache)) = self.entries.as_ref().map(|c| c.lock()) {
            cache.push(key.to_string(), compiled.clone());
        }
        Ok(compiled)
    }

    pub fn len(&self) -> usize {
        self.entries
            .as_ref()
            .and_then(|c| c.lock().ok().map(|c| c.len()))
            .unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Evaluate expression source against an interpreter
pub fn evaluate(interp: &mut Interpreter<'_>, source: &str) -> EvalResult {
    let compiled = interp.services.expressions.compile(source)?;
    match &compiled.program {
        Some(program) => bytecode::vm::execute(program, interp),
        None => eval_expr(&compiled.ast, interp),
    }
}
