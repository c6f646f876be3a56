//! Loop execution
//!
//! Counted `for`, `for...of`, `for...in` and `while` share one driver that
//! owns the iteration cap, cancellation polling and the per-iteration cache.

use super::assignment::{self, bind};
use super::{execute_statements, Control};
use crate::config::EngineConfig;
use crate::executor::errors::ScriptError;
use crate::executor::interp::Interpreter;
use crate::executor::types::Val;
use crate::parser::scanner::starts_with_word;
use crate::parser::{parse_binding, Binding, LoopBlock, LoopKind, Statement};

/* ===================== Driver ===================== */

struct LoopDriver {
    iterations: usize,
    cap: usize,
    check_interval: usize,
    small_loop_threshold: usize,
}

impl LoopDriver {
    fn new(config: &EngineConfig) -> Self {
        Self {
            iterations: 0,
            cap: config.max_loop_iterations,
            check_interval: config.cancellation_check_interval.max(1),
            small_loop_threshold: config.small_loop_threshold,
        }
    }

    /// Start the next iteration; `false` once the cap is reached.
    fn begin(&mut self, interp: &mut Interpreter<'_>) -> Result<bool, ScriptError> {
        if self.iterations >= self.cap {
            tracing::warn!(
                block = interp.block,
                limit = self.cap,
                "Loop stopped at the iteration limit"
            );
            return Ok(false);
        }
        if self.iterations < self.small_loop_threshold || self.iterations % self.check_interval == 0 {
            interp.check_cancelled()?;
        }
        interp.ctx.clear_iteration_cache();
        self.iterations += 1;
        Ok(true)
    }

    /// Run one body; `Some` ends the loop with that control.
    fn run_body(
        &mut self,
        interp: &mut Interpreter<'_>,
        body: &[Statement],
    ) -> Result<Option<Control>, ScriptError> {
        match execute_statements(interp, body)? {
            Control::None | Control::Continue => Ok(None),
            Control::Break => Ok(Some(Control::None)),
            ret @ Control::Return(_) => Ok(Some(ret)),
        }
    }
}

/* ===================== Loops ===================== */

pub fn execute_loop(interp: &mut Interpreter<'_>, block: &LoopBlock) -> Result<Control, ScriptError> {
    let scoped = scoped_names(&block.kind);
    let saved = interp.ctx.save_bindings(&scoped);
    let mut driver = LoopDriver::new(&interp.services.config);
    interp.enter_loop();

    let result = match &block.kind {
        LoopKind::Counted { init, test, update } => run_counted(
            interp,
            &mut driver,
            init.as_deref(),
            test.as_deref(),
            update.as_deref(),
            &block.body,
        ),
        LoopKind::While { test } => run_counted(interp, &mut driver, None, Some(test.as_str()), None, &block.body),
        LoopKind::ForOf { binding, iterable } => {
            run_for_of(interp, &mut driver, binding, iterable, &block.body)
        }
        LoopKind::ForIn { binding, object } => {
            run_for_in(interp, &mut driver, binding, object, &block.body)
        }
    };

    interp.exit_loop();
    interp.ctx.finalize_builders();
    interp.ctx.restore_bindings(saved);
    tracing::trace!(iterations = driver.iterations, "Loop finished");
    result
}

/// Variables declared by the loop header, restored when the loop ends
fn scoped_names(kind: &LoopKind) -> Vec<String> {
    match kind {
        LoopKind::Counted { init: Some(init), .. } => {
            let declared = ["let", "const", "var"]
                .into_iter()
                .find(|kw| starts_with_word(init, kw));
            match declared {
                Some(kw) => crate::parser::scanner::split_top_level(&init[kw.len()..], b',')
                    .into_iter()
                    .filter_map(|d| parse_binding(d).ok())
                    .flat_map(|(b, _)| b.names())
                    .collect(),
                None => Vec::new(),
            }
        }
        LoopKind::ForOf { binding, .. } | LoopKind::ForIn { binding, .. } => binding.names(),
        _ => Vec::new(),
    }
}

fn run_counted(
    interp: &mut Interpreter<'_>,
    driver: &mut LoopDriver,
    init: Option<&str>,
    test: Option<&str>,
    update: Option<&str>,
    body: &[Statement],
) -> Result<Control, ScriptError> {
    if let Some(init) = init {
        if ["let", "const", "var"].iter().any(|kw| starts_with_word(init, kw)) {
            assignment::execute_declaration(interp, init)?;
        } else {
            interp.evaluate(init)?;
        }
    }

    loop {
        if let Some(test) = test {
            if !interp.evaluate(test)?.is_truthy() {
                return Ok(Control::None);
            }
        }
        if !driver.begin(interp)? {
            return Ok(Control::None);
        }
        if let Some(control) = driver.run_body(interp, body)? {
            return Ok(control);
        }
        if let Some(update) = update {
            interp.evaluate(update)?;
        }
    }
}

fn run_for_of(
    interp: &mut Interpreter<'_>,
    driver: &mut LoopDriver,
    binding: &Binding,
    iterable: &str,
    body: &[Statement],
) -> Result<Control, ScriptError> {
    let items = match interp.evaluate(iterable)? {
        Val::List(items) => items,
        Val::Str(s) => s.chars().map(|c| Val::Str(c.to_string())).collect(),
        other => {
            return Err(ScriptError::type_error(format!(
                "{} is not iterable",
                other.type_name_for_error()
            )))
        }
    };
    iterate(interp, driver, binding, items, body)
}

fn run_for_in(
    interp: &mut Interpreter<'_>,
    driver: &mut LoopDriver,
    binding: &Binding,
    object: &str,
    body: &[Statement],
) -> Result<Control, ScriptError> {
    let keys = match interp.evaluate(object)? {
        Val::Obj(map) => map.into_keys().map(Val::Str).collect(),
        Val::List(items) => (0..items.len()).map(|i| Val::Str(i.to_string())).collect(),
        Val::Str(s) => (0..s.chars().count()).map(|i| Val::Str(i.to_string())).collect(),
        _ => Vec::new(),
    };
    iterate(interp, driver, binding, keys, body)
}

fn iterate(
    interp: &mut Interpreter<'_>,
    driver: &mut LoopDriver,
    binding: &Binding,
    items: Vec<Val>,
    body: &[Statement],
) -> Result<Control, ScriptError> {
    for item in items {
        if !driver.begin(interp)? {
            break;
        }
        bind(interp, binding, item)?;
        if let Some(control) = driver.run_body(interp, body)? {
            return Ok(control);
        }
    }
    Ok(Control::None)
}
