//! `try` / `catch` / `finally`

use super::{execute_statements, Control};
use crate::executor::errors::ScriptError;
use crate::executor::interp::Interpreter;
use crate::parser::TryBlock;

/// Faults other than cancellation are caught. The catch variable holds the
/// thrown value (or the fault message) and is restored after the handler.
/// `finally` runs on every path, and a non-local exit from it wins.
pub fn execute_try(interp: &mut Interpreter<'_>, block: &TryBlock) -> Result<Control, ScriptError> {
    let mut outcome = execute_statements(interp, &block.body);

    if let Some(handler) = &block.catch_body {
        let caught = match &outcome {
            Err(error) if !error.is_cancelled() => {
                tracing::debug!(block = interp.block, error = %error, "Caught script fault");
                Some(error.catch_value())
            }
            _ => None,
        };
        if let Some(caught) = caught {
            let names: Vec<&String> = block.catch_var.iter().collect();
            let saved = interp.ctx.save_bindings(&names);
            if let Some(var) = &block.catch_var {
                interp.ctx.set(var.clone(), caught);
            }
            outcome = execute_statements(interp, handler);
            interp.ctx.restore_bindings(saved);
        }
    }

    if let Some(finally) = &block.finally_body {
        let control = execute_statements(interp, finally)?;
        if control != Control::None {
            return Ok(control);
        }
    }
    outcome
}
