//! `if` / `else if` / `else`

use super::{execute_statements, Control};
use crate::executor::errors::ScriptError;
use crate::executor::interp::Interpreter;
use crate::parser::IfBlock;

/// Conditions are tested in order; the first truthy one runs its body.
pub fn execute_if(interp: &mut Interpreter<'_>, block: &IfBlock) -> Result<Control, ScriptError> {
    if interp.evaluate(&block.condition)?.is_truthy() {
        return execute_statements(interp, &block.body);
    }
    for (condition, body) in &block.else_ifs {
        if interp.evaluate(condition)?.is_truthy() {
            return execute_statements(interp, body);
        }
    }
    match &block.else_body {
        Some(body) => execute_statements(interp, body),
        None => Ok(Control::None),
    }
}
