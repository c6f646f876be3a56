//! Declarations and assignments
//!
//! Identifier targets take a fast path that skips the expression parser for
//! the left-hand side. `name += <string>` on a string variable appends to a
//! pending builder instead of copying the whole string.

use super::Control;
use crate::executor::errors::ScriptError;
use crate::executor::expressions::RuntimeContext;
use crate::executor::interp::Interpreter;
use crate::executor::types::{ops, BinaryOp, UnaryOp, Val};
use crate::parser::scanner::{self, is_identifier, starts_with_word};
use crate::parser::{parse_binding, Binding, ParseFailure};

/// `let`/`const`/`var` with one or more declarators
pub fn execute_declaration(interp: &mut Interpreter<'_>, body: &str) -> Result<Control, ScriptError> {
    let keyword = ["let", "const", "var"]
        .into_iter()
        .find(|kw| starts_with_word(body, kw))
        .unwrap_or("");
    let declarators = &body[keyword.len()..];

    for declarator in scanner::split_top_level(declarators, b',') {
        let declarator = declarator.trim();
        if declarator.is_empty() {
            continue;
        }
        let (binding, rest) = parse_binding(declarator)?;
        let value = match rest.strip_prefix('=') {
            Some(init) => interp.evaluate(init)?,
            None if rest.is_empty() => Val::Undefined,
            None => {
                return Err(ParseFailure::UnexpectedToken {
                    found: rest.to_string(),
                    offset: declarator.len() - rest.len(),
                }
                .into())
            }
        };
        bind(interp, &binding, value)?;
    }
    Ok(Control::None)
}

/// Assign `value` to a binding, destructuring as needed
pub fn bind(interp: &mut Interpreter<'_>, binding: &Binding, value: Val) -> Result<(), ScriptError> {
    match binding {
        Binding::Name(name) => interp.set_variable(name, value),
        Binding::Array(names) => {
            let items = match value {
                Val::List(items) => items,
                Val::Str(s) => s.chars().map(|c| Val::Str(c.to_string())).collect(),
                other => {
                    return Err(ScriptError::type_error(format!(
                        "{} is not iterable",
                        other.type_name_for_error()
                    )))
                }
            };
            for (i, name) in names.iter().enumerate() {
                interp.set_variable(name, items.get(i).cloned().unwrap_or_default())?;
            }
            Ok(())
        }
        Binding::Object(pairs) => {
            if value.is_nullish() {
                return Err(ScriptError::type_error(format!(
                    "Cannot destructure {}",
                    value.type_name_for_error()
                )));
            }
            for (key, name) in pairs {
                let v = interp.get_property(&value, key)?;
                interp.set_variable(name, v)?;
            }
            Ok(())
        }
    }
}

/// Plain and compound assignment, including accumulator writes
pub fn execute_assignment(interp: &mut Interpreter<'_>, body: &str) -> Result<Control, ScriptError> {
    let Some((eq, op)) = scanner::find_assignment(body) else {
        interp.evaluate(body)?;
        return Ok(Control::None);
    };
    let target_end = if op.is_some() { eq - 1 } else { eq };
    let target = body[..target_end].trim();
    if !is_identifier(target) {
        // member or index target: the expression evaluator writes it back
        interp.evaluate(body)?;
        return Ok(Control::None);
    }

    let value = interp.evaluate(&body[eq + 1..])?;
    match op.and_then(BinaryOp::from_compound) {
        None => interp.set_variable(target, value)?,
        Some(BinaryOp::Add) if interp.ctx.append_string(target, &value.to_display_string()) => {}
        Some(op) => {
            let current = interp.get_variable(target)?;
            interp.set_variable(target, ops::binary(op, &current, &value))?;
        }
    }
    Ok(Control::None)
}

/// `x++`, `++x`, `x--`, `--x` as statements
pub fn execute_update(interp: &mut Interpreter<'_>, body: &str, delta: i64) -> Result<Control, ScriptError> {
    let target = body.trim_matches(|c| c == '+' || c == '-').trim();
    if is_identifier(target) {
        let current = ops::unary(UnaryOp::Plus, &interp.get_variable(target)?);
        interp.set_variable(target, ops::binary(BinaryOp::Add, &current, &Val::Int(delta)))?;
    } else {
        interp.evaluate(body)?;
    }
    Ok(Control::None)
}
