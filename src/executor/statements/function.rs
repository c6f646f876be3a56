//! Function declarations
//!
//! A declaration registers a [`UserFunction`] whose body callback runs the
//! parsed statements against whichever interpreter calls it. Parameters are
//! scoped bindings; call depth is bounded by the interpreter.

use std::sync::Arc;

use super::{execute_statements, Control};
use crate::executor::errors::ScriptError;
use crate::executor::interp::Interpreter;
use crate::executor::types::{FunctionBody, UserFunction, Val};
use crate::parser::FunctionDecl;

pub fn declare(interp: &mut Interpreter<'_>, decl: &FunctionDecl) {
    let body = Arc::new(decl.body.clone());
    let params = decl.params.clone();

    let callback: FunctionBody = Arc::new(
        move |interp: &mut Interpreter<'_>, args: Vec<Val>| -> Result<Val, ScriptError> {
            let saved = interp.ctx.save_bindings(&params);
            for (i, param) in params.iter().enumerate() {
                interp
                    .ctx
                    .set(param.clone(), args.get(i).cloned().unwrap_or_default());
            }
            let result = execute_statements(interp, &body);
            interp.ctx.restore_bindings(saved);

            match result? {
                Control::Return(value) => Ok(value.unwrap_or_default()),
                _ => Ok(Val::Undefined),
            }
        },
    );

    tracing::trace!(function = %decl.name, "Declaring function");
    interp.ctx.define_function(UserFunction {
        name: decl.name.clone(),
        params: decl.params.clone(),
        body: callback,
    });
}
