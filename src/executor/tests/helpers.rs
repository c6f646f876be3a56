//! Test helpers for executor tests
//!
//! Builds an [`Interpreter`] over a fresh context with default services and
//! no way to cancel.

use std::collections::HashMap;

use crate::executor::statements::execute_source;
use crate::executor::{Control, Interpreter, ScriptContext, ScriptError, Services, Val};
use crate::host::NeverCancelled;

pub fn context() -> ScriptContext {
    ScriptContext::new("tR")
}

/// Evaluate one expression against an empty context
pub fn eval(source: &str) -> Result<Val, ScriptError> {
    eval_with(source, HashMap::new())
}

/// Evaluate one expression with the given variables in scope
pub fn eval_with(source: &str, vars: HashMap<String, Val>) -> Result<Val, ScriptError> {
    let services = Services::default();
    let mut ctx = context().with_variables(vars);
    let mut interp = Interpreter::new(&mut ctx, &services, &NeverCancelled);
    interp.evaluate(source)
}

/// Run statement source against `ctx` with the given services
pub fn run_in(
    services: &Services,
    ctx: &mut ScriptContext,
    code: &str,
) -> Result<Control, ScriptError> {
    let mut interp = Interpreter::new(ctx, services, &NeverCancelled);
    execute_source(&mut interp, code)
}

/// Run statement source on a fresh context, panicking on faults
pub fn run(code: &str) -> ScriptContext {
    let services = Services::default();
    let mut ctx = context();
    if let Err(e) = run_in(&services, &mut ctx, code) {
        panic!("script failed: {}\n{}", e, code);
    }
    ctx
}

/// Run statement source and return the accumulator text
pub fn output(code: &str) -> String {
    run(code).accumulated_output()
}

/// A variable's value, `undefined` when unbound
pub fn var(ctx: &ScriptContext, name: &str) -> Val {
    ctx.get(name).unwrap_or_default()
}

pub fn list(items: &[i64]) -> Val {
    Val::List(items.iter().map(|&n| Val::Int(n)).collect())
}

pub fn text(s: &str) -> Val {
    Val::Str(s.to_string())
}
