//! Tree-walking expression evaluation
//!
//! Evaluates an [`Expr`] against a [`RuntimeContext`]. The context owns
//! variables, function dispatch, property access and construction; this
//! module owns evaluation order, short-circuiting and assignment.
//!
//! Arrays and objects have value semantics: `o.p = v` and `a[i] = v` read the
//! container, update it and write it back through its own target.

use std::collections::BTreeMap;

use super::errors::{self, ScriptError};
use super::types::ops;
use super::types::{BinaryOp, Closure, Expr, LogicalOp, TemplatePart, UnaryOp, Val};

pub type EvalResult = Result<Val, ScriptError>;

/* ===================== Runtime Context ===================== */

/// Everything expression evaluation needs from its environment.
pub trait RuntimeContext {
    /// Undeclared names evaluate to `Val::Undefined`.
    fn get_variable(&self, name: &str) -> EvalResult;

    fn set_variable(&mut self, name: &str, value: Val) -> Result<(), ScriptError>;

    /// Call a function by name (`f(x)`)
    fn call_function(&mut self, name: &str, args: Vec<Val>) -> EvalResult;

    /// Call a method on a receiver (`r.m(x)`); mutating methods update `receiver`
    fn call_method(&mut self, receiver: &mut Val, method: &str, args: Vec<Val>) -> EvalResult;

    /// Call a function value (closure or function reference)
    fn call_value(&mut self, callee: &Val, args: Vec<Val>) -> EvalResult;

    fn get_property(&mut self, object: &Val, property: &str) -> EvalResult;

    fn get_index(&mut self, object: &Val, index: &Val) -> EvalResult;

    /// `new Class(args)`
    fn construct(&mut self, class: &str, args: Vec<Val>) -> EvalResult;
}

/// Methods that modify their receiver and must be written back
pub const MUTATING_METHODS: &[&str] = &[
    "push", "pop", "shift", "unshift", "splice", "sort", "reverse", "fill",
];

/* ===================== Evaluation ===================== */

/// Evaluate an expression to a value
pub fn eval_expr(expr: &Expr, ctx: &mut dyn RuntimeContext) -> EvalResult {
    match expr {
        Expr::Lit { v } => Ok(v.clone()),

        Expr::Ident { name } => ctx.get_variable(name),

        Expr::Array { elements } => {
            let mut items = Vec::with_capacity(elements.len());
            for e in elements {
                items.push(eval_expr(e, ctx)?);
            }
            Ok(Val::List(items))
        }

        Expr::Object { props } => {
            let mut map = BTreeMap::new();
            for (key, e) in props {
                map.insert(key.clone(), eval_expr(e, ctx)?);
            }
            Ok(Val::Obj(map))
        }

        Expr::Template { parts } => {
            let mut out = String::new();
            for part in parts {
                match part {
                    TemplatePart::Text { v } => out.push_str(v),
                    TemplatePart::Expr { e } => out.push_str(&eval_expr(e, ctx)?.to_display_string()),
                }
            }
            Ok(Val::Str(out))
        }

        Expr::Member {
            object,
            property,
            optional,
        } => {
            let target = eval_expr(object, ctx)?;
            if target.is_nullish() {
                if *optional {
                    return Ok(Val::Undefined);
                }
                return Err(ScriptError::type_error(format!(
                    "Cannot read properties of {} (reading '{}')",
                    target.type_name_for_error(),
                    property
                )));
            }
            ctx.get_property(&target, property)
        }

        Expr::Index { object, index } => {
            let target = eval_expr(object, ctx)?;
            let key = eval_expr(index, ctx)?;
            if target.is_nullish() {
                return Err(ScriptError::type_error(format!(
                    "Cannot read properties of {} (reading '{}')",
                    target.type_name_for_error(),
                    key.to_display_string()
                )));
            }
            ctx.get_index(&target, &key)
        }

        Expr::Call { callee, args } => eval_call(callee, args, ctx),

        Expr::New { class, args } => {
            let args = eval_args(args, ctx)?;
            ctx.construct(class, args)
        }

        Expr::Unary { op, operand } => {
            let v = eval_expr(operand, ctx)?;
            Ok(ops::unary(*op, &v))
        }

        Expr::Binary { op, left, right } => {
            let l = eval_expr(left, ctx)?;
            let r = eval_expr(right, ctx)?;
            Ok(ops::binary(*op, &l, &r))
        }

        Expr::Logical { op, left, right } => {
            let l = eval_expr(left, ctx)?;
            let short_circuit = match op {
                LogicalOp::And => !l.is_truthy(),
                LogicalOp::Or => l.is_truthy(),
                LogicalOp::Nullish => !l.is_nullish(),
            };
            if short_circuit {
                Ok(l)
            } else {
                eval_expr(right, ctx)
            }
        }

        Expr::Conditional {
            test,
            consequent,
            alternate,
        } => {
            if eval_expr(test, ctx)?.is_truthy() {
                eval_expr(consequent, ctx)
            } else {
                eval_expr(alternate, ctx)
            }
        }

        Expr::Assign { target, op, value } => {
            let v = eval_expr(value, ctx)?;
            let v = match op {
                Some(op) => {
                    let current = eval_expr(target, ctx)?;
                    ops::binary(*op, &current, &v)
                }
                None => v,
            };
            assign_to(target, v.clone(), ctx)?;
            Ok(v)
        }

        Expr::Update {
            target,
            delta,
            prefix,
        } => {
            let old = ops::unary(UnaryOp::Plus, &eval_expr(target, ctx)?);
            let new = ops::binary(BinaryOp::Add, &old, &Val::Int(*delta));
            assign_to(target, new.clone(), ctx)?;
            Ok(if *prefix { new } else { old })
        }

        Expr::Arrow { params, body } => Ok(Val::Closure(Box::new(Closure {
            params: params.clone(),
            body: body.clone(),
        }))),
    }
}

fn eval_args(args: &[Expr], ctx: &mut dyn RuntimeContext) -> Result<Vec<Val>, ScriptError> {
    let mut out = Vec::with_capacity(args.len());
    for a in args {
        out.push(eval_expr(a, ctx)?);
    }
    Ok(out)
}

fn eval_call(callee: &Expr, args: &[Expr], ctx: &mut dyn RuntimeContext) -> EvalResult {
    match callee {
        Expr::Ident { name } => {
            let args = eval_args(args, ctx)?;
            ctx.call_function(name, args)
        }

        Expr::Member {
            object,
            property,
            optional,
        } => {
            let mut receiver = eval_expr(object, ctx)?;
            if receiver.is_nullish() {
                if *optional {
                    return Ok(Val::Undefined);
                }
                return Err(ScriptError::type_error(format!(
                    "Cannot read properties of {} (reading '{}')",
                    receiver.type_name_for_error(),
                    property
                )));
            }
            let args = eval_args(args, ctx)?;
            let mutating = MUTATING_METHODS.contains(&property.as_str())
                && matches!(receiver, Val::List(_))
                && object.is_assignable();
            let result = ctx.call_method(&mut receiver, property, args)?;
            if mutating {
                assign_to(object, receiver, ctx)?;
            }
            Ok(result)
        }

        other => {
            let f = eval_expr(other, ctx)?;
            let args = eval_args(args, ctx)?;
            ctx.call_value(&f, args)
        }
    }
}

/* ===================== Assignment ===================== */

/// Store `value` into an assignable expression.
pub fn assign_to(target: &Expr, value: Val, ctx: &mut dyn RuntimeContext) -> Result<(), ScriptError> {
    match target {
        Expr::Ident { name } => ctx.set_variable(name, value),

        Expr::Member {
            object, property, ..
        } => {
            let mut container = eval_expr(object, ctx)?;
            set_property(&mut container, property, value)?;
            if object.is_assignable() {
                assign_to(object, container, ctx)?;
            }
            Ok(())
        }

        Expr::Index { object, index } => {
            let mut container = eval_expr(object, ctx)?;
            let key = eval_expr(index, ctx)?;
            match &mut container {
                Val::List(items) => {
                    let idx = key.as_index().ok_or_else(|| {
                        ScriptError::runtime(
                            errors::RANGE_ERROR,
                            format!("Invalid array index: {}", key.to_display_string()),
                        )
                    })?;
                    if idx >= items.len() {
                        items.resize(idx + 1, Val::Undefined);
                    }
                    items[idx] = value;
                }
                Val::Obj(_) => set_property(&mut container, &key.to_display_string(), value)?,
                other => {
                    return Err(ScriptError::type_error(format!(
                        "Cannot set index '{}' on {}",
                        key.to_display_string(),
                        other.type_name_for_error()
                    )))
                }
            }
            if object.is_assignable() {
                assign_to(object, container, ctx)?;
            }
            Ok(())
        }

        _ => Err(ScriptError::runtime(
            errors::SYNTAX_ERROR,
            "Invalid left-hand side in assignment",
        )),
    }
}

fn set_property(container: &mut Val, property: &str, value: Val) -> Result<(), ScriptError> {
    match container {
        Val::Obj(map) => {
            map.insert(property.to_string(), value);
            Ok(())
        }
        Val::List(items) if property == "length" => {
            let len = value.as_index().ok_or_else(|| {
                ScriptError::runtime(errors::RANGE_ERROR, "Invalid array length")
            })?;
            items.resize(len, Val::Undefined);
            Ok(())
        }
        other => Err(ScriptError::type_error(format!(
            "Cannot set property '{}' on {}",
            property,
            other.type_name_for_error()
        ))),
    }
}
