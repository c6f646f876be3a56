//! Built-in globals, namespaces and methods
//!
//! `Math`, `JSON`, `Object`, `Array`, `Number`, `String` and `console`, plus
//! the methods available on strings, arrays, numbers and objects. Methods
//! that take callbacks (`map`, `filter`, ...) call back into the
//! [`RuntimeContext`].

use serde::Serialize;
use std::cmp::Ordering;
use std::collections::BTreeMap;
use uuid::Uuid;

use super::errors::{self, ScriptError};
use super::expressions::{EvalResult, RuntimeContext};
use super::types::ops;
use super::types::Val;

/// Names that resolve to a built-in namespace when not shadowed by a variable
pub const NAMESPACES: &[&str] = &["Math", "JSON", "Object", "Array", "Number", "String", "console"];

/// Free functions callable by name
pub const GLOBAL_FUNCTIONS: &[&str] = &[
    "parseInt",
    "parseFloat",
    "String",
    "Number",
    "Boolean",
    "isNaN",
    "isFinite",
];

static UNDEFINED: Val = Val::Undefined;

fn arg(args: &[Val], i: usize) -> &Val {
    args.get(i).unwrap_or(&UNDEFINED)
}

fn wrong_type(message: impl Into<String>) -> ScriptError {
    ScriptError::runtime(errors::WRONG_ARG_TYPE, message)
}

/// Integral finite floats become `Int`.
fn number(n: f64) -> Val {
    if n.is_finite() && n.fract() == 0.0 && n.abs() < 9.007_199_254_740_992e15 {
        Val::Int(n as i64)
    } else {
        Val::Num(n)
    }
}

/// Resolve a possibly-negative relative index against `len`.
fn relative_index(v: &Val, len: usize, default: usize) -> usize {
    if matches!(v, Val::Undefined) {
        return default;
    }
    let n = v.to_number();
    if n.is_nan() {
        return 0;
    }
    let n = n.trunc();
    if n < 0.0 {
        (len as f64 + n).max(0.0) as usize
    } else {
        (n as usize).min(len)
    }
}

/* ===================== Global Functions ===================== */

/// Call a global function; `None` if `name` is not one.
pub fn call_global(name: &str, args: &[Val]) -> Option<EvalResult> {
    let result = match name {
        "parseInt" => parse_int(arg(args, 0), arg(args, 1)),
        "parseFloat" => parse_float(&arg(args, 0).to_display_string()),
        "String" => Val::Str(match args.first() {
            Some(v) => v.to_display_string(),
            None => String::new(),
        }),
        "Number" => match args.first() {
            Some(v) => v.to_numeric(),
            None => Val::Int(0),
        },
        "Boolean" => Val::Bool(arg(args, 0).is_truthy()),
        "isNaN" => Val::Bool(arg(args, 0).to_number().is_nan()),
        "isFinite" => Val::Bool(arg(args, 0).to_number().is_finite()),
        _ => return None,
    };
    Some(Ok(result))
}

fn parse_int(v: &Val, radix: &Val) -> Val {
    let text = v.to_display_string();
    let mut s = text.trim();
    let mut sign = 1i64;
    if let Some(rest) = s.strip_prefix('-') {
        sign = -1;
        s = rest;
    } else if let Some(rest) = s.strip_prefix('+') {
        s = rest;
    }

    let mut radix = match radix {
        Val::Undefined => 10,
        r => ops::truncate(r) as u32,
    };
    if radix == 0 {
        radix = 10;
    }
    if (radix == 16 || !matches!(v, Val::Undefined)) && (s.starts_with("0x") || s.starts_with("0X")) {
        if radix == 16 || radix == 10 {
            radix = 16;
            s = &s[2..];
        }
    }
    if !(2..=36).contains(&radix) {
        return Val::Num(f64::NAN);
    }

    let digits: String = s.chars().take_while(|c| c.is_digit(radix)).collect();
    match i64::from_str_radix(&digits, radix) {
        Ok(n) => Val::Int(sign * n),
        Err(_) => Val::Num(f64::NAN),
    }
}

fn parse_float(text: &str) -> Val {
    let s = text.trim_start();
    let bytes = s.as_bytes();
    let mut end = 0;
    if matches!(bytes.first(), Some(b'+') | Some(b'-')) {
        end = 1;
    }
    if s[end..].starts_with("Infinity") {
        let n = if s.starts_with('-') { f64::NEG_INFINITY } else { f64::INFINITY };
        return Val::Num(n);
    }
    let digits_start = end;
    while end < bytes.len() && bytes[end].is_ascii_digit() {
        end += 1;
    }
    if end < bytes.len() && bytes[end] == b'.' {
        end += 1;
        while end < bytes.len() && bytes[end].is_ascii_digit() {
            end += 1;
        }
    }
    if end == digits_start || &s[digits_start..end] == "." {
        return Val::Num(f64::NAN);
    }
    if end < bytes.len() && matches!(bytes[end], b'e' | b'E') {
        let mut exp = end + 1;
        if exp < bytes.len() && matches!(bytes[exp], b'+' | b'-') {
            exp += 1;
        }
        if exp < bytes.len() && bytes[exp].is_ascii_digit() {
            end = exp;
            while end < bytes.len() && bytes[end].is_ascii_digit() {
                end += 1;
            }
        }
    }
    s[..end]
        .parse::<f64>()
        .map(number)
        .unwrap_or(Val::Num(f64::NAN))
}

/* ===================== Namespaces ===================== */

/// Constant members of a namespace (`Math.PI`).
pub fn namespace_property(namespace: &str, property: &str) -> Option<Val> {
    let v = match (namespace, property) {
        ("Math", "PI") => Val::Num(std::f64::consts::PI),
        ("Math", "E") => Val::Num(std::f64::consts::E),
        ("Math", "LN2") => Val::Num(std::f64::consts::LN_2),
        ("Math", "LN10") => Val::Num(std::f64::consts::LN_10),
        ("Math", "SQRT2") => Val::Num(std::f64::consts::SQRT_2),
        ("Number", "MAX_SAFE_INTEGER") => Val::Int(9_007_199_254_740_991),
        ("Number", "MIN_SAFE_INTEGER") => Val::Int(-9_007_199_254_740_991),
        ("Number", "EPSILON") => Val::Num(f64::EPSILON),
        ("Number", "POSITIVE_INFINITY") => Val::Num(f64::INFINITY),
        ("Number", "NEGATIVE_INFINITY") => Val::Num(f64::NEG_INFINITY),
        ("Number", "NaN") => Val::Num(f64::NAN),
        _ => return None,
    };
    Some(v)
}

/// Call `namespace.method(args)`.
pub fn call_namespace(namespace: &str, method: &str, args: Vec<Val>) -> EvalResult {
    let result = match namespace {
        "Math" => math(method, &args),
        "JSON" => return json(method, &args),
        "Object" => object_fn(method, &args),
        "Array" => array_fn(method, &args),
        "Number" => number_fn(method, &args),
        "String" => string_fn(method, &args),
        "console" => {
            let line = args
                .iter()
                .map(Val::to_display_string)
                .collect::<Vec<_>>()
                .join(" ");
            match method {
                "warn" | "error" => tracing::warn!(target: "tessera::console", "{}", line),
                _ => tracing::info!(target: "tessera::console", "{}", line),
            }
            Some(Val::Undefined)
        }
        _ => None,
    };
    result.ok_or_else(|| {
        ScriptError::runtime(
            errors::UNKNOWN_FUNCTION,
            format!("{}.{} is not a function", namespace, method),
        )
    })
}

fn math(method: &str, args: &[Val]) -> Option<Val> {
    let x = arg(args, 0).to_number();
    let v = match method {
        "abs" => match arg(args, 0) {
            Val::Int(n) => n.checked_abs().map(Val::Int).unwrap_or(Val::Num(x.abs())),
            _ => Val::Num(x.abs()),
        },
        "floor" => number(x.floor()),
        "ceil" => number(x.ceil()),
        "round" => number((x + 0.5).floor()),
        "trunc" => number(x.trunc()),
        "sign" => {
            if x.is_nan() {
                Val::Num(f64::NAN)
            } else if x > 0.0 {
                Val::Int(1)
            } else if x < 0.0 {
                Val::Int(-1)
            } else {
                Val::Int(0)
            }
        }
        "sqrt" => number(x.sqrt()),
        "cbrt" => number(x.cbrt()),
        "pow" => ops::binary(super::types::BinaryOp::Pow, arg(args, 0), arg(args, 1)),
        "exp" => Val::Num(x.exp()),
        "log" => Val::Num(x.ln()),
        "log2" => Val::Num(x.log2()),
        "log10" => Val::Num(x.log10()),
        "sin" => Val::Num(x.sin()),
        "cos" => Val::Num(x.cos()),
        "tan" => Val::Num(x.tan()),
        "atan" => Val::Num(x.atan()),
        "atan2" => Val::Num(x.atan2(arg(args, 1).to_number())),
        "hypot" => Val::Num(args.iter().map(|a| a.to_number().powi(2)).sum::<f64>().sqrt()),
        "min" | "max" => {
            let want = if method == "min" { Ordering::Less } else { Ordering::Greater };
            let mut best = Val::Num(if method == "min" { f64::INFINITY } else { f64::NEG_INFINITY });
            for a in args {
                let a = a.to_numeric();
                match ops::compare(&a, &best) {
                    None => return Some(Val::Num(f64::NAN)),
                    Some(o) if o == want => best = a,
                    Some(_) => {}
                }
            }
            best
        }
        "random" => {
            // 53 random bits from a v4 UUID
            let bits = (Uuid::new_v4().as_u128() >> 75) as u64;
            Val::Num(bits as f64 / (1u64 << 53) as f64)
        }
        _ => return None,
    };
    Some(v)
}

fn json(method: &str, args: &[Val]) -> EvalResult {
    match method {
        "stringify" => Ok(match stringify(arg(args, 0), arg(args, 2)) {
            Some(s) => Val::Str(s),
            None => Val::Undefined,
        }),
        "parse" => {
            let text = arg(args, 0).to_display_string();
            serde_json::from_str::<serde_json::Value>(&text)
                .map(|j| Val::from_json(&j))
                .map_err(|e| ScriptError::runtime(errors::SYNTAX_ERROR, format!("JSON.parse: {}", e)))
        }
        _ => Err(ScriptError::runtime(
            errors::UNKNOWN_FUNCTION,
            format!("JSON.{} is not a function", method),
        )),
    }
}

/// `JSON.stringify(value, null, space)`; `None` for values with no JSON form.
pub fn stringify(value: &Val, space: &Val) -> Option<String> {
    if matches!(value, Val::Undefined | Val::Closure(_) | Val::Function(_)) {
        return None;
    }
    let json = value.to_json();
    let indent = match space {
        Val::Int(n) if *n > 0 => " ".repeat((*n).min(10) as usize),
        Val::Num(n) if *n >= 1.0 => " ".repeat(n.min(10.0) as usize),
        Val::Str(s) if !s.is_empty() => s.chars().take(10).collect(),
        _ => String::new(),
    };
    if indent.is_empty() {
        return serde_json::to_string(&json).ok();
    }
    let mut buf = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(indent.as_bytes());
    let mut ser = serde_json::Serializer::with_formatter(&mut buf, formatter);
    json.serialize(&mut ser).ok()?;
    String::from_utf8(buf).ok()
}

fn keys_of(v: &Val) -> Vec<String> {
    match v {
        Val::Obj(map) => map.keys().cloned().collect(),
        Val::List(items) => (0..items.len()).map(|i| i.to_string()).collect(),
        Val::Str(s) => (0..s.chars().count()).map(|i| i.to_string()).collect(),
        _ => Vec::new(),
    }
}

fn object_fn(method: &str, args: &[Val]) -> Option<Val> {
    let target = arg(args, 0);
    let v = match method {
        "keys" => Val::List(keys_of(target).into_iter().map(Val::Str).collect()),
        "values" => match target {
            Val::Obj(map) => Val::List(map.values().cloned().collect()),
            Val::List(items) => Val::List(items.clone()),
            Val::Str(s) => Val::List(s.chars().map(|c| Val::Str(c.to_string())).collect()),
            _ => Val::List(Vec::new()),
        },
        "entries" => match target {
            Val::Obj(map) => Val::List(
                map.iter()
                    .map(|(k, v)| Val::List(vec![Val::Str(k.clone()), v.clone()]))
                    .collect(),
            ),
            Val::List(items) => Val::List(
                items
                    .iter()
                    .enumerate()
                    .map(|(i, v)| Val::List(vec![Val::Str(i.to_string()), v.clone()]))
                    .collect(),
            ),
            _ => Val::List(Vec::new()),
        },
        "assign" => {
            let mut merged = match target {
                Val::Obj(map) => map.clone(),
                _ => BTreeMap::new(),
            };
            for source in &args[1.min(args.len())..] {
                if let Val::Obj(map) = source {
                    merged.extend(map.iter().map(|(k, v)| (k.clone(), v.clone())));
                }
            }
            Val::Obj(merged)
        }
        "fromEntries" => {
            let mut map = BTreeMap::new();
            if let Val::List(entries) = target {
                for entry in entries {
                    if let Val::List(pair) = entry {
                        map.insert(arg(pair, 0).to_display_string(), arg(pair, 1).clone());
                    }
                }
            }
            Val::Obj(map)
        }
        _ => return None,
    };
    Some(v)
}

fn array_fn(method: &str, args: &[Val]) -> Option<Val> {
    let v = match method {
        "isArray" => Val::Bool(matches!(arg(args, 0), Val::List(_))),
        "of" => Val::List(args.to_vec()),
        "from" => match arg(args, 0) {
            Val::List(items) => Val::List(items.clone()),
            Val::Str(s) => Val::List(s.chars().map(|c| Val::Str(c.to_string())).collect()),
            Val::Obj(map) => {
                let len = map.get("length").and_then(Val::as_index).unwrap_or(0);
                Val::List(vec![Val::Undefined; len])
            }
            _ => Val::List(Vec::new()),
        },
        _ => return None,
    };
    Some(v)
}

fn number_fn(method: &str, args: &[Val]) -> Option<Val> {
    let a = arg(args, 0);
    let v = match method {
        "isInteger" => Val::Bool(match a {
            Val::Int(_) => true,
            Val::Num(n) => n.is_finite() && n.fract() == 0.0,
            _ => false,
        }),
        "isFinite" => Val::Bool(a.is_numeric() && a.to_number().is_finite()),
        "isNaN" => Val::Bool(matches!(a, Val::Num(n) if n.is_nan())),
        "parseInt" => parse_int(a, arg(args, 1)),
        "parseFloat" => parse_float(&a.to_display_string()),
        _ => return None,
    };
    Some(v)
}

fn string_fn(method: &str, args: &[Val]) -> Option<Val> {
    match method {
        "fromCharCode" => Some(Val::Str(
            args.iter()
                .filter_map(|a| char::from_u32(ops::truncate(a) as u32))
                .collect(),
        )),
        _ => None,
    }
}

/* ===================== Property Access ===================== */

/// `object.property` for plain values
pub fn get_property(object: &Val, property: &str) -> Val {
    match (object, property) {
        (Val::Str(s), "length") => Val::Int(s.chars().count() as i64),
        (Val::List(items), "length") => Val::Int(items.len() as i64),
        (Val::Obj(map), key) => map.get(key).cloned().unwrap_or(Val::Undefined),
        (Val::Closure(c), "length") => Val::Int(c.params.len() as i64),
        _ => Val::Undefined,
    }
}

/// `object[index]` for plain values
pub fn get_index(object: &Val, index: &Val) -> Val {
    match object {
        Val::List(items) => match index.as_index() {
            Some(i) => items.get(i).cloned().unwrap_or(Val::Undefined),
            None => get_property(object, &index.to_display_string()),
        },
        Val::Str(s) => match index.as_index() {
            Some(i) => s
                .chars()
                .nth(i)
                .map(|c| Val::Str(c.to_string()))
                .unwrap_or(Val::Undefined),
            None => get_property(object, &index.to_display_string()),
        },
        _ => get_property(object, &index.to_display_string()),
    }
}

/* ===================== Methods ===================== */

/// Call a method on a plain value.
pub fn call_method(
    ctx: &mut dyn RuntimeContext,
    receiver: &mut Val,
    method: &str,
    args: Vec<Val>,
) -> EvalResult {
    let result = match receiver {
        Val::Str(s) => string_method(ctx, s, method, &args)?,
        Val::List(items) => return array_method(ctx, items, method, args),
        Val::Int(_) | Val::Num(_) => number_method(receiver, method, &args)?,
        Val::Bool(b) if method == "toString" => Some(Val::Str(b.to_string())),
        Val::Obj(map) => match map.get(method).cloned() {
            Some(f @ (Val::Closure(_) | Val::Function(_))) => return ctx.call_value(&f, args),
            Some(other) => {
                return Err(ScriptError::type_error(format!(
                    "{} is not a function ({})",
                    method,
                    other.type_name()
                )))
            }
            None => match method {
                "hasOwnProperty" => Some(Val::Bool(map.contains_key(&arg(&args, 0).to_display_string()))),
                "toString" => Some(Val::Str("[object Object]".to_string())),
                _ => None,
            },
        },
        _ => None,
    };
    result.ok_or_else(|| {
        ScriptError::type_error(format!(
            "{}.{} is not a function",
            receiver.type_name(),
            method
        ))
    })
}

fn string_method(
    ctx: &mut dyn RuntimeContext,
    s: &str,
    method: &str,
    args: &[Val],
) -> Result<Option<Val>, ScriptError> {
    let chars: Vec<char> = s.chars().collect();
    let len = chars.len();
    let slice = |from: usize, to: usize| -> Val {
        if from >= to {
            Val::Str(String::new())
        } else {
            Val::Str(chars[from..to].iter().collect())
        }
    };
    let char_index = |byte_idx: usize| s[..byte_idx].chars().count() as i64;
    let text_arg = |i: usize| arg(args, i).to_display_string();

    let v = match method {
        "toUpperCase" => Val::Str(s.to_uppercase()),
        "toLowerCase" => Val::Str(s.to_lowercase()),
        "trim" => Val::Str(s.trim().to_string()),
        "trimStart" => Val::Str(s.trim_start().to_string()),
        "trimEnd" => Val::Str(s.trim_end().to_string()),
        "toString" | "valueOf" => Val::Str(s.to_string()),
        "includes" => Val::Bool(s.contains(&text_arg(0))),
        "startsWith" => Val::Bool(s.starts_with(&text_arg(0))),
        "endsWith" => Val::Bool(s.ends_with(&text_arg(0))),
        "indexOf" => Val::Int(s.find(&text_arg(0)).map_or(-1, char_index)),
        "lastIndexOf" => Val::Int(s.rfind(&text_arg(0)).map_or(-1, char_index)),
        "slice" => {
            let from = relative_index(arg(args, 0), len, 0);
            let to = relative_index(arg(args, 1), len, len);
            slice(from, to)
        }
        "substring" => {
            let clamp = |v: &Val, default: usize| match v {
                Val::Undefined => default,
                other => (ops::truncate(other).max(0) as usize).min(len),
            };
            let a = clamp(arg(args, 0), 0);
            let b = clamp(arg(args, 1), len);
            slice(a.min(b), a.max(b))
        }
        "substr" => {
            let from = relative_index(arg(args, 0), len, 0);
            let count = match arg(args, 1) {
                Val::Undefined => len,
                other => ops::truncate(other).max(0) as usize,
            };
            slice(from, (from + count).min(len))
        }
        "charAt" => slice(
            relative_index(arg(args, 0), len, 0),
            (relative_index(arg(args, 0), len, 0) + 1).min(len),
        ),
        "charCodeAt" => chars
            .get(ops::truncate(arg(args, 0)).max(0) as usize)
            .map(|c| Val::Int(*c as i64))
            .unwrap_or(Val::Num(f64::NAN)),
        "at" => {
            let i = ops::truncate(arg(args, 0));
            let idx = if i < 0 { len as i64 + i } else { i };
            if idx < 0 {
                Val::Undefined
            } else {
                chars
                    .get(idx as usize)
                    .map(|c| Val::Str(c.to_string()))
                    .unwrap_or(Val::Undefined)
            }
        }
        "split" => {
            let parts: Vec<Val> = match arg(args, 0) {
                Val::Undefined => vec![Val::Str(s.to_string())],
                sep => {
                    let sep = sep.to_display_string();
                    if sep.is_empty() {
                        chars.iter().map(|c| Val::Str(c.to_string())).collect()
                    } else {
                        s.split(sep.as_str()).map(|p| Val::Str(p.to_string())).collect()
                    }
                }
            };
            match arg(args, 1) {
                Val::Undefined => Val::List(parts),
                limit => Val::List(parts.into_iter().take(ops::truncate(limit).max(0) as usize).collect()),
            }
        }
        "replace" | "replaceAll" => {
            let pattern = text_arg(0);
            let replacement = arg(args, 1).clone();
            let mut out = String::new();
            let mut rest = s;
            let mut replaced = false;
            while let Some(pos) = rest.find(pattern.as_str()) {
                if replaced && method == "replace" {
                    break;
                }
                out.push_str(&rest[..pos]);
                let with = match &replacement {
                    f @ (Val::Closure(_) | Val::Function(_)) => ctx
                        .call_value(f, vec![Val::Str(pattern.clone())])?
                        .to_display_string(),
                    other => other.to_display_string(),
                };
                out.push_str(&with);
                rest = &rest[pos + pattern.len()..];
                replaced = true;
                if pattern.is_empty() {
                    break;
                }
            }
            out.push_str(rest);
            Val::Str(out)
        }
        "repeat" => {
            let n = ops::truncate(arg(args, 0));
            if n < 0 {
                return Err(ScriptError::runtime(errors::RANGE_ERROR, "Invalid count value"));
            }
            Val::Str(s.repeat(n as usize))
        }
        "padStart" | "padEnd" => {
            let target = ops::truncate(arg(args, 0)).max(0) as usize;
            let fill = match arg(args, 1) {
                Val::Undefined => " ".to_string(),
                f => f.to_display_string(),
            };
            if target <= len || fill.is_empty() {
                Val::Str(s.to_string())
            } else {
                let pad: String = fill.chars().cycle().take(target - len).collect();
                if method == "padStart" {
                    Val::Str(format!("{}{}", pad, s))
                } else {
                    Val::Str(format!("{}{}", s, pad))
                }
            }
        }
        "concat" => {
            let mut out = s.to_string();
            for a in args {
                out.push_str(&a.to_display_string());
            }
            Val::Str(out)
        }
        "localeCompare" => Val::Int(match s.cmp(text_arg(0).as_str()) {
            Ordering::Less => -1,
            Ordering::Equal => 0,
            Ordering::Greater => 1,
        }),
        _ => return Ok(None),
    };
    Ok(Some(v))
}

fn number_method(receiver: &Val, method: &str, args: &[Val]) -> Result<Option<Val>, ScriptError> {
    let n = receiver.to_number();
    let v = match method {
        "toFixed" => {
            let digits = ops::truncate(arg(args, 0));
            if !(0..=100).contains(&digits) {
                return Err(ScriptError::runtime(
                    errors::RANGE_ERROR,
                    "toFixed() digits argument must be between 0 and 100",
                ));
            }
            Val::Str(format!("{:.*}", digits as usize, n))
        }
        "toString" => match (receiver, arg(args, 0)) {
            (Val::Int(i), Val::Int(radix)) if *radix != 10 => Val::Str(int_to_radix(*i, *radix)?),
            _ => Val::Str(receiver.to_display_string()),
        },
        "valueOf" => receiver.clone(),
        _ => return Ok(None),
    };
    Ok(Some(v))
}

fn int_to_radix(mut n: i64, radix: i64) -> Result<String, ScriptError> {
    if !(2..=36).contains(&radix) {
        return Err(ScriptError::runtime(
            errors::RANGE_ERROR,
            "toString() radix must be between 2 and 36",
        ));
    }
    if n == 0 {
        return Ok("0".to_string());
    }
    let negative = n < 0;
    let mut digits = Vec::new();
    while n != 0 {
        let d = (n % radix).unsigned_abs() as u32;
        digits.push(std::char::from_digit(d, radix as u32).unwrap_or('?'));
        n /= radix;
    }
    if negative {
        digits.push('-');
    }
    Ok(digits.into_iter().rev().collect())
}

fn array_method(
    ctx: &mut dyn RuntimeContext,
    items: &mut Vec<Val>,
    method: &str,
    args: Vec<Val>,
) -> EvalResult {
    let len = items.len();
    let v = match method {
        /* ----- mutating ----- */
        "push" => {
            items.extend(args);
            Val::Int(items.len() as i64)
        }
        "pop" => items.pop().unwrap_or(Val::Undefined),
        "shift" => {
            if items.is_empty() {
                Val::Undefined
            } else {
                items.remove(0)
            }
        }
        "unshift" => {
            let mut front = args;
            front.append(items);
            *items = front;
            Val::Int(items.len() as i64)
        }
        "splice" => {
            let start = relative_index(arg(&args, 0), len, 0);
            let count = match arg(&args, 1) {
                Val::Undefined => len - start,
                c => (ops::truncate(c).max(0) as usize).min(len - start),
            };
            let inserted: Vec<Val> = args.iter().skip(2).cloned().collect();
            Val::List(items.splice(start..start + count, inserted).collect())
        }
        "reverse" => {
            items.reverse();
            Val::List(items.clone())
        }
        "fill" => {
            let value = arg(&args, 0).clone();
            let from = relative_index(arg(&args, 1), len, 0);
            let to = relative_index(arg(&args, 2), len, len);
            for item in items.iter_mut().take(to).skip(from) {
                *item = value.clone();
            }
            Val::List(items.clone())
        }
        "sort" => {
            sort_items(ctx, items, arg(&args, 0))?;
            Val::List(items.clone())
        }

        /* ----- read-only ----- */
        "join" => {
            let sep = match arg(&args, 0) {
                Val::Undefined => ",".to_string(),
                s => s.to_display_string(),
            };
            Val::Str(join_items(items, &sep))
        }
        "toString" => Val::Str(join_items(items, ",")),
        "slice" => {
            let from = relative_index(arg(&args, 0), len, 0);
            let to = relative_index(arg(&args, 1), len, len);
            Val::List(if from < to { items[from..to].to_vec() } else { Vec::new() })
        }
        "concat" => {
            let mut out = items.clone();
            for a in args {
                match a {
                    Val::List(more) => out.extend(more),
                    other => out.push(other),
                }
            }
            Val::List(out)
        }
        "includes" => {
            let needle = arg(&args, 0);
            Val::Bool(items.iter().any(|v| same_value_zero(v, needle)))
        }
        "indexOf" => {
            let needle = arg(&args, 0);
            Val::Int(
                items
                    .iter()
                    .position(|v| ops::strict_eq(v, needle))
                    .map_or(-1, |i| i as i64),
            )
        }
        "lastIndexOf" => {
            let needle = arg(&args, 0);
            Val::Int(
                items
                    .iter()
                    .rposition(|v| ops::strict_eq(v, needle))
                    .map_or(-1, |i| i as i64),
            )
        }
        "at" => {
            let i = ops::truncate(arg(&args, 0));
            let idx = if i < 0 { len as i64 + i } else { i };
            if idx < 0 {
                Val::Undefined
            } else {
                items.get(idx as usize).cloned().unwrap_or(Val::Undefined)
            }
        }
        "flat" => {
            let depth = match arg(&args, 0) {
                Val::Undefined => 1,
                d => ops::truncate(d).max(0) as usize,
            };
            Val::List(flatten(items, depth))
        }
        "keys" => Val::List((0..len as i64).map(Val::Int).collect()),

        /* ----- callbacks ----- */
        "map" | "filter" | "find" | "findIndex" | "some" | "every" | "forEach" => {
            let f = arg(&args, 0).clone();
            if !matches!(f, Val::Closure(_) | Val::Function(_)) {
                return Err(wrong_type(format!(
                    "{} callback must be a function, got {}",
                    method,
                    f.type_name()
                )));
            }
            return iterate_with(ctx, items, method, &f);
        }
        "reduce" => {
            let f = arg(&args, 0).clone();
            let mut iter = items.iter().cloned().enumerate();
            let mut acc = match args.get(1) {
                Some(init) => init.clone(),
                None => match iter.next() {
                    Some((_, first)) => first,
                    None => {
                        return Err(ScriptError::type_error(
                            "Reduce of empty array with no initial value",
                        ))
                    }
                },
            };
            for (i, item) in iter {
                acc = ctx.call_value(&f, vec![acc, item, Val::Int(i as i64)])?;
            }
            acc
        }
        _ => {
            return Err(ScriptError::type_error(format!(
                "array.{} is not a function",
                method
            )))
        }
    };
    Ok(v)
}

fn iterate_with(ctx: &mut dyn RuntimeContext, items: &[Val], method: &str, f: &Val) -> EvalResult {
    let mut mapped = Vec::new();
    for (i, item) in items.iter().enumerate() {
        let out = ctx.call_value(f, vec![item.clone(), Val::Int(i as i64)])?;
        match method {
            "map" => mapped.push(out),
            "filter" if out.is_truthy() => mapped.push(item.clone()),
            "find" if out.is_truthy() => return Ok(item.clone()),
            "findIndex" if out.is_truthy() => return Ok(Val::Int(i as i64)),
            "some" if out.is_truthy() => return Ok(Val::Bool(true)),
            "every" if !out.is_truthy() => return Ok(Val::Bool(false)),
            _ => {}
        }
    }
    Ok(match method {
        "map" | "filter" => Val::List(mapped),
        "findIndex" => Val::Int(-1),
        "some" => Val::Bool(false),
        "every" => Val::Bool(true),
        _ => Val::Undefined,
    })
}

fn sort_items(ctx: &mut dyn RuntimeContext, items: &mut [Val], comparator: &Val) -> Result<(), ScriptError> {
    if matches!(comparator, Val::Undefined) {
        items.sort_by(|a, b| {
            // undefined sorts last, everything else by string form
            match (a, b) {
                (Val::Undefined, Val::Undefined) => Ordering::Equal,
                (Val::Undefined, _) => Ordering::Greater,
                (_, Val::Undefined) => Ordering::Less,
                _ => a.to_display_string().cmp(&b.to_display_string()),
            }
        });
        return Ok(());
    }

    let mut failure = None;
    items.sort_by(|a, b| {
        if failure.is_some() {
            return Ordering::Equal;
        }
        match ctx.call_value(comparator, vec![a.clone(), b.clone()]) {
            Ok(v) => v.to_number().partial_cmp(&0.0).unwrap_or(Ordering::Equal),
            Err(e) => {
                failure = Some(e);
                Ordering::Equal
            }
        }
    });
    match failure {
        Some(e) => Err(e),
        None => Ok(()),
    }
}

fn join_items(items: &[Val], sep: &str) -> String {
    items
        .iter()
        .map(|v| if v.is_nullish() { String::new() } else { v.to_display_string() })
        .collect::<Vec<_>>()
        .join(sep)
}

fn flatten(items: &[Val], depth: usize) -> Vec<Val> {
    let mut out = Vec::new();
    for item in items {
        match item {
            Val::List(inner) if depth > 0 => out.extend(flatten(inner, depth - 1)),
            other => out.push(other.clone()),
        }
    }
    out
}

fn same_value_zero(a: &Val, b: &Val) -> bool {
    match (a, b) {
        (Val::Num(x), Val::Num(y)) if x.is_nan() && y.is_nan() => true,
        _ => ops::strict_eq(a, b),
    }
}

/* ===================== Construction ===================== */

/// `new Class(args)` for built-in classes
pub fn construct(class: &str, args: Vec<Val>) -> EvalResult {
    match class {
        "Error" | "TypeError" | "RangeError" | "SyntaxError" | "ReferenceError" => {
            let mut map = BTreeMap::new();
            map.insert("name".to_string(), Val::Str(class.to_string()));
            map.insert(
                "message".to_string(),
                Val::Str(match args.first() {
                    Some(v) if !matches!(v, Val::Undefined) => v.to_display_string(),
                    _ => String::new(),
                }),
            );
            Ok(Val::Obj(map))
        }
        "Array" => match args.as_slice() {
            [Val::Int(n)] if *n >= 0 => Ok(Val::List(vec![Val::Undefined; *n as usize])),
            [Val::Int(_)] | [Val::Num(_)] => {
                Err(ScriptError::runtime(errors::RANGE_ERROR, "Invalid array length"))
            }
            _ => Ok(Val::List(args)),
        },
        "Object" => Ok(match args.into_iter().next() {
            Some(Val::Obj(map)) => Val::Obj(map),
            _ => Val::Obj(BTreeMap::new()),
        }),
        "String" => Ok(Val::Str(args.first().map(Val::to_display_string).unwrap_or_default())),
        "Number" => Ok(args.first().map(Val::to_numeric).unwrap_or(Val::Int(0))),
        "Boolean" => Ok(Val::Bool(args.first().map_or(false, Val::is_truthy))),
        _ => Err(ScriptError::runtime(
            errors::UNKNOWN_CLASS,
            format!("{} is not a constructor", class),
        )),
    }
}
