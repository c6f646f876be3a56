//! Runtime value types

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::collections::BTreeMap;
use std::fmt;

use super::ast::ArrowBody;

/// An arrow function value. Closures capture nothing: their body sees the
/// template's single variable table plus their own parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Closure {
    pub params: Vec<String>,
    pub body: ArrowBody,
}

/// Runtime value type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(tag = "t", content = "v")]
pub enum Val {
    #[default]
    Undefined,
    Null,
    Bool(bool),
    Int(i64),
    Num(f64),
    Str(String),
    List(Vec<Val>),
    Obj(BTreeMap<String, Val>),
    Closure(Box<Closure>),
    /// Reference to a declared `function` by name
    Function(String),
    /// A namespace such as `tp.date` or `Math`; members are resolved on access
    Module(String),
}

impl Val {
    /// Check if value is truthy (for conditionals)
    pub fn is_truthy(&self) -> bool {
        match self {
            Val::Undefined | Val::Null => false,
            Val::Bool(b) => *b,
            Val::Int(n) => *n != 0,
            Val::Num(n) => *n != 0.0 && !n.is_nan(),
            Val::Str(s) => !s.is_empty(),
            Val::List(_)
            | Val::Obj(_)
            | Val::Closure(_)
            | Val::Function(_)
            | Val::Module(_) => true,
        }
    }

    pub fn is_nullish(&self) -> bool {
        matches!(self, Val::Undefined | Val::Null)
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, Val::Int(_) | Val::Num(_))
    }

    /// The `typeof` name of the value
    pub fn type_name(&self) -> &'static str {
        match self {
            Val::Undefined => "undefined",
            Val::Null | Val::List(_) | Val::Obj(_) | Val::Module(_) => "object",
            Val::Bool(_) => "boolean",
            Val::Int(_) | Val::Num(_) => "number",
            Val::Str(_) => "string",
            Val::Closure(_) | Val::Function(_) => "function",
        }
    }

    /// Name used in fault messages (`undefined`, `null`, `a string`, ...)
    pub fn type_name_for_error(&self) -> &'static str {
        match self {
            Val::Undefined => "undefined",
            Val::Null => "null",
            Val::Bool(_) => "a boolean",
            Val::Int(_) | Val::Num(_) => "a number",
            Val::Str(_) => "a string",
            Val::List(_) => "an array",
            Val::Obj(_) => "an object",
            Val::Closure(_) | Val::Function(_) => "a function",
            Val::Module(_) => "a module",
        }
    }

    /// Numeric coercion (`Number(v)`)
    pub fn to_number(&self) -> f64 {
        match self {
            Val::Undefined => f64::NAN,
            Val::Null => 0.0,
            Val::Bool(b) => {
                if *b {
                    1.0
                } else {
                    0.0
                }
            }
            Val::Int(n) => *n as f64,
            Val::Num(n) => *n,
            Val::Str(s) => {
                let trimmed = s.trim();
                if trimmed.is_empty() {
                    0.0
                } else if let Some(hex) = trimmed.strip_prefix("0x") {
                    i64::from_str_radix(hex, 16)
                        .map(|v| v as f64)
                        .unwrap_or(f64::NAN)
                } else {
                    match trimmed {
                        "Infinity" | "+Infinity" => f64::INFINITY,
                        "-Infinity" => f64::NEG_INFINITY,
                        _ => trimmed.parse::<f64>().unwrap_or(f64::NAN),
                    }
                }
            }
            Val::List(items) if items.is_empty() => 0.0,
            Val::List(items) if items.len() == 1 => items[0].to_number(),
            _ => f64::NAN,
        }
    }

    /// Numeric coercion that keeps integers as integers
    pub fn to_numeric(&self) -> Val {
        match self {
            Val::Int(n) => Val::Int(*n),
            other => {
                let n = other.to_number();
                if n.fract() == 0.0 && n.is_finite() && n.abs() < 9.007_199_254_740_992e15 {
                    Val::Int(n as i64)
                } else {
                    Val::Num(n)
                }
            }
        }
    }

    /// Integer index, if the value is a non-negative whole number
    pub fn as_index(&self) -> Option<usize> {
        match self {
            Val::Int(n) if *n >= 0 => Some(*n as usize),
            Val::Num(n) if *n >= 0.0 && n.fract() == 0.0 => Some(*n as usize),
            Val::Str(s) => s.parse::<usize>().ok(),
            _ => None,
        }
    }

    /// String conversion used for output and concatenation
    pub fn to_display_string(&self) -> String {
        match self {
            Val::Undefined => "undefined".to_string(),
            Val::Null => "null".to_string(),
            Val::Bool(b) => b.to_string(),
            Val::Int(n) => n.to_string(),
            Val::Num(n) => format_number(*n),
            Val::Str(s) => s.clone(),
            Val::List(items) => items
                .iter()
                .map(|v| {
                    if v.is_nullish() {
                        String::new()
                    } else {
                        v.to_display_string()
                    }
                })
                .collect::<Vec<_>>()
                .join(","),
            Val::Obj(_) => "[object Object]".to_string(),
            Val::Closure(c) => format!("({}) => {{ ... }}", c.params.join(", ")),
            Val::Function(name) => format!("function {}() {{ ... }}", name),
            Val::Module(path) => format!("[module {}]", path),
        }
    }

    /// Convert to plain JSON (`JSON.stringify`, trace snapshots)
    pub fn to_json(&self) -> JsonValue {
        match self {
            Val::Undefined | Val::Null => JsonValue::Null,
            Val::Bool(b) => JsonValue::Bool(*b),
            Val::Int(n) => JsonValue::from(*n),
            Val::Num(n) => serde_json::Number::from_f64(*n)
                .map(JsonValue::Number)
                .unwrap_or(JsonValue::Null),
            Val::Str(s) => JsonValue::String(s.clone()),
            Val::List(items) => JsonValue::Array(items.iter().map(Val::to_json).collect()),
            Val::Obj(map) => JsonValue::Object(
                map.iter()
                    .filter(|(_, v)| !matches!(v, Val::Undefined))
                    .map(|(k, v)| (k.clone(), v.to_json()))
                    .collect(),
            ),
            Val::Closure(_) | Val::Function(_) | Val::Module(_) => JsonValue::Null,
        }
    }

    /// Convert from plain JSON (frontmatter, `JSON.parse`)
    pub fn from_json(json: &JsonValue) -> Val {
        match json {
            JsonValue::Null => Val::Null,
            JsonValue::Bool(b) => Val::Bool(*b),
            JsonValue::Number(n) => match n.as_i64() {
                Some(i) => Val::Int(i),
                None => Val::Num(n.as_f64().unwrap_or(f64::NAN)),
            },
            JsonValue::String(s) => Val::Str(s.clone()),
            JsonValue::Array(items) => Val::List(items.iter().map(Val::from_json).collect()),
            JsonValue::Object(map) => Val::Obj(
                map.iter()
                    .map(|(k, v)| (k.clone(), Val::from_json(v)))
                    .collect(),
            ),
        }
    }
}

impl fmt::Display for Val {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_display_string())
    }
}

impl From<&str> for Val {
    fn from(s: &str) -> Self {
        Val::Str(s.to_string())
    }
}

impl From<String> for Val {
    fn from(s: String) -> Self {
        Val::Str(s)
    }
}

impl From<i64> for Val {
    fn from(n: i64) -> Self {
        Val::Int(n)
    }
}

impl From<f64> for Val {
    fn from(n: f64) -> Self {
        Val::Num(n)
    }
}

impl From<bool> for Val {
    fn from(b: bool) -> Self {
        Val::Bool(b)
    }
}

/// Format a float the way script output expects: whole numbers without a
/// fractional part, `Infinity`/`NaN` spelled out.
pub fn format_number(n: f64) -> String {
    if n.is_nan() {
        "NaN".to_string()
    } else if n.is_infinite() {
        if n > 0.0 {
            "Infinity".to_string()
        } else {
            "-Infinity".to_string()
        }
    } else if n.fract() == 0.0 && n.abs() < 1e21 {
        if n == 0.0 {
            "0".to_string()
        } else {
            format!("{}", n as i128)
        }
    } else {
        format!("{}", n)
    }
}
