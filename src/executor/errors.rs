//! Script error types and error codes

use serde::{Deserialize, Serialize};
use std::fmt;

use super::types::Val;
use crate::parser::ParseFailure;

/* ===================== Error Codes ===================== */

pub const TYPE_ERROR: &str = "TypeError";
pub const REFERENCE_ERROR: &str = "ReferenceError";
pub const RANGE_ERROR: &str = "RangeError";
pub const SYNTAX_ERROR: &str = "SyntaxError";
pub const UNKNOWN_FUNCTION: &str = "UnknownFunction";
pub const UNKNOWN_CLASS: &str = "UnknownClass";
pub const WRONG_ARG_COUNT: &str = "WrongArgCount";
pub const WRONG_ARG_TYPE: &str = "WrongArgType";
pub const MODULE_ERROR: &str = "ModuleError";
pub const INTERNAL_ERROR: &str = "InternalError";

/// Error code and message for a runtime fault
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorInfo {
    pub code: String,
    pub message: String,
}

impl ErrorInfo {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ErrorInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

/* ===================== Script Error ===================== */

/// Everything that can stop a script block.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ScriptError {
    /// Structural problem in the source
    #[error("{0}")]
    Parse(#[from] ParseFailure),

    /// Fault raised by the runtime (type mismatch, unknown function, ...)
    #[error("{0}")]
    Runtime(ErrorInfo),

    /// Value raised by a `throw` statement
    #[error("{}", thrown_message(.0))]
    Thrown(Val),

    /// Render was cancelled; never caught by `try`
    #[error("execution cancelled")]
    Cancelled,
}

impl ScriptError {
    pub fn runtime(code: &str, message: impl Into<String>) -> Self {
        ScriptError::Runtime(ErrorInfo::new(code, message))
    }

    pub fn type_error(message: impl Into<String>) -> Self {
        Self::runtime(TYPE_ERROR, message)
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, ScriptError::Cancelled)
    }

    /// The message a `catch` clause or an inline error marker shows
    pub fn message(&self) -> String {
        match self {
            ScriptError::Parse(failure) => failure.to_string(),
            ScriptError::Runtime(info) => info.message.clone(),
            ScriptError::Thrown(v) => thrown_message(v),
            ScriptError::Cancelled => "execution cancelled".to_string(),
        }
    }

    /// The value bound to a `catch (e)` variable.
    ///
    /// Thrown values are bound as-is; every other fault binds its message.
    pub fn catch_value(&self) -> Val {
        match self {
            ScriptError::Thrown(v) => v.clone(),
            other => Val::Str(other.message()),
        }
    }
}

fn thrown_message(v: &Val) -> String {
    match v {
        Val::Obj(map) => match map.get("message") {
            Some(msg) => msg.to_display_string(),
            None => v.to_display_string(),
        },
        other => other.to_display_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    #[test]
    fn test_thrown_error_object_uses_message() {
        let mut map = BTreeMap::new();
        map.insert("name".to_string(), Val::from("Error"));
        map.insert("message".to_string(), Val::from("boom"));
        let err = ScriptError::Thrown(Val::Obj(map));
        assert_eq!(err.message(), "boom");
        assert_eq!(err.to_string(), "boom");
    }

    #[test]
    fn test_runtime_fault_binds_message() {
        let err = ScriptError::type_error("x is not a function");
        assert_eq!(err.catch_value(), Val::from("x is not a function"));
        assert_eq!(err.to_string(), "TypeError: x is not a function");
    }
}
