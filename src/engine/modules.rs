//! Built-in `date` and `file` modules for command-line renders

use chrono::{Datelike, Duration, Local, NaiveDate};
use std::path::{Path, PathBuf};

use crate::executor::errors::{self, ScriptError};
use crate::executor::types::Val;
use crate::host::ModuleExecutor;

const DEFAULT_DATE_FORMAT: &str = "YYYY-MM-DD";

/// Longest first
const DATE_TOKENS: &[(&str, &str)] = &[
    ("YYYY", "%Y"),
    ("YY", "%y"),
    ("MMMM", "%B"),
    ("MMM", "%b"),
    ("MM", "%m"),
    ("M", "%-m"),
    ("dddd", "%A"),
    ("ddd", "%a"),
    ("DD", "%d"),
    ("D", "%-d"),
    ("HH", "%H"),
    ("H", "%-H"),
    ("hh", "%I"),
    ("h", "%-I"),
    ("mm", "%M"),
    ("ss", "%S"),
    ("A", "%p"),
];

/// Translate a moment-style date format (`YYYY-MM-DD`, `[week] w`) into a
/// chrono format string.
pub fn chrono_format(format: &str) -> String {
    let mut out = String::new();
    let mut rest = format;
    while let Some(c) = rest.chars().next() {
        if c == '[' {
            let literal_end = rest.find(']').unwrap_or(rest.len());
            out.push_str(&rest[1..literal_end].replace('%', "%%"));
            rest = rest.get(literal_end + 1..).unwrap_or("");
            continue;
        }
        if let Some((token, spec)) = DATE_TOKENS.iter().find(|(t, _)| rest.starts_with(t)) {
            out.push_str(spec);
            rest = &rest[token.len()..];
            continue;
        }
        if c == '%' {
            out.push_str("%%");
        } else {
            out.push(c);
        }
        rest = &rest[c.len_utf8()..];
    }
    out
}

pub struct BuiltinModules {
    file: Option<PathBuf>,
    today: Option<NaiveDate>,
}

impl BuiltinModules {
    pub fn new() -> Self {
        Self {
            file: None,
            today: None,
        }
    }

    /// Path of the file being rendered, for `tp.file.*`
    pub fn with_file(mut self, file: impl Into<PathBuf>) -> Self {
        self.file = Some(file.into());
        self
    }

    /// Fixed reference date instead of the local clock
    pub fn with_today(mut self, today: NaiveDate) -> Self {
        self.today = Some(today);
        self
    }

    fn today(&self) -> NaiveDate {
        self.today.unwrap_or_else(|| Local::now().date_naive())
    }

    fn date(&self, function: &str, args: &[Val]) -> Result<Val, ScriptError> {
        let format = match args.first() {
            Some(Val::Str(f)) if !f.is_empty() => f.as_str(),
            _ => DEFAULT_DATE_FORMAT,
        };
        let today = self.today();
        let day = match function {
            "now" => {
                let offset = args.get(1).map(Val::to_number).unwrap_or(0.0);
                if !offset.is_finite() {
                    return Err(ScriptError::type_error("tp.date.now offset must be a number"));
                }
                today + Duration::days(offset.trunc() as i64)
            }
            "tomorrow" => today + Duration::days(1),
            "yesterday" => today - Duration::days(1),
            "weekday" => {
                let weekday = args.get(1).map(Val::to_number).unwrap_or(0.0);
                if !weekday.is_finite() {
                    return Err(ScriptError::type_error("tp.date.weekday weekday must be a number"));
                }
                let monday = today - Duration::days(today.weekday().num_days_from_monday() as i64);
                monday + Duration::days(weekday.trunc() as i64)
            }
            other => return Err(unknown("date", other)),
        };
        Ok(Val::Str(day.format(&chrono_format(format)).to_string()))
    }

    fn file(&self, function: &str) -> Result<Val, ScriptError> {
        let Some(path) = self.file.as_deref() else {
            return Ok(Val::Undefined);
        };
        let text = |p: Option<&Path>| p.map(|p| p.to_string_lossy().into_owned());
        let value = match function {
            "title" => text(path.file_stem().map(Path::new)),
            "path" => text(Some(path)),
            "folder" => text(path.parent()),
            other => return Err(unknown("file", other)),
        };
        Ok(value.map(Val::Str).unwrap_or(Val::Undefined))
    }
}

impl Default for BuiltinModules {
    fn default() -> Self {
        Self::new()
    }
}

fn unknown(module: &str, function: &str) -> ScriptError {
    ScriptError::runtime(
        errors::UNKNOWN_FUNCTION,
        format!("Unknown module function: {}.{}", module, function),
    )
}

impl ModuleExecutor for BuiltinModules {
    fn execute_module_function(
        &self,
        module: &str,
        function: &str,
        args: &[Val],
    ) -> Result<Val, ScriptError> {
        match module {
            "date" => self.date(function, args),
            "file" => self.file(function),
            other => Err(unknown(other, function)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn modules() -> BuiltinModules {
        BuiltinModules::new()
            .with_file("notes/daily/Monday plan.md")
            .with_today(NaiveDate::from_ymd_opt(2024, 3, 14).unwrap())
    }

    #[test]
    fn test_chrono_format_translation() {
        assert_eq!(chrono_format("YYYY-MM-DD"), "%Y-%m-%d");
        assert_eq!(chrono_format("dddd, MMMM D"), "%A, %B %-d");
        assert_eq!(chrono_format("[Week] YY"), "Week %y");
        assert_eq!(chrono_format("100%"), "100%%");
    }

    #[test]
    fn test_date_functions() {
        let m = modules();
        let call = |f: &str, args: Vec<Val>| m.execute_module_function("date", f, &args).unwrap();
        assert_eq!(call("now", vec![]), Val::Str("2024-03-14".to_string()));
        assert_eq!(
            call("now", vec![Val::Str("DD/MM".to_string()), Val::Int(-1)]),
            Val::Str("13/03".to_string())
        );
        assert_eq!(call("tomorrow", vec![]), Val::Str("2024-03-15".to_string()));
        assert_eq!(call("yesterday", vec![]), Val::Str("2024-03-13".to_string()));
        // 2024-03-14 is a Thursday
        assert_eq!(
            call("weekday", vec![Val::Str("YYYY-MM-DD".to_string()), Val::Int(0)]),
            Val::Str("2024-03-11".to_string())
        );
    }

    #[test]
    fn test_file_functions() {
        let m = modules();
        assert_eq!(
            m.execute_module_function("file", "title", &[]).unwrap(),
            Val::Str("Monday plan".to_string())
        );
        assert_eq!(
            m.execute_module_function("file", "folder", &[]).unwrap(),
            Val::Str("notes/daily".to_string())
        );
        assert_eq!(
            BuiltinModules::new().execute_module_function("file", "title", &[]).unwrap(),
            Val::Undefined
        );
    }

    #[test]
    fn test_unknown_module_function() {
        let err = modules()
            .execute_module_function("system", "prompt", &[])
            .unwrap_err();
        assert!(err.message().contains("system.prompt"));
    }
}
