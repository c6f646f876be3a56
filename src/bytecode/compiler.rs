//! Split-based expression compiler
//!
//! Compiles the arithmetic, comparison and logical subset of expressions
//! without building an AST. At each level the compiler looks for the
//! lowest-precedence operator at the top level of the text (outside quotes
//! and brackets), takes its rightmost occurrence so that chains associate to
//! the left, compiles both sides recursively and emits the operator.
//! Operators are tokenized longest-first, so `===` is never read as `==`
//! followed by `=`.
//!
//! Anything outside the subset (calls, member access, array/object/template
//! literals, assignment, arrows, `??`, `**`) is reported as
//! [`CompileError::Unsupported`] and left to the tree walker.

use super::opcode::OpCode;
use super::program::BytecodeProgram;
use crate::executor::types::Val;
use crate::parser::scanner::{self, is_identifier};

/// Recursion bound for nested sub-expressions
pub const MAX_COMPILE_DEPTH: usize = 128;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CompileError {
    #[error("empty expression")]
    Empty,

    #[error("unsupported in bytecode: {construct}")]
    Unsupported { construct: String },

    #[error("expression nested deeper than {limit} levels")]
    TooDeep { limit: usize },

    #[error("invalid program: {detail}")]
    InvalidProgram { detail: String },
}

fn unsupported(construct: impl Into<String>) -> CompileError {
    CompileError::Unsupported {
        construct: construct.into(),
    }
}

/* ===================== Operator Tokens ===================== */

/// Longest first
const OPERATORS: &[&str] = &[
    "===", "!==", ">>>", "**=", "...", "**", "==", "!=", "<=", ">=", "<<", ">>", "&&", "||",
    "??", "?.", "=>", "+=", "-=", "*=", "/=", "%=", "++", "--", "+", "-", "*", "/", "%", "<",
    ">", "=", "!", "~", "&", "|", "^", "?", ":", ".", ",",
];

/// Operators the compiler never handles
const REJECTED: &[&str] = &[
    ">>>", "**=", "...", "**", "??", "?.", "=>", "+=", "-=", "*=", "/=", "%=", "++", "--", "=",
    "~", ".", ",",
];

#[derive(Debug, Clone, Copy)]
struct OpToken {
    pos: usize,
    text: &'static str,
    /// Follows an operand (binary) rather than starting one (prefix)
    binary: bool,
}

/// Top-level operator tokens of `text`.
fn operator_tokens(text: &str) -> Vec<OpToken> {
    let bytes = text.as_bytes();
    let mut tokens = Vec::new();
    let mut after_operand = false;
    let mut skip_until = 0;

    for i in scanner::top_level_positions(text) {
        if i < skip_until {
            continue;
        }
        let b = bytes[i];
        if b.is_ascii_whitespace() {
            continue;
        }
        let Some(op) = OPERATORS.iter().copied().find(|op| text[i..].starts_with(op)) else {
            after_operand = true;
            continue;
        };
        if is_numeric_continuation(text, i, op) {
            after_operand = true;
            continue;
        }
        tokens.push(OpToken {
            pos: i,
            text: op,
            binary: after_operand,
        });
        after_operand = false;
        skip_until = i + op.len();
    }
    tokens
}

/// `.` in `1.5` and the sign in `1e-5` belong to the number literal.
fn is_numeric_continuation(text: &str, i: usize, op: &str) -> bool {
    let word_start = text[..i]
        .rfind(|c: char| !(c.is_ascii_alphanumeric() || c == '_' || c == '.'))
        .map_or(0, |p| p + text[p..].chars().next().map_or(1, char::len_utf8));
    let word = &text[word_start..i];
    if !word.starts_with(|c: char| c.is_ascii_digit()) {
        return op == "." && word.is_empty() && text[i + 1..].starts_with(|c: char| c.is_ascii_digit());
    }
    match op {
        "." => true,
        "+" | "-" => word.ends_with(|c| c == 'e' || c == 'E') && !word.starts_with("0x"),
        _ => false,
    }
}

/* ===================== Compiler ===================== */

/// Compile expression source into unoptimized bytecode.
pub fn compile_expression(source: &str) -> Result<BytecodeProgram, CompileError> {
    let source = source.trim().trim_end_matches(';').trim_end();
    if source.is_empty() {
        return Err(CompileError::Empty);
    }
    let mut compiler = Compiler {
        program: BytecodeProgram::new(source),
    };
    compiler.compile(source, 0)?;
    Ok(compiler.program)
}

struct Compiler {
    program: BytecodeProgram,
}

/// Binary levels, lowest precedence first
const LEVELS: &[&[&str]] = &[
    &["||"],
    &["&&"],
    &["|"],
    &["^"],
    &["&"],
    &["===", "!==", "==", "!="],
    &["<", ">", "<=", ">="],
    &["<<", ">>"],
    &["+", "-"],
    &["*", "/", "%"],
];

impl Compiler {
    fn compile(&mut self, text: &str, depth: usize) -> Result<(), CompileError> {
        if depth > MAX_COMPILE_DEPTH {
            return Err(CompileError::TooDeep {
                limit: MAX_COMPILE_DEPTH,
            });
        }
        let text = text.trim();
        if text.is_empty() {
            return Err(CompileError::Empty);
        }

        let tokens = operator_tokens(text);
        if let Some(bad) = tokens.iter().find(|t| REJECTED.contains(&t.text)) {
            return Err(unsupported(format!("operator '{}'", bad.text)));
        }

        if let Some(q) = tokens.iter().position(|t| t.text == "?") {
            return self.compile_conditional(text, &tokens, q, depth);
        }
        if tokens.iter().any(|t| t.text == ":") {
            return Err(unsupported("':' outside a conditional"));
        }

        for level in LEVELS {
            let split = tokens
                .iter()
                .rev()
                .find(|t| t.binary && level.contains(&t.text))
                .copied();
            if let Some(op) = split {
                let left = &text[..op.pos];
                let right = &text[op.pos + op.text.len()..];
                return self.compile_binary(op.text, left, right, depth);
            }
        }

        if let Some(first) = tokens.first() {
            if !first.binary && first.pos == 0 {
                return self.compile_unary(first.text, &text[first.text.len()..], depth);
            }
        }
        self.compile_primary(text, depth)
    }

    fn compile_conditional(
        &mut self,
        text: &str,
        tokens: &[OpToken],
        q: usize,
        depth: usize,
    ) -> Result<(), CompileError> {
        // the ':' pairing with the first '?', skipping nested conditionals
        let mut nested = 0;
        let mut colon = None;
        for (i, t) in tokens.iter().enumerate().skip(q + 1) {
            match t.text {
                "?" => nested += 1,
                ":" if nested == 0 => {
                    colon = Some(i);
                    break;
                }
                ":" => nested -= 1,
                _ => {}
            }
        }
        let colon = colon.ok_or_else(|| unsupported("'?' without ':'"))?;
        let (q, colon) = (tokens[q].pos, tokens[colon].pos);

        self.compile(&text[..q], depth + 1)?;
        let to_else = self.program.emit(OpCode::JumpIfFalse, 0);
        self.compile(&text[q + 1..colon], depth + 1)?;
        let to_end = self.program.emit(OpCode::Jump, 0);
        self.program.patch(to_else, self.program.len());
        self.compile(&text[colon + 1..], depth + 1)?;
        self.program.patch(to_end, self.program.len());
        Ok(())
    }

    fn compile_binary(
        &mut self,
        op: &str,
        left: &str,
        right: &str,
        depth: usize,
    ) -> Result<(), CompileError> {
        let short_circuit = match op {
            "||" => Some(OpCode::JumpIfTrueKeep),
            "&&" => Some(OpCode::JumpIfFalseKeep),
            _ => None,
        };
        if let Some(jump) = short_circuit {
            self.compile(left, depth + 1)?;
            let at = self.program.emit(jump, 0);
            self.compile(right, depth + 1)?;
            self.program.patch(at, self.program.len());
            return Ok(());
        }

        let code = match op {
            "+" => OpCode::Add,
            "-" => OpCode::Sub,
            "*" => OpCode::Mul,
            "/" => OpCode::Div,
            "%" => OpCode::Mod,
            "<" => OpCode::Lt,
            "<=" => OpCode::Le,
            ">" => OpCode::Gt,
            ">=" => OpCode::Ge,
            "==" => OpCode::Eq,
            "!=" => OpCode::Ne,
            "===" => OpCode::StrictEq,
            "!==" => OpCode::StrictNe,
            "&" => OpCode::BitAnd,
            "|" => OpCode::BitOr,
            "^" => OpCode::BitXor,
            "<<" => OpCode::Shl,
            ">>" => OpCode::Shr,
            other => return Err(unsupported(format!("operator '{}'", other))),
        };
        self.compile(left, depth + 1)?;
        self.compile(right, depth + 1)?;
        self.program.emit(code, 0);
        Ok(())
    }

    fn compile_unary(&mut self, op: &str, operand: &str, depth: usize) -> Result<(), CompileError> {
        match op {
            "-" => {
                if let Ok(n) = operand.trim().parse::<i64>() {
                    let idx = self.program.add_constant(Val::Int(-n));
                    self.program.emit(OpCode::PushInt, idx);
                    return Ok(());
                }
                self.compile(operand, depth + 1)?;
                self.program.emit(OpCode::Neg, 0);
            }
            "!" => {
                self.compile(operand, depth + 1)?;
                self.program.emit(OpCode::Not, 0);
            }
            other => return Err(unsupported(format!("prefix '{}'", other))),
        }
        Ok(())
    }

    fn compile_primary(&mut self, text: &str, depth: usize) -> Result<(), CompileError> {
        let bytes = text.as_bytes();

        if bytes[0] == b'(' && scanner::find_matching(text, 0) == Some(text.len() - 1) {
            return self.compile(&text[1..text.len() - 1], depth + 1);
        }

        if matches!(bytes[0], b'\'' | b'"') {
            if scanner::skip_quoted(text, 0) == Some(text.len() - 1) {
                let value = Val::Str(scanner::unescape(&text[1..text.len() - 1]));
                let idx = self.program.add_constant(value);
                self.program.emit(OpCode::PushConst, idx);
                return Ok(());
            }
            return Err(unsupported(format!("'{}'", text)));
        }

        if bytes[0].is_ascii_digit() || (bytes[0] == b'.' && text.len() > 1) {
            return self.compile_number(text);
        }

        let keyword = match text {
            "true" => Some(Val::Bool(true)),
            "false" => Some(Val::Bool(false)),
            "null" => Some(Val::Null),
            "undefined" => Some(Val::Undefined),
            "NaN" => Some(Val::Num(f64::NAN)),
            "Infinity" => Some(Val::Num(f64::INFINITY)),
            _ => None,
        };
        if let Some(value) = keyword {
            let idx = self.program.add_constant(value);
            self.program.emit(OpCode::PushConst, idx);
            return Ok(());
        }

        if is_identifier(text) && !RESERVED.contains(&text) {
            let idx = self.program.add_name(text);
            self.program.emit(OpCode::PushVar, idx);
            return Ok(());
        }

        Err(unsupported(format!("'{}'", text)))
    }

    fn compile_number(&mut self, text: &str) -> Result<(), CompileError> {
        let value = if let Some(hex) = text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
            i64::from_str_radix(hex, 16).ok().map(Val::Int)
        } else if text.bytes().all(|b| b.is_ascii_digit()) {
            text.parse::<i64>().ok().map(Val::Int)
        } else {
            None
        };
        let (op, value) = match value {
            Some(v) => (OpCode::PushInt, v),
            None => {
                let n = text
                    .parse::<f64>()
                    .map_err(|_| unsupported(format!("number '{}'", text)))?;
                (OpCode::PushConst, Val::Num(n))
            }
        };
        let idx = self.program.add_constant(value);
        self.program.emit(op, idx);
        Ok(())
    }
}

const RESERVED: &[&str] = &["typeof", "new", "this", "function", "return", "let", "const", "var"];
