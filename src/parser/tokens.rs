//! Token stream for the dependency analyzer
//!
//! Produced by the `tokens` rule of `script.pest`. Template literals stay raw
//! (`Token::Template`) so consumers can split them with
//! [`scanner::template_parts`](super::scanner::template_parts).

use pest::iterators::Pair;
use pest::Parser;

use super::scanner;
use super::{syntax_failure, ParseFailure, ParseResult, Rule, ScriptParser};
use crate::executor::types::Val;

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    Int(i64),
    Float(f64),
    Str(String),
    /// Raw body of a template literal, without the backticks
    Template(String),
    Ident(String),
    Punct(&'static str),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Spanned {
    pub token: Token,
    /// Byte offset of the token start
    pub offset: usize,
    /// Byte offset just past the token
    pub end: usize,
}

impl Spanned {
    pub fn is_punct(&self, p: &str) -> bool {
        matches!(&self.token, Token::Punct(q) if *q == p)
    }

    pub fn is_ident(&self, name: &str) -> bool {
        matches!(&self.token, Token::Ident(n) if n == name)
    }

    pub fn ident(&self) -> Option<&str> {
        match &self.token {
            Token::Ident(n) => Some(n),
            _ => None,
        }
    }
}

/// Every `punct` alternative in the grammar.
const PUNCTUATION: &[&str] = &[
    "===", "!==", "**", "=>", "==", "!=", "<=", ">=", "&&", "||", "??", "?.", "++", "--", "+=",
    "-=", "*=", "/=", "%=", "<<", ">>", "+", "-", "*", "/", "%", "<", ">", "=", "!", "&", "|",
    "^", "~", "?", ":", ".", ",", ";", "(", ")", "[", "]", "{", "}",
];

/// Tokenize `src`, skipping whitespace and comments.
pub fn tokenize(src: &str) -> ParseResult<Vec<Spanned>> {
    if let Some(offset) = scanner::unterminated_quote(src) {
        return Err(ParseFailure::UnterminatedString { offset });
    }

    let root = ScriptParser::parse(Rule::tokens, src)
        .map_err(|err| syntax_failure(src, &err))?
        .next()
        .ok_or(ParseFailure::UnexpectedEnd)?;

    root.into_inner()
        .filter(|pair| pair.as_rule() != Rule::EOI)
        .map(spanned)
        .collect()
}

fn spanned(pair: Pair<Rule>) -> ParseResult<Spanned> {
    let span = pair.as_span();
    let (offset, end) = (span.start(), span.end());
    let unexpected = || ParseFailure::UnexpectedToken {
        found: pair.as_str().to_string(),
        offset,
    };

    let token = match pair.as_rule() {
        Rule::number => match number_value(pair.clone()) {
            Some(Val::Int(n)) => Token::Int(n),
            Some(Val::Num(n)) => Token::Float(n),
            _ => return Err(unexpected()),
        },
        Rule::string => Token::Str(string_value(pair.clone())),
        Rule::template => Token::Template(inner_text(pair.clone()).to_string()),
        Rule::identifier => Token::Ident(pair.as_str().to_string()),
        Rule::punct => {
            let text = pair.as_str();
            match PUNCTUATION.iter().copied().find(|p| *p == text) {
                Some(p) => Token::Punct(p),
                None => return Err(unexpected()),
            }
        }
        _ => return Err(unexpected()),
    };
    Ok(Spanned { token, offset, end })
}

/* ===================== Literal Values ===================== */

/// Value of a `number` pair: an Int unless it has a fraction or exponent or
/// overflows `i64`.
pub(crate) fn number_value(pair: Pair<Rule>) -> Option<Val> {
    let digits = pair.into_inner().next()?;
    let text = digits.as_str();
    if digits.as_rule() == Rule::hex_int {
        return i64::from_str_radix(&text[2..], 16).ok().map(Val::Int);
    }
    if !text.contains(|c| matches!(c, '.' | 'e' | 'E')) {
        if let Ok(n) = text.parse::<i64>() {
            return Some(Val::Int(n));
        }
    }
    text.parse::<f64>().ok().map(Val::Num)
}

/// Unescaped body of a `string` pair.
pub(crate) fn string_value(pair: Pair<Rule>) -> String {
    scanner::unescape(inner_text(pair))
}

/// Text of the single inner pair of a quoted literal.
pub(crate) fn inner_text<'i>(pair: Pair<'i, Rule>) -> &'i str {
    pair.into_inner().next().map_or("", |inner| inner.as_str())
}
