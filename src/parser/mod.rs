//! Script parsing
//!
//! Everything between the template markers goes through here:
//!
//! - [`scanner`]: the quote-aware bracket matcher every other routine builds on
//! - [`tokens`]: the token stream the dependency analyzer walks
//! - [`expr`]: builds the expression AST for the tree walker
//! - [`statements`]: statement splitting and control-flow extraction
//! - [`classify`]: statement-kind tagging with a bounded cache
//!
//! Tokens and expressions come from the pest grammar in `script.pest`.

use pest_derive::Parser;

pub mod classify;
pub mod expr;
pub mod scanner;
pub mod statements;
pub mod tokens;

#[cfg(test)]
mod tests;

pub use classify::{StatementClassifier, StatementKind};
pub use expr::parse_expression;
pub use statements::{
    parse_binding, Binding, FunctionDecl, IfBlock, LoopBlock, LoopKind, SourceStatement,
    Statement, StatementParser, TryBlock,
};

/* ===================== PEST Parser ===================== */

#[derive(Parser)]
#[grammar = "parser/script.pest"]
pub struct ScriptParser;

/* ===================== Error Types ===================== */

/// A structural problem in script source.
///
/// Parse failures never escape a template block: the engine renders them as
/// a diagnostic in place of the block's output.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ParseFailure {
    #[error("unmatched '{open}' at offset {offset}")]
    UnmatchedBracket { open: char, offset: usize },

    #[error("unterminated string literal at offset {offset}")]
    UnterminatedString { offset: usize },

    #[error("missing condition in '{construct}' statement")]
    MissingCondition { construct: &'static str },

    #[error("missing body in '{construct}' statement")]
    MissingBody { construct: &'static str },

    #[error("'try' without 'catch' or 'finally'")]
    MissingHandler,

    #[error("'{keyword}' without a preceding '{expected}'")]
    Dangling {
        keyword: &'static str,
        expected: &'static str,
    },

    #[error("invalid {construct} header '{header}'")]
    InvalidHeader {
        construct: &'static str,
        header: String,
    },

    #[error("unexpected '{found}' at offset {offset}")]
    UnexpectedToken { found: String, offset: usize },

    #[error("unexpected end of input")]
    UnexpectedEnd,

    #[error("nesting deeper than {limit} levels")]
    TooDeep { limit: usize },

    #[error("invalid assignment target '{target}'")]
    InvalidTarget { target: String },
}

pub type ParseResult<T> = Result<T, ParseFailure>;

/// Map a grammar error to the token it stopped at.
///
/// An error with nothing but whitespace or comments after it is
/// [`ParseFailure::UnexpectedEnd`]: the grammar skips both before every
/// attempt, so such an error sits at the end of the input.
pub(crate) fn syntax_failure(src: &str, err: &pest::error::Error<Rule>) -> ParseFailure {
    let offset = match err.location {
        pest::error::InputLocation::Pos(pos) => pos,
        pest::error::InputLocation::Span((start, _)) => start,
    };
    let rest = src.get(offset..).unwrap_or_default();
    let found = match rest.chars().next() {
        None => return ParseFailure::UnexpectedEnd,
        Some(c) if scanner::is_ident_char(c) => {
            rest.chars().take_while(|&c| scanner::is_ident_char(c)).collect()
        }
        Some(c) => c.to_string(),
    };
    ParseFailure::UnexpectedToken { found, offset }
}
