//! Template block extraction
//!
//! Splits template text into literal text and `<% … %>` blocks:
//!
//! - `<% expr %>` interpolates the value of `expr`
//! - `<%* code %>` runs statements; the block renders the accumulator
//! - `<%-` / `-%>` drop one newline before / after the block
//! - `<%_` / `_%>` drop all whitespace before / after the block
//!
//! An opening marker without a closing one is kept as text.

use serde::{Deserialize, Serialize};

use crate::parser::scanner::skip_quoted;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlockKind {
    Interpolation,
    Execution,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemplateBlock {
    pub index: usize,
    pub kind: BlockKind,
    /// Code between the markers, without trim or execution flags
    pub code: String,
    /// Byte offset of the opening `<%`
    pub offset: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    Text(String),
    /// Placeholder for the output of `blocks[i]`
    Block(usize),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedTemplate {
    pub segments: Vec<Segment>,
    pub blocks: Vec<TemplateBlock>,
}

impl ParsedTemplate {
    /// Join text segments with the given block outputs.
    pub fn assemble(&self, outputs: &[String]) -> String {
        let mut out = String::new();
        for segment in &self.segments {
            match segment {
                Segment::Text(text) => out.push_str(text),
                Segment::Block(i) => {
                    if let Some(fragment) = outputs.get(*i) {
                        out.push_str(fragment);
                    }
                }
            }
        }
        out
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Trim {
    None,
    Newline,
    Whitespace,
}

impl Trim {
    fn from_marker(b: Option<&u8>) -> Self {
        match b {
            Some(b'-') => Trim::Newline,
            Some(b'_') => Trim::Whitespace,
            _ => Trim::None,
        }
    }

    fn start<'t>(self, text: &'t str) -> &'t str {
        match self {
            Trim::None => text,
            Trim::Newline => text
                .strip_prefix("\r\n")
                .or_else(|| text.strip_prefix('\n'))
                .unwrap_or(text),
            Trim::Whitespace => text.trim_start(),
        }
    }

    fn end<'t>(self, text: &'t str) -> &'t str {
        match self {
            Trim::None => text,
            Trim::Newline => text
                .strip_suffix("\r\n")
                .or_else(|| text.strip_suffix('\n'))
                .unwrap_or(text),
            Trim::Whitespace => text.trim_end(),
        }
    }
}

/// Index of the `%>` closing a block whose code starts at `start`.
///
/// `%>` inside a string literal does not close the block. If a quote is never
/// closed, the first `%>` after it wins.
fn find_close(source: &str, start: usize) -> Option<usize> {
    let bytes = source.as_bytes();
    let mut i = start;
    while i + 1 < bytes.len() {
        match bytes[i] {
            b'\'' | b'"' | b'`' => match skip_quoted(source, i) {
                Some(end) => i = end + 1,
                None => return source[i..].find("%>").map(|p| i + p),
            },
            b'%' if bytes[i + 1] == b'>' => return Some(i),
            _ => i += 1,
        }
    }
    None
}

pub fn parse_template(source: &str) -> ParsedTemplate {
    let bytes = source.as_bytes();
    let mut parsed = ParsedTemplate::default();
    let mut pos = 0;
    let mut trim_next = Trim::None;

    while let Some(rel) = source[pos..].find("<%") {
        let open = pos + rel;
        let mut code_start = open + 2;

        let lead = Trim::from_marker(bytes.get(code_start));
        if lead != Trim::None {
            code_start += 1;
        }
        let kind = if bytes.get(code_start) == Some(&b'*') {
            code_start += 1;
            BlockKind::Execution
        } else {
            BlockKind::Interpolation
        };

        let Some(close) = find_close(source, code_start) else {
            break;
        };
        let trail = if close > code_start {
            Trim::from_marker(bytes.get(close - 1))
        } else {
            Trim::None
        };
        let code_end = if trail == Trim::None { close } else { close - 1 };

        let text = lead.end(trim_next.start(&source[pos..open]));
        if !text.is_empty() {
            parsed.segments.push(Segment::Text(text.to_string()));
        }

        let index = parsed.blocks.len();
        parsed.blocks.push(TemplateBlock {
            index,
            kind,
            code: source[code_start..code_end].to_string(),
            offset: open,
        });
        parsed.segments.push(Segment::Block(index));

        trim_next = trail;
        pos = close + 2;
    }

    let rest = trim_next.start(&source[pos..]);
    if !rest.is_empty() {
        parsed.segments.push(Segment::Text(rest.to_string()));
    }
    parsed
}
