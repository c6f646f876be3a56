//! Quote-aware bracket scanning
//!
//! Every structural question the parsers ask ("where does this brace close?",
//! "is there a top-level `+` here?", "where are the `${}` parts of this
//! template literal?") is answered by the single state machine in [`scan`].
//! Quoted runs (`'…'`, `"…"`, `` `…` ``) and comments are opaque to it, and a
//! backslash always escapes the next byte inside a quoted run.
//!
//! All delimiters are ASCII, so every index produced here is a valid `str`
//! char boundary.

use std::ops::ControlFlow;

/* ===================== Core State Machine ===================== */

/// Walk `text` from `start`, visiting every byte outside quoted runs and comments.
///
/// The callback receives the byte index, the byte and the bracket depth
/// *outside* that byte (an opening bracket and its matching close bracket
/// report the same depth). A quoted run is reported once, at its opening
/// quote, and then skipped. Scanning stops early when the callback breaks,
/// or when a quoted run is unterminated.
pub fn scan<B>(
    text: &str,
    start: usize,
    mut visit: impl FnMut(usize, u8, usize) -> ControlFlow<B>,
) -> Option<B> {
    let bytes = text.as_bytes();
    let mut depth = 0usize;
    let mut i = start;

    while i < bytes.len() {
        let b = bytes[i];
        match b {
            b'\'' | b'"' | b'`' => {
                if let ControlFlow::Break(v) = visit(i, b, depth) {
                    return Some(v);
                }
                i = skip_quoted(text, i)? + 1;
                continue;
            }
            b'/' if matches!(bytes.get(i + 1), Some(b'/') | Some(b'*')) => {
                i = skip_comment(bytes, i);
                continue;
            }
            b'(' | b'[' | b'{' => {
                if let ControlFlow::Break(v) = visit(i, b, depth) {
                    return Some(v);
                }
                depth += 1;
            }
            b')' | b']' | b'}' => {
                depth = depth.saturating_sub(1);
                if let ControlFlow::Break(v) = visit(i, b, depth) {
                    return Some(v);
                }
            }
            _ => {
                if let ControlFlow::Break(v) = visit(i, b, depth) {
                    return Some(v);
                }
            }
        }
        i += 1;
    }
    None
}

/// Skip a quoted run whose opening quote is at `start`.
///
/// Returns the index of the closing quote, or `None` if the run is
/// unterminated. Inside backticks, `${…}` interpolations are matched with
/// [`find_matching`] so a quote or backtick inside them does not end the run.
pub fn skip_quoted(text: &str, start: usize) -> Option<usize> {
    let bytes = text.as_bytes();
    let quote = *bytes.get(start)?;
    let mut i = start + 1;

    while i < bytes.len() {
        match bytes[i] {
            b'\\' => i += 2,
            b if b == quote => return Some(i),
            b'$' if quote == b'`' && bytes.get(i + 1) == Some(&b'{') => {
                i = find_matching(text, i + 1)? + 1;
            }
            _ => i += 1,
        }
    }
    None
}

/// Index just past the comment starting at `start` (a line comment stops before its newline).
fn skip_comment(bytes: &[u8], start: usize) -> usize {
    if bytes.get(start + 1) == Some(&b'/') {
        bytes[start..]
            .iter()
            .position(|&b| b == b'\n')
            .map(|p| start + p)
            .unwrap_or(bytes.len())
    } else {
        bytes[start + 2..]
            .windows(2)
            .position(|w| w == b"*/")
            .map(|p| start + 2 + p + 2)
            .unwrap_or(bytes.len())
    }
}

/// Offset of the first quoted run in `text` that is never closed.
pub fn unterminated_quote(text: &str) -> Option<usize> {
    scan(text, 0, |i, b, _| {
        if matches!(b, b'\'' | b'"' | b'`') && skip_quoted(text, i).is_none() {
            ControlFlow::Break(i)
        } else {
            ControlFlow::Continue(())
        }
    })
}

/// Deepest bracket nesting in `text`, outside quoted runs and comments.
pub fn max_depth(text: &str) -> usize {
    let mut deepest = 0;
    scan(text, 0, |_, b, depth| {
        if matches!(b, b'(' | b'[' | b'{') {
            deepest = deepest.max(depth + 1);
        }
        ControlFlow::<()>::Continue(())
    });
    deepest
}

/* ===================== Bracket Matching ===================== */

/// The closing character for an opening bracket.
pub fn closing_for(open: u8) -> Option<u8> {
    match open {
        b'(' => Some(b')'),
        b'[' => Some(b']'),
        b'{' => Some(b'}'),
        _ => None,
    }
}

/// Find the index of the bracket that closes the one at `open_idx`.
///
/// Returns `None` when `open_idx` is not an opening bracket, when the bracket
/// is never closed, or when it is closed by the wrong kind of bracket.
pub fn find_matching(text: &str, open_idx: usize) -> Option<usize> {
    let open = *text.as_bytes().get(open_idx)?;
    let close = closing_for(open)?;

    scan(text, open_idx, |i, b, depth| {
        if i > open_idx && depth == 0 && matches!(b, b')' | b']' | b'}') {
            ControlFlow::Break((b == close).then_some(i))
        } else {
            ControlFlow::Continue(())
        }
    })
    .flatten()
}

/// Net bracket depth at the end of `text` (0 when every bracket is closed).
pub fn open_depth(text: &str) -> usize {
    let mut depth_after = 0usize;
    scan::<()>(text, 0, |_, b, depth| {
        depth_after = if matches!(b, b'(' | b'[' | b'{') {
            depth + 1
        } else {
            depth
        };
        ControlFlow::Continue(())
    });
    depth_after
}

/* ===================== Top-Level Searches ===================== */

/// Split `text` at every top-level occurrence of `sep`.
pub fn split_top_level(text: &str, sep: u8) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut last = 0;
    scan::<()>(text, 0, |i, b, depth| {
        if depth == 0 && b == sep {
            parts.push(&text[last..i]);
            last = i + 1;
        }
        ControlFlow::Continue(())
    });
    parts.push(&text[last..]);
    parts
}

/// First top-level index (from `start`) where `pred` holds.
pub fn find_top_level(text: &str, start: usize, mut pred: impl FnMut(usize, u8) -> bool) -> Option<usize> {
    scan(text, start, |i, b, depth| {
        if depth == 0 && pred(i, b) {
            ControlFlow::Break(i)
        } else {
            ControlFlow::Continue(())
        }
    })
}

/// All top-level byte positions of `text`, in order.
pub fn top_level_positions(text: &str) -> Vec<usize> {
    let mut positions = Vec::new();
    scan::<()>(text, 0, |i, b, depth| {
        // an opening bracket is itself top-level; its contents are not
        if depth == 0 && !matches!(b, b')' | b']' | b'}') {
            positions.push(i);
        }
        ControlFlow::Continue(())
    });
    positions
}

/// Locate the top-level assignment operator of a statement.
///
/// Returns the index of the `=` and the compound operator preceding it, if
/// any (`+`, `-`, `*`, `/`, `%`). `==`, `===`, `!=`, `<=`, `>=` and `=>` are
/// skipped.
pub fn find_assignment(text: &str) -> Option<(usize, Option<u8>)> {
    let bytes = text.as_bytes();
    let idx = find_top_level(text, 0, |i, b| {
        if b != b'=' {
            return false;
        }
        let next = bytes.get(i + 1).copied();
        let prev = if i > 0 { Some(bytes[i - 1]) } else { None };
        if matches!(next, Some(b'=') | Some(b'>')) {
            return false;
        }
        !matches!(prev, Some(b'=') | Some(b'!') | Some(b'<') | Some(b'>'))
    })?;

    let op = if idx > 0 {
        match bytes[idx - 1] {
            // `**=` is not a compound operator we support; leave it to the expression parser
            b'*' if idx > 1 && bytes[idx - 2] == b'*' => return None,
            c @ (b'+' | b'-' | b'*' | b'/' | b'%') => Some(c),
            _ => None,
        }
    } else {
        None
    };
    Some((idx, op))
}

/* ===================== Template Literals ===================== */

/// One piece of a template literal body.
#[derive(Debug, Clone, PartialEq)]
pub enum RawPart<'a> {
    /// Literal text, escapes not yet processed
    Text(&'a str),
    /// The source of a `${…}` interpolation
    Code(&'a str),
}

/// Split the body of a template literal (without its backticks) into text and code parts.
///
/// Returns `None` if an interpolation is never closed.
pub fn template_parts(raw: &str) -> Option<Vec<RawPart<'_>>> {
    let bytes = raw.as_bytes();
    let mut parts = Vec::new();
    let mut text_start = 0;
    let mut i = 0;

    while i < bytes.len() {
        match bytes[i] {
            b'\\' => i += 2,
            b'$' if bytes.get(i + 1) == Some(&b'{') => {
                if i > text_start {
                    parts.push(RawPart::Text(&raw[text_start..i]));
                }
                let close = find_matching(raw, i + 1)?;
                parts.push(RawPart::Code(&raw[i + 2..close]));
                i = close + 1;
                text_start = i;
            }
            _ => i += 1,
        }
    }
    if text_start < bytes.len() {
        parts.push(RawPart::Text(&raw[text_start.min(bytes.len())..]));
    }
    Some(parts)
}

/// Process backslash escapes in the body of a string or template literal.
pub fn unescape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();

    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('r') => out.push('\r'),
            Some('0') => out.push('\0'),
            Some('b') => out.push('\u{0008}'),
            Some('f') => out.push('\u{000C}'),
            Some('v') => out.push('\u{000B}'),
            Some('u') => {
                let hex: String = chars.by_ref().take(4).collect();
                match u32::from_str_radix(&hex, 16).ok().and_then(char::from_u32) {
                    Some(decoded) => out.push(decoded),
                    None => {
                        out.push_str("\\u");
                        out.push_str(&hex);
                    }
                }
            }
            Some('\n') => {}
            Some(other) => out.push(other),
            None => out.push('\\'),
        }
    }
    out
}

/// True for characters that may start an identifier.
pub fn is_ident_start(c: char) -> bool {
    c == '_' || c == '$' || c.is_alphabetic()
}

/// True for characters that may continue an identifier.
pub fn is_ident_char(c: char) -> bool {
    c == '_' || c == '$' || c.is_alphanumeric()
}

/// True if `text` is a single identifier.
pub fn is_identifier(text: &str) -> bool {
    let mut chars = text.chars();
    match chars.next() {
        Some(c) if is_ident_start(c) => chars.all(is_ident_char),
        _ => false,
    }
}

/// True if `text` starts with `word` followed by a non-identifier character.
pub fn starts_with_word(text: &str, word: &str) -> bool {
    text.starts_with(word)
        && text[word.len()..]
            .chars()
            .next()
            .map_or(true, |c| !is_ident_char(c))
}
