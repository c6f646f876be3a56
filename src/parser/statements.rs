//! Statement splitting and control-flow extraction
//!
//! Script code is split into statements at top-level `;` and line ends, and
//! keyword-headed constructs (`if`, `for`, `while`, `try`, `function`) are
//! extracted recursively into a [`Statement`] tree. Every bracket lookup goes
//! through [`scanner::find_matching`], so brackets inside string and template
//! literals never confuse the structure.
//!
//! Two input shapes are accepted and produce equal trees:
//! - a single string holding whole constructs ([`StatementParser::parse_statements`])
//! - a pre-split list whose braces may span several entries
//!   ([`StatementParser::parse_statement_list`])

use std::ops::ControlFlow;
use std::sync::Arc;

use super::classify::{StatementClassifier, StatementKind};
use super::scanner::{self, is_ident_char, is_identifier, starts_with_word};
use super::{ParseFailure, ParseResult};

/// Default bound on construct nesting (if inside for inside if ...)
pub const DEFAULT_MAX_NESTING: usize = 64;

/* ===================== Statement Tree ===================== */

/// A trimmed simple statement and its classification.
#[derive(Debug, Clone)]
pub struct SourceStatement {
    pub text: String,
    pub kind: StatementKind,
    /// 1-based line within the parsed code; diagnostic only and ignored by equality
    pub line: usize,
}

impl PartialEq for SourceStatement {
    fn eq(&self, other: &Self) -> bool {
        self.text == other.text && self.kind == other.kind
    }
}

/// Target of a loop variable or a destructuring declaration
#[derive(Debug, Clone, PartialEq)]
pub enum Binding {
    Name(String),
    /// `[a, b]`
    Array(Vec<String>),
    /// `{ key, key: alias }` as (key, bound name) pairs
    Object(Vec<(String, String)>),
}

impl Binding {
    /// Every variable name the binding introduces
    pub fn names(&self) -> Vec<String> {
        match self {
            Binding::Name(n) => vec![n.clone()],
            Binding::Array(names) => names.clone(),
            Binding::Object(pairs) => pairs.iter().map(|(_, n)| n.clone()).collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum LoopKind {
    /// `for (init; test; update)`
    Counted {
        init: Option<String>,
        test: Option<String>,
        update: Option<String>,
    },
    /// `for (x of iterable)`
    ForOf { binding: Binding, iterable: String },
    /// `for (k in object)`
    ForIn { binding: Binding, object: String },
    /// `while (test)`
    While { test: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct LoopBlock {
    pub kind: LoopKind,
    /// Text between the header parentheses
    pub header: String,
    pub body: Vec<Statement>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct IfBlock {
    pub condition: String,
    pub body: Vec<Statement>,
    pub else_ifs: Vec<(String, Vec<Statement>)>,
    pub else_body: Option<Vec<Statement>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TryBlock {
    pub body: Vec<Statement>,
    pub catch_var: Option<String>,
    pub catch_body: Option<Vec<Statement>>,
    pub finally_body: Option<Vec<Statement>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FunctionDecl {
    pub name: String,
    pub params: Vec<String>,
    pub body: Vec<Statement>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    Simple(SourceStatement),
    Loop(LoopBlock),
    If(IfBlock),
    Try(TryBlock),
    Function(FunctionDecl),
}

/* ===================== Parser ===================== */

pub struct StatementParser {
    classifier: Arc<StatementClassifier>,
    max_depth: usize,
}

impl StatementParser {
    pub fn new(classifier: Arc<StatementClassifier>) -> Self {
        Self {
            classifier,
            max_depth: DEFAULT_MAX_NESTING,
        }
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    pub fn classifier(&self) -> &StatementClassifier {
        &self.classifier
    }

    /// Parse a block of code into a statement tree.
    pub fn parse_statements(&self, code: &str) -> ParseResult<Vec<Statement>> {
        self.parse_range(code, 0, code.len(), 0)
    }

    /// Parse a pre-split statement list whose constructs may span entries.
    pub fn parse_statement_list<S: AsRef<str>>(&self, entries: &[S]) -> ParseResult<Vec<Statement>> {
        self.parse_statements(&join_statement_list(entries))
    }

    fn parse_range(&self, src: &str, start: usize, end: usize, depth: usize) -> ParseResult<Vec<Statement>> {
        if depth > self.max_depth {
            return Err(ParseFailure::TooDeep {
                limit: self.max_depth,
            });
        }
        let mut out = Vec::new();
        let mut pos = start;
        loop {
            pos = skip_separators(src, pos, end);
            if pos >= end {
                return Ok(out);
            }
            pos = self.parse_one(src, pos, end, depth, &mut out)?;
        }
    }

    /// Parse the statement starting at `pos`, returning the index just past it.
    fn parse_one(
        &self,
        src: &str,
        pos: usize,
        end: usize,
        depth: usize,
        out: &mut Vec<Statement>,
    ) -> ParseResult<usize> {
        let rest = &src[pos..end];

        if rest.starts_with('{') {
            // bare block: its statements join the enclosing list
            let close = matching(src, pos, end)?;
            out.extend(self.parse_range(src, pos + 1, close, depth + 1)?);
            return Ok(close + 1);
        }
        if let Some(c) = rest.chars().next().filter(|c| matches!(c, '}' | ')' | ']')) {
            return Err(ParseFailure::UnexpectedToken {
                found: c.to_string(),
                offset: pos,
            });
        }

        if starts_with_word(rest, "if") {
            return self.parse_if(src, pos, end, depth, out);
        }
        if starts_with_word(rest, "for") {
            return self.parse_for(src, pos, end, depth, out);
        }
        if starts_with_word(rest, "while") {
            return self.parse_while(src, pos, end, depth, out);
        }
        if starts_with_word(rest, "try") {
            return self.parse_try(src, pos, end, depth, out);
        }
        if starts_with_word(rest, "function") || is_async_function(rest) {
            return self.parse_function(src, pos, end, depth, out);
        }
        for (keyword, expected) in [("else", "if"), ("catch", "try"), ("finally", "try")] {
            if starts_with_word(rest, keyword) {
                return Err(ParseFailure::Dangling { keyword, expected });
            }
        }

        let stmt_end = simple_end(src, pos, end);
        let text = src[pos..stmt_end].trim();
        out.push(Statement::Simple(SourceStatement {
            text: text.to_string(),
            kind: self.classifier.classify(text),
            line: line_of(src, pos),
        }));
        Ok(stmt_end)
    }

    /// Body of a construct: a braced block, a lone `;`, or one statement.
    fn parse_body(
        &self,
        src: &str,
        pos: usize,
        end: usize,
        depth: usize,
        construct: &'static str,
    ) -> ParseResult<(Vec<Statement>, usize)> {
        let p = skip_blank(src, pos, end);
        if p >= end {
            return Err(ParseFailure::MissingBody { construct });
        }
        match src.as_bytes()[p] {
            b'{' => {
                let close = matching(src, p, end)?;
                let body = self.parse_range(src, p + 1, close, depth + 1)?;
                Ok((body, close + 1))
            }
            b';' => Ok((Vec::new(), p + 1)),
            _ => {
                if depth + 1 > self.max_depth {
                    return Err(ParseFailure::TooDeep {
                        limit: self.max_depth,
                    });
                }
                let mut body = Vec::new();
                let next = self.parse_one(src, p, end, depth + 1, &mut body)?;
                Ok((body, next))
            }
        }
    }

    /// A body that must be braced (`try`, `catch`, `finally`, `function`).
    fn parse_braced(
        &self,
        src: &str,
        pos: usize,
        end: usize,
        depth: usize,
        construct: &'static str,
    ) -> ParseResult<(Vec<Statement>, usize)> {
        let p = skip_blank(src, pos, end);
        if p >= end || src.as_bytes()[p] != b'{' {
            return Err(ParseFailure::MissingBody { construct });
        }
        let close = matching(src, p, end)?;
        let body = self.parse_range(src, p + 1, close, depth + 1)?;
        Ok((body, close + 1))
    }

    /* ----- constructs ----- */

    fn parse_if(
        &self,
        src: &str,
        pos: usize,
        end: usize,
        depth: usize,
        out: &mut Vec<Statement>,
    ) -> ParseResult<usize> {
        let (condition, p) = paren_group(src, pos + "if".len(), end, "if", true)?;
        let (body, mut p) = self.parse_body(src, p, end, depth, "if")?;
        let mut block = IfBlock {
            condition,
            body,
            else_ifs: Vec::new(),
            else_body: None,
        };

        loop {
            let q = skip_separators(src, p, end);
            if q >= end || !starts_with_word(&src[q..end], "else") {
                break;
            }
            let after_else = skip_blank(src, q + "else".len(), end);
            if after_else < end && starts_with_word(&src[after_else..end], "if") {
                let (cond, r) = paren_group(src, after_else + "if".len(), end, "else if", true)?;
                let (body, r) = self.parse_body(src, r, end, depth, "else if")?;
                block.else_ifs.push((cond, body));
                p = r;
            } else {
                let (body, r) = self.parse_body(src, q + "else".len(), end, depth, "else")?;
                block.else_body = Some(body);
                p = r;
                break;
            }
        }

        out.push(Statement::If(block));
        Ok(p)
    }

    fn parse_for(
        &self,
        src: &str,
        pos: usize,
        end: usize,
        depth: usize,
        out: &mut Vec<Statement>,
    ) -> ParseResult<usize> {
        let (header, p) = paren_group(src, pos + "for".len(), end, "for", false)?;
        let kind = parse_loop_header(&header)?;
        let (body, p) = self.parse_body(src, p, end, depth, "for")?;
        out.push(Statement::Loop(LoopBlock { kind, header, body }));
        Ok(p)
    }

    fn parse_while(
        &self,
        src: &str,
        pos: usize,
        end: usize,
        depth: usize,
        out: &mut Vec<Statement>,
    ) -> ParseResult<usize> {
        let (test, p) = paren_group(src, pos + "while".len(), end, "while", true)?;
        let (body, p) = self.parse_body(src, p, end, depth, "while")?;
        out.push(Statement::Loop(LoopBlock {
            kind: LoopKind::While { test: test.clone() },
            header: test,
            body,
        }));
        Ok(p)
    }

    fn parse_try(
        &self,
        src: &str,
        pos: usize,
        end: usize,
        depth: usize,
        out: &mut Vec<Statement>,
    ) -> ParseResult<usize> {
        let (body, mut p) = self.parse_braced(src, pos + "try".len(), end, depth, "try")?;
        let mut block = TryBlock {
            body,
            catch_var: None,
            catch_body: None,
            finally_body: None,
        };

        let q = skip_separators(src, p, end);
        if q < end && starts_with_word(&src[q..end], "catch") {
            let mut r = skip_blank(src, q + "catch".len(), end);
            if r < end && src.as_bytes()[r] == b'(' {
                let close = matching(src, r, end)?;
                let var = src[r + 1..close].trim();
                if !var.is_empty() {
                    if !is_identifier(var) {
                        return Err(ParseFailure::InvalidHeader {
                            construct: "catch",
                            header: var.to_string(),
                        });
                    }
                    block.catch_var = Some(var.to_string());
                }
                r = close + 1;
            }
            let (catch_body, r) = self.parse_braced(src, r, end, depth, "catch")?;
            block.catch_body = Some(catch_body);
            p = r;
        }

        let q = skip_separators(src, p, end);
        if q < end && starts_with_word(&src[q..end], "finally") {
            let (finally_body, r) = self.parse_braced(src, q + "finally".len(), end, depth, "finally")?;
            block.finally_body = Some(finally_body);
            p = r;
        }

        if block.catch_body.is_none() && block.finally_body.is_none() {
            return Err(ParseFailure::MissingHandler);
        }
        out.push(Statement::Try(block));
        Ok(p)
    }

    fn parse_function(
        &self,
        src: &str,
        pos: usize,
        end: usize,
        depth: usize,
        out: &mut Vec<Statement>,
    ) -> ParseResult<usize> {
        let mut p = pos;
        if starts_with_word(&src[p..end], "async") {
            p = skip_blank(src, p + "async".len(), end);
        }
        p = skip_blank(src, p + "function".len(), end);

        let name_len = src[p..end]
            .char_indices()
            .find(|&(_, c)| !is_ident_char(c))
            .map(|(i, _)| i)
            .unwrap_or(end - p);
        let name = &src[p..p + name_len];
        if !is_identifier(name) {
            let header = src[pos..end].lines().next().unwrap_or_default().trim();
            return Err(ParseFailure::InvalidHeader {
                construct: "function",
                header: header.to_string(),
            });
        }

        let (params_text, p) = paren_group(src, p + name_len, end, "function", false)?;
        let mut params = Vec::new();
        if !params_text.is_empty() {
            for raw in scanner::split_top_level(&params_text, b',') {
                // default values are not supported; keep the name only
                let param = raw.split('=').next().unwrap_or_default().trim();
                if !is_identifier(param) {
                    return Err(ParseFailure::InvalidHeader {
                        construct: "function",
                        header: params_text.clone(),
                    });
                }
                params.push(param.to_string());
            }
        }

        let (body, p) = self.parse_braced(src, p, end, depth, "function")?;
        out.push(Statement::Function(FunctionDecl {
            name: name.to_string(),
            params,
            body,
        }));
        Ok(p)
    }
}

/* ===================== Loop Headers & Bindings ===================== */

/// Parse the text between a `for (...)`'s parentheses.
pub fn parse_loop_header(header: &str) -> ParseResult<LoopKind> {
    let invalid = || ParseFailure::InvalidHeader {
        construct: "for",
        header: header.to_string(),
    };

    if scanner::find_top_level(header, 0, |_, b| b == b';').is_some() {
        let parts = scanner::split_top_level(header, b';');
        if parts.len() != 3 {
            return Err(invalid());
        }
        let part = |s: &str| {
            let t = s.trim();
            (!t.is_empty()).then(|| t.to_string())
        };
        return Ok(LoopKind::Counted {
            init: part(parts[0]),
            test: part(parts[1]),
            update: part(parts[2]),
        });
    }

    let mut rest = header.trim();
    for kw in ["let", "const", "var"] {
        if starts_with_word(rest, kw) {
            rest = rest[kw.len()..].trim_start();
            break;
        }
    }
    let (binding, after) = parse_binding(rest).map_err(|_| invalid())?;

    for (word, of) in [("of", true), ("in", false)] {
        if starts_with_word(after, word) {
            let target = after[word.len()..].trim();
            if target.is_empty() {
                return Err(invalid());
            }
            let target = target.to_string();
            return Ok(if of {
                LoopKind::ForOf {
                    binding,
                    iterable: target,
                }
            } else {
                LoopKind::ForIn {
                    binding,
                    object: target,
                }
            });
        }
    }
    Err(invalid())
}

/// Parse a binding (name or destructuring pattern) at the start of `text`.
///
/// Returns the binding and the remaining text.
pub fn parse_binding(text: &str) -> ParseResult<(Binding, &str)> {
    let text = text.trim_start();
    let invalid = || ParseFailure::InvalidTarget {
        target: text.to_string(),
    };

    if text.starts_with('[') || text.starts_with('{') {
        let close = scanner::find_matching(text, 0).ok_or(ParseFailure::UnmatchedBracket {
            open: if text.starts_with('[') { '[' } else { '{' },
            offset: 0,
        })?;
        let inner = &text[1..close];
        let rest = text[close + 1..].trim_start();
        let items = scanner::split_top_level(inner, b',')
            .into_iter()
            .map(str::trim)
            .filter(|s| !s.is_empty());

        let binding = if text.starts_with('[') {
            let mut names = Vec::new();
            for item in items {
                if !is_identifier(item) {
                    return Err(invalid());
                }
                names.push(item.to_string());
            }
            Binding::Array(names)
        } else {
            let mut pairs = Vec::new();
            for item in items {
                let (key, alias) = match item.split_once(':') {
                    Some((k, a)) => (k.trim(), a.trim()),
                    None => (item, item),
                };
                if !is_identifier(key) || !is_identifier(alias) {
                    return Err(invalid());
                }
                pairs.push((key.to_string(), alias.to_string()));
            }
            Binding::Object(pairs)
        };
        return Ok((binding, rest));
    }

    let len = text
        .char_indices()
        .find(|&(_, c)| !is_ident_char(c))
        .map(|(i, _)| i)
        .unwrap_or(text.len());
    let name = &text[..len];
    if !is_identifier(name) {
        return Err(invalid());
    }
    Ok((Binding::Name(name.to_string()), text[len..].trim_start()))
}

/* ===================== Helpers ===================== */

fn is_async_function(text: &str) -> bool {
    starts_with_word(text, "async") && starts_with_word(text["async".len()..].trim_start(), "function")
}

fn matching(src: &str, open: usize, end: usize) -> ParseResult<usize> {
    scanner::find_matching(&src[..end], open).ok_or_else(|| ParseFailure::UnmatchedBracket {
        open: src.as_bytes()[open] as char,
        offset: open,
    })
}

/// `( ... )` after a keyword: returns the trimmed inner text and the index past `)`.
fn paren_group(
    src: &str,
    pos: usize,
    end: usize,
    construct: &'static str,
    require_content: bool,
) -> ParseResult<(String, usize)> {
    let p = skip_blank(src, pos, end);
    if p >= end || src.as_bytes()[p] != b'(' {
        return Err(ParseFailure::MissingCondition { construct });
    }
    let close = matching(src, p, end)?;
    let inner = src[p + 1..close].trim();
    if require_content && inner.is_empty() {
        return Err(ParseFailure::MissingCondition { construct });
    }
    Ok((inner.to_string(), close + 1))
}

/// Skip whitespace and comments.
fn skip_blank(src: &str, mut pos: usize, end: usize) -> usize {
    let bytes = src.as_bytes();
    while pos < end {
        match bytes[pos] {
            b if b.is_ascii_whitespace() => pos += 1,
            b'/' if bytes.get(pos + 1) == Some(&b'/') => {
                pos = src[pos..end].find('\n').map_or(end, |i| pos + i);
            }
            b'/' if bytes.get(pos + 1) == Some(&b'*') => {
                pos = src[pos + 2..end].find("*/").map_or(end, |i| pos + 2 + i + 2);
            }
            _ => break,
        }
    }
    pos
}

/// Skip whitespace, comments and stray `;`.
fn skip_separators(src: &str, mut pos: usize, end: usize) -> usize {
    loop {
        pos = skip_blank(src, pos, end);
        if pos < end && src.as_bytes()[pos] == b';' {
            pos += 1;
        } else {
            return pos;
        }
    }
}

fn line_of(src: &str, pos: usize) -> usize {
    src[..pos].bytes().filter(|&b| b == b'\n').count() + 1
}

/// End of the simple statement starting at `pos`: the first top-level `;`,
/// a line end that does not continue the expression, a stray closing
/// bracket, or `end`.
fn simple_end(src: &str, pos: usize, end: usize) -> usize {
    let window = &src[..end];
    let mut open = 0usize;
    scanner::scan(window, pos, |i, b, depth| {
        if depth > 0 {
            return ControlFlow::Continue(());
        }
        match b {
            b';' => ControlFlow::Break(i),
            b'\n' if !continues_past_newline(window, pos, i) => ControlFlow::Break(i),
            b'(' | b'[' | b'{' => {
                open += 1;
                ControlFlow::Continue(())
            }
            b')' | b']' | b'}' => {
                if open == 0 {
                    ControlFlow::Break(i)
                } else {
                    open -= 1;
                    ControlFlow::Continue(())
                }
            }
            _ => ControlFlow::Continue(()),
        }
    })
    .unwrap_or(end)
}

/// Whether a statement continues onto the next line.
fn continues_past_newline(window: &str, start: usize, newline: usize) -> bool {
    let before = window[start..newline].trim_end();
    let after = window[newline + 1..].trim_start();

    if before.is_empty() || after.is_empty() {
        return false;
    }
    if before.ends_with("++") || before.ends_with("--") {
        return false;
    }
    if before
        .chars()
        .last()
        .map_or(false, |c| "+-*/%=&|,.?:<>!^~".contains(c))
    {
        return true;
    }
    after.starts_with('.')
        || after.starts_with('?')
        || after.starts_with(':')
        || after.starts_with("&&")
        || after.starts_with("||")
}

/// Join pre-split statement entries into one code string.
///
/// Entries split inside a parenthesized header (`for (a; b; c)` split at
/// its semicolons) are rejoined with `;`, everything else with a newline.
pub fn join_statement_list<S: AsRef<str>>(entries: &[S]) -> String {
    let mut out = String::new();
    for entry in entries {
        let text = entry.as_ref().trim();
        if text.is_empty() {
            continue;
        }
        if !out.is_empty() {
            if innermost_open(&out) == Some(b'(') {
                out.push_str("; ");
            } else {
                out.push('\n');
            }
        }
        out.push_str(text);
    }
    out
}

/// The innermost unclosed bracket at the end of `text`.
fn innermost_open(text: &str) -> Option<u8> {
    let mut stack = Vec::new();
    scanner::scan::<()>(text, 0, |_, b, _| {
        match b {
            b'(' | b'[' | b'{' => stack.push(b),
            b')' | b']' | b'}' => {
                stack.pop();
            }
            _ => {}
        }
        ControlFlow::Continue(())
    });
    stack.last().copied()
}
