//! Statement classification
//!
//! Tags a trimmed statement with the [`StatementKind`] the executors dispatch
//! on. Classification is a pure function of the text, so results are kept in
//! a bounded cache keyed by that text.

use lru::LruCache;
use serde::{Deserialize, Serialize};
use std::num::NonZeroUsize;
use std::sync::Mutex;

use super::scanner::{self, starts_with_word};

/// Default number of statements the classifier remembers
pub const DEFAULT_CLASSIFIER_CAPACITY: usize = 512;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StatementKind {
    Empty,
    BraceOnly,
    ReturnVoid,
    ReturnValue,
    Break,
    Continue,
    Throw,
    ForHeader,
    WhileHeader,
    IfHeader,
    TryHeader,
    FunctionDecl,
    VarDecl,
    AccumulatorWrite,
    Increment,
    Decrement,
    CompoundAssign,
    ArrayElementAssign,
    Assignment,
    Call,
    Other,
}

pub struct StatementClassifier {
    accumulator: String,
    /// `None` when the capacity is zero. Reads use `peek`, so eviction
    /// stays oldest-inserted first.
    cache: Option<Mutex<LruCache<String, StatementKind>>>,
}

impl StatementClassifier {
    pub fn new(accumulator: impl Into<String>, capacity: usize) -> Self {
        Self {
            accumulator: accumulator.into(),
            cache: NonZeroUsize::new(capacity).map(|cap| Mutex::new(LruCache::new(cap))),
        }
    }

    /// Classify a statement, consulting the cache first.
    pub fn classify(&self, text: &str) -> StatementKind {
        let text = text.trim();
        // a poisoned cache only costs us the memoization
        let Some(Ok(mut cache)) = self.cache.as_ref().map(|c| c.lock()) else {
            return classify_text(text, &self.accumulator);
        };
        if let Some(kind) = cache.peek(text) {
            return *kind;
        }
        let kind = classify_text(text, &self.accumulator);
        cache.push(text.to_string(), kind);
        kind
    }

    pub fn cached_len(&self) -> usize {
        self.cache
            .as_ref()
            .and_then(|c| c.lock().ok().map(|c| c.len()))
            .unwrap_or(0)
    }

    /// Whether `text` has a cached classification. Does not touch eviction order.
    pub fn is_cached(&self, text: &str) -> bool {
        self.cache
            .as_ref()
            .and_then(|c| c.lock().ok().map(|c| c.contains(text.trim())))
            .unwrap_or(false)
    }

    pub fn capacity(&self) -> usize {
        self.cache
            .as_ref()
            .and_then(|c| c.lock().ok().map(|c| c.cap().get()))
            .unwrap_or(0)
    }
}

impl Default for StatementClassifier {
    fn default() -> Self {
        Self::new("tR", DEFAULT_CLASSIFIER_CAPACITY)
    }
}

/// Uncached classification, in priority order.
pub fn classify_text(text: &str, accumulator: &str) -> StatementKind {
    let text = text.trim();
    let body = text.trim_end_matches(';').trim_end();

    if body.is_empty() {
        return StatementKind::Empty;
    }
    if body
        .chars()
        .all(|c| c == '{' || c == '}' || c == ';' || c.is_whitespace())
    {
        return StatementKind::BraceOnly;
    }

    if starts_with_word(body, "return") {
        return if body["return".len()..].trim().is_empty() {
            StatementKind::ReturnVoid
        } else {
            StatementKind::ReturnValue
        };
    }
    if starts_with_word(body, "break") {
        return StatementKind::Break;
    }
    if starts_with_word(body, "continue") {
        return StatementKind::Continue;
    }
    if starts_with_word(body, "throw") {
        return StatementKind::Throw;
    }

    if starts_with_word(body, "for") {
        return StatementKind::ForHeader;
    }
    if starts_with_word(body, "while") {
        return StatementKind::WhileHeader;
    }
    if starts_with_word(body, "if") {
        return StatementKind::IfHeader;
    }
    if starts_with_word(body, "try") {
        return StatementKind::TryHeader;
    }

    if starts_with_word(body, "function")
        || (starts_with_word(body, "async")
            && starts_with_word(body["async".len()..].trim_start(), "function"))
    {
        return StatementKind::FunctionDecl;
    }

    if ["let", "const", "var"]
        .iter()
        .any(|kw| starts_with_word(body, kw))
    {
        return StatementKind::VarDecl;
    }

    if starts_with_word(body, accumulator) {
        let rest = body[accumulator.len()..].trim_start();
        if rest.starts_with("+=") || (rest.starts_with('=') && !rest.starts_with("==")) {
            return StatementKind::AccumulatorWrite;
        }
    }

    if body.ends_with("++") || body.starts_with("++") {
        return StatementKind::Increment;
    }
    if body.ends_with("--") || body.starts_with("--") {
        return StatementKind::Decrement;
    }

    if let Some((idx, op)) = scanner::find_assignment(body) {
        if op.is_some() {
            return StatementKind::CompoundAssign;
        }
        let target = body[..idx].trim_end();
        return if target.ends_with(']') {
            StatementKind::ArrayElementAssign
        } else {
            StatementKind::Assignment
        };
    }

    if body.ends_with(')') && body.contains('(') {
        return StatementKind::Call;
    }

    StatementKind::Other
}
