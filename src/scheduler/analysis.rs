//! Block dependency analysis
//!
//! Each template block is reduced to the variables it reads and writes, plus
//! a barrier flag for calls with outside effects. The analysis runs on the
//! token stream, so identifiers inside string literals never count. It errs
//! on the side of dependencies: a block it cannot tokenize, or one calling a
//! function it cannot place, is a barrier.

use serde::Serialize;
use std::collections::{BTreeSet, HashSet};
use tracing::debug;

use super::registry::FunctionRegistry;
use crate::executor::builtins::{GLOBAL_FUNCTIONS, NAMESPACES};
use crate::executor::expressions::MUTATING_METHODS;
use crate::parser::tokens::{tokenize, Token};
use crate::parser::scanner::{template_parts, RawPart};
use crate::template::TemplateBlock;

const KEYWORDS: &[&str] = &[
    "let", "const", "var", "if", "else", "for", "while", "do", "of", "in", "return", "break",
    "continue", "function", "try", "catch", "finally", "throw", "new", "typeof", "instanceof",
    "true", "false", "null", "undefined", "this", "NaN", "Infinity",
];

const ASSIGN_OPS: &[&str] = &["=", "+=", "-=", "*=", "/=", "%="];

/// What a block touches.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BlockAnalysis {
    pub index: usize,
    pub reads: BTreeSet<String>,
    pub writes: BTreeSet<String>,
    /// Calls with outside effects; the block runs alone
    pub barrier: bool,
    pub writes_accumulator: bool,
    pub reads_accumulator: bool,
}

impl BlockAnalysis {
    pub fn new(index: usize) -> Self {
        Self {
            index,
            ..Self::default()
        }
    }

    /// A block the analyzer could not see into
    pub fn opaque(index: usize) -> Self {
        Self {
            index,
            barrier: true,
            ..Self::default()
        }
    }

    /// Whether this block must not run concurrently with `other` or be
    /// reordered relative to it.
    pub fn depends_on(&self, other: &BlockAnalysis) -> bool {
        if other.barrier {
            return true;
        }
        if other.writes_accumulator && (self.writes_accumulator || self.reads_accumulator) {
            return true;
        }
        self.reads
            .iter()
            .chain(&self.writes)
            .any(|name| other.writes.contains(name))
    }

    /// `depends_on` in either direction
    pub fn related(&self, other: &BlockAnalysis) -> bool {
        self.depends_on(other) || other.depends_on(self)
    }
}

/* ===================== Analyzer ===================== */

pub struct DependencyAnalyzer<'a> {
    registry: &'a FunctionRegistry,
    accumulator: &'a str,
}

impl<'a> DependencyAnalyzer<'a> {
    pub fn new(registry: &'a FunctionRegistry, accumulator: &'a str) -> Self {
        Self {
            registry,
            accumulator,
        }
    }

    pub fn analyze_template(&self, blocks: &[TemplateBlock]) -> Vec<BlockAnalysis> {
        blocks.iter().map(|b| self.analyze_block(b)).collect()
    }

    pub fn analyze_block(&self, block: &TemplateBlock) -> BlockAnalysis {
        self.analyze_code(block.index, &block.code)
    }

    pub fn analyze_code(&self, index: usize, code: &str) -> BlockAnalysis {
        let Some(tokens) = flatten(code) else {
            debug!(block = index, "Block could not be tokenized, treating as barrier");
            return BlockAnalysis::opaque(index);
        };
        let mut scan = Scan {
            analyzer: self,
            tokens: &tokens,
            skip: HashSet::new(),
            locals: HashSet::new(),
            out: BlockAnalysis::new(index),
        };
        scan.run();
        scan.out
    }
}

/// Tokens of `code` with template literal interpolations spliced in as
/// parenthesized groups.
fn flatten(code: &str) -> Option<Vec<Token>> {
    let mut out = Vec::new();
    for spanned in tokenize(code).ok()? {
        match spanned.token {
            Token::Template(raw) => {
                out.push(Token::Punct("("));
                for part in template_parts(&raw)? {
                    if let RawPart::Code(inner) = part {
                        out.push(Token::Punct("("));
                        out.extend(flatten(inner)?);
                        out.push(Token::Punct(")"));
                    }
                }
                out.push(Token::Punct(")"));
            }
            other => out.push(other),
        }
    }
    Some(out)
}

/* ===================== Token Walk ===================== */

struct Scan<'s, 'a> {
    analyzer: &'s DependencyAnalyzer<'a>,
    tokens: &'s [Token],
    /// Token positions already accounted for (declared names, parameters)
    skip: HashSet<usize>,
    /// Functions and variables declared in this block
    locals: HashSet<String>,
    out: BlockAnalysis,
}

impl<'s> Scan<'s, '_> {
    fn punct(&self, at: usize, p: &str) -> bool {
        matches!(self.tokens.get(at), Some(Token::Punct(q)) if *q == p)
    }

    fn ident(&self, at: usize) -> Option<&'s str> {
        let tokens: &'s [Token] = self.tokens;
        match tokens.get(at) {
            Some(Token::Ident(name)) => Some(name),
            _ => None,
        }
    }

    fn after_dot(&self, at: usize) -> bool {
        at > 0 && (self.punct(at - 1, ".") || self.punct(at - 1, "?."))
    }

    fn is_assign_op(&self, at: usize) -> bool {
        ASSIGN_OPS.iter().any(|op| self.punct(at, op))
    }

    fn run(&mut self) {
        self.collect_declarations();
        let tokens = self.tokens;
        for (i, token) in tokens.iter().enumerate() {
            if self.skip.contains(&i) {
                continue;
            }
            match token {
                Token::Ident(name) => self.visit_ident(i, name),
                Token::Punct(op) if ASSIGN_OPS.contains(op) || *op == "++" || *op == "--" => {
                    self.visit_member_write(i)
                }
                _ => {}
            }
        }
    }

    /// First pass: declared names, function names, and every parameter list.
    fn collect_declarations(&mut self) {
        for i in 0..self.tokens.len() {
            let Some(word) = self.ident(i) else {
                if self.punct(i, "=>") {
                    self.mark_arrow_params(i);
                }
                continue;
            };
            if self.after_dot(i) {
                continue;
            }
            match word {
                "let" | "const" | "var" => self.mark_binding(i + 1),
                "function" => {
                    let mut open = i + 1;
                    if let Some(name) = self.ident(i + 1) {
                        self.locals.insert(name.to_string());
                        self.skip.insert(i + 1);
                        open = i + 2;
                    }
                    if self.punct(open, "(") {
                        if let Some(close) = self.matching_forward(open) {
                            self.skip_idents(open, close);
                        }
                    }
                }
                "catch" if self.punct(i + 1, "(") => {
                    if let Some(close) = self.matching_forward(i + 1) {
                        self.skip_idents(i + 1, close);
                    }
                }
                _ => {}
            }
        }
    }

    fn mark_binding(&mut self, at: usize) {
        if let Some(name) = self.ident(at) {
            let name = name.to_string();
            self.skip.insert(at);
            self.locals.insert(name.clone());
            self.write(name);
            return;
        }
        if !(self.punct(at, "[") || self.punct(at, "{")) {
            return;
        }
        let Some(close) = self.matching_forward(at) else {
            return;
        };
        for j in at + 1..close {
            let Some(name) = self.ident(j) else { continue };
            self.skip.insert(j);
            // `{ key: alias }` binds the alias
            if self.punct(j + 1, ":") {
                continue;
            }
            let name = name.to_string();
            self.locals.insert(name.clone());
            self.write(name);
        }
    }

    fn mark_arrow_params(&mut self, arrow: usize) {
        if arrow == 0 {
            return;
        }
        if self.ident(arrow - 1).is_some() {
            self.skip.insert(arrow - 1);
        } else if self.punct(arrow - 1, ")") {
            if let Some(open) = self.matching_backward(arrow - 1) {
                self.skip_idents(open, arrow - 1);
            }
        }
    }

    fn skip_idents(&mut self, open: usize, close: usize) {
        for j in open + 1..close {
            if self.ident(j).is_some() {
                self.skip.insert(j);
            }
        }
    }

    fn matching_forward(&self, open: usize) -> Option<usize> {
        let mut depth = 0usize;
        for (j, token) in self.tokens.iter().enumerate().skip(open) {
            match token {
                Token::Punct("(" | "[" | "{") => depth += 1,
                Token::Punct(")" | "]" | "}") => {
                    depth = depth.checked_sub(1)?;
                    if depth == 0 {
                        return Some(j);
                    }
                }
                _ => {}
            }
        }
        None
    }

    fn matching_backward(&self, close: usize) -> Option<usize> {
        let mut depth = 0usize;
        for j in (0..=close).rev() {
            match &self.tokens[j] {
                Token::Punct(")" | "]" | "}") => depth += 1,
                Token::Punct("(" | "[" | "{") => {
                    depth = depth.checked_sub(1)?;
                    if depth == 0 {
                        return Some(j);
                    }
                }
                _ => {}
            }
        }
        None
    }

    /// Root variable of the member chain ending at `end` (`a` in `a.b[i].c`)
    fn chain_root(&self, end: usize) -> Option<usize> {
        let mut j = end;
        loop {
            match &self.tokens[j] {
                Token::Ident(name) if KEYWORDS.contains(&name.as_str()) => return None,
                Token::Ident(_) => {
                    if j >= 2 && self.after_dot(j) {
                        j -= 2;
                    } else {
                        return Some(j);
                    }
                }
                Token::Punct("]" | ")") => {
                    let open = self.matching_backward(j)?;
                    j = open.checked_sub(1)?;
                }
                _ => return None,
            }
        }
    }

    fn read(&mut self, name: &str) {
        if name == self.analyzer.accumulator {
            self.out.reads_accumulator = true;
        } else {
            self.out.reads.insert(name.to_string());
        }
    }

    fn write(&mut self, name: String) {
        if name == self.analyzer.accumulator {
            self.out.writes_accumulator = true;
        } else {
            self.out.writes.insert(name);
        }
    }

    fn visit_ident(&mut self, i: usize, name: &str) {
        if self.after_dot(i) {
            // a mutating method writes its receiver
            if MUTATING_METHODS.contains(&name) && self.punct(i + 1, "(") && i >= 2 {
                if let Some(root) = self.chain_root(i - 2).and_then(|r| self.ident(r)) {
                    let root = root.to_string();
                    self.read(&root);
                    self.write(root);
                }
            }
            return;
        }
        if KEYWORDS.contains(&name) {
            return;
        }
        // object literal key
        if self.punct(i + 1, ":") && i > 0 && (self.punct(i - 1, "{") || self.punct(i - 1, ",")) {
            return;
        }

        if self.punct(i + 1, "(") {
            self.visit_call(name);
            return;
        }
        if self.punct(i + 1, ".") || self.punct(i + 1, "?.") {
            self.visit_chain(i, name);
            return;
        }

        if name == self.analyzer.accumulator {
            if self.punct(i + 1, "=") || self.punct(i + 1, "+=") {
                self.out.writes_accumulator = true;
            } else {
                self.out.reads_accumulator = true;
            }
            return;
        }

        if self.is_assign_op(i + 1) {
            if !self.punct(i + 1, "=") {
                self.read(name);
            }
            self.write(name.to_string());
        } else if self.punct(i + 1, "++")
            || self.punct(i + 1, "--")
            || (i > 0 && (self.punct(i - 1, "++") || self.punct(i - 1, "--")))
        {
            self.read(name);
            self.write(name.to_string());
        } else {
            self.read(name);
        }
    }

    /// Call of a plain identifier: `f(x)`
    fn visit_call(&mut self, name: &str) {
        if self.locals.contains(name) {
            self.read(name);
        } else if !(GLOBAL_FUNCTIONS.contains(&name) || self.analyzer.registry.is_pure(name)) {
            debug!(block = self.out.index, function = name, "Unknown call makes block a barrier");
            self.out.barrier = true;
        }
    }

    /// Dotted access starting at a root identifier: `tp.file.title`, `items.length`
    fn visit_chain(&mut self, i: usize, name: &str) {
        let registry = self.analyzer.registry;
        if name != registry.module_root() {
            if !NAMESPACES.contains(&name) {
                self.read(name);
            }
            return;
        }

        let mut parts = vec![name];
        let mut j = i;
        while self.punct(j + 1, ".") {
            let Some(next) = self.ident(j + 2) else { break };
            parts.push(next);
            j += 2;
        }

        // the longest registered prefix decides
        for k in (2..=parts.len()).rev() {
            let qualified = parts[..k].join(".");
            if registry.is_barrier(&qualified) {
                self.out.barrier = true;
                return;
            }
            if registry.is_pure(&qualified) {
                return;
            }
        }
        debug!(block = self.out.index, chain = %parts.join("."), "Unregistered module access makes block a barrier");
        self.out.barrier = true;
    }

    /// Assignment or update whose target is a member chain or a
    /// destructuring pattern.
    fn visit_member_write(&mut self, op: usize) {
        if op == 0 {
            return;
        }
        let target = op - 1;
        let member = self.punct(target, "]") || (self.ident(target).is_some() && self.after_dot(target));
        if !member {
            return;
        }
        match self.chain_root(target) {
            Some(root) if root != target => {
                if let Some(name) = self.ident(root) {
                    let name = name.to_string();
                    self.read(&name);
                    self.write(name);
                }
            }
            Some(_) => {}
            None if self.punct(target, "]") && self.punct(op, "=") => {
                // `[a, b] = [b, a]`
                if let Some(open) = self.matching_backward(target) {
                    let preceded_by_decl = open > 0
                        && matches!(self.ident(open - 1), Some("let" | "const" | "var"));
                    if !preceded_by_decl {
                        for j in open + 1..target {
                            if let Some(name) = self.ident(j) {
                                let name = name.to_string();
                                self.write(name);
                            }
                        }
                    }
                }
            }
            None => {}
        }
    }
}
