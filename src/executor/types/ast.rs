//! Expression AST node types

use serde::{Deserialize, Serialize};

use super::values::Val;

/// Binary operators shared by the tree walker, the bytecode VM and compound assignment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Pow,
    Eq,
    Ne,
    StrictEq,
    StrictNe,
    Lt,
    Le,
    Gt,
    Ge,
    BitAnd,
    BitOr,
    BitXor,
    Shl,
    Shr,
}

impl BinaryOp {
    /// The operator for a compound assignment character (`+=` → `Add`)
    pub fn from_compound(c: u8) -> Option<BinaryOp> {
        match c {
            b'+' => Some(BinaryOp::Add),
            b'-' => Some(BinaryOp::Sub),
            b'*' => Some(BinaryOp::Mul),
            b'/' => Some(BinaryOp::Div),
            b'%' => Some(BinaryOp::Mod),
            _ => None,
        }
    }

    pub fn symbol(&self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Mod => "%",
            BinaryOp::Pow => "**",
            BinaryOp::Eq => "==",
            BinaryOp::Ne => "!=",
            BinaryOp::StrictEq => "===",
            BinaryOp::StrictNe => "!==",
            BinaryOp::Lt => "<",
            BinaryOp::Le => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::Ge => ">=",
            BinaryOp::BitAnd => "&",
            BinaryOp::BitOr => "|",
            BinaryOp::BitXor => "^",
            BinaryOp::Shl => "<<",
            BinaryOp::Shr => ">>",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UnaryOp {
    Neg,
    Plus,
    Not,
    BitNot,
    Typeof,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LogicalOp {
    And,
    Or,
    Nullish,
}

/// Piece of a template literal
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "t")]
pub enum TemplatePart {
    Text { v: String },
    Expr { e: Expr },
}

/// Body of an arrow function
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "t")]
pub enum ArrowBody {
    /// `x => x * 2`
    Expr { e: Box<Expr> },
    /// `x => { ... }`, kept as source and parsed by the statement parser when called
    Block { source: String },
}

/// Expression AST node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "t")]
pub enum Expr {
    Lit {
        v: Val,
    },
    Ident {
        name: String,
    },
    Array {
        elements: Vec<Expr>,
    },
    Object {
        props: Vec<(String, Expr)>,
    },
    Template {
        parts: Vec<TemplatePart>,
    },
    Member {
        object: Box<Expr>,
        property: String,
        /// `?.` access: yields undefined instead of faulting on a nullish object
        optional: bool,
    },
    Index {
        object: Box<Expr>,
        index: Box<Expr>,
    },
    Call {
        callee: Box<Expr>,
        args: Vec<Expr>,
    },
    New {
        class: String,
        args: Vec<Expr>,
    },
    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
    },
    Binary {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Logical {
        op: LogicalOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Conditional {
        test: Box<Expr>,
        consequent: Box<Expr>,
        alternate: Box<Expr>,
    },
    Assign {
        target: Box<Expr>,
        /// Compound operator (`+=` → `Some(Add)`)
        op: Option<BinaryOp>,
        value: Box<Expr>,
    },
    Update {
        target: Box<Expr>,
        /// +1 for `++`, -1 for `--`
        delta: i64,
        prefix: bool,
    },
    Arrow {
        params: Vec<String>,
        body: ArrowBody,
    },
}

impl Expr {
    /// True for expressions that can appear on the left of `=`.
    pub fn is_assignable(&self) -> bool {
        matches!(
            self,
            Expr::Ident { .. } | Expr::Member { .. } | Expr::Index { .. }
        )
    }
}
