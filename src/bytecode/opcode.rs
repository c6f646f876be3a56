//! Instruction set

use serde::{Deserialize, Serialize};

use crate::executor::types::BinaryOp;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum OpCode {
    /// Push `constants[operand]`
    PushConst,
    /// Push the integer constant `constants[operand]`
    PushInt,
    /// Push the value of variable `names[operand]`
    PushVar,
    Pop,

    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Neg,
    Not,

    Lt,
    Le,
    Gt,
    Ge,
    Eq,
    Ne,
    StrictEq,
    StrictNe,

    BitAnd,
    BitOr,
    BitXor,
    Shl,
    Shr,

    /// Jump to instruction `operand`
    Jump,
    /// Pop; jump if falsy
    JumpIfFalse,
    /// Jump if the top is falsy, leaving it; otherwise pop it (`&&`)
    JumpIfFalseKeep,
    /// Jump if the top is truthy, leaving it; otherwise pop it (`||`)
    JumpIfTrueKeep,

    AddInt,
    SubInt,
    MulInt,
    DivInt,
    ModInt,
    LtInt,
    LeInt,
    GtInt,
    GeInt,
    EqInt,
    NeInt,
}

impl OpCode {
    /// Integer-specialized form of a generic binary opcode
    pub fn int_variant(self) -> Option<OpCode> {
        let op = match self {
            OpCode::Add => OpCode::AddInt,
            OpCode::Sub => OpCode::SubInt,
            OpCode::Mul => OpCode::MulInt,
            OpCode::Div => OpCode::DivInt,
            OpCode::Mod => OpCode::ModInt,
            OpCode::Lt => OpCode::LtInt,
            OpCode::Le => OpCode::LeInt,
            OpCode::Gt => OpCode::GtInt,
            OpCode::Ge => OpCode::GeInt,
            OpCode::Eq | OpCode::StrictEq => OpCode::EqInt,
            OpCode::Ne | OpCode::StrictNe => OpCode::NeInt,
            _ => return None,
        };
        Some(op)
    }

    /// The operator a binary opcode applies, generic or integer form
    pub fn binary_op(self) -> Option<BinaryOp> {
        let op = match self {
            OpCode::Add | OpCode::AddInt => BinaryOp::Add,
            OpCode::Sub | OpCode::SubInt => BinaryOp::Sub,
            OpCode::Mul | OpCode::MulInt => BinaryOp::Mul,
            OpCode::Div | OpCode::DivInt => BinaryOp::Div,
            OpCode::Mod | OpCode::ModInt => BinaryOp::Mod,
            OpCode::Lt | OpCode::LtInt => BinaryOp::Lt,
            OpCode::Le | OpCode::LeInt => BinaryOp::Le,
            OpCode::Gt | OpCode::GtInt => BinaryOp::Gt,
            OpCode::Ge | OpCode::GeInt => BinaryOp::Ge,
            OpCode::Eq | OpCode::EqInt => BinaryOp::Eq,
            OpCode::Ne | OpCode::NeInt => BinaryOp::Ne,
            OpCode::StrictEq => BinaryOp::StrictEq,
            OpCode::StrictNe => BinaryOp::StrictNe,
            OpCode::BitAnd => BinaryOp::BitAnd,
            OpCode::BitOr => BinaryOp::BitOr,
            OpCode::BitXor => BinaryOp::BitXor,
            OpCode::Shl => BinaryOp::Shl,
            OpCode::Shr => BinaryOp::Shr,
            _ => return None,
        };
        Some(op)
    }

    pub fn from_binary(op: BinaryOp) -> Option<OpCode> {
        let code = match op {
            BinaryOp::Add => OpCode::Add,
            BinaryOp::Sub => OpCode::Sub,
            BinaryOp::Mul => OpCode::Mul,
            BinaryOp::Div => OpCode::Div,
            BinaryOp::Mod => OpCode::Mod,
            BinaryOp::Lt => OpCode::Lt,
            BinaryOp::Le => OpCode::Le,
            BinaryOp::Gt => OpCode::Gt,
            BinaryOp::Ge => OpCode::Ge,
            BinaryOp::Eq => OpCode::Eq,
            BinaryOp::Ne => OpCode::Ne,
            BinaryOp::StrictEq => OpCode::StrictEq,
            BinaryOp::StrictNe => OpCode::StrictNe,
            BinaryOp::BitAnd => OpCode::BitAnd,
            BinaryOp::BitOr => OpCode::BitOr,
            BinaryOp::BitXor => OpCode::BitXor,
            BinaryOp::Shl => OpCode::Shl,
            BinaryOp::Shr => OpCode::Shr,
            BinaryOp::Pow => return None,
        };
        Some(code)
    }

    pub fn is_jump(self) -> bool {
        matches!(
            self,
            OpCode::Jump | OpCode::JumpIfFalse | OpCode::JumpIfFalseKeep | OpCode::JumpIfTrueKeep
        )
    }

    /// Whether the operand slot is meaningful
    pub fn has_operand(self) -> bool {
        self.is_jump() || matches!(self, OpCode::PushConst | OpCode::PushInt | OpCode::PushVar)
    }

    pub fn mnemonic(self) -> &'static str {
        match self {
            OpCode::PushConst => "PUSH_CONST",
            OpCode::PushInt => "PUSH_INT",
            OpCode::PushVar => "PUSH_VAR",
            OpCode::Pop => "POP",
            OpCode::Add => "ADD",
            OpCode::Sub => "SUB",
            OpCode::Mul => "MUL",
            OpCode::Div => "DIV",
            OpCode::Mod => "MOD",
            OpCode::Neg => "NEG",
            OpCode::Not => "NOT",
            OpCode::Lt => "LT",
            OpCode::Le => "LE",
            OpCode::Gt => "GT",
            OpCode::Ge => "GE",
            OpCode::Eq => "EQ",
            OpCode::Ne => "NE",
            OpCode::StrictEq => "STRICT_EQ",
            OpCode::StrictNe => "STRICT_NE",
            OpCode::BitAnd => "BIT_AND",
            OpCode::BitOr => "BIT_OR",
            OpCode::BitXor => "BIT_XOR",
            OpCode::Shl => "SHL",
            OpCode::Shr => "SHR",
            OpCode::Jump => "JUMP",
            OpCode::JumpIfFalse => "JUMP_IF_FALSE",
            OpCode::JumpIfFalseKeep => "JUMP_IF_FALSE_KEEP",
            OpCode::JumpIfTrueKeep => "JUMP_IF_TRUE_KEEP",
            OpCode::AddInt => "ADD_INT",
            OpCode::SubInt => "SUB_INT",
            OpCode::MulInt => "MUL_INT",
            OpCode::DivInt => "DIV_INT",
            OpCode::ModInt => "MOD_INT",
            OpCode::LtInt => "LT_INT",
            OpCode::LeInt => "LE_INT",
            OpCode::GtInt => "GT_INT",
            OpCode::GeInt => "GE_INT",
            OpCode::EqInt => "EQ_INT",
            OpCode::NeInt => "NE_INT",
        }
    }
}
