//! Stack machine for compiled expressions

use super::opcode::OpCode;
use super::program::BytecodeProgram;
use crate::executor::errors::{self, ScriptError};
use crate::executor::expressions::{EvalResult, RuntimeContext};
use crate::executor::types::{ops, UnaryOp, Val};

fn underflow(pc: usize) -> ScriptError {
    ScriptError::runtime(
        errors::INTERNAL_ERROR,
        format!("bytecode stack underflow at {}", pc),
    )
}

/// Run a program to completion and return the value left on the stack.
///
/// Variables are read through `ctx`; nothing is written.
pub fn execute(program: &BytecodeProgram, ctx: &mut dyn RuntimeContext) -> EvalResult {
    let mut stack: Vec<Val> = Vec::with_capacity(8);
    let mut pc = 0;

    while pc < program.ops.len() {
        let op = program.ops[pc];
        let operand = program.operands[pc] as usize;
        let at = pc;
        pc += 1;

        match op {
            OpCode::PushConst | OpCode::PushInt => {
                let value = program.constants.get(operand).cloned().ok_or_else(|| {
                    ScriptError::runtime(
                        errors::INTERNAL_ERROR,
                        format!("constant {} out of range at {}", operand, at),
                    )
                })?;
                stack.push(value);
            }
            OpCode::PushVar => {
                let name = program.names.get(operand).ok_or_else(|| {
                    ScriptError::runtime(
                        errors::INTERNAL_ERROR,
                        format!("name {} out of range at {}", operand, at),
                    )
                })?;
                stack.push(ctx.get_variable(name)?);
            }
            OpCode::Pop => {
                stack.pop().ok_or_else(|| underflow(at))?;
            }

            OpCode::Neg | OpCode::Not => {
                let v = stack.pop().ok_or_else(|| underflow(at))?;
                let unary = if op == OpCode::Neg { UnaryOp::Neg } else { UnaryOp::Not };
                stack.push(ops::unary(unary, &v));
            }

            OpCode::Jump => pc = operand,
            OpCode::JumpIfFalse => {
                let v = stack.pop().ok_or_else(|| underflow(at))?;
                if !v.is_truthy() {
                    pc = operand;
                }
            }
            OpCode::JumpIfFalseKeep | OpCode::JumpIfTrueKeep => {
                let top = stack.last().ok_or_else(|| underflow(at))?;
                if top.is_truthy() == (op == OpCode::JumpIfTrueKeep) {
                    pc = operand;
                } else {
                    stack.pop();
                }
            }

            OpCode::AddInt
            | OpCode::SubInt
            | OpCode::MulInt
            | OpCode::DivInt
            | OpCode::ModInt
            | OpCode::LtInt
            | OpCode::LeInt
            | OpCode::GtInt
            | OpCode::GeInt
            | OpCode::EqInt
            | OpCode::NeInt => {
                let b = stack.pop().ok_or_else(|| underflow(at))?;
                let a = stack.pop().ok_or_else(|| underflow(at))?;
                let bop = op.binary_op().ok_or_else(|| underflow(at))?;
                stack.push(match (&a, &b) {
                    (Val::Int(x), Val::Int(y)) => ops::int_binary(bop, *x, *y),
                    _ => ops::binary(bop, &a, &b),
                });
            }

            OpCode::Add
            | OpCode::Sub
            | OpCode::Mul
            | OpCode::Div
            | OpCode::Mod
            | OpCode::Lt
            | OpCode::Le
            | OpCode::Gt
            | OpCode::Ge
            | OpCode::Eq
            | OpCode::Ne
            | OpCode::StrictEq
            | OpCode::StrictNe
            | OpCode::BitAnd
            | OpCode::BitOr
            | OpCode::BitXor
            | OpCode::Shl
            | OpCode::Shr => {
                let b = stack.pop().ok_or_else(|| underflow(at))?;
                let a = stack.pop().ok_or_else(|| underflow(at))?;
                let bop = op.binary_op().ok_or_else(|| underflow(at))?;
                stack.push(ops::binary(bop, &a, &b));
            }
        }
    }

    match (stack.pop(), stack.is_empty()) {
        (Some(v), true) => Ok(v),
        (None, _) => Err(underflow(pc)),
        (Some(_), false) => Err(ScriptError::runtime(
            errors::INTERNAL_ERROR,
            format!("{} values left on the bytecode stack", stack.len() + 1),
        )),
    }
}
