//! Compiled expression container

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt::Write;

use super::compiler::CompileError;
use super::opcode::OpCode;
use crate::executor::types::Val;

/// A compiled expression.
///
/// `ops` and `operands` are parallel arrays; an opcode without an operand
/// carries 0. Constants and variable names are referenced by index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BytecodeProgram {
    pub ops: Vec<OpCode>,
    pub operands: Vec<u32>,
    pub constants: Vec<Val>,
    pub names: Vec<String>,
    pub source: String,
}

impl BytecodeProgram {
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            ops: Vec::new(),
            operands: Vec::new(),
            constants: Vec::new(),
            names: Vec::new(),
            source: source.into(),
        }
    }

    /// Append an instruction, returning its index
    pub fn emit(&mut self, op: OpCode, operand: u32) -> usize {
        self.ops.push(op);
        self.operands.push(operand);
        self.ops.len() - 1
    }

    /// Point the jump at `at` to `target`
    pub fn patch(&mut self, at: usize, target: usize) {
        self.operands[at] = target as u32;
    }

    pub fn add_constant(&mut self, value: Val) -> u32 {
        if let Some(i) = self.constants.iter().position(|c| *c == value) {
            return i as u32;
        }
        self.constants.push(value);
        (self.constants.len() - 1) as u32
    }

    pub fn add_name(&mut self, name: &str) -> u32 {
        if let Some(i) = self.names.iter().position(|n| n == name) {
            return i as u32;
        }
        self.names.push(name.to_string());
        (self.names.len() - 1) as u32
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    pub fn contains(&self, op: OpCode) -> bool {
        self.ops.contains(&op)
    }

    /// Every instruction index some jump lands on
    pub fn jump_targets(&self) -> BTreeSet<usize> {
        self.ops
            .iter()
            .zip(&self.operands)
            .filter(|(op, _)| op.is_jump())
            .map(|(_, &target)| target as usize)
            .collect()
    }

    /// Check structural invariants: parallel arrays and in-range operands.
    pub fn validate(&self) -> Result<(), CompileError> {
        let invalid = |detail: String| Err(CompileError::InvalidProgram { detail });

        if self.ops.len() != self.operands.len() {
            return invalid(format!(
                "{} opcodes but {} operands",
                self.ops.len(),
                self.operands.len()
            ));
        }
        for (i, (op, &operand)) in self.ops.iter().zip(&self.operands).enumerate() {
            let operand = operand as usize;
            match op {
                OpCode::PushConst if operand >= self.constants.len() => {
                    return invalid(format!("constant {} out of range at {}", operand, i));
                }
                OpCode::PushInt => match self.constants.get(operand) {
                    Some(Val::Int(_)) => {}
                    _ => return invalid(format!("PUSH_INT without integer constant at {}", i)),
                },
                OpCode::PushVar if operand >= self.names.len() => {
                    return invalid(format!("name {} out of range at {}", operand, i));
                }
                op if op.is_jump() && operand > self.ops.len() => {
                    return invalid(format!("jump target {} out of range at {}", operand, i));
                }
                _ => {}
            }
        }
        Ok(())
    }

    /// Human-readable listing
    pub fn disassemble(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "; {}", self.source);
        for (i, (op, &operand)) in self.ops.iter().zip(&self.operands).enumerate() {
            let mut line = format!("{:04} {:<20}", i, op.mnemonic());
            if op.has_operand() {
                let _ = write!(line, " {}", operand);
            }
            let note = match op {
                OpCode::PushConst | OpCode::PushInt => {
                    self.constants.get(operand as usize).map(|c| match c {
                        Val::Str(s) => format!("{:?}", s),
                        other => other.to_display_string(),
                    })
                }
                OpCode::PushVar => self.names.get(operand as usize).cloned(),
                _ => None,
            };
            if let Some(note) = note {
                let _ = write!(line, "  ; {}", note);
            }
            out.push_str(line.trim_end());
            out.push('\n');
        }
        out
    }
}
