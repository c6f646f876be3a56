//! Peephole specialization
//!
//! Rewrites `PushInt a; PushInt b; <op>` windows so that `<op>` becomes its
//! integer form (`Add` → `AddInt`). A window is left alone when a jump lands
//! on its second or third instruction, since control could then reach the
//! operator with a non-integer operand. Instructions are never removed, so
//! jump targets stay valid.

use super::opcode::OpCode;
use super::program::BytecodeProgram;
use crate::executor::types::Val;

/// Specialize in place; returns the number of rewritten instructions.
pub fn optimize(program: &mut BytecodeProgram) -> usize {
    let targets = program.jump_targets();
    let is_int_push = |program: &BytecodeProgram, at: usize| {
        program.ops[at] == OpCode::PushInt
            && matches!(
                program.constants.get(program.operands[at] as usize),
                Some(Val::Int(_))
            )
    };

    let mut rewritten = 0;
    let mut i = 0;
    while i + 2 < program.ops.len() {
        let window_clear = !targets.contains(&(i + 1)) && !targets.contains(&(i + 2));
        if window_clear && is_int_push(program, i) && is_int_push(program, i + 1) {
            if let Some(specialized) = program.ops[i + 2].int_variant() {
                program.ops[i + 2] = specialized;
                rewritten += 1;
                i += 3;
                continue;
            }
        }
        i += 1;
    }

    if rewritten > 0 {
        tracing::trace!(source = %program.source, rewritten, "Specialized integer operations");
    }
    rewritten
}
