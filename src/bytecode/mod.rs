//! # Bytecode Evaluator
//!
//! An alternative to tree-walking for the arithmetic, comparison and logical
//! subset of expressions:
//!
//! 1. `compiler` splits the source text into operators and operands and
//!    emits a [`BytecodeProgram`]
//! 2. `peephole` specializes operations on two integer literals
//! 3. `vm` runs the program on an explicit operand stack
//!
//! Both evaluators share `executor::types::ops`, so they agree on every
//! result.

pub mod compiler;
pub mod opcode;
pub mod peephole;
pub mod program;
pub mod vm;

#[cfg(test)]
mod tests;

pub use compiler::{compile_expression, CompileError};
pub use opcode::OpCode;
pub use program::BytecodeProgram;

/// Compile, specialize and validate an expression.
pub fn compile(source: &str) -> Result<BytecodeProgram, CompileError> {
    let mut program = compile_expression(source)?;
    peephole::optimize(&mut program);
    program.validate()?;
    Ok(program)
}
