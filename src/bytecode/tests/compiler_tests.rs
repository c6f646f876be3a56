//! Tests for the split-based compiler, peephole pass and program checks

use crate::bytecode::{compile, compile_expression, peephole, BytecodeProgram, CompileError, OpCode};
use crate::executor::Val;

fn unsupported(source: &str) -> bool {
    matches!(compile(source), Err(CompileError::Unsupported { .. }))
}

/* ===================== Compilation ===================== */

#[test]
fn test_integer_literals_are_specialized() {
    let program = compile("5 + 3").unwrap();
    assert_eq!(
        program.ops,
        vec![OpCode::PushInt, OpCode::PushInt, OpCode::AddInt]
    );
    assert!(!program.contains(OpCode::Add));
}

#[test]
fn test_variables_keep_generic_ops() {
    let program = compile("x + y").unwrap();
    assert_eq!(
        program.ops,
        vec![OpCode::PushVar, OpCode::PushVar, OpCode::Add]
    );
    assert_eq!(program.names, vec!["x".to_string(), "y".to_string()]);
}

#[test]
fn test_precedence_and_left_associativity() {
    let program = compile_expression("1 + 2 * 3").unwrap();
    assert_eq!(
        program.ops,
        vec![
            OpCode::PushInt,
            OpCode::PushInt,
            OpCode::PushInt,
            OpCode::Mul,
            OpCode::Add
        ]
    );

    let program = compile_expression("a - b - c").unwrap();
    // (a - b) - c
    assert_eq!(
        program.ops,
        vec![
            OpCode::PushVar,
            OpCode::PushVar,
            OpCode::Sub,
            OpCode::PushVar,
            OpCode::Sub
        ]
    );
}

#[test]
fn test_only_the_literal_pair_is_specialized() {
    let program = compile("1 + 2 * 3").unwrap();
    assert!(program.contains(OpCode::MulInt));
    assert!(program.contains(OpCode::Add));
    assert!(!program.contains(OpCode::AddInt));
}

#[test]
fn test_negative_literal_folds() {
    let program = compile("-5 + 2").unwrap();
    assert_eq!(
        program.ops,
        vec![OpCode::PushInt, OpCode::PushInt, OpCode::AddInt]
    );
    assert_eq!(program.constants[0], Val::Int(-5));
}

#[test]
fn test_strict_operators_are_not_split() {
    let program = compile("a === b").unwrap();
    assert_eq!(program.ops.last(), Some(&OpCode::StrictEq));
    let program = compile("a !== b").unwrap();
    assert_eq!(program.ops.last(), Some(&OpCode::StrictNe));
}

#[test]
fn test_short_circuit_and_conditional_jumps() {
    let program = compile("a || b").unwrap();
    assert_eq!(program.ops[1], OpCode::JumpIfTrueKeep);
    assert_eq!(program.operands[1], 3);

    let program = compile("c ? 1 : 2").unwrap();
    assert_eq!(
        program.ops,
        vec![
            OpCode::PushVar,
            OpCode::JumpIfFalse,
            OpCode::PushInt,
            OpCode::Jump,
            OpCode::PushInt
        ]
    );
    assert_eq!(program.operands[1], 4);
    assert_eq!(program.operands[3], 5);
}

#[test]
fn test_string_and_keyword_constants() {
    let program = compile("'a' + true").unwrap();
    assert_eq!(program.constants, vec![Val::from("a"), Val::Bool(true)]);
    assert_eq!(program.ops[2], OpCode::Add);
}

#[test]
fn test_unsupported_constructs() {
    assert!(unsupported("f(x)"));
    assert!(unsupported("a.b"));
    assert!(unsupported("x = 1"));
    assert!(unsupported("[1, 2]"));
    assert!(unsupported("`t`"));
    assert!(unsupported("a ?? b"));
    assert!(unsupported("2 ** 3"));
    assert!(unsupported("x => x"));
    assert!(unsupported("i++"));
    assert!(unsupported("typeof x"));
    assert_eq!(compile("  ").unwrap_err(), CompileError::Empty);
}

#[test]
fn test_nesting_limit() {
    let source = format!("{}1{}", "(".repeat(200), ")".repeat(200));
    assert!(matches!(
        compile(&source),
        Err(CompileError::TooDeep { .. })
    ));
}

/* ===================== Peephole ===================== */

#[test]
fn test_peephole_skips_jump_targets() {
    let mut program = BytecodeProgram::new("manual");
    let one = program.add_constant(Val::Int(1));
    let two = program.add_constant(Val::Int(2));
    program.emit(OpCode::PushInt, one);
    program.emit(OpCode::PushInt, two);
    program.emit(OpCode::Add, 0);
    program.emit(OpCode::Jump, 1);

    assert_eq!(peephole::optimize(&mut program), 0);
    assert_eq!(program.ops[2], OpCode::Add);
}

#[test]
fn test_peephole_never_removes_instructions() {
    let before = compile_expression("c ? 1 + 2 : 3 * 4").unwrap();
    let mut after = before.clone();
    assert_eq!(peephole::optimize(&mut after), 2);
    assert_eq!(before.len(), after.len());
    assert_eq!(before.operands, after.operands);
}

/* ===================== Program ===================== */

#[test]
fn test_validate_rejects_bad_operands() {
    let mut program = BytecodeProgram::new("bad");
    program.emit(OpCode::PushConst, 3);
    assert!(matches!(
        program.validate(),
        Err(CompileError::InvalidProgram { .. })
    ));

    let mut program = BytecodeProgram::new("bad");
    let idx = program.add_constant(Val::from("s"));
    program.emit(OpCode::PushInt, idx);
    assert!(program.validate().is_err());
}

#[test]
fn test_constants_are_deduplicated() {
    let program = compile("x + 1 + 1").unwrap();
    assert_eq!(program.constants, vec![Val::Int(1)]);
}

#[test]
fn test_disassemble() {
    let listing = compile("a + 1").unwrap().disassemble();
    let lines: Vec<&str> = listing.lines().collect();
    assert_eq!(lines[0], "; a + 1");
    assert!(lines[1].starts_with("0000 PUSH_VAR"));
    assert!(lines[1].ends_with("; a"));
    assert!(lines[2].starts_with("0001 PUSH_INT"));
    assert!(lines[2].ends_with("; 1"));
    assert_eq!(lines[3], "0002 ADD");
}
