//! Tests for the stack machine, including agreement with the tree walker

use std::collections::HashMap;

use maplit::hashmap;

use crate::bytecode::{compile, vm, BytecodeProgram, OpCode};
use crate::executor::{eval_expr, Interpreter, ScriptContext, ScriptError, Services, Val};
use crate::host::NeverCancelled;
use crate::parser::parse_expression;

fn variables() -> HashMap<String, Val> {
    hashmap! {
        "x".to_string() => Val::Int(7),
        "y".to_string() => Val::Int(2),
        "f".to_string() => Val::Num(2.5),
        "s".to_string() => Val::from("ab"),
        "none".to_string() => Val::Null,
        "min".to_string() => Val::Int(i64::MIN),
    }
}

/// Run `source` on the VM and on the tree walker against the same variables
fn both(source: &str) -> (Val, Val) {
    let services = Services::default();
    let mut ctx = ScriptContext::new("tR").with_variables(variables());
    let mut interp = Interpreter::new(&mut ctx, &services, &NeverCancelled);

    let program = compile(source).unwrap_or_else(|e| panic!("{}: {}", source, e));
    let from_vm = vm::execute(&program, &mut interp).unwrap();
    let ast = parse_expression(source).unwrap();
    let from_tree = eval_expr(&ast, &mut interp).unwrap();
    (from_vm, from_tree)
}

fn run(source: &str) -> Val {
    both(source).0
}

#[test]
fn test_vm_matches_tree_walker() {
    let sources = [
        "x + y * 3",
        "x / y",
        "x % y",
        "x - y - 1",
        "(x + 1) * (y - 1)",
        "s + x",
        "x > y && y > 1",
        "none || 'default'",
        "x === 7 ? 'seven' : 'other'",
        "-x + f",
        "x << 2",
        "x & 3 | 8",
        "x ^ y",
        "!none",
        "f * 2",
        "x != '7'",
        "1 < 2 < 3",
        "x >= 7 == true",
        "'a' < 'b'",
        "missing || 0",
        "7 / 2",
        "x / 0",
        "0 / 0",
        "x % 0",
    ];
    for source in sources {
        let (from_vm, from_tree) = both(source);
        assert_eq!(
            format!("{:?}", from_vm),
            format!("{:?}", from_tree),
            "evaluators disagree on `{}`",
            source
        );
    }
}

#[test]
fn test_division_results() {
    assert_eq!(run("8 / 2"), Val::Int(4));
    assert_eq!(run("7 / 2"), Val::Num(3.5));
    assert_eq!(run("x / 0"), Val::Num(f64::INFINITY));
    assert_eq!(run("1 / 0"), Val::Num(f64::INFINITY));
    assert_eq!(run("f / 0"), Val::Num(f64::INFINITY));
}

#[test]
fn test_integer_division_sweep() {
    for a in -12i64..=12 {
        for b in (-12i64..=12).filter(|b| *b != 0) {
            let source = format!("{} / {}", a, b);
            let program = compile(&source).unwrap();
            assert!(program.ops.contains(&OpCode::DivInt), "{}", source);

            let (from_vm, from_tree) = both(&source);
            let expected = if a % b == 0 {
                Val::Int(a / b)
            } else {
                Val::Num(a as f64 / b as f64)
            };
            assert_eq!(from_vm, expected, "{}", source);
            assert_eq!(from_tree, expected, "{}", source);
        }
    }
}

#[test]
fn test_division_overflow_becomes_float() {
    let (from_vm, from_tree) = both("min / -1");
    assert_eq!(from_vm, Val::Num(-(i64::MIN as f64)));
    assert_eq!(from_tree, from_vm);
}

#[test]
fn test_short_circuit_keeps_operand() {
    assert_eq!(run("0 || 'b'"), Val::from("b"));
    assert_eq!(run("none && x"), Val::Null);
    assert_eq!(run("x && y"), Val::Int(2));
}

#[test]
fn test_nested_conditionals() {
    assert_eq!(run("x > 5 ? y > 5 ? 'both' : 'x only' : 'neither'"), Val::from("x only"));
}

#[test]
fn test_stack_underflow_is_an_error() {
    let mut program = BytecodeProgram::new("broken");
    program.emit(OpCode::Add, 0);

    let services = Services::default();
    let mut ctx = ScriptContext::new("tR");
    let mut interp = Interpreter::new(&mut ctx, &services, &NeverCancelled);
    let err = vm::execute(&program, &mut interp).unwrap_err();
    assert!(matches!(err, ScriptError::Runtime(ref info) if info.message.contains("underflow")));
}

#[test]
fn test_leftover_values_are_an_error() {
    let mut program = BytecodeProgram::new("two values");
    let one = program.add_constant(Val::Int(1));
    program.emit(OpCode::PushInt, one);
    program.emit(OpCode::PushInt, one);

    let services = Services::default();
    let mut ctx = ScriptContext::new("tR");
    let mut interp = Interpreter::new(&mut ctx, &services, &NeverCancelled);
    assert!(vm::execute(&program, &mut interp).is_err());
}
