//! Tests for statement execution: declarations, loops, branches, try and
//! functions

use super::helpers::{context, list, output, run, run_in, text, var};
use crate::config::EngineConfig;
use crate::executor::{Control, ScriptError, Services, Val};

/* ===================== Declarations ===================== */

#[test]
fn test_declarations_and_destructuring() {
    let ctx = run(r#"
        let a = 1, b = a + 1;
        let [x, y] = [10, 20];
        const { name, age: years } = { name: 'Ada', age: 36 };
        var empty;
    "#);
    assert_eq!(var(&ctx, "b"), Val::Int(2));
    assert_eq!(var(&ctx, "x"), Val::Int(10));
    assert_eq!(var(&ctx, "y"), Val::Int(20));
    assert_eq!(var(&ctx, "name"), text("Ada"));
    assert_eq!(var(&ctx, "years"), Val::Int(36));
    assert_eq!(var(&ctx, "empty"), Val::Undefined);
    assert!(ctx.contains("empty"));
}

#[test]
fn test_accumulator_writes() {
    assert_eq!(output("tR += 'a'; tR += 'b';"), "ab");
    assert_eq!(output("tR = 'reset'; tR += '!';"), "reset!");
}

#[test]
fn test_string_append_on_non_string() {
    let ctx = run("let n = 1; n += 2; let s = 'x'; s += 1;");
    assert_eq!(var(&ctx, "n"), Val::Int(3));
    assert_eq!(var(&ctx, "s"), text("x1"));
}

/* ===================== Loops ===================== */

#[test]
fn test_counted_loop() {
    let ctx = run("let total = 0;\nfor (let i = 0; i < 4; i++) {\n  total += i;\n}");
    assert_eq!(var(&ctx, "total"), Val::Int(6));
    // the header variable does not outlive the loop
    assert!(!ctx.contains("i"));
}

#[test]
fn test_loop_restores_shadowed_variable() {
    let ctx = run("let i = 'outer'; for (let i = 0; i < 2; i++) { tR += i }");
    assert_eq!(var(&ctx, "i"), text("outer"));
}

#[test]
fn test_zero_iteration_loops() {
    let ctx = run(r#"
        let n = 0;
        for (let i = 0; i < 0; i++) { n++ }
        for (const item of []) { n++ }
        while (false) { n++ }
    "#);
    assert_eq!(var(&ctx, "n"), Val::Int(0));
}

#[test]
fn test_for_of_and_for_in() {
    let ctx = run(r#"
        let s = '';
        for (const c of ['a', 'b', 'c']) { s += c }
        const o = { x: 1, y: 2 };
        let keys = [];
        for (const k in o) { keys.push(k) }
        let chars = 0;
        for (const ch of 'hey') { chars++ }
    "#);
    assert_eq!(var(&ctx, "s"), text("abc"));
    assert_eq!(var(&ctx, "keys"), Val::List(vec![text("x"), text("y")]));
    assert_eq!(var(&ctx, "chars"), Val::Int(3));
}

#[test]
fn test_for_in_over_number_does_nothing() {
    let ctx = run("let n = 0; for (const k in 42) { n++ }");
    assert_eq!(var(&ctx, "n"), Val::Int(0));
}

#[test]
fn test_for_of_over_number_fails() {
    let services = Services::default();
    let mut ctx = context();
    let err = run_in(&services, &mut ctx, "for (const k of 42) { tR += k }").unwrap_err();
    assert!(err.message().contains("is not iterable"));
}

#[test]
fn test_break_and_continue() {
    let ctx = run(r#"
        let i = 0;
        let odd = 0;
        while (true) {
            i++;
            if (i > 6) {
                break;
            }
            if (i % 2 === 0) {
                continue;
            }
            odd++;
        }
    "#);
    assert_eq!(var(&ctx, "i"), Val::Int(7));
    assert_eq!(var(&ctx, "odd"), Val::Int(3));
}

#[test]
fn test_loop_stops_at_iteration_limit() {
    let services = Services::new(EngineConfig {
        max_loop_iterations: 5,
        ..EngineConfig::default()
    });
    let mut ctx = context();
    let result = run_in(&services, &mut ctx, "let n = 0; while (true) { n++ } tR += 'after';");
    assert_eq!(result, Ok(Control::None));
    assert_eq!(var(&ctx, "n"), Val::Int(5));
    assert_eq!(ctx.accumulated_output(), "after");
}

/* ===================== Conditionals ===================== */

#[test]
fn test_if_else_chain() {
    let grade = |score: i64| {
        output(&format!(
            "let s = {};\nif (s >= 90) {{ tR += 'A' }} else if (s >= 80) {{ tR += 'B' }} else {{ tR += 'C' }}",
            score
        ))
    };
    assert_eq!(grade(95), "A");
    assert_eq!(grade(85), "B");
    assert_eq!(grade(10), "C");
}

/* ===================== Try / Catch ===================== */

#[test]
fn test_catch_thrown_error_object() {
    let ctx = run("let msg = ''; try { throw new Error('boom') } catch (e) { msg = e.message }");
    assert_eq!(var(&ctx, "msg"), text("boom"));
}

#[test]
fn test_catch_runtime_fault_binds_message() {
    let ctx = run("let msg = ''; try { missing.x } catch (e) { msg = e }");
    assert_eq!(
        var(&ctx, "msg"),
        text("Cannot read properties of undefined (reading 'x')")
    );
}

#[test]
fn test_catch_variable_is_restored() {
    let ctx = run("let e = 'keep'; let seen; try { throw 1 } catch (e) { seen = e }");
    assert_eq!(var(&ctx, "e"), text("keep"));
    assert_eq!(var(&ctx, "seen"), Val::Int(1));
}

#[test]
fn test_finally_runs_once_on_every_path() {
    let ctx = run(r#"
        let runs = 0;
        try { tR += 'ok' } finally { runs++ }
        try { throw 'x' } catch (e) { } finally { runs++ }
    "#);
    assert_eq!(var(&ctx, "runs"), Val::Int(2));
}

#[test]
fn test_uncaught_throw_still_runs_finally() {
    let services = Services::default();
    let mut ctx = context();
    let result = run_in(&services, &mut ctx, "let runs = 0; try { throw 'bad' } finally { runs++ }");
    assert_eq!(result, Err(ScriptError::Thrown(text("bad"))));
    assert_eq!(var(&ctx, "runs"), Val::Int(1));
}

/* ===================== Functions & Return ===================== */

#[test]
fn test_function_declarations_are_hoisted() {
    let ctx = run("let r = square(4);\nfunction square(n) {\n  return n * n;\n}");
    assert_eq!(var(&ctx, "r"), Val::Int(16));
}

#[test]
fn test_function_parameters_are_scoped() {
    let ctx = run("let a = 'outer';\nfunction f(a) { return a }\nlet r = f(1);\nlet none = f();");
    assert_eq!(var(&ctx, "a"), text("outer"));
    assert_eq!(var(&ctx, "r"), Val::Int(1));
    assert_eq!(var(&ctx, "none"), Val::Undefined);
}

#[test]
fn test_function_without_return_yields_undefined() {
    let ctx = run("function log(x) { tR += x }\nlet r = log('hi');");
    assert_eq!(var(&ctx, "r"), Val::Undefined);
    assert_eq!(var(&ctx, "tR"), text("hi"));
}

#[test]
fn test_return_stops_execution() {
    let services = Services::default();
    let mut ctx = context();
    let result = run_in(&services, &mut ctx, "let x = 1;\nreturn x + 1;\nx = 5;");
    assert_eq!(result, Ok(Control::Return(Some(Val::Int(2)))));
    assert_eq!(var(&ctx, "x"), Val::Int(1));
}

#[test]
fn test_return_inside_loop_leaves_loop() {
    let services = Services::default();
    let mut ctx = context();
    let result = run_in(
        &services,
        &mut ctx,
        "for (const n of [1, 2, 3]) { if (n === 2) { return n } tR += n }",
    );
    assert_eq!(result, Ok(Control::Return(Some(Val::Int(2)))));
    assert_eq!(ctx.accumulated_output(), "1");
}

#[test]
fn test_structural_failures() {
    let services = Services::default();
    let mut ctx = context();
    assert!(matches!(
        run_in(&services, &mut ctx, "if (x) { tR += 1"),
        Err(ScriptError::Parse(_))
    ));
    assert!(matches!(
        run_in(&services, &mut ctx, "let = 5"),
        Err(ScriptError::Parse(_))
    ));
}

#[test]
fn test_nested_containers_in_loops() {
    let ctx = run(r#"
        const grid = [[0, 0], [0, 0]];
        for (let i = 0; i < 2; i++) {
            for (let j = 0; j < 2; j++) {
                grid[i][j] = i * 2 + j;
            }
        }
    "#);
    assert_eq!(
        var(&ctx, "grid"),
        Val::List(vec![list(&[0, 1]), list(&[2, 3])])
    );
}
