//! Tests for name resolution, modules, frontmatter, call depth and
//! cancellation

use std::sync::{Arc, Mutex};

use serde_json::json;
use tokio_util::sync::CancellationToken;

use super::helpers::{context, eval, run_in, text, var};
use crate::config::{EngineConfig, EvaluatorMode};
use crate::executor::statements::execute_source;
use crate::executor::types::{FunctionBody, UserFunction};
use crate::executor::{Interpreter, ScriptError, Services, Val};
use crate::host::{MapFrontmatter, ModuleExecutor};

/// Records every module call and echoes `module.function(args)`
#[derive(Default)]
struct RecordingModules {
    calls: Mutex<Vec<String>>,
}

impl RecordingModules {
    fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

impl ModuleExecutor for RecordingModules {
    fn execute_module_function(
        &self,
        module: &str,
        function: &str,
        args: &[Val],
    ) -> Result<Val, ScriptError> {
        let args: Vec<String> = args.iter().map(Val::to_display_string).collect();
        let call = format!("{}.{}({})", module, function, args.join(","));
        self.calls.lock().unwrap().push(call.clone());
        Ok(Val::Str(call))
    }
}

fn services_with_modules() -> (Services, Arc<RecordingModules>) {
    let modules = Arc::new(RecordingModules::default());
    let services = Services::default().with_modules(modules.clone());
    (services, modules)
}

/* ===================== Modules ===================== */

#[test]
fn test_module_calls_route_to_executor() {
    let (services, modules) = services_with_modules();
    let mut ctx = context();
    run_in(
        &services,
        &mut ctx,
        "let greeting = tp.user.greet('Ada', 2); let title = tp.file.title;",
    )
    .unwrap();

    assert_eq!(var(&ctx, "greeting"), text("user.greet(Ada,2)"));
    assert_eq!(var(&ctx, "title"), text("file.title()"));
    assert_eq!(modules.calls(), vec!["user.greet(Ada,2)", "file.title()"]);
}

#[test]
fn test_pure_calls_are_cached_per_iteration() {
    let (services, modules) = services_with_modules();
    let mut ctx = context();
    run_in(
        &services,
        &mut ctx,
        "for (let i = 0; i < 3; i++) { let a = tp.date.now('YYYY'); let b = tp.date.now('YYYY'); }",
    )
    .unwrap();
    assert_eq!(modules.calls().len(), 3);
}

#[test]
fn test_pure_calls_outside_loops_are_not_cached() {
    let (services, modules) = services_with_modules();
    let mut ctx = context();
    run_in(
        &services,
        &mut ctx,
        "let a = tp.date.now('YYYY'); let b = tp.date.now('YYYY');",
    )
    .unwrap();
    assert_eq!(modules.calls().len(), 2);
}

#[test]
fn test_loop_cache_ends_with_the_loop() {
    let (services, modules) = services_with_modules();
    let mut ctx = context();
    run_in(
        &services,
        &mut ctx,
        "for (let i = 0; i < 2; i++) { let a = tp.file.title; } let after = tp.file.title;",
    )
    .unwrap();
    assert_eq!(modules.calls().len(), 3);
}

#[test]
fn test_impure_calls_are_never_cached() {
    let (services, modules) = services_with_modules();
    let mut ctx = context();
    run_in(
        &services,
        &mut ctx,
        "for (let i = 0; i < 2; i++) { tp.system.prompt('a'); tp.system.prompt('a'); }",
    )
    .unwrap();
    assert_eq!(modules.calls().len(), 4);
}

#[test]
fn test_unknown_module_function_without_executor() {
    let err = eval("tp.system.prompt('name')").unwrap_err();
    assert_eq!(err.message(), "Unknown module function: system.prompt");
}

/* ===================== Frontmatter ===================== */

#[test]
fn test_frontmatter_access() {
    let frontmatter = MapFrontmatter::from_json(&json!({
        "title": "Weekly",
        "tags": ["a", "b"],
        "meta": { "owner": "ops" }
    }));
    let services = Services::default().with_frontmatter(Arc::new(frontmatter));
    let mut ctx = context();
    run_in(
        &services,
        &mut ctx,
        r#"
        let title = tp.frontmatter.title;
        let count = tp.frontmatter.tags.length;
        let owner = tp.frontmatter['meta'].owner;
        let missing = tp.frontmatter.nothing;
        let fm = tp.frontmatter;
        "#,
    )
    .unwrap();

    assert_eq!(var(&ctx, "title"), text("Weekly"));
    assert_eq!(var(&ctx, "count"), Val::Int(2));
    assert_eq!(var(&ctx, "owner"), text("ops"));
    assert_eq!(var(&ctx, "missing"), Val::Undefined);
    match var(&ctx, "fm") {
        Val::Obj(map) => assert_eq!(map.get("title"), Some(&text("Weekly"))),
        other => panic!("expected frontmatter object, got {:?}", other),
    }
}

/* ===================== Name Resolution ===================== */

#[test]
fn test_function_references() {
    let services = Services::default();
    let mut ctx = context();
    run_in(
        &services,
        &mut ctx,
        "let f = parseInt; let n = f('7');\nfunction twice(x) { return x * 2 }\nlet g = twice; let m = g(4);",
    )
    .unwrap();
    assert_eq!(var(&ctx, "n"), Val::Int(7));
    assert_eq!(var(&ctx, "m"), Val::Int(8));
}

#[test]
fn test_host_defined_function() {
    let services = Services::default();
    let mut ctx = context();
    let body: FunctionBody = Arc::new(
        |_interp: &mut Interpreter<'_>, args: Vec<Val>| -> Result<Val, ScriptError> {
            let total: f64 = args.iter().map(Val::to_number).sum();
            Ok(Val::Num(total))
        },
    );
    ctx.define_function(UserFunction {
        name: "sum".to_string(),
        params: Vec::new(),
        body,
    });
    run_in(&services, &mut ctx, "let total = sum(1, 2, 3.5)").unwrap();
    assert_eq!(var(&ctx, "total"), Val::Num(6.5));
}

#[test]
fn test_calling_non_function_fails() {
    let services = Services::default();
    let mut ctx = context();
    let err = run_in(&services, &mut ctx, "let n = 1; n();").unwrap_err();
    assert_eq!(err.message(), "n is not a function (number)");
}

#[test]
fn test_variables_shadow_namespaces() {
    let services = Services::default();
    let mut ctx = context();
    run_in(&services, &mut ctx, "let Math = { max: 1 }; let m = Math.max;").unwrap();
    assert_eq!(var(&ctx, "m"), Val::Int(1));
}

/* ===================== Limits ===================== */

#[test]
fn test_call_depth_is_bounded() {
    let services = Services::new(EngineConfig {
        max_call_depth: 8,
        ..EngineConfig::default()
    });
    let mut ctx = context();
    let err = run_in(
        &services,
        &mut ctx,
        "function down(n) { return down(n + 1) }\ndown(0);",
    )
    .unwrap_err();
    assert!(err.message().contains("Maximum call stack size exceeded in 'down'"));
}

#[test]
fn test_cancellation_stops_loops_and_is_not_caught() {
    let services = Services::default();
    let token = CancellationToken::new();
    token.cancel();

    let mut ctx = context();
    let result = {
        let mut interp = Interpreter::new(&mut ctx, &services, &token);
        execute_source(
            &mut interp,
            "let caught = false; try { while (true) { tR += 'x' } } catch (e) { caught = true }",
        )
    };
    assert_eq!(result, Err(ScriptError::Cancelled));
    assert_eq!(var(&ctx, "caught"), Val::Bool(false));
}

/* ===================== Evaluator Selection ===================== */

#[test]
fn test_bytecode_evaluator_with_fallback() {
    let services = Services::new(EngineConfig {
        evaluator: EvaluatorMode::Bytecode,
        ..EngineConfig::default()
    });
    let mut ctx = context();
    run_in(
        &services,
        &mut ctx,
        "let a = 2 + 3 * 4; let b = a / 4; let c = [a, b].length; let d = `${a}!`;",
    )
    .unwrap();
    assert_eq!(var(&ctx, "a"), Val::Int(14));
    assert_eq!(var(&ctx, "b"), Val::Num(3.5));
    assert_eq!(var(&ctx, "c"), Val::Int(2));
    assert_eq!(var(&ctx, "d"), text("14!"));
    assert!(services.expressions.len() >= 4);
    assert_eq!(services.expressions.mode(), EvaluatorMode::Bytecode);
}
