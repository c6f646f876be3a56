//! End-to-end rendering tests

use std::sync::Arc;

use chrono::NaiveDate;
use serde_json::json;
use tokio_util::sync::CancellationToken;

use super::helpers::{
    render, render_with, sequential_config, CancelAfter, CountingModules, RecordingTrace,
};
use crate::config::EngineConfig;
use crate::engine::{BuiltinModules, RenderOutcome, TemplateEngine};
use crate::executor::Val;
use crate::host::MapFrontmatter;

/* ===================== Blocks ===================== */

#[tokio::test]
async fn test_plain_text_passes_through() {
    assert_eq!(render("no blocks here\n").await, "no blocks here\n");
    assert_eq!(render("").await, "");
}

#[tokio::test]
async fn test_execution_then_interpolation() {
    assert_eq!(
        render("<%* let a = 2; let b = 3; -%>\n<% a + b %>").await,
        "5"
    );
}

#[tokio::test]
async fn test_accumulator_loop() {
    assert_eq!(
        render("<%* for (let i = 0; i < 3; i++) { tR += i + ',' } %>").await,
        "0,1,2,"
    );
}

#[tokio::test]
async fn test_accumulator_is_per_block() {
    let output = render("<%* tR += 'one' %>|<%* tR += 'two' %>").await;
    assert_eq!(output, "one|two");
}

#[tokio::test]
async fn test_nullish_interpolation_renders_empty() {
    assert_eq!(render("[<% missing %>]").await, "[]");
    assert_eq!(render("[<% null %>][<%  %>]").await, "[][]");
    assert_eq!(render("[<% 0 %>][<% false %>]").await, "[0][false]");
}

#[tokio::test]
async fn test_whitespace_control() {
    assert_eq!(render("line\n<%_ 1 _%>\nnext").await, "line1next");
    assert_eq!(render("a\n<%- 'b' -%>\nc").await, "abc");
}

#[tokio::test]
async fn test_values_render_as_strings() {
    assert_eq!(render("<% [1, 2, 3] %>").await, "1,2,3");
    assert_eq!(render("<% 7 / 2 %>").await, "3.5");
    assert_eq!(render("<% 1 / 0 %>").await, "Infinity");
    assert_eq!(render("<% JSON.stringify({ a: 1 }) %>").await, r#"{"a":1}"#);
}

/* ===================== Errors ===================== */

#[tokio::test]
async fn test_runtime_error_marker() {
    assert_eq!(
        render("<% missing.x %>").await,
        "[Error: Cannot read properties of undefined (reading 'x')]"
    );
}

#[tokio::test]
async fn test_uncaught_throw_marker() {
    assert_eq!(render("<%* throw new Error('stop') %>").await, "[Error: stop]");
}

#[tokio::test]
async fn test_parse_error_marker() {
    let output = render("<%* if (x) { tR += 1 %>").await;
    assert!(output.starts_with("[Parse error: "), "{}", output);
}

#[tokio::test]
async fn test_errors_do_not_stop_the_render() {
    let output = render("<% missing.x %> then <%* let n = 2 %><% n * 2 %>").await;
    assert!(output.ends_with(" then 4"), "{}", output);
}

/* ===================== Return ===================== */

#[tokio::test]
async fn test_return_silences_later_blocks() {
    let engine = TemplateEngine::default();
    let (outcome, ctx) = engine
        .render_with_context(
            "<%* tR += 'a'; return 'done' %>b<% 'c' %><%* tR += 'd' %>",
            engine.new_context(),
            Arc::new(crate::host::NeverCancelled),
        )
        .await;
    assert_eq!(outcome, RenderOutcome::Completed("ab".to_string()));
    assert!(ctx.return_requested());
    assert_eq!(ctx.return_value(), Some(&Val::from("done")));
}

#[tokio::test]
async fn test_return_inside_function_is_not_sticky() {
    let output = render("<%* function f() { return 1 } let v = f() %><% v %>").await;
    assert_eq!(output, "1");
}

/* ===================== Host Services ===================== */

#[tokio::test]
async fn test_frontmatter_values() {
    let engine = TemplateEngine::builder()
        .frontmatter(Arc::new(MapFrontmatter::from_json(&json!({
            "title": "Weekly",
            "tags": ["work", "review"]
        }))))
        .build();
    assert_eq!(
        render_with(&engine, "# <% tp.frontmatter.title %> (<% tp.frontmatter.tags.join(', ') %>)").await,
        "# Weekly (work, review)"
    );
}

#[tokio::test]
async fn test_builtin_modules() {
    let engine = TemplateEngine::builder()
        .modules(Arc::new(
            BuiltinModules::new()
                .with_file("notes/Standup.md")
                .with_today(NaiveDate::from_ymd_opt(2024, 3, 14).unwrap()),
        ))
        .build();
    assert_eq!(
        render_with(&engine, "<% tp.file.title %> <% tp.date.now('YYYY-MM-DD') %>").await,
        "Standup 2024-03-14"
    );
}

#[tokio::test]
async fn test_pure_calls_rerun_in_later_blocks() {
    let modules = Arc::new(CountingModules::default());
    let engine = TemplateEngine::builder()
        .config(sequential_config())
        .modules(modules.clone())
        .build();
    let output = render_with(
        &engine,
        "<% tp.file.title %>|<%* tp.file.move('x') %>|<% tp.file.title %>",
    )
    .await;
    assert_eq!(output, "1||3");
    assert_eq!(modules.calls.load(std::sync::atomic::Ordering::SeqCst), 3);
}

#[tokio::test]
async fn test_custom_accumulator_name() {
    let engine = TemplateEngine::new(EngineConfig {
        accumulator: "out".to_string(),
        ..EngineConfig::default()
    });
    assert_eq!(render_with(&engine, "<%* out += 'x'; out += 'y' %>").await, "xy");
}

#[tokio::test]
async fn test_trace_events() {
    let trace = Arc::new(RecordingTrace::default());
    let engine = TemplateEngine::builder()
        .config(sequential_config())
        .trace(trace.clone())
        .build();
    render_with(&engine, "<%* let a = 1 %><% a %>").await;

    assert_eq!(
        trace.events(),
        vec![
            "start 0 Execution",
            "finish 0 \"\"",
            "start 1 Interpolation",
            "finish 1 \"1\"",
        ]
    );
    let snapshots = trace.snapshots.lock().unwrap();
    assert_eq!(snapshots.len(), 2);
    assert_eq!(snapshots[0].get("a"), Some(&Val::Int(1)));
}

/* ===================== Cancellation ===================== */

#[tokio::test]
async fn test_cancelled_before_start() {
    let token = CancellationToken::new();
    token.cancel();
    let outcome = TemplateEngine::default()
        .render("a <% 1 %> b", Arc::new(token))
        .await;
    assert_eq!(outcome, RenderOutcome::Cancelled);
    assert!(outcome.is_cancelled());
    assert_eq!(outcome.into_output(), None);
}

#[tokio::test]
async fn test_cancelled_inside_loop() {
    let engine = TemplateEngine::new(sequential_config());
    let outcome = engine
        .render(
            "before <%* while (true) { tR += 'x' } %> after",
            Arc::new(CancelAfter::new(10)),
        )
        .await;
    assert!(outcome.is_cancelled());
}

#[tokio::test]
async fn test_cancellation_is_not_caught_by_try() {
    let engine = TemplateEngine::new(sequential_config());
    let outcome = engine
        .render(
            "<%* try { while (true) { tR += 'x' } } catch (e) { tR += 'caught' } %>",
            Arc::new(CancelAfter::new(10)),
        )
        .await;
    assert_eq!(outcome, RenderOutcome::Cancelled);
}

#[test]
fn test_render_from_sync_code() {
    let engine = TemplateEngine::default();
    let outcome = tokio_test::block_on(engine.render_to_end("<% 'sync' %>"));
    assert_eq!(outcome.into_output(), Some("sync".to_string()));
}
