//! Tests for per-block read/write/barrier analysis

use super::helpers::{analyze, analyze_all, names};
use crate::scheduler::{BlockAnalysis, DependencyAnalyzer, FunctionRegistry};
use crate::template::parse_template;

/* ===================== Reads & Writes ===================== */

#[test]
fn test_declaration_reads_and_writes() {
    let analysis = analyze("let total = a + b");
    assert_eq!(analysis.writes, names(&["total"]));
    assert_eq!(analysis.reads, names(&["a", "b"]));
    assert!(!analysis.barrier);
}

#[test]
fn test_compound_assignment_and_update() {
    let analysis = analyze("x += 1; count++; --left");
    assert_eq!(analysis.writes, names(&["count", "left", "x"]));
    assert_eq!(analysis.reads, names(&["count", "left", "x"]));
}

#[test]
fn test_string_contents_are_ignored() {
    let analysis = analyze("let s = 'a + b' + \"c\"");
    assert_eq!(analysis.reads, names(&[]));
    assert_eq!(analysis.writes, names(&["s"]));
}

#[test]
fn test_template_literal_interpolations_are_read() {
    let analysis = analyze("`Hello ${name}, you are ${age + 1}`");
    assert_eq!(analysis.reads, names(&["age", "name"]));
}

#[test]
fn test_destructuring_declarations() {
    let analysis = analyze("const { a, b: c } = obj; let [first, second] = pair");
    assert_eq!(analysis.writes, names(&["a", "c", "first", "second"]));
    assert_eq!(analysis.reads, names(&["obj", "pair"]));
}

#[test]
fn test_swap_writes_both_names() {
    let analysis = analyze("[a, b] = [b, a]");
    assert_eq!(analysis.writes, names(&["a", "b"]));
}

#[test]
fn test_object_keys_are_not_reads() {
    let analysis = analyze("const o = { title: t, 'quoted': q }");
    assert_eq!(analysis.reads, names(&["q", "t"]));
    assert!(!analysis.reads.contains("title"));
}

#[test]
fn test_member_writes_write_the_root() {
    let analysis = analyze("config.theme.dark = enabled");
    assert!(analysis.writes.contains("config"));
    assert!(analysis.reads.contains("enabled"));
    assert!(!analysis.writes.contains("theme"));
}

#[test]
fn test_mutating_methods_write_receiver() {
    let analysis = analyze("items.push(4)");
    assert!(analysis.writes.contains("items"));
    assert!(analysis.reads.contains("items"));

    let analysis = analyze("let n = items.length; items.slice(1)");
    assert!(!analysis.writes.contains("items"));
    assert!(analysis.reads.contains("items"));
}

#[test]
fn test_control_flow_keywords_are_not_variables() {
    let analysis = analyze("if (ready) { done = true } else { done = false }");
    assert_eq!(analysis.reads, names(&["ready"]));
    assert_eq!(analysis.writes, names(&["done"]));
}

/* ===================== Accumulator ===================== */

#[test]
fn test_accumulator_tracking() {
    let analysis = analyze("tR += name");
    assert!(analysis.writes_accumulator);
    assert!(!analysis.reads_accumulator);
    assert_eq!(analysis.reads, names(&["name"]));
    assert!(!analysis.writes.contains("tR"));

    let analysis = analyze("let copy = tR");
    assert!(analysis.reads_accumulator);
    assert!(!analysis.writes_accumulator);
}

#[test]
fn test_custom_accumulator_name() {
    let registry = FunctionRegistry::default();
    let analysis = DependencyAnalyzer::new(&registry, "out").analyze_code(0, "out += tR");
    assert!(analysis.writes_accumulator);
    assert!(analysis.reads.contains("tR"));
}

/* ===================== Calls & Barriers ===================== */

#[test]
fn test_outside_effects_are_barriers() {
    assert!(analyze("let name = tp.system.prompt('Name')").barrier);
    assert!(analyze("tp.file.move('/archive')").barrier);
    assert!(analyze("tp.user.my_script()").barrier);
    assert!(analyze("tp.web.daily_quote()").barrier);
}

#[test]
fn test_pure_module_calls_are_not_barriers() {
    assert!(!analyze("let today = tp.date.now('YYYY-MM-DD')").barrier);
    assert!(!analyze("let t = tp.file.title").barrier);
    assert!(!analyze("let owner = tp.frontmatter.owner").barrier);
}

#[test]
fn test_unregistered_module_access_is_a_barrier() {
    assert!(analyze("tp.custom.thing()").barrier);
}

#[test]
fn test_unknown_plain_calls_are_barriers() {
    assert!(analyze("helper(1)").barrier);
    assert!(!analyze("parseInt(s)").barrier);
    assert!(!analyze("let m = Math.max(a, 1)").barrier);

    let local = analyze("function helper(n) { return n * 2 }\nlet r = helper(1)");
    assert!(!local.barrier);
    assert!(local.writes.contains("r"));
}

#[test]
fn test_untokenizable_block_is_opaque() {
    let analysis = analyze("let s = 'unterminated");
    assert_eq!(analysis, BlockAnalysis::opaque(0));
}

/* ===================== Dependencies ===================== */

#[test]
fn test_depends_on() {
    let blocks = analyze_all(&["let x = 1", "let y = x", "x = 2", "let z = 3"]);
    // read after write
    assert!(blocks[1].depends_on(&blocks[0]));
    // write after read is caught from the other side
    assert!(!blocks[2].depends_on(&blocks[1]));
    assert!(blocks[1].depends_on(&blocks[2]));
    assert!(blocks[2].related(&blocks[1]));
    // write after write
    assert!(blocks[2].depends_on(&blocks[0]));
    assert!(!blocks[3].related(&blocks[0]));
}

#[test]
fn test_accumulator_and_barrier_dependencies() {
    let blocks = analyze_all(&["tR += 'a'", "tR += 'b'", "let v = 1", "tp.system.prompt()"]);
    assert!(blocks[1].depends_on(&blocks[0]));
    assert!(!blocks[2].related(&blocks[0]));
    assert!(blocks[2].depends_on(&blocks[3]));
    assert!(blocks[3].related(&blocks[2]));
}

#[test]
fn test_analyze_template_keeps_block_indices() {
    let parsed = parse_template("<%* let a = 1 %> text <% a %>");
    let registry = FunctionRegistry::default();
    let analyses = DependencyAnalyzer::new(&registry, "tR").analyze_template(&parsed.blocks);
    assert_eq!(analyses.len(), 2);
    assert_eq!(analyses[1].index, 1);
    assert!(analyses[1].depends_on(&analyses[0]));
}
