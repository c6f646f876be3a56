use std::sync::Arc;

use crate::parser::statements::{join_statement_list, parse_loop_header};
use crate::parser::{
    parse_binding, Binding, LoopKind, ParseFailure, SourceStatement, Statement, StatementClassifier,
    StatementKind, StatementParser,
};

fn parser() -> StatementParser {
    StatementParser::new(Arc::new(StatementClassifier::default()))
}

fn parse(code: &str) -> Vec<Statement> {
    parser().parse_statements(code).expect("parse failed")
}

fn simple(text: &str, kind: StatementKind) -> Statement {
    Statement::Simple(SourceStatement {
        text: text.to_string(),
        kind,
        line: 0,
    })
}

/* ===================== Simple Statements ===================== */

#[test]
fn test_split_on_semicolons_and_newlines() {
    let statements = parse("let a = 1; a++\ntR += a;");
    assert_eq!(
        statements,
        vec![
            simple("let a = 1", StatementKind::VarDecl),
            simple("a++", StatementKind::Increment),
            simple("tR += a", StatementKind::AccumulatorWrite),
        ]
    );
}

#[test]
fn test_continuation_lines_stay_together() {
    let statements = parse("let s = a +\n  b\nlet t = items\n  .map(x => x)");
    assert_eq!(statements.len(), 2);
    assert_eq!(statements[0], simple("let s = a +\n  b", StatementKind::VarDecl));
}

#[test]
fn test_semicolon_inside_string_does_not_split() {
    let statements = parse("let s = 'a;b'; f(';')");
    assert_eq!(statements.len(), 2);
    assert_eq!(statements[0], simple("let s = 'a;b'", StatementKind::VarDecl));
}

#[test]
fn test_line_numbers_recorded() {
    let statements = parse("a = 1\n\nb = 2");
    match &statements[1] {
        Statement::Simple(s) => assert_eq!(s.line, 3),
        other => panic!("expected simple statement, got {:?}", other),
    }
}

/* ===================== Control Flow ===================== */

#[test]
fn test_if_else_chain() {
    let statements = parse("if (a) { x = 1 } else if (b) { x = 2 } else if (c) x = 3; else { x = 4 }");
    assert_eq!(statements.len(), 1);
    let Statement::If(block) = &statements[0] else {
        panic!("expected if, got {:?}", statements[0]);
    };
    assert_eq!(block.condition, "a");
    assert_eq!(block.body, vec![simple("x = 1", StatementKind::Assignment)]);
    assert_eq!(block.else_ifs.len(), 2);
    assert_eq!(block.else_ifs[0].0, "b");
    assert_eq!(block.else_ifs[1].0, "c");
    assert_eq!(block.else_ifs[1].1, vec![simple("x = 3", StatementKind::Assignment)]);
    assert_eq!(block.else_body, Some(vec![simple("x = 4", StatementKind::Assignment)]));
}

#[test]
fn test_if_condition_with_nested_parens_and_strings() {
    let statements = parse("if (f(a) && s === ')') { g() }");
    let Statement::If(block) = &statements[0] else {
        panic!("expected if");
    };
    assert_eq!(block.condition, "f(a) && s === ')'");
}

#[test]
fn test_counted_for_loop() {
    let statements = parse("for (let i = 0; i < 3; i++) { tR += i }");
    let Statement::Loop(block) = &statements[0] else {
        panic!("expected loop");
    };
    assert_eq!(
        block.kind,
        LoopKind::Counted {
            init: Some("let i = 0".to_string()),
            test: Some("i < 3".to_string()),
            update: Some("i++".to_string()),
        }
    );
    assert_eq!(block.body, vec![simple("tR += i", StatementKind::AccumulatorWrite)]);
}

#[test]
fn test_for_of_and_for_in_headers() {
    assert_eq!(
        parse_loop_header("const item of items").unwrap(),
        LoopKind::ForOf {
            binding: Binding::Name("item".to_string()),
            iterable: "items".to_string(),
        }
    );
    assert_eq!(
        parse_loop_header("let [k, v] of Object.entries(o)").unwrap(),
        LoopKind::ForOf {
            binding: Binding::Array(vec!["k".to_string(), "v".to_string()]),
            iterable: "Object.entries(o)".to_string(),
        }
    );
    assert_eq!(
        parse_loop_header("key in obj").unwrap(),
        LoopKind::ForIn {
            binding: Binding::Name("key".to_string()),
            object: "obj".to_string(),
        }
    );
    assert_eq!(
        parse_loop_header(";;").unwrap(),
        LoopKind::Counted {
            init: None,
            test: None,
            update: None,
        }
    );
    assert!(parse_loop_header("x to y").is_err());
    assert!(parse_loop_header("a; b").is_err());
}

#[test]
fn test_while_with_single_statement_body() {
    let statements = parse("while (n > 0) n--");
    let Statement::Loop(block) = &statements[0] else {
        panic!("expected loop");
    };
    assert_eq!(block.kind, LoopKind::While { test: "n > 0".to_string() });
    assert_eq!(block.body, vec![simple("n--", StatementKind::Decrement)]);
}

#[test]
fn test_try_catch_finally() {
    let statements = parse("try { risky() } catch (e) { tR += e } finally { done = true }");
    let Statement::Try(block) = &statements[0] else {
        panic!("expected try");
    };
    assert_eq!(block.body, vec![simple("risky()", StatementKind::Call)]);
    assert_eq!(block.catch_var.as_deref(), Some("e"));
    assert!(block.catch_body.is_some());
    assert_eq!(
        block.finally_body,
        Some(vec![simple("done = true", StatementKind::Assignment)])
    );
}

#[test]
fn test_try_without_catch_binding() {
    let statements = parse("try { a() } catch { b() }");
    let Statement::Try(block) = &statements[0] else {
        panic!("expected try");
    };
    assert_eq!(block.catch_var, None);
    assert!(block.finally_body.is_none());
}

#[test]
fn test_function_declaration() {
    let statements = parse("function add(a, b) { return a + b }\ntR += add(1, 2)");
    assert_eq!(statements.len(), 2);
    let Statement::Function(decl) = &statements[0] else {
        panic!("expected function");
    };
    assert_eq!(decl.name, "add");
    assert_eq!(decl.params, vec!["a".to_string(), "b".to_string()]);
    assert_eq!(decl.body, vec![simple("return a + b", StatementKind::ReturnValue)]);
}

#[test]
fn test_nested_constructs() {
    let statements =
        parse("for (const x of xs) { if (x > 1) { for (;;) { break } } else { continue } }");
    let Statement::Loop(outer) = &statements[0] else {
        panic!("expected loop");
    };
    let Statement::If(inner) = &outer.body[0] else {
        panic!("expected if");
    };
    assert!(matches!(inner.body[0], Statement::Loop(_)));
    assert_eq!(
        inner.else_body,
        Some(vec![simple("continue", StatementKind::Continue)])
    );
}

#[test]
fn test_bare_block_flattens() {
    let statements = parse("{ a = 1; { b = 2 } }");
    assert_eq!(
        statements,
        vec![
            simple("a = 1", StatementKind::Assignment),
            simple("b = 2", StatementKind::Assignment),
        ]
    );
}

/* ===================== Failures ===================== */

#[test]
fn test_structural_failures() {
    let p = parser();
    assert!(matches!(
        p.parse_statements("if (a { b }"),
        Err(ParseFailure::UnmatchedBracket { .. })
    ));
    assert!(matches!(
        p.parse_statements("if a { b }"),
        Err(ParseFailure::MissingCondition { construct: "if" })
    ));
    assert!(matches!(
        p.parse_statements("while (x)"),
        Err(ParseFailure::MissingBody { construct: "while" })
    ));
    assert!(matches!(p.parse_statements("try { a }"), Err(ParseFailure::MissingHandler)));
    assert!(matches!(
        p.parse_statements("else { a }"),
        Err(ParseFailure::Dangling { keyword: "else", .. })
    ));
    assert!(matches!(
        p.parse_statements("a = 1 }"),
        Err(ParseFailure::UnexpectedToken { .. })
    ));
}

#[test]
fn test_nesting_limit() {
    let p = parser().with_max_depth(3);
    assert!(p.parse_statements("if (a) { if (b) { c() } }").is_ok());
    let deep = "if (a) { if (b) { if (c) { if (d) { e() } } } }";
    assert!(matches!(
        p.parse_statements(deep),
        Err(ParseFailure::TooDeep { limit: 3 })
    ));
}

/* ===================== Bindings & Lists ===================== */

#[test]
fn test_parse_binding_forms() {
    let (binding, rest) = parse_binding("x = 1").unwrap();
    assert_eq!(binding, Binding::Name("x".to_string()));
    assert_eq!(rest, "= 1");

    let (binding, _) = parse_binding("{ a, b: c } = o").unwrap();
    assert_eq!(
        binding,
        Binding::Object(vec![
            ("a".to_string(), "a".to_string()),
            ("b".to_string(), "c".to_string()),
        ])
    );
    assert_eq!(binding.names(), vec!["a".to_string(), "c".to_string()]);

    assert!(parse_binding("[a, 1] = o").is_err());
    assert!(parse_binding("1x").is_err());
}

#[test]
fn test_statement_list_rejoins_split_headers() {
    let entries = ["for (let i = 0", "i < 2", "i++) {", "tR += i", "}"];
    assert_eq!(
        join_statement_list(&entries),
        "for (let i = 0; i < 2; i++) {\ntR += i\n}"
    );
    let statements = parser().parse_statement_list(&entries).unwrap();
    assert_eq!(statements.len(), 1);
    assert!(matches!(statements[0], Statement::Loop(_)));
}

#[test]
fn test_statement_list_matches_source_text() {
    let cases: [(&[&str], &str); 3] = [
        (
            &[
                "if (a > 1) {",
                "tR += 'big'",
                "} else if (a > 0) {",
                "tR += 'small'",
                "} else {",
                "tR += 'none'",
                "}",
            ],
            "if (a > 1) { tR += 'big' } else if (a > 0) { tR += 'small' } else { tR += 'none' }",
        ),
        (
            &[
                "try {",
                "risky()",
                "} catch (e) {",
                "tR += e",
                "} finally {",
                "done = true",
                "}",
            ],
            "try { risky() } catch (e) { tR += e } finally { done = true }",
        ),
        (
            &["function wrap(x) {", "if (x) {", "tR += `}${x}`", "}", "}"],
            "function wrap(x) { if (x) { tR += `}${x}` } }",
        ),
    ];
    let parser = parser();
    for (entries, text) in cases {
        let from_list = parser.parse_statement_list(entries).unwrap();
        let from_text = parser.parse_statements(text).unwrap();
        assert_eq!(from_list.len(), 1, "{}", text);
        assert_eq!(from_list, from_text, "{}", text);
    }
}
