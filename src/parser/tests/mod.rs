//! Parser test suite
//!
//! Organized by stage:
//! - `scanner_tests`: bracket matching and top-level searches
//! - `classify_tests`: statement kinds and the classifier cache
//! - `statement_tests`: control-flow extraction
//! - `expr_tests`: expression AST shapes

mod statement_tests;
