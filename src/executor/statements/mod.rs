//! Statement execution
//!
//! Walks the statement tree produced by [`crate::parser::StatementParser`].
//! Simple statements dispatch on their [`StatementKind`]; compound ones go to
//! the loop, conditional, try and function executors. Non-local exits travel
//! up as [`Control`] values; faults travel as `Err`.

pub mod assignment;
pub mod conditional;
pub mod function;
pub mod loops;
pub mod try_catch;

use super::errors::ScriptError;
use super::interp::Interpreter;
use super::types::Val;
use crate::parser::{ParseFailure, SourceStatement, Statement, StatementKind};

/* ===================== Control Flow ===================== */

/// How a statement list finished
#[derive(Debug, Clone, PartialEq)]
pub enum Control {
    /// Ran to the end
    None,
    Break,
    Continue,
    /// `return`, with its value if one was given
    Return(Option<Val>),
}

/* ===================== Execution ===================== */

/// Parse and run a code fragment (arrow block bodies).
pub fn execute_source(interp: &mut Interpreter<'_>, source: &str) -> Result<Control, ScriptError> {
    let statements = interp.services.parser.parse_statements(source)?;
    execute_statements(interp, &statements)
}

/// Run statements in order, stopping at the first non-local exit.
///
/// Function declarations are registered before anything runs, so a function
/// can be called above its declaration.
pub fn execute_statements(
    interp: &mut Interpreter<'_>,
    statements: &[Statement],
) -> Result<Control, ScriptError> {
    for statement in statements {
        if let Statement::Function(decl) = statement {
            function::declare(interp, decl);
        }
    }

    for statement in statements {
        let control = execute_statement(interp, statement)?;
        if control != Control::None {
            return Ok(control);
        }
    }
    Ok(Control::None)
}

pub fn execute_statement(
    interp: &mut Interpreter<'_>,
    statement: &Statement,
) -> Result<Control, ScriptError> {
    match statement {
        Statement::Simple(simple) => execute_simple(interp, simple),
        Statement::Loop(block) => loops::execute_loop(interp, block),
        Statement::If(block) => conditional::execute_if(interp, block),
        Statement::Try(block) => try_catch::execute_try(interp, block),
        // hoisted
        Statement::Function(_) => Ok(Control::None),
    }
}

fn execute_simple(
    interp: &mut Interpreter<'_>,
    statement: &SourceStatement,
) -> Result<Control, ScriptError> {
    interp
        .services
        .trace
        .line(interp.block, statement.line, &statement.text);

    let body = statement.text.trim().trim_end_matches(';').trim_end();
    let after_keyword = |keyword: &str| body[keyword.len()..].trim();

    match statement.kind {
        StatementKind::Empty | StatementKind::BraceOnly => Ok(Control::None),

        StatementKind::ReturnVoid => Ok(Control::Return(None)),
        StatementKind::ReturnValue => {
            let value = interp.evaluate(after_keyword("return"))?;
            Ok(Control::Return(Some(value)))
        }
        StatementKind::Break => Ok(Control::Break),
        StatementKind::Continue => Ok(Control::Continue),
        StatementKind::Throw => {
            let value = interp.evaluate(after_keyword("throw"))?;
            Err(ScriptError::Thrown(value))
        }

        // A header the parser could not attach a body to
        StatementKind::ForHeader => Err(missing_body("for")),
        StatementKind::WhileHeader => Err(missing_body("while")),
        StatementKind::IfHeader => Err(missing_body("if")),
        StatementKind::TryHeader => Err(missing_body("try")),
        StatementKind::FunctionDecl => Err(missing_body("function")),

        StatementKind::VarDecl => assignment::execute_declaration(interp, body),
        StatementKind::AccumulatorWrite
        | StatementKind::CompoundAssign
        | StatementKind::Assignment
        | StatementKind::ArrayElementAssign => assignment::execute_assignment(interp, body),
        StatementKind::Increment => assignment::execute_update(interp, body, 1),
        StatementKind::Decrement => assignment::execute_update(interp, body, -1),

        StatementKind::Call | StatementKind::Other => {
            interp.evaluate(body)?;
            Ok(Control::None)
        }
    }
}

fn missing_body(construct: &'static str) -> ScriptError {
    ScriptError::Parse(ParseFailure::MissingBody { construct })
}
