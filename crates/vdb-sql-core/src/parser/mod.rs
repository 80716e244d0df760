//! SQL parser.
//!
//! Recursive descent for statements and precedence climbing (Pratt
//! binding powers) for expressions.

mod error;
mod parser;
mod pratt;

pub use error::ParseError;
pub use parser::Parser;

use crate::ast::{SelectStatement, Statement};

/// Parses a single statement from SQL text.
///
/// # Errors
///
/// Returns a `ParseError` if the input is not a valid SQL statement.
pub fn parse_statement(sql: &str) -> Result<Statement, ParseError> {
    Parser::new(sql).parse()
}

/// Parses SQL text that must be a SELECT statement.
///
/// # Errors
///
/// Returns a `ParseError` if the input is not a valid SELECT statement.
pub fn parse_select(sql: &str) -> Result<SelectStatement, ParseError> {
    match Parser::new(sql).parse()? {
        Statement::Select(select) => Ok(select),
        other => Err(ParseError::new(
            format!("expected a SELECT statement, got: {other}"),
            crate::lexer::Span::default(),
        )),
    }
}
