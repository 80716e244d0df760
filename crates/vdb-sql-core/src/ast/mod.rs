//! Abstract syntax tree for SQL statements and expressions.
//!
//! The AST is the single shared IR: the parser builds it, the renderer
//! walks it via `Display`, and the engine evaluates it. Nodes are
//! immutable after construction.

mod expression;
mod statement;
mod types;

use core::fmt;

pub use expression::{
    BinaryOp, Expr, FunctionCall, Literal, NiladicFunction, OverClause, Quantifier, UnaryOp,
};
pub use statement::{
    ColumnSpec, CompoundOp, CompoundSelect, CreateIndexStatement, CreateTableStatement, Cte,
    DeleteStatement, DropIndexStatement, DropTableStatement, InsertStatement, JoinClause, JoinType,
    OrderBy, OrderDirection, SelectColumn, SelectStatement, Statement, TableRef, UpdateAssignment,
    UpdateStatement, WithClause,
};
pub use types::DataType;

use crate::lexer::Keyword;

/// Writes an identifier, double-quoting it when it is not a bare
/// identifier or collides with a keyword.
pub(crate) fn write_ident(f: &mut fmt::Formatter<'_>, name: &str) -> fmt::Result {
    let bare = !name.is_empty()
        && name
            .chars()
            .next()
            .is_some_and(|c| c.is_alphabetic() || c == '_')
        && name.chars().all(|c| c.is_alphanumeric() || c == '_')
        && Keyword::from_str(name).is_none();
    if bare {
        f.write_str(name)
    } else {
        write!(f, "\"{}\"", name.replace('"', "\"\""))
    }
}
