//! Error types for the engine.

use vdb_sql_core::ParseError;

/// Errors surfaced by query parsing, planning, and execution.
///
/// Division and modulus by zero are not errors: they evaluate to NULL,
/// matching the SQLite convention.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// The SQL text could not be parsed.
    #[error("syntax error: {0}")]
    Syntax(#[from] ParseError),

    /// An unknown table or column name, or an ambiguous column reference.
    #[error("cannot resolve name: {0}")]
    Resolution(String),

    /// A builder operation referenced a column outside its available set.
    #[error("column not available: {0}")]
    ColumnNotAvailable(String),

    /// Invalid operand types for an operator with no NULL fallback.
    #[error("type error: {0}")]
    Type(String),

    /// The query exceeded the configured wall-clock ceiling.
    #[error("query timed out")]
    Timeout,

    /// DML was attempted on a table without mutation support.
    #[error("table '{0}' is read-only")]
    ReadOnlyTable(String),

    /// A CTE was attached under a name that is already taken.
    #[error("CTE '{0}' is already defined")]
    CteConflict(String),

    /// An operation combined queries from different databases.
    #[error("queries belong to different databases")]
    CrossBackend,

    /// A scalar subquery produced the wrong shape.
    #[error("scalar subquery returned {rows} row(s) and {cols} column(s)")]
    ScalarSubqueryShape {
        /// Number of rows produced.
        rows: usize,
        /// Number of columns produced.
        cols: usize,
    },

    /// Any other runtime failure (duplicate row ids, recursion ceiling,
    /// missing columns in `matches`, I/O from table sources).
    #[error("{0}")]
    Runtime(String),
}

impl EngineError {
    /// Shorthand for a [`EngineError::Runtime`] with a formatted message.
    #[must_use]
    pub fn runtime(message: impl Into<String>) -> Self {
        Self::Runtime(message.into())
    }
}

impl From<std::io::Error> for EngineError {
    fn from(err: std::io::Error) -> Self {
        Self::Runtime(format!("io error: {err}"))
    }
}

impl From<csv::Error> for EngineError {
    fn from(err: csv::Error) -> Self {
        Self::Runtime(format!("csv error: {err}"))
    }
}

/// Result type for engine operations.
pub type Result<T> = std::result::Result<T, EngineError>;
