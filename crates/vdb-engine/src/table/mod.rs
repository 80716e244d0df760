//! Table sources.
//!
//! Every source implements the [`Table`] contract: a schema, a scan
//! producing a finite lazy row stream (optionally prefixed by ordering
//! hints the stream guarantees), and optional mutation operations.
//! Sources without mutation support are read-only; DML against them fails
//! with a read-only error.

mod array;
mod csv_table;
mod generator;
mod memory;
mod query;

pub use array::ArrayTable;
pub use csv_table::CsvTable;
pub use generator::{GeneratorTable, RowFactory};
pub use memory::MemoryTable;
pub use query::QueryTable;

use vdb_sql_core::ast::{Expr, OrderDirection};

use crate::error::{EngineError, Result};
use crate::row::{ColumnDef, Row, RowId, SourceRow};
use crate::value::Value;

/// A sort key the scan guarantees for the rows it emits.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderHint {
    /// The ordered column.
    pub column: String,
    /// The direction.
    pub direction: OrderDirection,
}

impl OrderHint {
    /// Creates an ascending hint.
    #[must_use]
    pub fn asc(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            direction: OrderDirection::Asc,
        }
    }

    /// Creates a descending hint.
    #[must_use]
    pub fn desc(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            direction: OrderDirection::Desc,
        }
    }
}

/// A lazy stream of source rows, prefixed by the ordering its emitter
/// guarantees (possibly none).
pub struct Scan {
    /// The leading sort keys of the emitted rows.
    pub order: Vec<OrderHint>,
    /// The row stream.
    pub rows: Box<dyn Iterator<Item = Result<SourceRow>>>,
}

impl Scan {
    /// Creates a scan with no ordering guarantee.
    #[must_use]
    pub fn unordered(rows: Box<dyn Iterator<Item = Result<SourceRow>>>) -> Self {
        Self {
            order: vec![],
            rows,
        }
    }

    /// Creates a scan guaranteeing the given leading sort keys.
    #[must_use]
    pub fn ordered(order: Vec<OrderHint>, rows: Box<dyn Iterator<Item = Result<SourceRow>>>) -> Self {
        Self { order, rows }
    }
}

/// A change to one column of one row.
pub type ChangeSet = Vec<(String, Value)>;

/// The uniform contract for anything queryable as a table.
///
/// Rows are value-copied on scan: external mutation of a source never
/// reaches rows already emitted.
pub trait Table {
    /// The ordered column definitions.
    fn schema(&self) -> &[ColumnDef];

    /// Starts a scan. `filter_hint` is the residual WHERE predicate; a
    /// source may use it to reduce the rows it emits but is never required
    /// to apply it (the executor re-checks).
    ///
    /// # Errors
    ///
    /// Returns an error when the underlying source cannot be read.
    fn scan(&self, filter_hint: Option<&Expr>) -> Result<Scan>;

    /// Point lookup by an indexed column, when this source supports it for
    /// `column`. Used by the executor for equality join probes.
    fn index_lookup(&self, _column: &str, _value: &Value) -> Option<Result<Vec<SourceRow>>> {
        None
    }

    /// Inserts a row given as a column/value change set; unmentioned
    /// columns become NULL. Returns the row id (declared primary key value
    /// when supplied, otherwise the minted id).
    ///
    /// # Errors
    ///
    /// Read-only sources fail with [`EngineError::ReadOnlyTable`].
    fn insert(&mut self, _row: ChangeSet) -> Result<i64> {
        Err(EngineError::ReadOnlyTable(String::from("<read-only>")))
    }

    /// Applies per-row change sets. Returns the number of affected rows.
    ///
    /// # Errors
    ///
    /// Read-only sources fail with [`EngineError::ReadOnlyTable`].
    fn update(&mut self, _updates: Vec<(RowId, ChangeSet)>) -> Result<usize> {
        Err(EngineError::ReadOnlyTable(String::from("<read-only>")))
    }

    /// Deletes the identified rows. Returns the number of deleted rows.
    ///
    /// # Errors
    ///
    /// Read-only sources fail with [`EngineError::ReadOnlyTable`].
    fn delete(&mut self, _ids: &[RowId]) -> Result<usize> {
        Err(EngineError::ReadOnlyTable(String::from("<read-only>")))
    }
}

/// Builds a row following the schema column order from a change set;
/// columns not mentioned become NULL. Unknown columns are rejected.
pub(crate) fn row_from_changes(schema: &[ColumnDef], changes: &ChangeSet) -> Result<Row> {
    for (name, _) in changes {
        if !schema.iter().any(|c| c.name.eq_ignore_ascii_case(name)) {
            return Err(EngineError::Resolution(format!("unknown column: {name}")));
        }
    }
    let pairs = schema
        .iter()
        .map(|col| {
            let value = changes
                .iter()
                .find(|(name, _)| name.eq_ignore_ascii_case(&col.name))
                .map_or(Value::Null, |(_, value)| value.clone());
            (col.name.clone(), value)
        })
        .collect();
    Ok(Row::from_pairs(pairs))
}
