//! Rows, column metadata, and source row identifiers.

use core::fmt;

use vdb_sql_core::ast::DataType;

use crate::error::{EngineError, Result};
use crate::value::Value;

/// An opaque identifier minted by a mutable table source, letting UPDATE
/// and DELETE target the physical row. Unique per live row in its source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RowId(pub u64);

/// The index kind of a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IndexKind {
    /// No index.
    #[default]
    None,
    /// Plain (non-unique) index.
    Index,
    /// Unique index.
    Unique,
    /// Primary key.
    Primary,
}

impl IndexKind {
    /// Returns true for unique and primary indexes (usable for equality
    /// probes that yield at most one row).
    #[must_use]
    pub const fn is_unique(&self) -> bool {
        matches!(self, Self::Unique | Self::Primary)
    }
}

/// A column definition in a table schema.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnDef {
    /// Column name.
    pub name: String,
    /// Logical type.
    pub ty: DataType,
    /// Index kind.
    pub index: IndexKind,
}

impl ColumnDef {
    /// Creates an unindexed column.
    #[must_use]
    pub fn new(name: impl Into<String>, ty: DataType) -> Self {
        Self {
            name: name.into(),
            ty,
            index: IndexKind::None,
        }
    }

    /// Marks the column as the primary key.
    #[must_use]
    pub fn primary_key(mut self) -> Self {
        self.index = IndexKind::Primary;
        self
    }

    /// Marks the column as unique.
    #[must_use]
    pub fn unique(mut self) -> Self {
        self.index = IndexKind::Unique;
        self
    }
}

/// The name of a row cell: the column name plus the table binding it came
/// from, when the row was produced under a join or aliased source.
#[derive(Debug, Clone, PartialEq)]
pub struct CellName {
    /// The table name or alias qualifying this cell, if any.
    pub table: Option<String>,
    /// The column name.
    pub name: String,
}

impl CellName {
    /// Creates an unqualified cell name.
    #[must_use]
    pub fn bare(name: impl Into<String>) -> Self {
        Self {
            table: None,
            name: name.into(),
        }
    }

    /// Creates a qualified cell name.
    #[must_use]
    pub fn qualified(table: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            table: Some(table.into()),
            name: name.into(),
        }
    }

    /// The display form: `table.col` when qualified, `col` otherwise.
    #[must_use]
    pub fn display(&self) -> String {
        match &self.table {
            Some(t) => format!("{t}.{}", self.name),
            None => self.name.clone(),
        }
    }
}

impl fmt::Display for CellName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(t) = &self.table {
            write!(f, "{t}.")?;
        }
        f.write_str(&self.name)
    }
}

/// An ordered, column-named record.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Row {
    names: Vec<CellName>,
    values: Vec<Value>,
}

impl Row {
    /// Creates a row from parallel name/value vectors.
    ///
    /// # Panics
    ///
    /// Panics if the vectors differ in length.
    #[must_use]
    pub fn new(names: Vec<CellName>, values: Vec<Value>) -> Self {
        assert_eq!(names.len(), values.len(), "row names/values length mismatch");
        Self { names, values }
    }

    /// Creates a row from bare column names and values.
    #[must_use]
    pub fn from_pairs(pairs: Vec<(String, Value)>) -> Self {
        let (names, values) = pairs
            .into_iter()
            .map(|(name, value)| (CellName::bare(name), value))
            .unzip();
        Self { names, values }
    }

    /// Convenience constructor from `(&str, Value)` pairs.
    #[must_use]
    pub fn of<V: Into<Value>>(pairs: Vec<(&str, V)>) -> Self {
        Self::from_pairs(
            pairs
                .into_iter()
                .map(|(name, value)| (String::from(name), value.into()))
                .collect(),
        )
    }

    /// Number of cells.
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Returns true when the row has no cells.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// The cell names, in order.
    #[must_use]
    pub fn names(&self) -> &[CellName] {
        &self.names
    }

    /// The cell values, in order.
    #[must_use]
    pub fn values(&self) -> &[Value] {
        &self.values
    }

    /// Consumes the row, returning its values.
    #[must_use]
    pub fn into_values(self) -> Vec<Value> {
        self.values
    }

    /// The value at an index.
    #[must_use]
    pub fn value_at(&self, index: usize) -> Option<&Value> {
        self.values.get(index)
    }

    /// Looks up a cell by optionally-qualified name, case-insensitively.
    /// Returns `Ok(None)` when the name is absent, so scope stacks can
    /// keep searching outward.
    ///
    /// # Errors
    ///
    /// Returns a [`EngineError::Resolution`] error when an unqualified
    /// name matches more than one cell with differing values.
    pub fn find(&self, table: Option<&str>, name: &str) -> Result<Option<&Value>> {
        // An unqualified name written as `t.c` still resolves: split once.
        if table.is_none() {
            if let Some((t, c)) = name.split_once('.') {
                return self.find(Some(t), c);
            }
        }

        let mut found: Option<usize> = None;
        for (i, cell) in self.names.iter().enumerate() {
            if !cell.name.eq_ignore_ascii_case(name) {
                continue;
            }
            match table {
                Some(t) => {
                    if cell
                        .table
                        .as_deref()
                        .is_some_and(|ct| ct.eq_ignore_ascii_case(t))
                    {
                        found = Some(i);
                        break;
                    }
                }
                None => {
                    if let Some(prev) = found {
                        // Duplicate unqualified matches carrying the same
                        // value are harmless (e.g. a join's key columns).
                        if self.values[prev] != self.values[i] {
                            return Err(EngineError::Resolution(format!(
                                "ambiguous column reference: {name}"
                            )));
                        }
                    } else {
                        found = Some(i);
                    }
                }
            }
        }

        Ok(found.map(|i| &self.values[i]))
    }

    /// Looks up a cell, failing when it is absent.
    ///
    /// # Errors
    ///
    /// Returns a [`EngineError::Resolution`] error when the name is
    /// unknown or ambiguous.
    pub fn lookup(&self, table: Option<&str>, name: &str) -> Result<&Value> {
        self.find(table, name)?.ok_or_else(|| {
            let display = match table {
                Some(t) => format!("{t}.{name}"),
                None => String::from(name),
            };
            EngineError::Resolution(format!("unknown column: {display}"))
        })
    }

    /// Looks up a cell, returning `None` instead of an error when absent.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.lookup(None, name).ok()
    }

    /// Appends a cell.
    pub fn push(&mut self, name: CellName, value: Value) {
        self.names.push(name);
        self.values.push(value);
    }

    /// Concatenates two rows (used when joining).
    #[must_use]
    pub fn concat(mut self, other: Self) -> Self {
        self.names.extend(other.names);
        self.values.extend(other.values);
        self
    }

    /// Re-qualifies every cell with the given table binding.
    #[must_use]
    pub fn qualified(mut self, table: &str) -> Self {
        for name in &mut self.names {
            name.table = Some(String::from(table));
        }
        self
    }

    /// Strips the table qualifier from every cell.
    #[must_use]
    pub fn unqualified(mut self) -> Self {
        for name in &mut self.names {
            name.table = None;
        }
        self
    }
}

/// Conversion from a result row into a typed value, for entity-shaped
/// query results.
pub trait FromRow: Sized {
    /// Builds the value from a row.
    ///
    /// # Errors
    ///
    /// Returns an error when the row lacks an expected column or a value
    /// has the wrong type.
    fn from_row(row: &Row) -> Result<Self>;
}

/// A scanned row together with its source row id (mutable sources only).
#[derive(Debug, Clone)]
pub struct SourceRow {
    /// The source row id, present for mutable sources.
    pub id: Option<RowId>,
    /// The row values.
    pub row: Row,
}

impl SourceRow {
    /// Creates a source row without an id.
    #[must_use]
    pub const fn anonymous(row: Row) -> Self {
        Self { id: None, row }
    }

    /// Creates a source row with an id.
    #[must_use]
    pub const fn identified(id: RowId, row: Row) -> Self {
        Self { id: Some(id), row }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_bare() {
        let row = Row::of(vec![("id", 1i64), ("age", 30i64)]);
        assert_eq!(row.lookup(None, "age").unwrap(), &Value::Integer(30));
        assert_eq!(row.lookup(None, "AGE").unwrap(), &Value::Integer(30));
    }

    #[test]
    fn test_lookup_qualified() {
        let row = Row::new(
            vec![
                CellName::qualified("u", "id"),
                CellName::qualified("o", "id"),
            ],
            vec![Value::Integer(1), Value::Integer(2)],
        );
        assert_eq!(row.lookup(Some("u"), "id").unwrap(), &Value::Integer(1));
        assert_eq!(row.lookup(Some("o"), "id").unwrap(), &Value::Integer(2));
    }

    #[test]
    fn test_ambiguous_lookup_fails() {
        let row = Row::new(
            vec![
                CellName::qualified("u", "id"),
                CellName::qualified("o", "id"),
            ],
            vec![Value::Integer(1), Value::Integer(2)],
        );
        assert!(matches!(
            row.lookup(None, "id"),
            Err(EngineError::Resolution(_))
        ));
    }

    #[test]
    fn test_equal_duplicates_are_not_ambiguous() {
        let row = Row::new(
            vec![
                CellName::qualified("u", "id"),
                CellName::qualified("o", "id"),
            ],
            vec![Value::Integer(7), Value::Integer(7)],
        );
        assert_eq!(row.lookup(None, "id").unwrap(), &Value::Integer(7));
    }

    #[test]
    fn test_missing_column() {
        let row = Row::of(vec![("id", 1i64)]);
        assert!(matches!(
            row.lookup(None, "nope"),
            Err(EngineError::Resolution(_))
        ));
    }
}
