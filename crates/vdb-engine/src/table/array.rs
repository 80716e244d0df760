//! Read-only wrapper around a precomputed row vector.

use vdb_sql_core::ast::Expr;

use super::{OrderHint, Scan, Table};
use crate::error::Result;
use crate::row::{ColumnDef, Row, SourceRow};

/// A read-only table over a fixed vector of rows.
pub struct ArrayTable {
    schema: Vec<ColumnDef>,
    rows: Vec<Row>,
    order: Vec<OrderHint>,
}

impl ArrayTable {
    /// Creates a table from a schema and rows.
    #[must_use]
    pub fn new(schema: Vec<ColumnDef>, rows: Vec<Row>) -> Self {
        Self {
            schema,
            rows,
            order: vec![],
        }
    }

    /// Declares the leading sort keys the stored rows already satisfy.
    #[must_use]
    pub fn with_order(mut self, order: Vec<OrderHint>) -> Self {
        self.order = order;
        self
    }
}

impl Table for ArrayTable {
    fn schema(&self) -> &[ColumnDef] {
        &self.schema
    }

    fn scan(&self, _filter_hint: Option<&Expr>) -> Result<Scan> {
        let rows: Vec<Result<SourceRow>> = self
            .rows
            .iter()
            .map(|row| Ok(SourceRow::anonymous(row.clone())))
            .collect();
        Ok(Scan::ordered(self.order.clone(), Box::new(rows.into_iter())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Value;
    use vdb_sql_core::ast::DataType;

    #[test]
    fn test_scan_preserves_order_hints() {
        let t = ArrayTable::new(
            vec![ColumnDef::new("n", DataType::Integer)],
            vec![
                Row::of(vec![("n", 1i64)]),
                Row::of(vec![("n", 2i64)]),
            ],
        )
        .with_order(vec![OrderHint::asc("n")]);

        let scan = t.scan(None).unwrap();
        assert_eq!(scan.order.len(), 1);
        let rows: Vec<_> = scan.rows.collect::<Result<Vec<_>>>().unwrap();
        assert_eq!(rows[1].row.get("n"), Some(&Value::Integer(2)));
        assert!(rows[0].id.is_none());
    }
}
