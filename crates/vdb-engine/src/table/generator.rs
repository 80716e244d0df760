//! Generator-backed table source.

use std::rc::Rc;

use vdb_sql_core::ast::Expr;

use super::{OrderHint, Scan, Table};
use crate::error::Result;
use crate::row::{ColumnDef, Row, SourceRow};

/// The factory producing a fresh row iterator per scan.
pub type RowFactory = Rc<dyn Fn() -> Box<dyn Iterator<Item = Result<Row>>>>;

/// A read-only table wrapping a user-supplied lazy sequence factory.
///
/// Each scan re-invokes the factory, so the sequence restarts per query.
pub struct GeneratorTable {
    schema: Vec<ColumnDef>,
    factory: RowFactory,
    order: Vec<OrderHint>,
}

impl GeneratorTable {
    /// Creates a generator table.
    #[must_use]
    pub fn new(schema: Vec<ColumnDef>, factory: RowFactory) -> Self {
        Self {
            schema,
            factory,
            order: vec![],
        }
    }

    /// Creates a generator table from a plain closure.
    #[must_use]
    pub fn from_fn<F>(schema: Vec<ColumnDef>, factory: F) -> Self
    where
        F: Fn() -> Box<dyn Iterator<Item = Result<Row>>> + 'static,
    {
        Self::new(schema, Rc::new(factory))
    }

    /// Declares the leading sort keys every generated run satisfies.
    #[must_use]
    pub fn with_order(mut self, order: Vec<OrderHint>) -> Self {
        self.order = order;
        self
    }
}

impl Table for GeneratorTable {
    fn schema(&self) -> &[ColumnDef] {
        &self.schema
    }

    fn scan(&self, _filter_hint: Option<&Expr>) -> Result<Scan> {
        let rows = (self.factory)();
        Ok(Scan::ordered(
            self.order.clone(),
            Box::new(rows.map(|row| row.map(SourceRow::anonymous))),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Value;
    use vdb_sql_core::ast::DataType;

    fn counter(upto: i64) -> GeneratorTable {
        GeneratorTable::from_fn(vec![ColumnDef::new("n", DataType::Integer)], move || {
            Box::new((1..=upto).map(|n| Ok(Row::of(vec![("n", n)]))))
        })
    }

    #[test]
    fn test_each_scan_restarts() {
        let t = counter(3);
        for _ in 0..2 {
            let rows: Vec<_> = t
                .scan(None)
                .unwrap()
                .rows
                .collect::<Result<Vec<_>>>()
                .unwrap();
            assert_eq!(rows.len(), 3);
            assert_eq!(rows[0].row.get("n"), Some(&Value::Integer(1)));
        }
    }
}
