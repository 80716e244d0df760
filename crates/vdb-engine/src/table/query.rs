//! A table source backed by a query builder from any backend.

use vdb_sql_core::ast::{BinaryOp, DataType, Expr};

use super::{Scan, Table};
use crate::error::Result;
use crate::query::{Cond, PartialQuery};
use crate::row::{ColumnDef, SourceRow};

/// Adapts a [`PartialQuery`] as a read-only table. Each scan re-runs the
/// query; simple conjunctive filter hints on columns the wrapped query
/// knows are pushed down into the builder.
pub struct QueryTable {
    query: PartialQuery,
    schema: Vec<ColumnDef>,
}

impl QueryTable {
    /// Wraps a query, deriving the schema from its projection when it is
    /// known (types default to TEXT).
    #[must_use]
    pub fn new(query: PartialQuery) -> Self {
        let schema = query
            .output_columns()
            .map(|columns| {
                columns
                    .into_iter()
                    .map(|name| ColumnDef::new(name, DataType::Text))
                    .collect()
            })
            .unwrap_or_default();
        Self { query, schema }
    }

    /// Wraps a query with an explicit schema.
    #[must_use]
    pub fn with_schema(query: PartialQuery, schema: Vec<ColumnDef>) -> Self {
        Self { query, schema }
    }

    /// Pushes the pushable conjuncts of a filter hint into the wrapped
    /// builder. Conjuncts that do not translate are simply skipped; the
    /// executor re-applies the full predicate anyway.
    fn pushdown(&self, filter: &Expr) -> PartialQuery {
        let mut query = self.query.clone();
        let mut conjuncts = vec![];
        split_conjuncts(filter, &mut conjuncts);
        for conjunct in conjuncts {
            if let Some(cond) = translate(conjunct) {
                if let Ok(narrowed) = query.filter(cond) {
                    query = narrowed;
                }
            }
        }
        query
    }
}

impl Table for QueryTable {
    fn schema(&self) -> &[ColumnDef] {
        &self.schema
    }

    fn scan(&self, filter_hint: Option<&Expr>) -> Result<Scan> {
        let query = match filter_hint {
            Some(filter) => self.pushdown(filter),
            None => self.query.clone(),
        };
        let rows = query.to_array()?;
        Ok(Scan::unordered(Box::new(
            rows.into_iter().map(|row| Ok(SourceRow::anonymous(row))),
        )))
    }
}

/// Splits an AND tree into its conjuncts.
fn split_conjuncts<'e>(expr: &'e Expr, out: &mut Vec<&'e Expr>) {
    match expr {
        Expr::Binary {
            left,
            op: BinaryOp::And,
            right,
        } => {
            split_conjuncts(left, out);
            split_conjuncts(right, out);
        }
        Expr::Paren(inner) => split_conjuncts(inner, out),
        other => out.push(other),
    }
}

/// Translates a simple `column op literal` conjunct into a builder
/// predicate. Qualified references use the bare column name, since the
/// wrapped query knows nothing about the outer binding.
fn translate(expr: &Expr) -> Option<Cond> {
    let Expr::Binary { left, op, right } = expr else {
        return None;
    };
    if !op.is_comparison() {
        return None;
    }

    // `lit op column` flips the operator when normalized to
    // `column op' lit`.
    let (column, literal, op) = match (&**left, &**right) {
        (Expr::Column { name, .. }, Expr::Literal(lit)) => (name, lit, *op),
        (Expr::Literal(lit), Expr::Column { name, .. }) => {
            let flipped = match op {
                BinaryOp::Eq => BinaryOp::Eq,
                BinaryOp::Lt => BinaryOp::Gt,
                BinaryOp::LtEq => BinaryOp::GtEq,
                BinaryOp::Gt => BinaryOp::Lt,
                BinaryOp::GtEq => BinaryOp::LtEq,
                _ => return None,
            };
            (name, lit, flipped)
        }
        _ => return None,
    };
    let value = crate::eval::literal_value(literal);

    Some(match op {
        BinaryOp::Eq => Cond::eq(column, value),
        BinaryOp::Lt => Cond::lt(column, value),
        BinaryOp::LtEq => Cond::lte(column, value),
        BinaryOp::Gt => Cond::gt(column, value),
        BinaryOp::GtEq => Cond::gte(column, value),
        _ => return None,
    })
}
