//! Predicate fragments for the query builder.

use vdb_sql_core::ast::{BinaryOp, Expr};
use vdb_sql_core::Parser;

use super::bind_parameters_expr;
use crate::error::Result;
use crate::params::Params;
use crate::value::Value;

/// A single predicate, composable with [`crate::PartialQuery::filter`]
/// and [`crate::PartialQuery::or_where`].
#[derive(Debug, Clone)]
pub struct Cond(Expr);

impl Cond {
    /// `column = value`
    #[must_use]
    pub fn eq(column: &str, value: impl Into<Value>) -> Self {
        Self::comparison(column, BinaryOp::Eq, value)
    }

    /// `column < value`
    #[must_use]
    pub fn lt(column: &str, value: impl Into<Value>) -> Self {
        Self::comparison(column, BinaryOp::Lt, value)
    }

    /// `column <= value`
    #[must_use]
    pub fn lte(column: &str, value: impl Into<Value>) -> Self {
        Self::comparison(column, BinaryOp::LtEq, value)
    }

    /// `column > value`
    #[must_use]
    pub fn gt(column: &str, value: impl Into<Value>) -> Self {
        Self::comparison(column, BinaryOp::Gt, value)
    }

    /// `column >= value`
    #[must_use]
    pub fn gte(column: &str, value: impl Into<Value>) -> Self {
        Self::comparison(column, BinaryOp::GtEq, value)
    }

    /// `column LIKE pattern`
    #[must_use]
    pub fn like(column: &str, pattern: &str) -> Self {
        Self(Expr::column(column).like(Expr::string(pattern)))
    }

    /// `column IS NULL`
    #[must_use]
    pub fn is_null(column: &str) -> Self {
        Self(Expr::IsNull {
            expr: Box::new(Expr::column(column)),
            negated: false,
        })
    }

    /// `column IN (values…)`; the empty list becomes the always-false
    /// `1 = 0`.
    #[must_use]
    pub fn in_list<V: Into<Value>>(column: &str, values: Vec<V>) -> Self {
        if values.is_empty() {
            return Self(Expr::integer(1).eq(Expr::integer(0)));
        }
        let list = values
            .into_iter()
            .map(|v| value_expr(v.into()))
            .collect();
        Self(Expr::column(column).in_list(list))
    }

    /// A raw SQL predicate fragment; its placeholders are bound from
    /// `params` immediately.
    ///
    /// # Errors
    ///
    /// Fails when the fragment is not a valid expression.
    pub fn raw(fragment: &str, params: Params) -> Result<Self> {
        let mut expr = Parser::new(fragment).parse_expression_fragment()?;
        bind_parameters_expr(&mut expr, &params);
        Ok(Self(expr))
    }

    pub(crate) fn from_expr(expr: Expr) -> Self {
        Self(expr)
    }

    pub(crate) fn into_expr(self) -> Expr {
        self.0
    }

    fn comparison(column: &str, op: BinaryOp, value: impl Into<Value>) -> Self {
        Self(Expr::column(column).binary(op, value_expr(value.into())))
    }
}

fn value_expr(value: Value) -> Expr {
    Expr::Literal(super::value_to_literal(&value))
}
