//! Expression evaluation.
//!
//! An expression evaluates against a stack of row scopes (innermost
//! last, so correlated subqueries resolve outer references), the query's
//! parameter bindings, and the database's function registry.

pub(crate) mod aggregate;
pub(crate) mod functions;

pub use aggregate::{AggregateFinalFn, AggregateRegistry, AggregateStepFn, UserAggregate};

use std::collections::HashMap;

use vdb_sql_core::ast::{BinaryOp, Expr, Literal, NiladicFunction, Quantifier, UnaryOp};

use crate::error::{EngineError, Result};
use crate::exec::Executor;
use crate::row::Row;
use crate::value::{Truth, Value};

/// The stack of row environments, outermost first.
pub(crate) type Scopes<'a> = [&'a Row];

/// Evaluates expression nodes against a row-binding environment.
pub(crate) struct Evaluator<'a> {
    /// The executor, for subquery evaluation and parameter resolution.
    pub exec: &'a Executor<'a>,
    /// Row scopes, innermost last.
    pub scopes: &'a Scopes<'a>,
    /// Precomputed aggregate values for the current group, keyed by the
    /// rendered aggregate call.
    pub aggregates: Option<&'a HashMap<String, Value>>,
    /// Precomputed window-function values for the current row, keyed by
    /// the rendered window call.
    pub windows: Option<&'a HashMap<String, Value>>,
    /// True while evaluating select-list expressions, which enables the
    /// dialect's `NULL = NULL` quirk for literal NULL operands.
    pub select_list: bool,
}

impl<'a> Evaluator<'a> {
    /// Creates an evaluator with no aggregate or window context.
    pub(crate) fn new(exec: &'a Executor<'a>, scopes: &'a Scopes<'a>) -> Self {
        Self {
            exec,
            scopes,
            aggregates: None,
            windows: None,
            select_list: false,
        }
    }

    /// Evaluates an expression to a value.
    pub(crate) fn eval(&self, expr: &Expr) -> Result<Value> {
        match expr {
            Expr::Literal(lit) => Ok(literal_value(lit)),
            Expr::Column { table, name, .. } => self.resolve_column(table.as_deref(), name),
            Expr::Parameter { name, position } => {
                self.exec.params().resolve(name.as_deref(), *position)
            }
            Expr::Unary { op, operand } => self.eval_unary(*op, operand),
            Expr::Binary { left, op, right } => self.eval_binary(left, *op, right),
            Expr::Function(call) => self.eval_function(expr, call),
            Expr::Niladic(n) => Ok(match n {
                NiladicFunction::CurrentDate => functions::current_date(),
                NiladicFunction::CurrentTime => functions::current_time(),
                NiladicFunction::CurrentTimestamp => functions::current_timestamp(),
            }),
            Expr::WindowFunction { .. } => {
                let key = expr.to_string();
                self.windows
                    .and_then(|w| w.get(&key))
                    .cloned()
                    .ok_or_else(|| {
                        EngineError::runtime(format!(
                            "window function not allowed here: {key}"
                        ))
                    })
            }
            Expr::Case {
                operand,
                when_clauses,
                else_clause,
            } => self.eval_case(operand.as_deref(), when_clauses, else_clause.as_deref()),
            Expr::Between {
                expr,
                low,
                high,
                negated,
            } => {
                let value = self.eval(expr)?;
                let low = self.eval(low)?;
                let high = self.eval(high)?;
                let truth = compare(BinaryOp::GtEq, &value, &low)
                    .and(compare(BinaryOp::LtEq, &value, &high));
                Ok(negate_if(*negated, truth).into_value())
            }
            Expr::InList {
                expr,
                list,
                negated,
            } => {
                let truth = self.eval_in_list(expr, list)?;
                Ok(negate_if(*negated, truth).into_value())
            }
            Expr::InSubquery {
                expr,
                subquery,
                negated,
            } => {
                let truth = self.eval_in_subquery(expr, subquery)?;
                Ok(negate_if(*negated, truth).into_value())
            }
            Expr::Like {
                expr,
                pattern,
                negated,
            } => {
                let value = self.eval(expr)?;
                let pattern = self.eval(pattern)?;
                let truth = match (value.to_text(), pattern.to_text()) {
                    (Some(v), Some(p)) => Truth::from_bool(functions::like_match(&v, &p)),
                    _ => Truth::Unknown,
                };
                Ok(negate_if(*negated, truth).into_value())
            }
            Expr::IsNull { expr, negated } => {
                let value = self.eval(expr)?;
                Ok(Value::Boolean(value.is_null() != *negated))
            }
            Expr::Exists(subquery) => {
                let result = self.exec.run_select(subquery, self.scopes)?;
                Ok(Value::Boolean(!result.rows.is_empty()))
            }
            Expr::Subquery(subquery) => self.eval_scalar_subquery(subquery),
            Expr::Quantified {
                left,
                op,
                quantifier,
                subquery,
            } => self.eval_quantified(left, *op, *quantifier, subquery),
            Expr::Paren(inner) => self.eval(inner),
            Expr::Wildcard { .. } => Err(EngineError::runtime(
                "misplaced * outside a select list or COUNT(*)",
            )),
        }
    }

    /// Evaluates an expression as a predicate.
    pub(crate) fn truth(&self, expr: &Expr) -> Result<Truth> {
        Ok(self.eval(expr)?.truth())
    }

    fn resolve_column(&self, table: Option<&str>, name: &str) -> Result<Value> {
        // Innermost scope first; outer scopes shadow nothing.
        for row in self.scopes.iter().rev() {
            if let Some(value) = row.find(table, name)? {
                return Ok(value.clone());
            }
        }
        let display = match table {
            Some(t) => format!("{t}.{name}"),
            None => String::from(name),
        };
        Err(EngineError::Resolution(format!("unknown column: {display}")))
    }

    fn eval_unary(&self, op: UnaryOp, operand: &Expr) -> Result<Value> {
        let value = self.eval(operand)?;
        Ok(match op {
            UnaryOp::Neg => value.neg(),
            UnaryOp::Pos => value,
            UnaryOp::Not => value.truth().not().into_value(),
        })
    }

    fn eval_binary(&self, left: &Expr, op: BinaryOp, right: &Expr) -> Result<Value> {
        // Dialect quirk: a literal NULL compares equal to a literal NULL
        // in select-list context only.
        if self.select_list
            && op == BinaryOp::Eq
            && matches!(left, Expr::Literal(Literal::Null))
            && matches!(right, Expr::Literal(Literal::Null))
        {
            return Ok(Value::Boolean(true));
        }

        let lhs = self.eval(left)?;
        let rhs = self.eval(right)?;

        Ok(match op {
            BinaryOp::And => lhs.truth().and(rhs.truth()).into_value(),
            BinaryOp::Or => lhs.truth().or(rhs.truth()).into_value(),
            BinaryOp::Add => lhs.add(&rhs),
            BinaryOp::Sub => lhs.sub(&rhs),
            BinaryOp::Mul => lhs.mul(&rhs),
            BinaryOp::Div => lhs.div(&rhs),
            BinaryOp::Mod => lhs.rem(&rhs),
            BinaryOp::Pow => lhs.pow(&rhs),
            BinaryOp::Concat => lhs.concat(&rhs),
            BinaryOp::Eq
            | BinaryOp::NotEq
            | BinaryOp::Lt
            | BinaryOp::LtEq
            | BinaryOp::Gt
            | BinaryOp::GtEq => compare(op, &lhs, &rhs).into_value(),
        })
    }

    fn eval_function(&self, expr: &Expr, call: &vdb_sql_core::ast::FunctionCall) -> Result<Value> {
        if self.exec.aggregates_registry().is_aggregate(&call.name) {
            let key = expr.to_string();
            return self
                .aggregates
                .and_then(|a| a.get(&key))
                .cloned()
                .ok_or_else(|| {
                    EngineError::runtime(format!("aggregate not allowed here: {key}"))
                });
        }

        let args = call
            .args
            .iter()
            .map(|arg| self.eval(arg))
            .collect::<Result<Vec<_>>>()?;
        functions::call_scalar(&call.name, &args)
    }

    fn eval_case(
        &self,
        operand: Option<&Expr>,
        when_clauses: &[(Expr, Expr)],
        else_clause: Option<&Expr>,
    ) -> Result<Value> {
        // Lazy, left to right: only the matching THEN arm is evaluated.
        match operand {
            Some(operand) => {
                let subject = self.eval(operand)?;
                for (when, then) in when_clauses {
                    let candidate = self.eval(when)?;
                    if subject.sql_eq(&candidate).is_true() {
                        return self.eval(then);
                    }
                }
            }
            None => {
                for (when, then) in when_clauses {
                    if self.truth(when)?.is_true() {
                        return self.eval(then);
                    }
                }
            }
        }
        else_clause.map_or(Ok(Value::Null), |e| self.eval(e))
    }

    fn eval_in_list(&self, expr: &Expr, list: &[Expr]) -> Result<Truth> {
        if list.is_empty() {
            return Ok(Truth::False);
        }
        let value = self.eval(expr)?;
        if value.is_null() {
            return Ok(Truth::Unknown);
        }
        let mut result = Truth::False;
        for candidate in list {
            let candidate = self.eval(candidate)?;
            result = result.or(value.sql_eq(&candidate));
            if result.is_true() {
                break;
            }
        }
        Ok(result)
    }

    fn eval_in_subquery(
        &self,
        expr: &Expr,
        subquery: &vdb_sql_core::ast::SelectStatement,
    ) -> Result<Truth> {
        let result = self.exec.run_select(subquery, self.scopes)?;
        if result.rows.is_empty() {
            return Ok(Truth::False);
        }
        let value = self.eval(expr)?;
        if value.is_null() {
            return Ok(Truth::Unknown);
        }
        let mut truth = Truth::False;
        for row in &result.rows {
            let candidate = row.value_at(0).unwrap_or(&Value::Null);
            truth = truth.or(value.sql_eq(candidate));
            if truth.is_true() {
                break;
            }
        }
        Ok(truth)
    }

    fn eval_scalar_subquery(
        &self,
        subquery: &vdb_sql_core::ast::SelectStatement,
    ) -> Result<Value> {
        let result = self.exec.run_select(subquery, self.scopes)?;
        let cols = result.columns.len();
        if result.rows.len() > 1 || cols != 1 {
            return Err(EngineError::ScalarSubqueryShape {
                rows: result.rows.len(),
                cols,
            });
        }
        Ok(result
            .rows
            .first()
            .and_then(|row| row.value_at(0))
            .cloned()
            .unwrap_or(Value::Null))
    }

    fn eval_quantified(
        &self,
        left: &Expr,
        op: BinaryOp,
        quantifier: Quantifier,
        subquery: &vdb_sql_core::ast::SelectStatement,
    ) -> Result<Value> {
        let value = self.eval(left)?;
        let result = self.exec.run_select(subquery, self.scopes)?;

        let mut truth = match quantifier {
            Quantifier::All => Truth::True,
            Quantifier::Any => Truth::False,
        };
        for row in &result.rows {
            let candidate = row.value_at(0).unwrap_or(&Value::Null);
            let one = compare(op, &value, candidate);
            truth = match quantifier {
                Quantifier::All => truth.and(one),
                Quantifier::Any => truth.or(one),
            };
        }
        Ok(truth.into_value())
    }
}

/// Converts an AST literal to a value.
pub(crate) fn literal_value(lit: &Literal) -> Value {
    match lit {
        Literal::Integer(i) => Value::Integer(*i),
        Literal::Float(f) => Value::Float(*f),
        Literal::String(s) => Value::Text(s.clone()),
        Literal::Boolean(b) => Value::Boolean(*b),
        Literal::Null => Value::Null,
    }
}

/// Three-valued comparison for the six comparison operators.
pub(crate) fn compare(op: BinaryOp, lhs: &Value, rhs: &Value) -> Truth {
    let Some(ordering) = lhs.sql_cmp(rhs) else {
        return Truth::Unknown;
    };
    let holds = match op {
        BinaryOp::Eq => ordering == core::cmp::Ordering::Equal,
        BinaryOp::NotEq => ordering != core::cmp::Ordering::Equal,
        BinaryOp::Lt => ordering == core::cmp::Ordering::Less,
        BinaryOp::LtEq => ordering != core::cmp::Ordering::Greater,
        BinaryOp::Gt => ordering == core::cmp::Ordering::Greater,
        BinaryOp::GtEq => ordering != core::cmp::Ordering::Less,
        _ => return Truth::Unknown,
    };
    Truth::from_bool(holds)
}

const fn negate_if(negated: bool, truth: Truth) -> Truth {
    if negated {
        truth.not()
    } else {
        truth
    }
}
