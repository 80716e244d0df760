//! The composable, immutable query builder.
//!
//! A `PartialQuery` wraps SQL text and parameters from one database.
//! Every operation returns a new builder; the original is never touched.
//! The source text is kept verbatim until the first structural operation
//! parses it (the fast path), after which rendering walks the AST.
//!
//! A `(limit, offset)` window rides on top of the AST: `limit` only ever
//! narrows, `offset` only ever accumulates, and any operation that cannot
//! be merged into the current clause set first wraps the query in a
//! subquery barrier `SELECT * FROM (…) AS _q`.

mod cond;

pub use cond::Cond;

use std::cell::OnceCell;
use std::collections::BTreeSet;
use std::rc::Rc;

use tracing::debug;
use vdb_sql_core::ast::{
    Cte, Expr, Literal, OrderBy, OrderDirection, SelectColumn, SelectStatement, TableRef,
};
use vdb_sql_core::parse_select;

use crate::error::{EngineError, Result};
use crate::exec::{Executor, QueryRows};
use crate::params::Params;
use crate::row::Row;
use crate::value::{Truth, Value};
use crate::vdb::Vdb;

/// The alias given to barrier subqueries.
const BARRIER_ALIAS: &str = "_q";

/// The remaining selectable window over the current result.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct Window {
    limit: Option<u64>,
    offset: u64,
}

impl Window {
    fn is_trivial(self) -> bool {
        self.limit.is_none() && self.offset == 0
    }
}

/// The parsed state behind a builder once any structural operation has
/// been applied.
#[derive(Clone)]
struct Built {
    /// The AST with LIMIT/OFFSET lifted out into `window`.
    ast: SelectStatement,
    window: Window,
    /// Exactly the selectable column names (lowercase), or `None` when
    /// unknown (e.g. a `SELECT *` source).
    available: Option<Rc<BTreeSet<String>>>,
    /// Attached CTEs, rendered at the outermost level.
    ctes: Vec<(String, PartialQuery)>,
}

/// A result-shaping callback applied to each produced row.
pub type Hydrator = Rc<dyn Fn(Row) -> Row>;

/// An immutable, chainable query builder bound to one database.
#[derive(Clone)]
pub struct PartialQuery {
    db: Vdb,
    sql: Rc<String>,
    params: Rc<Params>,
    built: OnceCell<Built>,
    /// True once a structural operation has been applied; disables the
    /// verbatim fast path.
    structural: bool,
    hydrator: Option<Hydrator>,
}

impl PartialQuery {
    pub(crate) fn new(db: Vdb, sql: impl Into<String>, params: Params) -> Self {
        Self {
            db,
            sql: Rc::new(sql.into()),
            params: Rc::new(params),
            built: OnceCell::new(),
            structural: false,
            hydrator: None,
        }
    }

    /// The database this builder belongs to.
    #[must_use]
    pub fn database(&self) -> &Vdb {
        &self.db
    }

    fn ensure_same_backend(&self, other: &Self) -> Result<()> {
        if self.db.backend_id() == other.db.backend_id() {
            Ok(())
        } else {
            Err(EngineError::CrossBackend)
        }
    }

    // ---- parsing ---------------------------------------------------------

    fn get_built(&self) -> Result<Built> {
        if let Some(built) = self.built.get() {
            return Ok(built.clone());
        }
        let built = self.parse_built()?;
        let _ = self.built.set(built.clone());
        Ok(built)
    }

    fn parse_built(&self) -> Result<Built> {
        let mut ast = parse_select(&self.sql)?;

        // Lift literal LIMIT/OFFSET into the window so the narrowing
        // algebra applies to them. Non-literal bounds cannot be narrowed,
        // so the query is wrapped in a barrier instead.
        let limit_lit = match &ast.limit {
            None => Some(None),
            Some(e) => as_count_literal(e).map(Some),
        };
        let offset_lit = match &ast.offset {
            None => Some(0),
            Some(e) => as_count_literal(e),
        };
        let (ast, window) = match (limit_lit, offset_lit) {
            (Some(limit), Some(offset)) => {
                ast.limit = None;
                ast.offset = None;
                (ast, Window { limit, offset })
            }
            _ => (barrier_ast(ast), Window::default()),
        };

        let available = derive_available(&ast);
        Ok(Built {
            ast,
            window,
            available,
            ctes: vec![],
        })
    }

    /// Applies a structural change, producing a new builder off the fast
    /// path.
    fn map_built(&self, f: impl FnOnce(&Self, Built) -> Result<Built>) -> Result<Self> {
        let built = f(self, self.get_built()?)?;
        Ok(Self {
            db: self.db.clone(),
            sql: Rc::clone(&self.sql),
            params: Rc::clone(&self.params),
            built: OnceCell::from(built),
            structural: true,
            hydrator: self.hydrator.clone(),
        })
    }

    // ---- window algebra --------------------------------------------------

    /// Narrows the window: the new effective limit is the minimum of the
    /// current and requested limits. Attempts to enlarge are clamped.
    ///
    /// # Errors
    ///
    /// Fails when the source text cannot be parsed.
    pub fn limit(&self, n: u64) -> Result<Self> {
        self.map_built(|_, mut built| {
            built.window.limit = Some(built.window.limit.map_or(n, |cur| cur.min(n)));
            Ok(built)
        })
    }

    /// Advances the window: offsets accumulate, and an existing limit
    /// shrinks by the same amount so the window never widens past its
    /// original upper bound.
    ///
    /// # Errors
    ///
    /// Fails when the source text cannot be parsed.
    pub fn offset(&self, n: u64) -> Result<Self> {
        self.map_built(|_, mut built| {
            built.window.offset += n;
            if let Some(limit) = built.window.limit {
                built.window.limit = Some(limit.saturating_sub(n));
            }
            Ok(built)
        })
    }

    // ---- predicates ------------------------------------------------------

    /// ANDs `column = value` into the WHERE clause.
    ///
    /// # Errors
    ///
    /// Fails when the column is outside the available set.
    pub fn eq(&self, column: &str, value: impl Into<Value>) -> Result<Self> {
        self.filter(Cond::eq(column, value))
    }

    /// ANDs `column < value` into the WHERE clause.
    ///
    /// # Errors
    ///
    /// Fails when the column is outside the available set.
    pub fn lt(&self, column: &str, value: impl Into<Value>) -> Result<Self> {
        self.filter(Cond::lt(column, value))
    }

    /// ANDs `column <= value` into the WHERE clause.
    ///
    /// # Errors
    ///
    /// Fails when the column is outside the available set.
    pub fn lte(&self, column: &str, value: impl Into<Value>) -> Result<Self> {
        self.filter(Cond::lte(column, value))
    }

    /// ANDs `column > value` into the WHERE clause.
    ///
    /// # Errors
    ///
    /// Fails when the column is outside the available set.
    pub fn gt(&self, column: &str, value: impl Into<Value>) -> Result<Self> {
        self.filter(Cond::gt(column, value))
    }

    /// ANDs `column >= value` into the WHERE clause.
    ///
    /// # Errors
    ///
    /// Fails when the column is outside the available set.
    pub fn gte(&self, column: &str, value: impl Into<Value>) -> Result<Self> {
        self.filter(Cond::gte(column, value))
    }

    /// ANDs `column LIKE pattern` into the WHERE clause.
    ///
    /// # Errors
    ///
    /// Fails when the column is outside the available set.
    pub fn like(&self, column: &str, pattern: &str) -> Result<Self> {
        self.filter(Cond::like(column, pattern))
    }

    /// ANDs `column IN (values…)` into the WHERE clause. An empty list
    /// yields the always-false predicate `1 = 0`.
    ///
    /// # Errors
    ///
    /// Fails when the column is outside the available set.
    pub fn in_list<V: Into<Value>>(&self, column: &str, values: Vec<V>) -> Result<Self> {
        self.filter(Cond::in_list(column, values))
    }

    /// ANDs `column IN (subquery)` into the WHERE clause. The subquery's
    /// first selected column is the match column, so it may carry a
    /// different name than `column`.
    ///
    /// # Errors
    ///
    /// Fails for subqueries from another database, on CTE name conflicts,
    /// or when the column is outside the available set.
    pub fn in_query(&self, column: &str, subquery: &Self) -> Result<Self> {
        self.ensure_same_backend(subquery)?;
        let sub_built = subquery.get_built()?;
        let sub_ast = bind_parameters_select(subquery.windowed_ast(&sub_built), &subquery.params);
        let predicate = Expr::InSubquery {
            expr: Box::new(Expr::column(column)),
            subquery: Box::new(sub_ast),
            negated: false,
        };
        let merged = self.merge_ctes(&sub_built.ctes)?;
        merged.filter(Cond::from_expr(predicate))
    }

    /// Parses a raw SQL fragment as a predicate and ANDs it in. The
    /// fragment's placeholders are bound from `params` immediately.
    ///
    /// # Errors
    ///
    /// Fails on parse errors, unbound placeholders, or unavailable
    /// columns.
    pub fn where_sql(&self, fragment: &str, params: Params) -> Result<Self> {
        self.filter(Cond::raw(fragment, params)?)
    }

    /// Builds `(c1 OR c2 OR …)` and ANDs it into the WHERE clause.
    ///
    /// # Errors
    ///
    /// Fails when a referenced column is outside the available set.
    pub fn or_where(&self, conditions: Vec<Cond>) -> Result<Self> {
        let mut iter = conditions.into_iter();
        let Some(first) = iter.next() else {
            return Ok(self.clone());
        };
        let disjunction = iter.fold(first.into_expr(), |acc, cond| acc.or(cond.into_expr()));
        self.filter(Cond::from_expr(Expr::Paren(Box::new(disjunction))))
    }

    /// ANDs an arbitrary predicate into the WHERE clause, inserting a
    /// barrier first when the window is non-trivial or the current query
    /// cannot absorb another WHERE conjunct.
    ///
    /// # Errors
    ///
    /// Fails when a referenced column is outside the available set.
    pub fn filter(&self, cond: Cond) -> Result<Self> {
        let predicate = cond.into_expr();
        self.map_built(|this, built| {
            this.check_available(&built, &predicate)?;
            let mut built = if needs_predicate_barrier(&built) {
                this.barrier(built)
            } else {
                built
            };
            built.ast.where_clause = Some(match built.ast.where_clause.take() {
                Some(existing) => existing.and(predicate),
                None => predicate,
            });
            Ok(built)
        })
    }

    // ---- ordering and projection ----------------------------------------

    /// Sets the outer ORDER BY from specs of the form `"col"` (ascending)
    /// or `"-col"` (descending). An existing window forces a barrier so
    /// the new ordering applies to the already-sliced result.
    ///
    /// # Errors
    ///
    /// Fails when a referenced column is outside the available set.
    pub fn order(&self, specs: &[&str]) -> Result<Self> {
        let entries: Vec<OrderBy> = specs
            .iter()
            .map(|spec| match spec.strip_prefix('-') {
                Some(column) => OrderBy {
                    expr: Expr::column(column),
                    direction: OrderDirection::Desc,
                },
                None => OrderBy {
                    expr: Expr::column(*spec),
                    direction: OrderDirection::Asc,
                },
            })
            .collect();

        self.map_built(|this, built| {
            for entry in &entries {
                this.check_available(&built, &entry.expr)?;
            }
            let mut built = if built.window.is_trivial() {
                built
            } else {
                this.barrier(built)
            };
            built.ast.order_by = entries;
            Ok(built)
        })
    }

    /// Replaces the projection. Every referenced column must be in the
    /// available set; afterwards the available set becomes the new
    /// projection's output names. A barrier is inserted when the current
    /// projection cannot simply be replaced.
    ///
    /// # Errors
    ///
    /// Fails on parse errors or unavailable columns.
    pub fn select(&self, columns: &[&str]) -> Result<Self> {
        let list = parse_select(&format!("SELECT {}", columns.join(", ")))?.columns;

        self.map_built(|this, built| {
            for col in &list {
                this.check_available(&built, &col.expr)?;
            }
            let mut built = if projection_merges(&built.ast) {
                built
            } else {
                this.barrier(built)
            };
            built.ast.columns = list.clone();
            built.available = Some(Rc::new(
                list.iter()
                    .map(|c| c.output_name().to_ascii_lowercase())
                    .collect(),
            ));
            Ok(built)
        })
    }

    /// Alias for [`PartialQuery::select`].
    ///
    /// # Errors
    ///
    /// Fails on parse errors or unavailable columns.
    pub fn columns(&self, columns: &[&str]) -> Result<Self> {
        self.select(columns)
    }

    // ---- CTEs ------------------------------------------------------------

    /// Attaches `name` as a CTE defined by `subquery`. The subquery's own
    /// attached CTEs are merged in; name collisions (including with the
    /// query's textual WITH clause) are rejected rather than shadowed.
    ///
    /// # Errors
    ///
    /// Fails with a CTE-conflict error on duplicate names, or a
    /// cross-backend error when `subquery` belongs to another database.
    pub fn with_cte(&self, name: &str, subquery: &Self) -> Result<Self> {
        self.ensure_same_backend(subquery)?;
        let sub_built = subquery.get_built()?;

        let this = self.merge_ctes(&sub_built.ctes)?;
        this.map_built(|_, mut built| {
            if cte_name_taken(&built, name) {
                return Err(EngineError::CteConflict(String::from(name)));
            }
            let stripped = subquery.clone_without_ctes(&sub_built);
            built.ctes.push((String::from(name), stripped));
            Ok(built)
        })
    }

    fn merge_ctes(&self, foreign: &[(String, PartialQuery)]) -> Result<Self> {
        if foreign.is_empty() {
            // Still force the parse so later stages see an AST.
            return self.map_built(|_, built| Ok(built));
        }
        self.map_built(|_, mut built| {
            for (name, sub) in foreign {
                if cte_name_taken(&built, name) {
                    return Err(EngineError::CteConflict(name.clone()));
                }
                built.ctes.push((name.clone(), sub.clone()));
            }
            Ok(built)
        })
    }

    fn clone_without_ctes(&self, built: &Built) -> Self {
        let mut stripped = built.clone();
        stripped.ctes = vec![];
        Self {
            db: self.db.clone(),
            sql: Rc::clone(&self.sql),
            params: Rc::clone(&self.params),
            built: OnceCell::from(stripped),
            structural: self.structural,
            hydrator: None,
        }
    }

    // ---- result shaping --------------------------------------------------

    /// Installs a row-shaping callback applied to every produced row. The
    /// SQL is unchanged.
    #[must_use]
    pub fn with_hydrator(&self, hydrator: Hydrator) -> Self {
        let mut next = self.clone();
        next.hydrator = Some(hydrator);
        next
    }

    /// Runs the query, mapping every row into an entity type.
    ///
    /// # Errors
    ///
    /// Propagates execution errors and entity conversion failures.
    pub fn entities<T: crate::row::FromRow>(&self) -> Result<Vec<T>> {
        self.rows()?.map(|row| T::from_row(&row)).collect()
    }

    // ---- barriers and rendering ------------------------------------------

    /// Wraps the current state as `SELECT * FROM (…) AS _q`, applying the
    /// window to the inner query and resetting it. Attached and textual
    /// CTEs bubble up to the outer level.
    fn barrier(&self, built: Built) -> Built {
        debug!(window = ?built.window, "inserting barrier");
        let inner = self.windowed_ast(&built);
        Built {
            ast: barrier_ast(inner),
            window: Window::default(),
            available: built.available,
            ctes: built.ctes,
        }
    }

    /// The AST with the window re-applied as LIMIT/OFFSET clauses (CTE
    /// attachments not included).
    fn windowed_ast(&self, built: &Built) -> SelectStatement {
        let mut ast = built.ast.clone();
        if let Some(limit) = built.window.limit {
            ast.limit = Some(Expr::integer(limit as i64));
        }
        if built.window.offset > 0 {
            ast.offset = Some(Expr::integer(built.window.offset as i64));
        }
        ast
    }

    /// The full renderable AST: window applied and every attached CTE
    /// hoisted into the outermost WITH clause (parameters of attached
    /// subqueries are frozen into literals).
    fn render_ast(&self) -> Result<SelectStatement> {
        let built = self.get_built()?;
        let mut ast = self.windowed_ast(&built);
        if !built.ctes.is_empty() {
            let mut with = ast.with.take().unwrap_or_default();
            for (name, sub) in &built.ctes {
                let sub_built = sub.get_built()?;
                let sub_ast =
                    bind_parameters_select(sub.windowed_ast(&sub_built), &sub.params);
                with.ctes.push(Cte {
                    name: name.clone(),
                    query: sub_ast,
                });
            }
            ast.with = Some(with);
        }
        Ok(ast)
    }

    /// Returns the SQL text and its parameters. A never-modified builder
    /// returns the original text and parameters verbatim.
    ///
    /// # Errors
    ///
    /// Fails when the source text cannot be parsed (structural path only).
    pub fn sql(&self) -> Result<(String, Params)> {
        if !self.structural {
            return Ok(((*self.sql).clone(), (*self.params).clone()));
        }
        Ok((self.render_ast()?.to_string(), (*self.params).clone()))
    }

    /// Renders the SQL with parameters interpolated as literals, for
    /// display and diagnostics.
    ///
    /// # Errors
    ///
    /// Fails when the source text cannot be parsed.
    pub fn display_sql(&self) -> Result<String> {
        let ast = bind_parameters_select(self.render_ast()?, &self.params);
        Ok(ast.to_string())
    }

    // ---- predicate evaluation --------------------------------------------

    /// Evaluates the builder's accumulated predicate (the WHERE clauses
    /// of every barrier level) against a single row without running the
    /// query.
    ///
    /// # Errors
    ///
    /// Fails with a runtime error when the row lacks a referenced column.
    pub fn matches(&self, row: &Row) -> Result<bool> {
        let built = self.get_built()?;
        let mut predicates = vec![];
        collect_spine_predicates(&built.ast, &mut predicates);

        let executor = Executor::new(&self.db, (*self.params).clone());
        let scopes: Vec<&Row> = vec![row];
        let evaluator = crate::eval::Evaluator::new(&executor, &scopes);
        for predicate in &predicates {
            let truth = evaluator.truth(predicate).map_err(|e| match e {
                EngineError::Resolution(msg) => EngineError::runtime(msg),
                other => other,
            })?;
            if truth != Truth::True {
                return Ok(false);
            }
        }
        Ok(true)
    }

    // ---- execution -------------------------------------------------------

    /// Runs the query, returning an iterable result.
    ///
    /// # Errors
    ///
    /// Propagates parse, resolution, and execution errors.
    pub fn rows(&self) -> Result<QueryRows> {
        let ast = self.render_ast()?;
        let executor = Executor::new(&self.db, (*self.params).clone());
        let mut result = executor.run_select(&ast, &[])?;
        if let Some(hydrator) = &self.hydrator {
            result.rows = result.rows.into_iter().map(|row| hydrator(row)).collect();
        }
        Ok(result.into_rows())
    }

    /// Runs the query and collects every row.
    ///
    /// # Errors
    ///
    /// Propagates parse, resolution, and execution errors.
    pub fn to_array(&self) -> Result<Vec<Row>> {
        Ok(self.rows()?.collect())
    }

    /// Runs the query and returns the first row, if any.
    ///
    /// # Errors
    ///
    /// Propagates parse, resolution, and execution errors.
    pub fn one(&self) -> Result<Option<Row>> {
        Ok(self.rows()?.next())
    }

    /// Runs the query and returns the first column of the first row
    /// (NULL when the result is empty).
    ///
    /// # Errors
    ///
    /// Propagates parse, resolution, and execution errors.
    pub fn field(&self) -> Result<Value> {
        Ok(self
            .one()?
            .and_then(|row| row.value_at(0).cloned())
            .unwrap_or(Value::Null))
    }

    /// Runs the query and returns the first column of every row.
    ///
    /// # Errors
    ///
    /// Propagates parse, resolution, and execution errors.
    pub fn column(&self) -> Result<Vec<Value>> {
        Ok(self
            .rows()?
            .map(|row| row.value_at(0).cloned().unwrap_or(Value::Null))
            .collect())
    }

    /// Counts the rows the query would produce, via
    /// `SELECT COUNT(*) FROM (…) AS _q`.
    ///
    /// # Errors
    ///
    /// Propagates parse, resolution, and execution errors.
    pub fn count(&self) -> Result<i64> {
        let inner = self.render_ast()?;
        let mut wrapper = barrier_ast(inner);
        wrapper.columns = vec![SelectColumn {
            expr: Expr::Function(vdb_sql_core::ast::FunctionCall {
                name: String::from("COUNT"),
                args: vec![Expr::Wildcard { table: None }],
                distinct: false,
            }),
            alias: None,
        }];
        let executor = Executor::new(&self.db, (*self.params).clone());
        let result = executor.run_select(&wrapper, &[])?;
        Ok(result
            .rows
            .first()
            .and_then(|row| row.value_at(0))
            .and_then(Value::as_integer)
            .unwrap_or(0))
    }

    // ---- pushdown support ------------------------------------------------

    /// The currently selectable column names (lowercase), when known.
    pub(crate) fn available_columns(&self) -> Option<BTreeSet<String>> {
        self.get_built()
            .ok()
            .and_then(|built| built.available.map(|set| (*set).clone()))
    }

    /// The output column names in projection order, when the projection
    /// has no wildcard.
    pub(crate) fn output_columns(&self) -> Option<Vec<String>> {
        let built = self.get_built().ok()?;
        let any_wildcard = built
            .ast
            .columns
            .iter()
            .any(|c| matches!(c.expr, Expr::Wildcard { .. }));
        if any_wildcard {
            return None;
        }
        Some(built.ast.columns.iter().map(SelectColumn::output_name).collect())
    }

    fn check_available(&self, built: &Built, expr: &Expr) -> Result<()> {
        let Some(available) = &built.available else {
            return Ok(());
        };
        let mut missing = None;
        expr.for_each_column(&mut |_, name| {
            if missing.is_none() && !available.contains(&name.to_ascii_lowercase()) {
                missing = Some(String::from(name));
            }
        });
        match missing {
            Some(name) => Err(EngineError::ColumnNotAvailable(name)),
            None => Ok(()),
        }
    }
}

impl core::fmt::Debug for PartialQuery {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("PartialQuery")
            .field("sql", &self.sql)
            .field("structural", &self.structural)
            .finish_non_exhaustive()
    }
}

// ---- helpers -------------------------------------------------------------

fn as_count_literal(expr: &Expr) -> Option<u64> {
    match expr {
        Expr::Literal(Literal::Integer(i)) if *i >= 0 => Some(*i as u64),
        _ => None,
    }
}

/// Wraps a select in `SELECT * FROM (…) AS _q`, hoisting its WITH clause
/// onto the wrapper: `WITH` may not appear inside a derived table.
fn barrier_ast(mut inner: SelectStatement) -> SelectStatement {
    let with = inner.with.take();
    SelectStatement {
        with,
        columns: vec![SelectColumn {
            expr: Expr::Wildcard { table: None },
            alias: None,
        }],
        from: Some(TableRef::Subquery {
            query: Box::new(inner),
            alias: String::from(BARRIER_ALIAS),
        }),
        ..SelectStatement::default()
    }
}

/// A predicate can merge into the WHERE clause only when the query has a
/// trivial window and no grouping, set operations, or aggregation that a
/// new conjunct would leak into.
fn needs_predicate_barrier(built: &Built) -> bool {
    if !built.window.is_trivial() {
        return true;
    }
    let ast = &built.ast;
    let has_aggregate_output = ast.columns.iter().any(|c| {
        c.expr
            .contains_aggregate(&|name| matches!(name, "COUNT" | "SUM" | "AVG" | "MIN" | "MAX"))
    });
    !ast.group_by.is_empty()
        || ast.having.is_some()
        || !ast.compounds.is_empty()
        || has_aggregate_output
}

/// A new projection can replace the current one in place only for a
/// plain `SELECT *` query without DISTINCT, grouping, or set operations.
fn projection_merges(ast: &SelectStatement) -> bool {
    let star = matches!(
        ast.columns.as_slice(),
        [SelectColumn {
            expr: Expr::Wildcard { table: None },
            alias: None,
        }]
    );
    star && !ast.distinct && ast.group_by.is_empty() && ast.compounds.is_empty()
}

fn derive_available(ast: &SelectStatement) -> Option<Rc<BTreeSet<String>>> {
    let any_wildcard = ast
        .columns
        .iter()
        .any(|c| matches!(c.expr, Expr::Wildcard { .. }));
    if any_wildcard {
        return None;
    }
    Some(Rc::new(
        ast.columns
            .iter()
            .map(|c| c.output_name().to_ascii_lowercase())
            .collect(),
    ))
}

fn cte_name_taken(built: &Built, name: &str) -> bool {
    built
        .ctes
        .iter()
        .any(|(n, _)| n.eq_ignore_ascii_case(name))
        || built.ast.with.as_ref().is_some_and(|with| {
            with.ctes.iter().any(|cte| cte.name.eq_ignore_ascii_case(name))
        })
}

/// Collects the WHERE predicates along the barrier spine: the outer query
/// and every derived table it directly wraps.
fn collect_spine_predicates(stmt: &SelectStatement, out: &mut Vec<Expr>) {
    if let Some(predicate) = &stmt.where_clause {
        out.push(predicate.clone());
    }
    if let Some(TableRef::Subquery { query, .. }) = &stmt.from {
        collect_spine_predicates(query, out);
    }
}

fn value_to_literal(value: &Value) -> Literal {
    match value {
        Value::Null => Literal::Null,
        Value::Integer(i) => Literal::Integer(*i),
        Value::Float(f) => Literal::Float(*f),
        Value::Text(s) => Literal::String(s.clone()),
        Value::Blob(b) => Literal::String(String::from_utf8_lossy(b).into_owned()),
        Value::Boolean(b) => Literal::Boolean(*b),
    }
}

/// Freezes every placeholder in an expression into its bound value.
pub(crate) fn bind_parameters_expr(expr: &mut Expr, params: &Params) {
    match expr {
        Expr::Parameter { name, position } => {
            let value = params
                .resolve(name.as_deref(), *position)
                .unwrap_or(Value::Null);
            *expr = Expr::Literal(value_to_literal(&value));
        }
        Expr::Unary { operand, .. } => bind_parameters_expr(operand, params),
        Expr::Binary { left, right, .. } => {
            bind_parameters_expr(left, params);
            bind_parameters_expr(right, params);
        }
        Expr::Function(call) => {
            for arg in &mut call.args {
                bind_parameters_expr(arg, params);
            }
        }
        Expr::WindowFunction { call, over } => {
            for arg in &mut call.args {
                bind_parameters_expr(arg, params);
            }
            for e in &mut over.partition_by {
                bind_parameters_expr(e, params);
            }
            for ob in &mut over.order_by {
                bind_parameters_expr(&mut ob.expr, params);
            }
        }
        Expr::Case {
            operand,
            when_clauses,
            else_clause,
        } => {
            if let Some(op) = operand {
                bind_parameters_expr(op, params);
            }
            for (when, then) in when_clauses {
                bind_parameters_expr(when, params);
                bind_parameters_expr(then, params);
            }
            if let Some(e) = else_clause {
                bind_parameters_expr(e, params);
            }
        }
        Expr::Between {
            expr, low, high, ..
        } => {
            bind_parameters_expr(expr, params);
            bind_parameters_expr(low, params);
            bind_parameters_expr(high, params);
        }
        Expr::InList { expr, list, .. } => {
            bind_parameters_expr(expr, params);
            for e in list {
                bind_parameters_expr(e, params);
            }
        }
        Expr::InSubquery { expr, subquery, .. } => {
            bind_parameters_expr(expr, params);
            bind_parameters_stmt(subquery, params);
        }
        Expr::Like { expr, pattern, .. } => {
            bind_parameters_expr(expr, params);
            bind_parameters_expr(pattern, params);
        }
        Expr::IsNull { expr, .. } => bind_parameters_expr(expr, params),
        Expr::Exists(subquery) | Expr::Subquery(subquery) => {
            bind_parameters_stmt(subquery, params);
        }
        Expr::Quantified { left, subquery, .. } => {
            bind_parameters_expr(left, params);
            bind_parameters_stmt(subquery, params);
        }
        Expr::Paren(inner) => bind_parameters_expr(inner, params),
        Expr::Literal(_) | Expr::Column { .. } | Expr::Niladic(_) | Expr::Wildcard { .. } => {}
    }
}

fn bind_parameters_table_ref(table_ref: &mut TableRef, params: &Params) {
    match table_ref {
        TableRef::Table { .. } => {}
        TableRef::Subquery { query, .. } => bind_parameters_stmt(query, params),
        TableRef::Join { left, join } => {
            bind_parameters_table_ref(left, params);
            bind_parameters_table_ref(&mut join.table, params);
            if let Some(on) = &mut join.on {
                bind_parameters_expr(on, params);
            }
        }
    }
}

fn bind_parameters_stmt(stmt: &mut SelectStatement, params: &Params) {
    if let Some(with) = &mut stmt.with {
        for cte in &mut with.ctes {
            bind_parameters_stmt(&mut cte.query, params);
        }
    }
    for col in &mut stmt.columns {
        bind_parameters_expr(&mut col.expr, params);
    }
    if let Some(from) = &mut stmt.from {
        bind_parameters_table_ref(from, params);
    }
    if let Some(predicate) = &mut stmt.where_clause {
        bind_parameters_expr(predicate, params);
    }
    for e in &mut stmt.group_by {
        bind_parameters_expr(e, params);
    }
    if let Some(having) = &mut stmt.having {
        bind_parameters_expr(having, params);
    }
    for arm in &mut stmt.compounds {
        bind_parameters_stmt(&mut arm.select, params);
    }
    for ob in &mut stmt.order_by {
        bind_parameters_expr(&mut ob.expr, params);
    }
    if let Some(limit) = &mut stmt.limit {
        bind_parameters_expr(limit, params);
    }
    if let Some(offset) = &mut stmt.offset {
        bind_parameters_expr(offset, params);
    }
}

/// Returns a copy of the statement with every placeholder bound.
fn bind_parameters_select(mut stmt: SelectStatement, params: &Params) -> SelectStatement {
    bind_parameters_stmt(&mut stmt, params);
    stmt
}
