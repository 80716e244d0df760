//! Source resolution: named tables, CTEs, derived tables, and joins.

use std::rc::Rc;

use tracing::{debug, trace};
use vdb_sql_core::ast::{Expr, JoinType, SelectStatement, TableRef, WithClause};

use super::{CteEntry, Executor};
use crate::error::{EngineError, Result};
use crate::eval::{Evaluator, Scopes};
use crate::row::{CellName, Row};
use crate::table::OrderHint;
use crate::value::{Value, ValueKey};

/// A resolved row source: the full ordered column list, the materialized
/// rows, and the ordering the rows are known to satisfy.
pub(crate) struct Source {
    pub(crate) cells: Vec<CellName>,
    pub(crate) rows: Vec<Row>,
    pub(crate) hints: Vec<OrderHint>,
    pub(crate) is_join: bool,
}

impl Source {
    fn empty_row() -> Self {
        Self {
            cells: vec![],
            rows: vec![Row::default()],
            hints: vec![],
            is_join: false,
        }
    }
}

impl<'a> Executor<'a> {
    /// Resolves the FROM clause into a row source. A missing FROM yields a
    /// single empty row so expression-only selects produce one row.
    pub(crate) fn resolve_source(
        &self,
        from: Option<&TableRef>,
        where_hint: Option<&Expr>,
        scopes: &Scopes<'_>,
    ) -> Result<Source> {
        match from {
            None => Ok(Source::empty_row()),
            Some(table_ref) => self.resolve_table_ref(table_ref, where_hint, scopes),
        }
    }

    fn resolve_table_ref(
        &self,
        table_ref: &TableRef,
        where_hint: Option<&Expr>,
        scopes: &Scopes<'_>,
    ) -> Result<Source> {
        match table_ref {
            TableRef::Table { name, alias } => {
                let binding = alias.as_deref().unwrap_or(name);
                self.resolve_named_table(name, binding, where_hint)
            }
            TableRef::Subquery { query, alias } => {
                let result = self.run_select(query, scopes)?;
                let cells: Vec<CellName> = result
                    .columns
                    .iter()
                    .map(|c| CellName::qualified(alias.clone(), c.clone()))
                    .collect();
                let rows = result
                    .rows
                    .into_iter()
                    .map(|row| {
                        Row::new(cells.clone(), row.into_values())
                    })
                    .collect();
                Ok(Source {
                    cells,
                    rows,
                    hints: vec![],
                    is_join: false,
                })
            }
            TableRef::Join { left, join } => {
                let left_src = self.resolve_table_ref(left, None, scopes)?;
                let right_src = self.resolve_table_ref(&join.table, None, scopes)?;
                self.join_sources(
                    left_src,
                    right_src,
                    &join.table,
                    join.join_type,
                    join.on.as_ref(),
                    scopes,
                )
            }
        }
    }

    fn resolve_named_table(
        &self,
        name: &str,
        binding: &str,
        where_hint: Option<&Expr>,
    ) -> Result<Source> {
        // CTEs shadow registered tables.
        if let Some((columns, rows)) = self.materialize_cte(name)? {
            let cells: Vec<CellName> = columns
                .iter()
                .map(|c| CellName::qualified(binding, c.clone()))
                .collect();
            let rows = rows
                .iter()
                .map(|row| Row::new(cells.clone(), row.values().to_vec()))
                .collect();
            return Ok(Source {
                cells,
                rows,
                hints: vec![],
                is_join: false,
            });
        }

        let table = self
            .db()
            .table(name)
            .ok_or_else(|| EngineError::Resolution(format!("unknown table: {name}")))?;
        let table = table.borrow();
        let cells: Vec<CellName> = table
            .schema()
            .iter()
            .map(|c| CellName::qualified(binding, c.name.clone()))
            .collect();

        let scan = table.scan(where_hint)?;
        let hints = scan.order.clone();
        let mut rows = vec![];
        for source_row in scan.rows {
            self.check_deadline()?;
            // Rebuild in schema order by name: a source's scan is not
            // required to emit cells in schema order.
            let scanned = source_row?.row;
            let values = cells
                .iter()
                .map(|cell| scanned.get(&cell.name).cloned().unwrap_or(Value::Null))
                .collect();
            rows.push(Row::new(cells.clone(), values));
        }
        trace!(table = name, rows = rows.len(), "scanned");
        Ok(Source {
            cells,
            rows,
            hints,
            is_join: false,
        })
    }

    // ---- joins -----------------------------------------------------------

    fn join_sources(
        &self,
        left: Source,
        right: Source,
        right_ref: &TableRef,
        join_type: JoinType,
        on: Option<&Expr>,
        scopes: &Scopes<'_>,
    ) -> Result<Source> {
        let cells: Vec<CellName> = left
            .cells
            .iter()
            .chain(right.cells.iter())
            .cloned()
            .collect();

        let probe = match join_type {
            JoinType::Inner | JoinType::Left => self.find_probe(right_ref, on),
            _ => None,
        };
        if probe.is_some() {
            debug!(join = %join_type, "using index probe");
        }

        let null_right = Row::new(
            right.cells.clone(),
            vec![Value::Null; right.cells.len()],
        );
        let null_left = Row::new(left.cells.clone(), vec![Value::Null; left.cells.len()]);

        let mut rows = vec![];
        match join_type {
            JoinType::Cross => {
                for l in &left.rows {
                    for r in &right.rows {
                        self.check_deadline()?;
                        rows.push(l.clone().concat(r.clone()));
                    }
                }
            }
            JoinType::Inner | JoinType::Left => {
                for l in &left.rows {
                    let mut matched = false;
                    let candidates = match &probe {
                        Some((outer_expr, table_name, column)) => {
                            self.probe_rows(l, scopes, outer_expr, table_name, column)?
                        }
                        None => None,
                    };
                    match candidates {
                        Some(hits) => {
                            for r in hits {
                                self.check_deadline()?;
                                // Probe rows come from the base table; they
                                // still need the right binding applied.
                                let r = Row::new(right.cells.clone(), r.into_values());
                                rows.push(l.clone().concat(r));
                                matched = true;
                            }
                        }
                        None => {
                            for r in &right.rows {
                                self.check_deadline()?;
                                let combined = l.clone().concat(r.clone());
                                if self.on_matches(on, &combined, scopes)? {
                                    rows.push(combined);
                                    matched = true;
                                }
                            }
                        }
                    }
                    if !matched && join_type == JoinType::Left {
                        rows.push(l.clone().concat(null_right.clone()));
                    }
                }
            }
            JoinType::Right => {
                for r in &right.rows {
                    let mut matched = false;
                    for l in &left.rows {
                        self.check_deadline()?;
                        let combined = l.clone().concat(r.clone());
                        if self.on_matches(on, &combined, scopes)? {
                            rows.push(combined);
                            matched = true;
                        }
                    }
                    if !matched {
                        rows.push(null_left.clone().concat(r.clone()));
                    }
                }
            }
            JoinType::Full => {
                let mut right_matched = vec![false; right.rows.len()];
                let mut left_unmatched = vec![];
                for l in &left.rows {
                    let mut matched = false;
                    for (ri, r) in right.rows.iter().enumerate() {
                        self.check_deadline()?;
                        let combined = l.clone().concat(r.clone());
                        if self.on_matches(on, &combined, scopes)? {
                            rows.push(combined);
                            matched = true;
                            right_matched[ri] = true;
                        }
                    }
                    if !matched {
                        left_unmatched.push(l.clone().concat(null_right.clone()));
                    }
                }
                // Matched rows first, then unmatched left, then unmatched
                // right, stable per side.
                rows.extend(left_unmatched);
                for (ri, r) in right.rows.iter().enumerate() {
                    if !right_matched[ri] {
                        rows.push(null_left.clone().concat(r.clone()));
                    }
                }
            }
        }

        // Left-major iteration preserves the left side's ordering.
        let hints = match join_type {
            JoinType::Inner | JoinType::Left | JoinType::Cross => left.hints,
            JoinType::Right | JoinType::Full => vec![],
        };

        Ok(Source {
            cells,
            rows,
            hints,
            is_join: true,
        })
    }

    fn on_matches(
        &self,
        on: Option<&Expr>,
        combined: &Row,
        scopes: &Scopes<'_>,
    ) -> Result<bool> {
        let Some(predicate) = on else {
            // A join without ON behaves like CROSS.
            return Ok(true);
        };
        let mut stack: Vec<&Row> = scopes.to_vec();
        stack.push(combined);
        let eval = Evaluator::new(self, &stack);
        Ok(eval.truth(predicate)?.is_true())
    }

    /// Detects a `left_expr = binding.column` equality ON clause probing a
    /// unique-indexed column of a registered base table.
    fn find_probe(
        &self,
        right_ref: &TableRef,
        on: Option<&Expr>,
    ) -> Option<(Expr, String, String)> {
        let TableRef::Table { name, alias } = right_ref else {
            return None;
        };
        let binding = alias.as_deref().unwrap_or(name);
        // CTEs shadow base tables; a shadowed name cannot probe.
        if self.lookup_cte(name).is_some() {
            return None;
        }
        let table = self.db().table(name)?;

        let Some(Expr::Binary {
            left,
            op: vdb_sql_core::ast::BinaryOp::Eq,
            right,
        }) = on
        else {
            return None;
        };

        let is_right_column = |e: &Expr| -> Option<String> {
            if let Expr::Column {
                table: Some(t),
                name: col,
                ..
            } = e
            {
                if t.eq_ignore_ascii_case(binding) {
                    return Some(col.clone());
                }
            }
            None
        };

        let (outer, column) = if let Some(col) = is_right_column(right) {
            ((**left).clone(), col)
        } else if let Some(col) = is_right_column(left) {
            ((**right).clone(), col)
        } else {
            return None;
        };

        // The probe key is evaluated against the left row alone; bail out
        // when it also touches the probed table.
        let mut touches_right = false;
        outer.for_each_column(&mut |qualifier, _| {
            if qualifier.is_some_and(|q| q.eq_ignore_ascii_case(binding)) {
                touches_right = true;
            }
        });
        if touches_right {
            return None;
        }

        let unique = table
            .borrow()
            .schema()
            .iter()
            .any(|c| c.name.eq_ignore_ascii_case(&column) && c.index.is_unique());
        if !unique {
            return None;
        }

        Some((outer, String::from(name), column))
    }

    fn probe_rows(
        &self,
        left_row: &Row,
        scopes: &Scopes<'_>,
        outer_expr: &Expr,
        table_name: &str,
        column: &str,
    ) -> Result<Option<Vec<Row>>> {
        let mut stack: Vec<&Row> = scopes.to_vec();
        stack.push(left_row);
        let eval = Evaluator::new(self, &stack);
        let key = eval.eval(outer_expr)?;

        let Some(table) = self.db().table(table_name) else {
            return Ok(None);
        };
        let hits = table.borrow().index_lookup(column, &key);
        match hits {
            Some(result) => Ok(Some(
                result?.into_iter().map(|sr| sr.row).collect(),
            )),
            None => Ok(None),
        }
    }

    // ---- CTEs ------------------------------------------------------------

    /// Registers the CTEs of a WITH clause in a fresh frame. Recursive
    /// members are materialized eagerly by fixed-point iteration;
    /// non-recursive members stay pending until first reference.
    pub(crate) fn setup_with(&self, with: &WithClause) -> Result<()> {
        self.push_cte_frame();
        for cte in &with.ctes {
            if references_table(&cte.query, &cte.name) {
                let (columns, rows) = self.materialize_recursive(&cte.name, &cte.query)?;
                self.bind_cte(
                    &cte.name,
                    CteEntry::Ready {
                        columns,
                        rows: Rc::new(rows),
                    },
                );
            } else {
                self.bind_cte(&cte.name, CteEntry::Pending(Rc::new(cte.query.clone())));
            }
        }
        Ok(())
    }

    /// Returns the materialized rows of a CTE, evaluating it on first
    /// reference. `None` when the name is not a CTE in scope.
    pub(crate) fn materialize_cte(
        &self,
        name: &str,
    ) -> Result<Option<(Vec<String>, Rc<Vec<Row>>)>> {
        let Some(entry) = self.lookup_cte(name) else {
            return Ok(None);
        };

        let pending = match &*entry.borrow() {
            CteEntry::Ready { columns, rows } => {
                return Ok(Some((columns.clone(), Rc::clone(rows))));
            }
            CteEntry::Pending(stmt) => Rc::clone(stmt),
        };

        debug!(cte = name, "materializing");
        let result = self.run_select(&pending, &[])?;
        let columns = result.columns.clone();
        let rows = Rc::new(result.rows);
        *entry.borrow_mut() = CteEntry::Ready {
            columns: columns.clone(),
            rows: Rc::clone(&rows),
        };
        Ok(Some((columns, rows)))
    }

    /// Fixed-point evaluation of a self-referencing CTE: evaluate the
    /// non-recursive arms, then repeatedly evaluate the recursive arms
    /// against the rows added by the previous round until a round adds
    /// nothing. UNION deduplicates against everything accumulated;
    /// UNION ALL keeps every produced row.
    fn materialize_recursive(
        &self,
        name: &str,
        stmt: &SelectStatement,
    ) -> Result<(Vec<String>, Vec<Row>)> {
        let mut base = stmt.clone();
        let mut recursive_arms = vec![];
        base.compounds = stmt
            .compounds
            .iter()
            .filter(|arm| {
                if references_table(&arm.select, name) {
                    recursive_arms.push(((*arm).clone()));
                    false
                } else {
                    true
                }
            })
            .cloned()
            .collect();
        if recursive_arms.is_empty() {
            return Err(EngineError::runtime(format!(
                "recursive CTE '{name}' has no recursive arm"
            )));
        }
        let order_by = std::mem::take(&mut base.order_by);
        let limit = base.limit.take();
        let offset = base.offset.take();

        let base_result = self.run_select(&base, &[])?;
        let columns = base_result.columns;
        let mut acc = base_result.rows;
        let mut seen: std::collections::BTreeSet<ValueKey> = acc
            .iter()
            .map(|row| ValueKey(row.values().to_vec()))
            .collect();
        let mut delta = acc.clone();

        // The frame the CTE itself lives in; iteration rebinds the name to
        // the delta rows of the previous round.
        self.push_cte_frame();
        let limit_iterations = self.db().config().recursion_limit;
        let result = (|| {
            let mut iterations = 0usize;
            while !delta.is_empty() {
                iterations += 1;
                if iterations > limit_iterations {
                    return Err(EngineError::runtime(format!(
                        "recursive CTE '{name}' exceeded {limit_iterations} iterations"
                    )));
                }
                self.check_deadline()?;
                self.bind_cte(
                    name,
                    CteEntry::Ready {
                        columns: columns.clone(),
                        rows: Rc::new(std::mem::take(&mut delta)),
                    },
                );

                let mut produced = vec![];
                for arm in &recursive_arms {
                    let result = self.run_select(&arm.select, &[])?;
                    for row in result.rows {
                        if arm.op.deduplicates() {
                            if seen.insert(ValueKey(row.values().to_vec())) {
                                produced.push(row);
                            }
                        } else {
                            produced.push(row);
                        }
                    }
                }
                acc.extend(produced.iter().cloned());
                delta = produced;
            }
            trace!(cte = name, rows = acc.len(), iterations, "fixed point reached");
            Ok(())
        })();
        self.pop_cte_frame();
        result?;

        // Trailing ORDER BY / LIMIT / OFFSET of the defining query apply
        // to the accumulated result.
        if !order_by.is_empty() {
            let mut keyed: Vec<(Vec<Value>, Row)> = acc
                .into_iter()
                .map(|row| {
                    let scopes: Vec<&Row> = vec![&row];
                    let eval = Evaluator::new(self, &scopes);
                    let keys = order_by
                        .iter()
                        .map(|ob| eval.eval(&ob.expr))
                        .collect::<Result<Vec<_>>>()?;
                    Ok((keys, row))
                })
                .collect::<Result<Vec<_>>>()?;
            keyed.sort_by(|a, b| super::select::order_keys_cmp(&a.0, &b.0, &order_by));
            acc = keyed.into_iter().map(|(_, row)| row).collect();
        }
        if let Some(offset) = offset {
            let scopes: &Scopes<'_> = &[];
            let n = self.eval_bound(&offset, scopes)?;
            acc.drain(..n.min(acc.len()));
        }
        if let Some(limit) = limit {
            let scopes: &Scopes<'_> = &[];
            let n = self.eval_bound(&limit, scopes)?;
            acc.truncate(n);
        }

        Ok((columns, acc))
    }

    /// Evaluates a LIMIT/OFFSET bound to a non-negative count.
    pub(crate) fn eval_bound(&self, expr: &Expr, scopes: &Scopes<'_>) -> Result<usize> {
        let eval = Evaluator::new(self, scopes);
        let value = eval.eval(expr)?;
        match value.as_integer() {
            Some(n) if n >= 0 => Ok(n as usize),
            Some(_) => Ok(0),
            None => Err(EngineError::Type(format!(
                "LIMIT/OFFSET must be an integer, got {value}"
            ))),
        }
    }
}

/// Returns true when the statement's FROM trees (including derived tables
/// and compound arms) reference the given table name.
pub(crate) fn references_table(stmt: &SelectStatement, name: &str) -> bool {
    fn in_table_ref(table_ref: &TableRef, name: &str) -> bool {
        match table_ref {
            TableRef::Table { name: n, .. } => n.eq_ignore_ascii_case(name),
            TableRef::Subquery { query, .. } => references_table(query, name),
            TableRef::Join { left, join } => {
                in_table_ref(left, name) || in_table_ref(&join.table, name)
            }
        }
    }

    stmt.from
        .as_ref()
        .is_some_and(|table_ref| in_table_ref(table_ref, name))
        || stmt
            .compounds
            .iter()
            .any(|arm| references_table(&arm.select, name))
}
