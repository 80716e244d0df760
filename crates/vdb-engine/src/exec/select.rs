//! The SELECT pipeline: filter, group, window, project, combine, order,
//! and slice.

use std::collections::HashMap;
use std::rc::Rc;

use vdb_sql_core::ast::{
    CompoundOp, Expr, FunctionCall, OrderBy, OrderDirection, OverClause, SelectColumn,
    SelectStatement,
};

use super::source::Source;
use super::{Executor, ResultSet};
use crate::error::{EngineError, Result};
use crate::eval::aggregate::{Accumulator, AggregateRegistry};
use crate::eval::{Evaluator, Scopes};
use crate::row::{CellName, Row};
use crate::table::OrderHint;
use crate::value::{Value, ValueKey};

/// One result row mid-pipeline: the projected row, the environment used
/// for ORDER BY (source cells plus projected cells), and the aggregate
/// and window values visible to expressions over it.
struct OutEntry {
    out: Row,
    env: Row,
    aggs: Option<Rc<HashMap<String, Value>>>,
    windows: Option<Rc<HashMap<String, Value>>>,
}

struct CoreOutput {
    columns: Vec<String>,
    entries: Vec<OutEntry>,
    /// True while entry order still reflects the source scan order, so
    /// matching order hints can satisfy ORDER BY without a sort.
    scan_ordered: bool,
    hints: Vec<OrderHint>,
}

impl<'a> Executor<'a> {
    /// Runs a full SELECT: CTE prologue, compound chain, ORDER BY, LIMIT
    /// and OFFSET.
    pub(crate) fn run_select(
        &self,
        stmt: &SelectStatement,
        scopes: &Scopes<'_>,
    ) -> Result<ResultSet> {
        self.check_deadline()?;

        let framed = stmt.with.is_some();
        if let Some(with) = &stmt.with {
            self.setup_with(with)?;
        }
        let result = self.run_select_body(stmt, scopes);
        if framed {
            self.pop_cte_frame();
        }
        result
    }

    fn run_select_body(
        &self,
        stmt: &SelectStatement,
        scopes: &Scopes<'_>,
    ) -> Result<ResultSet> {
        let compound = !stmt.compounds.is_empty();
        let head = self.run_core(stmt, scopes, !compound)?;
        let columns = head.columns;
        let mut entries = head.entries;
        let mut scan_ordered = head.scan_ordered;
        let hints = head.hints;

        if compound {
            let mut rows: Vec<Row> = entries.into_iter().map(|e| e.out).collect();
            for arm in &stmt.compounds {
                self.check_deadline()?;
                let rhs = self.run_core(&arm.select, scopes, false)?;
                if rhs.columns.len() != columns.len() {
                    return Err(EngineError::runtime(format!(
                        "compound SELECT arms produce {} and {} columns",
                        columns.len(),
                        rhs.columns.len()
                    )));
                }
                rows = combine(rows, rhs.entries.into_iter().map(|e| e.out).collect(), arm.op);
            }
            entries = rows
                .into_iter()
                .map(|out| OutEntry {
                    env: out.clone(),
                    out,
                    aggs: None,
                    windows: None,
                })
                .collect();
            scan_ordered = false;
        }

        if !stmt.order_by.is_empty() && !(scan_ordered && hint_satisfies(&hints, &stmt.order_by)) {
            let mut keyed: Vec<(Vec<Value>, OutEntry)> = entries
                .into_iter()
                .map(|entry| {
                    let mut stack: Vec<&Row> = scopes.to_vec();
                    stack.push(&entry.env);
                    let eval = Evaluator {
                        exec: self,
                        scopes: &stack,
                        aggregates: entry.aggs.as_deref(),
                        windows: entry.windows.as_deref(),
                        select_list: false,
                    };
                    let keys = stmt
                        .order_by
                        .iter()
                        .map(|ob| eval.eval(&ob.expr))
                        .collect::<Result<Vec<_>>>()?;
                    Ok((keys, entry))
                })
                .collect::<Result<Vec<_>>>()?;
            keyed.sort_by(|a, b| order_keys_cmp(&a.0, &b.0, &stmt.order_by));
            entries = keyed.into_iter().map(|(_, entry)| entry).collect();
        }

        if let Some(offset) = &stmt.offset {
            let n = self.eval_bound(offset, scopes)?;
            entries.drain(..n.min(entries.len()));
        }
        if let Some(limit) = &stmt.limit {
            let n = self.eval_bound(limit, scopes)?;
            entries.truncate(n);
        }

        Ok(ResultSet {
            columns,
            rows: entries.into_iter().map(|e| e.out).collect(),
        })
    }

    /// Runs one SELECT core (no WITH, compounds, ORDER BY, or LIMIT).
    fn run_core(
        &self,
        stmt: &SelectStatement,
        scopes: &Scopes<'_>,
        order_feeds_aggregates: bool,
    ) -> Result<CoreOutput> {
        let source = self.resolve_source(stmt.from.as_ref(), stmt.where_clause.as_ref(), scopes)?;

        let columns = output_columns(&stmt.columns, &source);

        // WHERE keeps only rows whose predicate is TRUE.
        let mut rows = vec![];
        for row in source.rows.clone() {
            self.check_deadline()?;
            if let Some(predicate) = &stmt.where_clause {
                let mut stack: Vec<&Row> = scopes.to_vec();
                stack.push(&row);
                let eval = Evaluator::new(self, &stack);
                if !eval.truth(predicate)?.is_true() {
                    continue;
                }
            }
            rows.push(row);
        }

        // Aggregation applies when GROUP BY is present or any aggregate
        // appears in the select list, HAVING, or ORDER BY.
        let mut agg_calls: Vec<(String, FunctionCall)> = vec![];
        for col in &stmt.columns {
            collect_aggregates(&col.expr, self.aggregates_registry(), &mut agg_calls);
        }
        if let Some(having) = &stmt.having {
            collect_aggregates(having, self.aggregates_registry(), &mut agg_calls);
        }
        if order_feeds_aggregates {
            for ob in &stmt.order_by {
                collect_aggregates(&ob.expr, self.aggregates_registry(), &mut agg_calls);
            }
        }
        let grouped = !stmt.group_by.is_empty() || !agg_calls.is_empty();

        let mut entries: Vec<(Row, Option<Rc<HashMap<String, Value>>>)> = vec![];
        if grouped {
            let groups = self.bucket_rows(&rows, &stmt.group_by, scopes)?;
            for group in groups {
                self.check_deadline()?;
                let aggs = Rc::new(self.accumulate(&agg_calls, &group, scopes)?);
                let env = group.first().cloned().unwrap_or_else(|| {
                    Row::new(
                        source.cells.clone(),
                        vec![Value::Null; source.cells.len()],
                    )
                });

                if let Some(having) = &stmt.having {
                    let mut stack: Vec<&Row> = scopes.to_vec();
                    stack.push(&env);
                    let eval = Evaluator {
                        exec: self,
                        scopes: &stack,
                        aggregates: Some(&aggs),
                        windows: None,
                        select_list: false,
                    };
                    if !eval.truth(having)?.is_true() {
                        continue;
                    }
                }
                entries.push((env, Some(aggs)));
            }
        } else {
            entries = rows.into_iter().map(|row| (row, None)).collect();
        }

        // Window functions run after grouping, before projection; output
        // order stays the input order.
        let window_calls = collect_windows(&stmt.columns);
        let window_maps = if window_calls.is_empty() {
            vec![None; entries.len()]
        } else {
            self.compute_windows(&window_calls, &entries, scopes)?
        };

        let mut projected = vec![];
        for ((env, aggs), windows) in entries.into_iter().zip(window_maps) {
            self.check_deadline()?;
            let out = self.project_row(&stmt.columns, &source, &env, aggs.as_deref(), windows.as_deref(), scopes)?;
            let order_env = env.concat(out.clone());
            projected.push(OutEntry {
                out,
                env: order_env,
                aggs,
                windows,
            });
        }

        if stmt.distinct {
            let mut seen = std::collections::BTreeSet::new();
            projected.retain(|entry| seen.insert(ValueKey(entry.out.values().to_vec())));
        }

        Ok(CoreOutput {
            columns,
            entries: projected,
            scan_ordered: !grouped,
            hints: source.hints,
        })
    }

    fn bucket_rows(
        &self,
        rows: &[Row],
        group_by: &[Expr],
        scopes: &Scopes<'_>,
    ) -> Result<Vec<Vec<Row>>> {
        if group_by.is_empty() {
            // A single group over everything, even when empty: aggregates
            // over no rows still produce one output row.
            return Ok(vec![rows.to_vec()]);
        }

        let mut order: Vec<ValueKey> = vec![];
        let mut buckets: std::collections::BTreeMap<ValueKey, Vec<Row>> =
            std::collections::BTreeMap::new();
        for row in rows {
            self.check_deadline()?;
            let mut stack: Vec<&Row> = scopes.to_vec();
            stack.push(row);
            let eval = Evaluator::new(self, &stack);
            let key = ValueKey(
                group_by
                    .iter()
                    .map(|e| eval.eval(e))
                    .collect::<Result<Vec<_>>>()?,
            );
            if !buckets.contains_key(&key) {
                order.push(key.clone());
            }
            buckets.entry(key).or_default().push(row.clone());
        }
        Ok(order
            .into_iter()
            .map(|key| buckets.remove(&key).expect("bucket recorded in order"))
            .collect())
    }

    fn accumulate(
        &self,
        agg_calls: &[(String, FunctionCall)],
        group: &[Row],
        scopes: &Scopes<'_>,
    ) -> Result<HashMap<String, Value>> {
        let mut results = HashMap::new();
        for (key, call) in agg_calls {
            if results.contains_key(key) {
                continue;
            }
            let star = matches!(call.args.first(), Some(Expr::Wildcard { .. }));
            let mut acc = Accumulator::new(
                &call.name,
                star,
                call.distinct,
                call.args.len(),
                self.aggregates_registry(),
            )?;
            for row in group {
                self.check_deadline()?;
                if star {
                    acc.step(&[]);
                    continue;
                }
                let mut stack: Vec<&Row> = scopes.to_vec();
                stack.push(row);
                let eval = Evaluator::new(self, &stack);
                let args = call
                    .args
                    .iter()
                    .map(|arg| eval.eval(arg))
                    .collect::<Result<Vec<_>>>()?;
                acc.step(&args);
            }
            results.insert(key.clone(), acc.finish());
        }
        Ok(results)
    }

    fn compute_windows(
        &self,
        calls: &[(String, FunctionCall, OverClause)],
        entries: &[(Row, Option<Rc<HashMap<String, Value>>>)],
        scopes: &Scopes<'_>,
    ) -> Result<Vec<Option<Rc<HashMap<String, Value>>>>> {
        let mut maps: Vec<HashMap<String, Value>> = vec![HashMap::new(); entries.len()];

        for (key, call, over) in calls {
            let func = call.name.to_ascii_uppercase();
            if !matches!(func.as_str(), "ROW_NUMBER" | "RANK" | "DENSE_RANK") {
                return Err(EngineError::runtime(format!(
                    "unsupported window function: {}",
                    call.name
                )));
            }

            // Partition, then sort each partition by the OVER ordering.
            let mut partitions: Vec<(ValueKey, Vec<usize>)> = vec![];
            let mut index_of: std::collections::BTreeMap<ValueKey, usize> =
                std::collections::BTreeMap::new();
            for (i, (env, aggs)) in entries.iter().enumerate() {
                let mut stack: Vec<&Row> = scopes.to_vec();
                stack.push(env);
                let eval = Evaluator {
                    exec: self,
                    scopes: &stack,
                    aggregates: aggs.as_deref(),
                    windows: None,
                    select_list: false,
                };
                let part_key = ValueKey(
                    over.partition_by
                        .iter()
                        .map(|e| eval.eval(e))
                        .collect::<Result<Vec<_>>>()?,
                );
                match index_of.get(&part_key) {
                    Some(&p) => partitions[p].1.push(i),
                    None => {
                        index_of.insert(part_key.clone(), partitions.len());
                        partitions.push((part_key, vec![i]));
                    }
                }
            }

            for (_, members) in &partitions {
                let mut keyed: Vec<(Vec<Value>, usize)> = members
                    .iter()
                    .map(|&i| {
                        let (env, aggs) = &entries[i];
                        let mut stack: Vec<&Row> = scopes.to_vec();
                        stack.push(env);
                        let eval = Evaluator {
                            exec: self,
                            scopes: &stack,
                            aggregates: aggs.as_deref(),
                            windows: None,
                            select_list: false,
                        };
                        let keys = over
                            .order_by
                            .iter()
                            .map(|ob| eval.eval(&ob.expr))
                            .collect::<Result<Vec<_>>>()?;
                        Ok((keys, i))
                    })
                    .collect::<Result<Vec<_>>>()?;
                keyed.sort_by(|a, b| order_keys_cmp(&a.0, &b.0, &over.order_by));

                let mut rank = 0usize;
                let mut dense = 0usize;
                let mut prev_key: Option<&Vec<Value>> = None;
                for (pos, (order_key, i)) in keyed.iter().enumerate() {
                    let tied = prev_key.is_some_and(|p| {
                        order_keys_cmp(p, order_key, &over.order_by)
                            == core::cmp::Ordering::Equal
                    });
                    if !tied {
                        rank = pos + 1;
                        dense += 1;
                    }
                    let value = match func.as_str() {
                        "ROW_NUMBER" => Value::Integer((pos + 1) as i64),
                        "RANK" => Value::Integer(rank as i64),
                        _ => Value::Integer(dense as i64),
                    };
                    maps[*i].insert(key.clone(), value);
                    prev_key = Some(order_key);
                }
            }
        }

        Ok(maps.into_iter().map(|m| Some(Rc::new(m))).collect())
    }

    fn project_row(
        &self,
        columns: &[SelectColumn],
        source: &Source,
        env: &Row,
        aggs: Option<&HashMap<String, Value>>,
        windows: Option<&HashMap<String, Value>>,
        scopes: &Scopes<'_>,
    ) -> Result<Row> {
        let mut out = Row::default();
        for col in columns {
            match &col.expr {
                Expr::Wildcard { table } => {
                    for (i, cell) in source.cells.iter().enumerate() {
                        if let Some(t) = table {
                            let matches = cell
                                .table
                                .as_deref()
                                .is_some_and(|ct| ct.eq_ignore_ascii_case(t));
                            if !matches {
                                continue;
                            }
                        }
                        let name = if source.is_join {
                            cell.clone()
                        } else {
                            CellName::bare(cell.name.clone())
                        };
                        let value = env
                            .value_at(i)
                            .cloned()
                            .unwrap_or(Value::Null)
                            .surfaced();
                        out.push(name, value);
                    }
                }
                expr => {
                    let mut stack: Vec<&Row> = scopes.to_vec();
                    stack.push(env);
                    let eval = Evaluator {
                        exec: self,
                        scopes: &stack,
                        aggregates: aggs,
                        windows,
                        select_list: true,
                    };
                    let value = eval.eval(expr)?.surfaced();
                    out.push(CellName::bare(col.output_name()), value);
                }
            }
        }
        Ok(out)
    }
}

/// Combines two compound-arm row sets.
fn combine(left: Vec<Row>, right: Vec<Row>, op: CompoundOp) -> Vec<Row> {
    let key = |row: &Row| ValueKey(row.values().to_vec());
    match op {
        CompoundOp::UnionAll => {
            let mut rows = left;
            rows.extend(right);
            rows
        }
        CompoundOp::Union => {
            let mut seen = std::collections::BTreeSet::new();
            let mut rows = vec![];
            for row in left.into_iter().chain(right) {
                if seen.insert(key(&row)) {
                    rows.push(row);
                }
            }
            rows
        }
        CompoundOp::Intersect => {
            let right_keys: std::collections::BTreeSet<ValueKey> =
                right.iter().map(|r| key(r)).collect();
            let mut seen = std::collections::BTreeSet::new();
            left.into_iter()
                .filter(|row| right_keys.contains(&key(row)) && seen.insert(key(row)))
                .collect()
        }
        CompoundOp::Except => {
            let right_keys: std::collections::BTreeSet<ValueKey> =
                right.iter().map(|r| key(r)).collect();
            let mut seen = std::collections::BTreeSet::new();
            left.into_iter()
                .filter(|row| !right_keys.contains(&key(row)) && seen.insert(key(row)))
                .collect()
        }
    }
}

/// True when the scan's order hints already satisfy the requested
/// ordering prefix, so no sort is needed.
fn hint_satisfies(hints: &[OrderHint], order_by: &[OrderBy]) -> bool {
    if order_by.len() > hints.len() {
        return false;
    }
    order_by.iter().zip(hints).all(|(ob, hint)| {
        let Expr::Column { name, .. } = &ob.expr else {
            return false;
        };
        name.eq_ignore_ascii_case(&hint.column) && ob.direction == hint.direction
    })
}

/// Compares two order-key tuples per the ORDER BY directions: NULLs sort
/// first ascending, last descending.
pub(crate) fn order_keys_cmp(
    a: &[Value],
    b: &[Value],
    order_by: &[OrderBy],
) -> core::cmp::Ordering {
    for (i, ob) in order_by.iter().enumerate() {
        let (x, y) = (&a[i], &b[i]);
        let ordering = match ob.direction {
            OrderDirection::Asc => x.total_cmp(y),
            OrderDirection::Desc => y.total_cmp(x),
        };
        if ordering != core::cmp::Ordering::Equal {
            return ordering;
        }
    }
    core::cmp::Ordering::Equal
}

/// The static output column names of a projection.
fn output_columns(columns: &[SelectColumn], source: &Source) -> Vec<String> {
    let mut out = vec![];
    for col in columns {
        match &col.expr {
            Expr::Wildcard { table } => {
                for cell in &source.cells {
                    if let Some(t) = table {
                        let matches = cell
                            .table
                            .as_deref()
                            .is_some_and(|ct| ct.eq_ignore_ascii_case(t));
                        if !matches {
                            continue;
                        }
                    }
                    if source.is_join {
                        out.push(cell.display());
                    } else {
                        out.push(cell.name.clone());
                    }
                }
            }
            _ => out.push(col.output_name()),
        }
    }
    out
}

/// Collects aggregate function calls (keyed by their rendered text) from
/// an expression, without descending into subqueries or window calls.
fn collect_aggregates(
    expr: &Expr,
    registry: &AggregateRegistry,
    out: &mut Vec<(String, FunctionCall)>,
) {
    match expr {
        Expr::Function(call) => {
            if registry.is_aggregate(&call.name) {
                let key = expr.to_string();
                if !out.iter().any(|(k, _)| k == &key) {
                    out.push((key, call.clone()));
                }
            } else {
                for arg in &call.args {
                    collect_aggregates(arg, registry, out);
                }
            }
        }
        Expr::Unary { operand, .. } => collect_aggregates(operand, registry, out),
        Expr::Binary { left, right, .. } => {
            collect_aggregates(left, registry, out);
            collect_aggregates(right, registry, out);
        }
        Expr::Case {
            operand,
            when_clauses,
            else_clause,
        } => {
            if let Some(op) = operand {
                collect_aggregates(op, registry, out);
            }
            for (when, then) in when_clauses {
                collect_aggregates(when, registry, out);
                collect_aggregates(then, registry, out);
            }
            if let Some(e) = else_clause {
                collect_aggregates(e, registry, out);
            }
        }
        Expr::Between {
            expr, low, high, ..
        } => {
            collect_aggregates(expr, registry, out);
            collect_aggregates(low, registry, out);
            collect_aggregates(high, registry, out);
        }
        Expr::InList { expr, list, .. } => {
            collect_aggregates(expr, registry, out);
            for e in list {
                collect_aggregates(e, registry, out);
            }
        }
        Expr::Like { expr, pattern, .. } => {
            collect_aggregates(expr, registry, out);
            collect_aggregates(pattern, registry, out);
        }
        Expr::IsNull { expr, .. } | Expr::InSubquery { expr, .. } => {
            collect_aggregates(expr, registry, out);
        }
        Expr::Quantified { left, .. } => collect_aggregates(left, registry, out),
        Expr::Paren(inner) => collect_aggregates(inner, registry, out),
        Expr::Literal(_)
        | Expr::Column { .. }
        | Expr::Parameter { .. }
        | Expr::Niladic(_)
        | Expr::WindowFunction { .. }
        | Expr::Exists(_)
        | Expr::Subquery(_)
        | Expr::Wildcard { .. } => {}
    }
}

/// Collects window function calls (keyed by their rendered text) from the
/// select list.
fn collect_windows(columns: &[SelectColumn]) -> Vec<(String, FunctionCall, OverClause)> {
    fn walk(expr: &Expr, out: &mut Vec<(String, FunctionCall, OverClause)>) {
        match expr {
            Expr::WindowFunction { call, over } => {
                let key = expr.to_string();
                if !out.iter().any(|(k, _, _)| k == &key) {
                    out.push((key, call.clone(), over.clone()));
                }
            }
            Expr::Unary { operand, .. } => walk(operand, out),
            Expr::Binary { left, right, .. } => {
                walk(left, out);
                walk(right, out);
            }
            Expr::Function(call) => {
                for arg in &call.args {
                    walk(arg, out);
                }
            }
            Expr::Case {
                operand,
                when_clauses,
                else_clause,
            } => {
                if let Some(op) = operand {
                    walk(op, out);
                }
                for (when, then) in when_clauses {
                    walk(when, out);
                    walk(then, out);
                }
                if let Some(e) = else_clause {
                    walk(e, out);
                }
            }
            Expr::Paren(inner) => walk(inner, out),
            _ => {}
        }
    }

    let mut out = vec![];
    for col in columns {
        walk(&col.expr, &mut out);
    }
    out
}
