//! Query execution.
//!
//! The executor walks a parsed statement, pulling rows from table
//! sources and applying the SELECT pipeline stage by stage. It checks
//! the configured deadline at row boundaries so a runaway query
//! surfaces a timeout error.

mod select;
mod source;

use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::rc::Rc;
use std::time::Instant;

use tracing::debug;
use vdb_sql_core::ast::{
    DeleteStatement, InsertStatement, SelectStatement, Statement, UpdateStatement,
};

use crate::error::{EngineError, Result};
use crate::eval::aggregate::AggregateRegistry;
use crate::eval::{Evaluator, Scopes};
use crate::params::Params;
use crate::row::{Row, RowId};
use crate::value::Value;
use crate::vdb::Vdb;

/// A materialized query result, iterable row by row.
pub struct QueryRows {
    columns: Vec<String>,
    iter: std::vec::IntoIter<Row>,
}

impl QueryRows {
    /// The output column names, in order.
    #[must_use]
    pub fn columns(&self) -> &[String] {
        &self.columns
    }
}

impl Iterator for QueryRows {
    type Item = Row;

    fn next(&mut self) -> Option<Row> {
        self.iter.next()
    }
}

/// The internal result shape passed between pipeline stages.
#[derive(Debug, Clone, Default)]
pub(crate) struct ResultSet {
    pub(crate) columns: Vec<String>,
    pub(crate) rows: Vec<Row>,
}

impl ResultSet {
    pub(crate) fn into_rows(self) -> QueryRows {
        QueryRows {
            columns: self.columns,
            iter: self.rows.into_iter(),
        }
    }
}

/// A CTE registered for the duration of the enclosing query.
pub(crate) enum CteEntry {
    /// Not yet referenced; evaluated once on first use.
    Pending(Rc<SelectStatement>),
    /// Materialized rows.
    Ready {
        columns: Vec<String>,
        rows: Rc<Vec<Row>>,
    },
}

pub(crate) type CteFrame = HashMap<String, Rc<RefCell<CteEntry>>>;

/// Executes statements against a database.
pub(crate) struct Executor<'a> {
    db: &'a Vdb,
    params: Params,
    aggregates: AggregateRegistry,
    deadline: Option<Instant>,
    cte_frames: RefCell<Vec<CteFrame>>,
}

impl<'a> Executor<'a> {
    pub(crate) fn new(db: &'a Vdb, params: Params) -> Self {
        let deadline = db.config().timeout.map(|t| Instant::now() + t);
        Self {
            db,
            params,
            aggregates: db.aggregates_snapshot(),
            deadline,
            cte_frames: RefCell::new(vec![]),
        }
    }

    pub(crate) fn db(&self) -> &Vdb {
        self.db
    }

    pub(crate) fn params(&self) -> &Params {
        &self.params
    }

    pub(crate) fn aggregates_registry(&self) -> &AggregateRegistry {
        &self.aggregates
    }

    /// Fails with a timeout error once the deadline has passed. Called at
    /// row boundaries and inside join inner loops.
    pub(crate) fn check_deadline(&self) -> Result<()> {
        match self.deadline {
            Some(deadline) if Instant::now() > deadline => Err(EngineError::Timeout),
            _ => Ok(()),
        }
    }

    pub(crate) fn lookup_cte(&self, name: &str) -> Option<Rc<RefCell<CteEntry>>> {
        let key = name.to_ascii_lowercase();
        let frames = self.cte_frames.borrow();
        frames.iter().rev().find_map(|frame| frame.get(&key).cloned())
    }

    pub(crate) fn push_cte_frame(&self) {
        self.cte_frames.borrow_mut().push(CteFrame::new());
    }

    pub(crate) fn pop_cte_frame(&self) {
        self.cte_frames.borrow_mut().pop();
    }

    pub(crate) fn bind_cte(&self, name: &str, entry: CteEntry) {
        let key = name.to_ascii_lowercase();
        let mut frames = self.cte_frames.borrow_mut();
        let frame = frames.last_mut().expect("a CTE frame is pushed");
        frame.insert(key, Rc::new(RefCell::new(entry)));
    }

    // ---- statement dispatch ---------------------------------------------

    /// Runs a non-DDL statement, returning the affected-row count or the
    /// last insert id (DDL is handled by the façade, which owns the table
    /// registry).
    pub(crate) fn run_statement(&self, stmt: &Statement) -> Result<i64> {
        match stmt {
            Statement::Select(select) => {
                let result = self.run_select(select, &[])?;
                Ok(result.rows.len() as i64)
            }
            Statement::Insert(insert) => self.run_insert(insert),
            Statement::Update(update) => Ok(self.run_update(update)? as i64),
            Statement::Delete(delete) => Ok(self.run_delete(delete)? as i64),
            Statement::CreateTable(_)
            | Statement::DropTable(_)
            | Statement::CreateIndex(_)
            | Statement::DropIndex(_) => Err(EngineError::runtime(
                "DDL statements are handled by the database façade",
            )),
        }
    }

    // ---- DML -------------------------------------------------------------

    fn run_insert(&self, stmt: &InsertStatement) -> Result<i64> {
        let table = self
            .db
            .table(&stmt.table)
            .ok_or_else(|| EngineError::Resolution(format!("unknown table: {}", stmt.table)))?;

        let schema: Vec<String> = table
            .borrow()
            .schema()
            .iter()
            .map(|c| c.name.clone())
            .collect();

        let columns: Vec<String> = if stmt.columns.is_empty() {
            schema
        } else {
            stmt.columns.clone()
        };

        let scopes: &Scopes<'_> = &[];
        let eval = Evaluator::new(self, scopes);
        let mut last_id = 0;
        for tuple in &stmt.rows {
            self.check_deadline()?;
            if tuple.len() != columns.len() {
                return Err(EngineError::runtime(format!(
                    "INSERT expects {} value(s) per row, got {}",
                    columns.len(),
                    tuple.len()
                )));
            }
            let changes = columns
                .iter()
                .zip(tuple)
                .map(|(name, expr)| Ok((name.clone(), eval.eval(expr)?)))
                .collect::<Result<Vec<_>>>()?;
            last_id = table
                .borrow_mut()
                .insert(changes)
                .map_err(|e| rename_read_only(e, &stmt.table))?;
        }
        debug!(table = %stmt.table, rows = stmt.rows.len(), "insert");
        Ok(last_id)
    }

    fn run_update(&self, stmt: &UpdateStatement) -> Result<usize> {
        let table = self
            .db
            .table(&stmt.table)
            .ok_or_else(|| EngineError::Resolution(format!("unknown table: {}", stmt.table)))?;

        let mut updates: Vec<(RowId, Vec<(String, Value)>)> = vec![];
        for entry in self.collect_targets(&table, &stmt.table, stmt.where_clause.as_ref())? {
            let (id, row) = entry;
            let scope_row = row;
            let scopes: Vec<&Row> = vec![&scope_row];
            let eval = Evaluator::new(self, &scopes);
            let changes = stmt
                .assignments
                .iter()
                .map(|a| Ok((a.column.clone(), eval.eval(&a.value)?)))
                .collect::<Result<Vec<_>>>()?;
            updates.push((id, changes));
        }

        let affected = table
            .borrow_mut()
            .update(updates)
            .map_err(|e| rename_read_only(e, &stmt.table))?;
        debug!(table = %stmt.table, affected, "update");
        Ok(affected)
    }

    fn run_delete(&self, stmt: &DeleteStatement) -> Result<usize> {
        let table = self
            .db
            .table(&stmt.table)
            .ok_or_else(|| EngineError::Resolution(format!("unknown table: {}", stmt.table)))?;

        let ids: Vec<RowId> = self
            .collect_targets(&table, &stmt.table, stmt.where_clause.as_ref())?
            .into_iter()
            .map(|(id, _)| id)
            .collect();

        let affected = table
            .borrow_mut()
            .delete(&ids)
            .map_err(|e| rename_read_only(e, &stmt.table))?;
        debug!(table = %stmt.table, affected, "delete");
        Ok(affected)
    }

    /// Scans a table for DML, applying the WHERE predicate and collecting
    /// source row ids. Duplicate or missing ids are a runtime error.
    fn collect_targets(
        &self,
        table: &Rc<RefCell<dyn crate::table::Table>>,
        table_name: &str,
        where_clause: Option<&vdb_sql_core::ast::Expr>,
    ) -> Result<Vec<(RowId, Row)>> {
        let scan = table.borrow().scan(where_clause)?;
        let mut seen = HashSet::new();
        let mut targets = vec![];
        for source_row in scan.rows {
            self.check_deadline()?;
            let source_row = source_row?;
            let row = source_row.row.qualified(table_name);

            if let Some(predicate) = where_clause {
                let scopes: Vec<&Row> = vec![&row];
                let eval = Evaluator::new(self, &scopes);
                if !eval.truth(predicate)?.is_true() {
                    continue;
                }
            }

            // A source that cannot present stable row ids refuses mutation.
            let id = source_row
                .id
                .ok_or_else(|| EngineError::ReadOnlyTable(String::from(table_name)))?;
            if !seen.insert(id) {
                return Err(EngineError::runtime(format!(
                    "table '{table_name}' produced duplicate row id {}",
                    id.0
                )));
            }
            targets.push((id, row));
        }
        Ok(targets)
    }
}

fn rename_read_only(err: EngineError, table: &str) -> EngineError {
    match err {
        EngineError::ReadOnlyTable(_) => EngineError::ReadOnlyTable(String::from(table)),
        other => other,
    }
}
