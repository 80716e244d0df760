//! The in-memory, mutable table source.

use std::collections::BTreeMap;

use vdb_sql_core::ast::Expr;

use super::{row_from_changes, ChangeSet, Scan, Table};
use crate::error::{EngineError, Result};
use crate::row::{ColumnDef, IndexKind, Row, RowId, SourceRow};
use crate::value::{Value, ValueKey};

/// A mutable table holding its rows in memory, with O(1)-ish equality
/// lookup on primary and unique columns.
pub struct MemoryTable {
    schema: Vec<ColumnDef>,
    rows: Vec<(RowId, Row)>,
    /// Key maps per unique/primary column: column index -> value -> row id.
    keys: BTreeMap<usize, BTreeMap<ValueKey, RowId>>,
    next_id: u64,
}

impl MemoryTable {
    /// Creates an empty table with the given schema.
    #[must_use]
    pub fn new(schema: Vec<ColumnDef>) -> Self {
        let keys = schema
            .iter()
            .enumerate()
            .filter(|(_, col)| col.index.is_unique())
            .map(|(i, _)| (i, BTreeMap::new()))
            .collect();
        Self {
            schema,
            rows: vec![],
            keys,
            next_id: 1,
        }
    }

    /// Number of live rows.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Returns true when the table holds no rows.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    fn column_index(&self, name: &str) -> Option<usize> {
        self.schema
            .iter()
            .position(|c| c.name.eq_ignore_ascii_case(name))
    }

    fn index_keys(&mut self, id: RowId, row: &Row) -> Result<()> {
        let indexed: Vec<usize> = self.keys.keys().copied().collect();
        for col in indexed {
            let value = row.values()[col].clone();
            if value.is_null() {
                continue;
            }
            let key = ValueKey(vec![value]);
            let map = self.keys.get_mut(&col).expect("key map exists");
            if map.contains_key(&key) {
                return Err(EngineError::runtime(format!(
                    "duplicate value for unique column '{}'",
                    self.schema[col].name
                )));
            }
            map.insert(key, id);
        }
        Ok(())
    }

    fn unindex_keys(&mut self, row: &Row) {
        let indexed: Vec<usize> = self.keys.keys().copied().collect();
        for col in indexed {
            let key = ValueKey(vec![row.values()[col].clone()]);
            if let Some(map) = self.keys.get_mut(&col) {
                map.remove(&key);
            }
        }
    }
}

impl Table for MemoryTable {
    fn schema(&self) -> &[ColumnDef] {
        &self.schema
    }

    fn scan(&self, _filter_hint: Option<&Expr>) -> Result<Scan> {
        // Rows are value-copied: mutation after the scan starts cannot
        // reach already-emitted rows.
        let snapshot: Vec<Result<SourceRow>> = self
            .rows
            .iter()
            .map(|(id, row)| Ok(SourceRow::identified(*id, row.clone())))
            .collect();
        Ok(Scan::unordered(Box::new(snapshot.into_iter())))
    }

    fn index_lookup(&self, column: &str, value: &Value) -> Option<Result<Vec<SourceRow>>> {
        let col = self.column_index(column)?;
        let map = self.keys.get(&col)?;
        if value.is_null() {
            return Some(Ok(vec![]));
        }
        let rows = map
            .get(&ValueKey(vec![value.clone()]))
            .and_then(|id| {
                self.rows
                    .iter()
                    .find(|(rid, _)| rid == id)
                    .map(|(rid, row)| SourceRow::identified(*rid, row.clone()))
            })
            .into_iter()
            .collect();
        Some(Ok(rows))
    }

    fn insert(&mut self, changes: ChangeSet) -> Result<i64> {
        let row = row_from_changes(&self.schema, &changes)?;
        let id = RowId(self.next_id);
        self.index_keys(id, &row)?;
        self.next_id += 1;

        // The reported insert id: an integer primary key value when one
        // was supplied, otherwise the minted row id.
        let insert_id = self
            .schema
            .iter()
            .position(|c| c.index == IndexKind::Primary)
            .and_then(|i| row.values()[i].as_integer())
            .unwrap_or(id.0 as i64);

        self.rows.push((id, row));
        Ok(insert_id)
    }

    fn update(&mut self, updates: Vec<(RowId, ChangeSet)>) -> Result<usize> {
        let mut affected = 0;
        for (id, changes) in updates {
            let Some(pos) = self.rows.iter().position(|(rid, _)| *rid == id) else {
                continue;
            };
            let old = self.rows[pos].1.clone();
            let mut pairs: Vec<(String, Value)> = old
                .names()
                .iter()
                .zip(old.values())
                .map(|(name, value)| (name.name.clone(), value.clone()))
                .collect();
            for (column, value) in changes {
                let Some(i) = pairs
                    .iter()
                    .position(|(name, _)| name.eq_ignore_ascii_case(&column))
                else {
                    return Err(EngineError::Resolution(format!(
                        "unknown column: {column}"
                    )));
                };
                pairs[i].1 = value;
            }
            let new_row = Row::from_pairs(pairs);
            self.unindex_keys(&old);
            self.index_keys(id, &new_row)?;
            self.rows[pos].1 = new_row;
            affected += 1;
        }
        Ok(affected)
    }

    fn delete(&mut self, ids: &[RowId]) -> Result<usize> {
        let mut affected = 0;
        for id in ids {
            let Some(pos) = self.rows.iter().position(|(rid, _)| rid == id) else {
                continue;
            };
            let (_, row) = self.rows.remove(pos);
            self.unindex_keys(&row);
            affected += 1;
        }
        Ok(affected)
    }
}
