//! The database façade: table registry, query entry points, DDL, and
//! user-defined aggregates.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use tracing::debug;
use vdb_sql_core::ast::{CreateTableStatement, DataType, Statement};
use vdb_sql_core::Parser;

use crate::error::{EngineError, Result};
use crate::eval::{AggregateFinalFn, AggregateRegistry, AggregateStepFn, UserAggregate};
use crate::exec::Executor;
use crate::params::Params;
use crate::query::PartialQuery;
use crate::row::{ColumnDef, IndexKind};
use crate::table::{MemoryTable, Table};

static NEXT_BACKEND_ID: AtomicU64 = AtomicU64::new(1);

/// Engine configuration.
#[derive(Debug, Clone, Copy)]
pub struct EngineConfig {
    /// Wall-clock ceiling for a single query; `None` means unlimited.
    pub timeout: Option<Duration>,
    /// Iteration ceiling for recursive CTE fixed points.
    pub recursion_limit: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            timeout: None,
            recursion_limit: 10_000,
        }
    }
}

struct VdbShared {
    id: u64,
    tables: RefCell<HashMap<String, Rc<RefCell<dyn Table>>>>,
    aggregates: RefCell<AggregateRegistry>,
    config: EngineConfig,
}

/// The virtual database: an in-process SQL engine over registered table
/// sources.
///
/// Cloning is cheap and shares the underlying registry; use
/// [`Vdb::with_table`] for a shadowing overlay that leaves the original
/// untouched.
#[derive(Clone)]
pub struct Vdb {
    shared: Rc<VdbShared>,
}

impl Default for Vdb {
    fn default() -> Self {
        Self::new()
    }
}

impl Vdb {
    /// Creates an empty database with default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(EngineConfig::default())
    }

    /// Creates an empty database with the given configuration.
    #[must_use]
    pub fn with_config(config: EngineConfig) -> Self {
        Self {
            shared: Rc::new(VdbShared {
                id: NEXT_BACKEND_ID.fetch_add(1, Ordering::Relaxed),
                tables: RefCell::new(HashMap::new()),
                aggregates: RefCell::new(AggregateRegistry::default()),
                config,
            }),
        }
    }

    /// Registers a table under a case-insensitive name, replacing any
    /// previous registration.
    pub fn register_table(&self, name: &str, table: impl Table + 'static) {
        self.register_shared(name, Rc::new(RefCell::new(table)));
    }

    /// Registers an already-shared table handle.
    pub fn register_shared(&self, name: &str, table: Rc<RefCell<dyn Table>>) {
        self.shared
            .tables
            .borrow_mut()
            .insert(name.to_ascii_lowercase(), table);
    }

    /// Returns a shallow overlay: a new database seeing the same tables
    /// and aggregates, on which further registrations shadow without
    /// touching the original.
    #[must_use]
    pub fn overlay(&self) -> Self {
        Self {
            shared: Rc::new(VdbShared {
                id: NEXT_BACKEND_ID.fetch_add(1, Ordering::Relaxed),
                tables: RefCell::new(self.shared.tables.borrow().clone()),
                aggregates: RefCell::new(self.shared.aggregates.borrow().clone()),
                config: self.shared.config,
            }),
        }
    }

    /// Returns an overlay with one table shadowed. Chain for several.
    #[must_use]
    pub fn with_table(&self, name: &str, table: impl Table + 'static) -> Self {
        let overlay = self.overlay();
        overlay.register_table(name, table);
        overlay
    }

    /// Builds a query over this database.
    #[must_use]
    pub fn query(&self, sql: &str) -> PartialQuery {
        PartialQuery::new(self.clone(), sql, Params::none())
    }

    /// Builds a query with bound parameters.
    #[must_use]
    pub fn query_with(&self, sql: &str, params: impl Into<Params>) -> PartialQuery {
        PartialQuery::new(self.clone(), sql, params.into())
    }

    /// Executes DDL or DML (SELECT is accepted and returns its row
    /// count). Returns the affected-row count, or the last insert id for
    /// INSERT.
    ///
    /// # Errors
    ///
    /// Propagates parse, resolution, and execution errors.
    pub fn exec(&self, sql: &str, params: impl Into<Params>) -> Result<i64> {
        let statement = Parser::new(sql).parse()?;
        debug!(%statement, "exec");
        match statement {
            Statement::CreateTable(create) => self.create_table(&create),
            Statement::DropTable(drop) => {
                let removed = self
                    .shared
                    .tables
                    .borrow_mut()
                    .remove(&drop.name.to_ascii_lowercase())
                    .is_some();
                if !removed && !drop.if_exists {
                    return Err(EngineError::Resolution(format!(
                        "unknown table: {}",
                        drop.name
                    )));
                }
                Ok(0)
            }
            // Index DDL is accepted and ignored.
            Statement::CreateIndex(_) | Statement::DropIndex(_) => Ok(0),
            other => Executor::new(self, params.into()).run_statement(&other),
        }
    }

    fn create_table(&self, create: &CreateTableStatement) -> Result<i64> {
        let key = create.name.to_ascii_lowercase();
        if self.shared.tables.borrow().contains_key(&key) {
            if create.if_not_exists {
                return Ok(0);
            }
            return Err(EngineError::runtime(format!(
                "table '{}' already exists",
                create.name
            )));
        }

        let schema = create
            .columns
            .iter()
            .map(|col| ColumnDef {
                name: col.name.clone(),
                ty: col.ty.unwrap_or(DataType::Text),
                index: if col.primary_key {
                    IndexKind::Primary
                } else if col.unique {
                    IndexKind::Unique
                } else {
                    IndexKind::None
                },
            })
            .collect();
        self.register_table(&create.name, MemoryTable::new(schema));
        Ok(0)
    }

    /// Registers a user-defined aggregate usable from SQL. The step
    /// callback receives the mutable accumulator context and the row's
    /// argument values; finalize consumes the context.
    pub fn create_aggregate(
        &self,
        name: &str,
        step: AggregateStepFn,
        finalize: AggregateFinalFn,
        arity: usize,
    ) {
        self.shared.aggregates.borrow_mut().register(
            name,
            UserAggregate {
                arity,
                step,
                finalize,
            },
        );
    }

    // ---- engine-internal accessors --------------------------------------

    pub(crate) fn table(&self, name: &str) -> Option<Rc<RefCell<dyn Table>>> {
        self.shared
            .tables
            .borrow()
            .get(&name.to_ascii_lowercase())
            .cloned()
    }

    pub(crate) fn aggregates_snapshot(&self) -> AggregateRegistry {
        self.shared.aggregates.borrow().clone()
    }

    pub(crate) fn config(&self) -> &EngineConfig {
        &self.shared.config
    }

    pub(crate) fn backend_id(&self) -> u64 {
        self.shared.id
    }
}
