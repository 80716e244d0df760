//! # vdb-engine
//!
//! An embedded, in-process SQL engine executing queries against
//! pluggable table sources, plus a composable, immutable query builder
//! that works uniformly over the engine.
//!
//! ## Querying registered tables
//!
//! ```rust
//! use vdb_engine::{Params, Vdb, Value};
//!
//! let db = Vdb::new();
//! db.exec("CREATE TABLE users (id INTEGER PRIMARY KEY, name TEXT)", Params::none())
//!     .unwrap();
//! db.exec("INSERT INTO users (id, name) VALUES (1, 'ada'), (2, 'bob')", Params::none())
//!     .unwrap();
//!
//! let names: Vec<Value> = db
//!     .query("SELECT name FROM users ORDER BY id")
//!     .column()
//!     .unwrap();
//! assert_eq!(names, vec![Value::from("ada"), Value::from("bob")]);
//! ```
//!
//! ## Composing queries
//!
//! Builders are immutable; limits narrow, offsets accumulate, and
//! operations that cannot merge into the current clause set wrap the
//! query in a subquery barrier:
//!
//! ```rust
//! use vdb_engine::Vdb;
//!
//! let db = Vdb::new();
//! let q = db.query("SELECT * FROM users");
//! let narrowed = q.limit(10).unwrap().limit(5).unwrap();
//! let (sql, _) = narrowed.sql().unwrap();
//! assert!(sql.ends_with("LIMIT 5"));
//! ```

mod error;
mod eval;
mod exec;
mod params;
mod query;
mod row;
mod table;
mod value;
mod vdb;

pub use error::{EngineError, Result};
pub use eval::{AggregateFinalFn, AggregateStepFn};
pub use exec::QueryRows;
pub use params::Params;
pub use query::{Cond, Hydrator, PartialQuery};
pub use row::{CellName, ColumnDef, FromRow, IndexKind, Row, RowId, SourceRow};
pub use table::{
    ArrayTable, ChangeSet, CsvTable, GeneratorTable, MemoryTable, OrderHint, QueryTable,
    RowFactory, Scan, Table,
};
pub use value::{Truth, Value, ValueKey};
pub use vdb::{EngineConfig, Vdb};

/// Builds a [`Row`] from `name => value` pairs.
///
/// ```rust
/// use vdb_engine::{row, Value};
///
/// let r = row! { "id" => 1, "name" => "ada" };
/// assert_eq!(r.get("name"), Some(&Value::from("ada")));
/// ```
#[macro_export]
macro_rules! row {
    ( $( $name:expr => $value:expr ),* $(,)? ) => {
        $crate::Row::from_pairs(vec![
            $( (String::from($name), $crate::Value::from($value)) ),*
        ])
    };
}
