//! Façade tests: DDL, DML counts, table shadowing, user aggregates, and
//! the query timeout.

mod common;
use common::*;

use std::rc::Rc;
use std::time::Duration;

use vdb_engine::{
    row, ArrayTable, ColumnDef, EngineConfig, EngineError, Params, Value, Vdb,
};
use vdb_sql_core::ast::DataType;

#[test]
fn create_insert_update_delete_counts() {
    let db = Vdb::new();
    assert_eq!(
        db.exec(
            "CREATE TABLE notes (id INTEGER PRIMARY KEY, body TEXT)",
            Params::none()
        )
        .unwrap(),
        0
    );
    let last_id = db
        .exec(
            "INSERT INTO notes (id, body) VALUES (1, 'a'), (2, 'b'), (3, 'c')",
            Params::none(),
        )
        .unwrap();
    assert_eq!(last_id, 3);

    let affected = db
        .exec("UPDATE notes SET body = 'x' WHERE id >= 2", Params::none())
        .unwrap();
    assert_eq!(affected, 2);

    let affected = db
        .exec("DELETE FROM notes WHERE id = 1", Params::none())
        .unwrap();
    assert_eq!(affected, 1);
    assert_eq!(db.query("SELECT * FROM notes").count().unwrap(), 2);
}

#[test]
fn update_expressions_see_the_old_row() {
    let db = users_db();
    db.exec("UPDATE users SET age = age + 100 WHERE id <= 2", Params::none())
        .unwrap();
    assert_eq!(
        ints(&db, "SELECT age FROM users WHERE id <= 2"),
        vec![118, 121]
    );
}

#[test]
fn create_table_if_not_exists() {
    let db = Vdb::new();
    db.exec("CREATE TABLE t (x INTEGER)", Params::none()).unwrap();
    assert!(db.exec("CREATE TABLE t (x INTEGER)", Params::none()).is_err());
    assert_eq!(
        db.exec("CREATE TABLE IF NOT EXISTS t (x INTEGER)", Params::none())
            .unwrap(),
        0
    );
}

#[test]
fn drop_table_semantics() {
    let db = Vdb::new();
    db.exec("CREATE TABLE t (x INTEGER)", Params::none()).unwrap();
    assert_eq!(db.exec("DROP TABLE t", Params::none()).unwrap(), 0);
    assert!(matches!(
        db.exec("DROP TABLE t", Params::none()),
        Err(EngineError::Resolution(_))
    ));
    assert_eq!(db.exec("DROP TABLE IF EXISTS t", Params::none()).unwrap(), 0);
}

#[test]
fn index_ddl_is_accepted_and_ignored() {
    let db = users_db();
    assert_eq!(
        db.exec("CREATE INDEX idx_age ON users (age)", Params::none())
            .unwrap(),
        0
    );
    assert_eq!(db.exec("DROP INDEX idx_age", Params::none()).unwrap(), 0);
}

#[test]
fn table_names_are_case_insensitive() {
    let db = users_db();
    assert_eq!(rows(&db, "SELECT * FROM USERS").len(), 10);
    assert_eq!(rows(&db, "SELECT * FROM Users").len(), 10);
}

#[test]
fn registration_replaces() {
    let db = Vdb::new();
    db.register_table(
        "t",
        ArrayTable::new(
            vec![ColumnDef::new("n", DataType::Integer)],
            vec![row! { "n" => 1 }],
        ),
    );
    db.register_table(
        "T",
        ArrayTable::new(
            vec![ColumnDef::new("n", DataType::Integer)],
            vec![row! { "n" => 2 }, row! { "n" => 3 }],
        ),
    );
    assert_eq!(ints(&db, "SELECT n FROM t"), vec![2, 3]);
}

#[test]
fn with_table_shadows_without_touching_original() {
    let db = users_db();
    let shadowed = db.with_table(
        "users",
        ArrayTable::new(
            vec![ColumnDef::new("id", DataType::Integer)],
            vec![row! { "id" => 99 }],
        ),
    );

    assert_eq!(ints(&shadowed, "SELECT id FROM users"), vec![99]);
    // The original is untouched.
    assert_eq!(rows(&db, "SELECT * FROM users").len(), 10);
}

#[test]
fn with_table_preserves_registered_aggregates() {
    let db = users_db();
    db.create_aggregate(
        "product",
        Rc::new(|state: &mut Value, args: &[Value]| {
            let current = state.as_integer().unwrap_or(1);
            if let Some(v) = args[0].as_integer() {
                *state = Value::Integer(current * v);
            }
        }),
        Rc::new(|state| state),
        1,
    );

    assert_eq!(
        first_value(&db, "SELECT PRODUCT(id) FROM users WHERE id <= 4"),
        Value::Integer(24)
    );

    let shadowed = db.with_table(
        "extra",
        ArrayTable::new(vec![ColumnDef::new("n", DataType::Integer)], vec![]),
    );
    assert_eq!(
        first_value(&shadowed, "SELECT PRODUCT(id) FROM users WHERE id <= 3"),
        Value::Integer(6)
    );
}

#[test]
fn user_aggregate_in_group_by() {
    let db = users_db();
    db.create_aggregate(
        "product",
        Rc::new(|state: &mut Value, args: &[Value]| {
            let current = state.as_integer().unwrap_or(1);
            if let Some(v) = args[0].as_integer() {
                *state = Value::Integer(current * v);
            }
        }),
        Rc::new(|state| state),
        1,
    );
    let result = rows(
        &db,
        "SELECT status, PRODUCT(id) AS p FROM users WHERE id <= 5 GROUP BY status",
    );
    // active: 1 * 2 * 4 = 8; inactive: 3 * 5 = 15.
    assert_eq!(result[0].get("p"), Some(&Value::Integer(8)));
    assert_eq!(result[1].get("p"), Some(&Value::Integer(15)));
}

#[test]
fn query_timeout_aborts() {
    let db = Vdb::with_config(EngineConfig {
        timeout: Some(Duration::ZERO),
        ..EngineConfig::default()
    });
    let result = db
        .query(
            "WITH RECURSIVE nums AS (SELECT 1 AS n UNION ALL SELECT n + 1 FROM nums WHERE n < 100000) \
             SELECT COUNT(*) FROM nums",
        )
        .to_array();
    assert!(matches!(result, Err(EngineError::Timeout)));
}

#[test]
fn recursion_limit_bounds_runaway_ctes() {
    let db = Vdb::with_config(EngineConfig {
        recursion_limit: 50,
        ..EngineConfig::default()
    });
    let result = db
        .query(
            "WITH RECURSIVE nums AS (SELECT 1 AS n UNION ALL SELECT n + 1 FROM nums) \
             SELECT COUNT(*) FROM nums",
        )
        .to_array();
    assert!(matches!(result, Err(EngineError::Runtime(_))));
}

#[test]
fn exec_select_returns_row_count() {
    let db = users_db();
    assert_eq!(
        db.exec("SELECT * FROM users WHERE id <= 4", Params::none())
            .unwrap(),
        4
    );
}

#[test]
fn positional_params_in_exec() {
    let db = users_db();
    let affected = db
        .exec(
            "DELETE FROM users WHERE id > ?",
            Params::positional(vec![8i64]),
        )
        .unwrap();
    assert_eq!(affected, 2);
}
