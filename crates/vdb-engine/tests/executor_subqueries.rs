//! Executor tests: scalar, IN, EXISTS, quantified, and correlated
//! subqueries.

mod common;
use common::*;

use vdb_engine::{EngineError, Value};

#[test]
fn scalar_subquery_value() {
    let db = users_db();
    assert_eq!(
        first_value(&db, "SELECT (SELECT MAX(id) FROM users)"),
        Value::Integer(10)
    );
}

#[test]
fn scalar_subquery_empty_is_null() {
    let db = users_db();
    assert_eq!(
        first_value(&db, "SELECT (SELECT id FROM users WHERE id > 99)"),
        Value::Null
    );
}

#[test]
fn scalar_subquery_multiple_rows_is_error() {
    let db = users_db();
    let result = db.query("SELECT (SELECT id FROM users)").to_array();
    assert!(matches!(
        result,
        Err(EngineError::ScalarSubqueryShape { rows: 10, .. })
    ));
}

#[test]
fn scalar_subquery_multiple_columns_is_error() {
    let db = users_db();
    let result = db
        .query("SELECT (SELECT id, name FROM users WHERE id = 1)")
        .to_array();
    assert!(matches!(
        result,
        Err(EngineError::ScalarSubqueryShape { cols: 2, .. })
    ));
}

#[test]
fn in_subquery() {
    let db = users_db();
    with_orders(&db);
    let result = ints(
        &db,
        "SELECT id FROM users WHERE id IN (SELECT user_id FROM orders WHERE status = 'shipped')",
    );
    assert_eq!(result, vec![1, 4]);
}

#[test]
fn not_in_empty_subquery_is_true() {
    let db = users_db();
    with_orders(&db);
    let result = ints(
        &db,
        "SELECT id FROM users WHERE id NOT IN (SELECT user_id FROM orders WHERE status = 'lost') \
         AND id <= 2",
    );
    assert_eq!(result, vec![1, 2]);
}

#[test]
fn correlated_not_exists() {
    let db = users_db();
    with_orders(&db);
    // Users with no shipped order: everyone but 1 and 4.
    let result = ints(
        &db,
        "SELECT id FROM users u WHERE NOT EXISTS \
         (SELECT 1 FROM orders o WHERE o.user_id = u.id AND o.status = 'shipped')",
    );
    assert_eq!(result, vec![2, 3, 5, 6, 7, 8, 9, 10]);
}

#[test]
fn correlated_scalar_in_select_list() {
    let db = users_db();
    with_orders(&db);
    let result = rows(
        &db,
        "SELECT u.id, (SELECT COUNT(*) FROM orders o WHERE o.user_id = u.id) AS cnt \
         FROM users u WHERE u.id <= 4",
    );
    let counts: Vec<i64> = result
        .iter()
        .map(|row| row.get("cnt").unwrap().as_integer().unwrap())
        .collect();
    assert_eq!(counts, vec![1, 1, 0, 2]);
}

#[test]
fn quantified_all_and_any() {
    let db = users_db();
    assert_eq!(
        first_value(&db, "SELECT 11 > ALL (SELECT id FROM users)"),
        Value::Integer(1)
    );
    assert_eq!(
        first_value(&db, "SELECT 10 > ALL (SELECT id FROM users)"),
        Value::Integer(0)
    );
    assert_eq!(
        first_value(&db, "SELECT 10 = ANY (SELECT id FROM users)"),
        Value::Integer(1)
    );
}

#[test]
fn quantified_over_empty_subquery() {
    let db = users_db();
    assert_eq!(
        first_value(&db, "SELECT 1 = ALL (SELECT id FROM users WHERE id > 99)"),
        Value::Integer(1)
    );
    assert_eq!(
        first_value(&db, "SELECT 1 = ANY (SELECT id FROM users WHERE id > 99)"),
        Value::Integer(0)
    );
}

#[test]
fn derived_table_subquery() {
    let db = users_db();
    let result = ints(
        &db,
        "SELECT id FROM (SELECT id FROM users WHERE status = 'active') a WHERE id < 5",
    );
    assert_eq!(result, vec![1, 2, 4]);
}
