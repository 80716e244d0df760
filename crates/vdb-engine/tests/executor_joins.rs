//! Executor tests: join types, ON vs WHERE, and column qualification.

mod common;
use common::*;

use vdb_engine::{EngineError, Params, Value, Vdb};

fn join_db() -> Vdb {
    let db = users_db();
    with_orders(&db);
    db
}

#[test]
fn inner_join_matches_pairs() {
    let db = join_db();
    let result = rows(
        &db,
        "SELECT u.name, o.status FROM users u INNER JOIN orders o ON o.user_id = u.id \
         WHERE u.id <= 2",
    );
    assert_eq!(result.len(), 2);
    assert_eq!(result[0].get("name"), Some(&Value::from("user1")));
    assert_eq!(result[0].get("status"), Some(&Value::from("shipped")));
}

#[test]
fn left_join_null_completes() {
    let db = join_db();
    let result = rows(
        &db,
        "SELECT u.id, o.id AS order_id FROM users u LEFT JOIN orders o ON o.user_id = u.id \
         WHERE u.id <= 3",
    );
    // user1 one order, user2 one order, user3 none.
    assert_eq!(result.len(), 3);
    assert_eq!(result[2].get("id"), Some(&Value::Integer(3)));
    assert_eq!(result[2].get("order_id"), Some(&Value::Null));
}

#[test]
fn left_join_emits_every_left_row_at_least_once() {
    let db = join_db();
    let result = rows(
        &db,
        "SELECT u.id FROM users u LEFT JOIN orders o ON o.user_id = u.id",
    );
    // 10 users, user4 has two orders: 11 rows.
    assert_eq!(result.len(), 11);
}

#[test]
fn right_join_mirrors_left() {
    let db = join_db();
    let result = rows(
        &db,
        "SELECT o.id AS order_id, u.id FROM orders o RIGHT JOIN users u ON o.user_id = u.id",
    );
    assert_eq!(result.len(), 11);
}

#[test]
fn full_join_ordering() {
    let db = Vdb::new();
    db.exec("CREATE TABLE a (x INTEGER)", Params::none()).unwrap();
    db.exec("CREATE TABLE b (y INTEGER)", Params::none()).unwrap();
    db.exec("INSERT INTO a (x) VALUES (1), (2)", Params::none())
        .unwrap();
    db.exec("INSERT INTO b (y) VALUES (2), (3)", Params::none())
        .unwrap();

    let result = rows(&db, "SELECT a.x, b.y FROM a FULL JOIN b ON a.x = b.y");
    // Matched first, then unmatched left, then unmatched right.
    assert_eq!(result.len(), 3);
    assert_eq!(result[0].get("x"), Some(&Value::Integer(2)));
    assert_eq!(result[0].get("y"), Some(&Value::Integer(2)));
    assert_eq!(result[1].get("x"), Some(&Value::Integer(1)));
    assert_eq!(result[1].get("y"), Some(&Value::Null));
    assert_eq!(result[2].get("x"), Some(&Value::Null));
    assert_eq!(result[2].get("y"), Some(&Value::Integer(3)));
}

#[test]
fn cross_join_cardinality() {
    let db = join_db();
    let result = rows(
        &db,
        "SELECT u.id FROM users u CROSS JOIN orders o WHERE u.id <= 2",
    );
    assert_eq!(result.len(), 8);
}

#[test]
fn on_filters_before_null_completion_where_after() {
    let db = join_db();
    // Filtering shipped in ON keeps every user, null-completing the rest.
    let in_on = rows(
        &db,
        "SELECT u.id, o.id AS order_id FROM users u \
         LEFT JOIN orders o ON o.user_id = u.id AND o.status = 'shipped' \
         WHERE u.id <= 4",
    );
    assert_eq!(in_on.len(), 4);
    assert_eq!(in_on[1].get("order_id"), Some(&Value::Null));

    // The same predicate in WHERE removes the null-completed rows.
    let in_where = rows(
        &db,
        "SELECT u.id, o.id AS order_id FROM users u \
         LEFT JOIN orders o ON o.user_id = u.id \
         WHERE o.status = 'shipped' AND u.id <= 4",
    );
    assert_eq!(in_where.len(), 2);
}

#[test]
fn select_star_over_join_qualifies_columns() {
    let db = join_db();
    let result = db
        .query("SELECT * FROM users u INNER JOIN orders o ON o.user_id = u.id WHERE u.id = 1")
        .rows()
        .unwrap();
    let columns = result.columns().to_vec();
    assert!(columns.contains(&String::from("u.id")));
    assert!(columns.contains(&String::from("o.status")));
}

#[test]
fn ambiguous_unqualified_column_fails() {
    let db = join_db();
    let result = db
        .query("SELECT id FROM users u INNER JOIN orders o ON o.user_id = u.id")
        .to_array();
    assert!(matches!(result, Err(EngineError::Resolution(_))));
}

#[test]
fn index_probe_matches_nested_loop() {
    let db = join_db();
    // users.id is the primary key, so the equality join probes the index.
    let probed = rows(
        &db,
        "SELECT o.id AS order_id, u.name FROM orders o INNER JOIN users u ON u.id = o.user_id",
    );
    assert_eq!(probed.len(), 4);
    assert_eq!(probed[0].get("name"), Some(&Value::from("user1")));

    // Same join forced through the nested loop (no index on user_id).
    let looped = rows(
        &db,
        "SELECT o.id AS order_id, u.name FROM users u INNER JOIN orders o ON u.id = o.user_id",
    );
    assert_eq!(looped.len(), 4);
}

#[test]
fn join_with_derived_table() {
    let db = join_db();
    let result = rows(
        &db,
        "SELECT u.id, s.cnt FROM users u \
         INNER JOIN (SELECT user_id, COUNT(*) AS cnt FROM orders GROUP BY user_id) s \
         ON s.user_id = u.id WHERE u.id = 4",
    );
    assert_eq!(result.len(), 1);
    assert_eq!(result[0].get("cnt"), Some(&Value::Integer(2)));
}
