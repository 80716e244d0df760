#![allow(dead_code)]

use vdb_engine::{Params, Row, Value, Vdb};

/// A database with the reference `users` table:
///
/// ids 1..=10, `name` = "user{id}", `age` = 15 + 3 * id, and `status`
/// "inactive" for ids 3 and 5, "active" otherwise.
pub fn users_db() -> Vdb {
    let db = Vdb::new();
    db.exec(
        "CREATE TABLE users (id INTEGER PRIMARY KEY, name TEXT, age INTEGER, status TEXT)",
        Params::none(),
    )
    .unwrap();
    for id in 1..=10i64 {
        let status = if id == 3 || id == 5 { "inactive" } else { "active" };
        db.exec(
            "INSERT INTO users (id, name, age, status) VALUES (?, ?, ?, ?)",
            Params::positional(vec![
                Value::Integer(id),
                Value::from(format!("user{id}")),
                Value::Integer(15 + 3 * id),
                Value::from(status),
            ]),
        )
        .unwrap();
    }
    db
}

/// Adds an `orders` table: (id, user_id, status). Users 1 and 4 have a
/// shipped order; user 2 has only a pending one.
pub fn with_orders(db: &Vdb) {
    db.exec(
        "CREATE TABLE orders (id INTEGER PRIMARY KEY, user_id INTEGER, status TEXT)",
        Params::none(),
    )
    .unwrap();
    for (id, user_id, status) in [
        (1i64, 1i64, "shipped"),
        (2, 2, "pending"),
        (3, 4, "shipped"),
        (4, 4, "pending"),
    ] {
        db.exec(
            "INSERT INTO orders (id, user_id, status) VALUES (?, ?, ?)",
            Params::positional(vec![
                Value::Integer(id),
                Value::Integer(user_id),
                Value::from(status),
            ]),
        )
        .unwrap();
    }
}

pub fn rows(db: &Vdb, sql: &str) -> Vec<Row> {
    db.query(sql).to_array().unwrap()
}

pub fn ints(db: &Vdb, sql: &str) -> Vec<i64> {
    db.query(sql)
        .column()
        .unwrap()
        .into_iter()
        .map(|v| match v {
            Value::Integer(i) => i,
            other => panic!("expected integer, got {other:?}"),
        })
        .collect()
}

pub fn texts(db: &Vdb, sql: &str) -> Vec<String> {
    db.query(sql)
        .column()
        .unwrap()
        .into_iter()
        .map(|v| match v {
            Value::Text(s) => s,
            other => panic!("expected text, got {other:?}"),
        })
        .collect()
}

pub fn first_value(db: &Vdb, sql: &str) -> Value {
    db.query(sql).field().unwrap()
}
