//! Executor tests: the SELECT pipeline over registered tables.

mod common;
use common::*;

use vdb_engine::{EngineError, Params, Value, Vdb};

#[test]
fn select_star_preserves_insertion_order() {
    let db = users_db();
    let result = rows(&db, "SELECT * FROM users");
    assert_eq!(result.len(), 10);
    assert_eq!(result[0].get("name"), Some(&Value::from("user1")));
    assert_eq!(result[9].get("id"), Some(&Value::Integer(10)));
}

#[test]
fn where_keeps_only_true_rows() {
    let db = users_db();
    let result = ints(&db, "SELECT id FROM users WHERE status = 'inactive'");
    assert_eq!(result, vec![3, 5]);
}

#[test]
fn where_with_null_comparison_matches_nothing() {
    let db = users_db();
    let result = rows(&db, "SELECT id FROM users WHERE age = NULL");
    assert!(result.is_empty());
}

#[test]
fn null_eq_null_in_select_list_is_true() {
    // Dialect quirk: literal NULL = NULL is TRUE in the select list only.
    let db = users_db();
    assert_eq!(
        first_value(&db, "SELECT NULL = NULL"),
        Value::Integer(1)
    );
    assert!(rows(&db, "SELECT id FROM users WHERE NULL = NULL").is_empty());
}

#[test]
fn arithmetic_semantics() {
    let db = users_db();
    assert_eq!(first_value(&db, "SELECT 6 / 2"), Value::Integer(3));
    assert_eq!(first_value(&db, "SELECT 7 / 2"), Value::Float(3.5));
    assert_eq!(first_value(&db, "SELECT 1 / 0"), Value::Null);
    assert_eq!(first_value(&db, "SELECT 7 % 0"), Value::Null);
    assert_eq!(first_value(&db, "SELECT -2 ** 2"), Value::Integer(-4));
    assert_eq!(
        first_value(&db, "SELECT 'a' || 1 || NULL"),
        Value::Null
    );
    assert_eq!(first_value(&db, "SELECT 1 + NULL"), Value::Null);
}

#[test]
fn order_by_desc_and_expression() {
    let db = users_db();
    let result = ints(&db, "SELECT id FROM users ORDER BY id DESC LIMIT 3");
    assert_eq!(result, vec![10, 9, 8]);

    let result = ints(&db, "SELECT id FROM users ORDER BY 0 - id LIMIT 2");
    assert_eq!(result, vec![10, 9]);
}

#[test]
fn nulls_sort_first_ascending_last_descending() {
    let db = Vdb::new();
    db.exec("CREATE TABLE t (x INTEGER)", Params::none()).unwrap();
    db.exec(
        "INSERT INTO t (x) VALUES (2), (NULL), (1)",
        Params::none(),
    )
    .unwrap();

    let asc = rows(&db, "SELECT x FROM t ORDER BY x ASC");
    assert_eq!(asc[0].get("x"), Some(&Value::Null));
    let desc = rows(&db, "SELECT x FROM t ORDER BY x DESC");
    assert_eq!(desc[2].get("x"), Some(&Value::Null));
}

#[test]
fn limit_offset_slice() {
    let db = users_db();
    assert_eq!(
        ints(&db, "SELECT id FROM users LIMIT 3 OFFSET 2"),
        vec![3, 4, 5]
    );
    assert_eq!(ints(&db, "SELECT id FROM users LIMIT 0"), Vec::<i64>::new());
}

#[test]
fn distinct_deduplicates() {
    let db = users_db();
    let result = texts(&db, "SELECT DISTINCT status FROM users");
    assert_eq!(result, vec![String::from("active"), String::from("inactive")]);
}

#[test]
fn group_by_with_having() {
    let db = users_db();
    let result = rows(
        &db,
        "SELECT status, COUNT(*) AS cnt FROM users GROUP BY status HAVING COUNT(*) > 2",
    );
    assert_eq!(result.len(), 1);
    assert_eq!(result[0].get("status"), Some(&Value::from("active")));
    assert_eq!(result[0].get("cnt"), Some(&Value::Integer(8)));
}

#[test]
fn aggregates_over_all_rows() {
    let db = users_db();
    let row = rows(
        &db,
        "SELECT COUNT(*) AS n, SUM(age) AS total, AVG(id) AS mid, MIN(id) AS lo, MAX(id) AS hi \
         FROM users",
    );
    assert_eq!(row[0].get("n"), Some(&Value::Integer(10)));
    // sum(15 + 3i) for i in 1..=10 = 150 + 3 * 55
    assert_eq!(row[0].get("total"), Some(&Value::Integer(315)));
    assert_eq!(row[0].get("mid"), Some(&Value::Float(5.5)));
    assert_eq!(row[0].get("lo"), Some(&Value::Integer(1)));
    assert_eq!(row[0].get("hi"), Some(&Value::Integer(10)));
}

#[test]
fn aggregates_over_empty_input() {
    let db = users_db();
    let row = rows(
        &db,
        "SELECT COUNT(*) AS n, SUM(age) AS total FROM users WHERE id > 99",
    );
    assert_eq!(row.len(), 1);
    assert_eq!(row[0].get("n"), Some(&Value::Integer(0)));
    assert_eq!(row[0].get("total"), Some(&Value::Null));
}

#[test]
fn count_distinct() {
    let db = users_db();
    assert_eq!(
        first_value(&db, "SELECT COUNT(DISTINCT status) FROM users"),
        Value::Integer(2)
    );
}

#[test]
fn group_by_null_keys_group_together() {
    let db = Vdb::new();
    db.exec("CREATE TABLE t (k TEXT, v INTEGER)", Params::none())
        .unwrap();
    db.exec(
        "INSERT INTO t (k, v) VALUES (NULL, 1), ('a', 2), (NULL, 3)",
        Params::none(),
    )
    .unwrap();
    let result = rows(&db, "SELECT k, SUM(v) AS s FROM t GROUP BY k");
    assert_eq!(result.len(), 2);
    assert_eq!(result[0].get("s"), Some(&Value::Integer(4)));
}

#[test]
fn union_dedupes_union_all_preserves() {
    let db = users_db();
    assert_eq!(
        ints(
            &db,
            "SELECT id FROM users WHERE id <= 2 UNION SELECT id FROM users WHERE id <= 2"
        )
        .len(),
        2
    );
    assert_eq!(
        ints(
            &db,
            "SELECT id FROM users WHERE id <= 2 UNION ALL SELECT id FROM users WHERE id <= 2"
        ),
        vec![1, 2, 1, 2]
    );
}

#[test]
fn intersect_and_except() {
    let db = users_db();
    assert_eq!(
        ints(
            &db,
            "SELECT id FROM users WHERE id <= 5 INTERSECT SELECT id FROM users WHERE id >= 4"
        ),
        vec![4, 5]
    );
    assert_eq!(
        ints(
            &db,
            "SELECT id FROM users WHERE id <= 5 EXCEPT SELECT id FROM users WHERE id >= 4"
        ),
        vec![1, 2, 3]
    );
}

#[test]
fn compound_with_order_and_limit() {
    let db = users_db();
    let result = ints(
        &db,
        "SELECT id FROM users WHERE id <= 3 UNION SELECT id FROM users WHERE id >= 8 \
         ORDER BY id DESC LIMIT 4",
    );
    assert_eq!(result, vec![10, 9, 8, 3]);
}

#[test]
fn case_between_in_like() {
    let db = users_db();
    assert_eq!(
        ints(&db, "SELECT id FROM users WHERE id BETWEEN 2 AND 4"),
        vec![2, 3, 4]
    );
    assert_eq!(
        ints(&db, "SELECT id FROM users WHERE id IN (1, 9, 42)"),
        vec![1, 9]
    );
    assert_eq!(
        ints(&db, "SELECT id FROM users WHERE name LIKE 'USER1%'"),
        vec![1, 10]
    );
    let labels = texts(
        &db,
        "SELECT CASE WHEN id < 3 THEN 'low' ELSE 'high' END FROM users WHERE id <= 4",
    );
    assert_eq!(labels, vec!["low", "low", "high", "high"]);
}

#[test]
fn builtin_string_and_numeric_functions() {
    let db = users_db();
    assert_eq!(first_value(&db, "SELECT UPPER('ada')"), Value::from("ADA"));
    assert_eq!(
        first_value(&db, "SELECT SUBSTR('hello', 2, 3)"),
        Value::from("ell")
    );
    assert_eq!(
        first_value(&db, "SELECT REPLACE('aaa', 'a', 'b')"),
        Value::from("bbb")
    );
    assert_eq!(first_value(&db, "SELECT INSTR('hello', 'lo')"), Value::Integer(4));
    assert_eq!(first_value(&db, "SELECT ABS(-3)"), Value::Integer(3));
    assert_eq!(
        first_value(&db, "SELECT COALESCE(NULL, NULL, 7)"),
        Value::Integer(7)
    );
    assert_eq!(
        first_value(&db, "SELECT IFNULL(NULL, 'x')"),
        Value::from("x")
    );
    assert_eq!(first_value(&db, "SELECT NULLIF(3, 3)"), Value::Null);
}

#[test]
fn current_timestamp_formats() {
    let db = users_db();
    let Value::Text(date) = first_value(&db, "SELECT CURRENT_DATE") else {
        panic!("expected text");
    };
    assert_eq!(date.len(), 10);
    let Value::Text(ts) = first_value(&db, "SELECT CURRENT_TIMESTAMP") else {
        panic!("expected text");
    };
    assert_eq!(ts.len(), 19);
}

#[test]
fn recursive_cte_counter() {
    let db = Vdb::new();
    let result = ints(
        &db,
        "WITH RECURSIVE nums AS (SELECT 1 AS n UNION ALL SELECT n + 1 FROM nums WHERE n < 5) \
         SELECT n FROM nums",
    );
    assert_eq!(result, vec![1, 2, 3, 4, 5]);
}

#[test]
fn recursive_cte_union_dedupes() {
    let db = Vdb::new();
    // Without ALL, revisiting 1 must not loop forever.
    let result = ints(
        &db,
        "WITH RECURSIVE loopy AS (SELECT 1 AS n UNION SELECT 3 - n FROM loopy) \
         SELECT n FROM loopy",
    );
    assert_eq!(result, vec![1, 2]);
}

#[test]
fn non_recursive_cte_referenced_twice() {
    let db = users_db();
    let result = ints(
        &db,
        "WITH actives AS (SELECT id FROM users WHERE status = 'active') \
         SELECT id FROM actives WHERE id < 3 UNION ALL SELECT id FROM actives WHERE id > 9",
    );
    assert_eq!(result, vec![1, 2, 10]);
}

#[test]
fn window_row_number_preserves_input_order() {
    let db = users_db();
    let result = rows(
        &db,
        "SELECT name, ROW_NUMBER() OVER (ORDER BY id) AS rn FROM users",
    );
    assert_eq!(result.len(), 10);
    for (i, row) in result.iter().enumerate() {
        assert_eq!(row.get("rn"), Some(&Value::Integer(i as i64 + 1)));
        assert_eq!(row.get("name"), Some(&Value::from(format!("user{}", i + 1))));
    }
}

#[test]
fn window_rank_and_dense_rank() {
    let db = Vdb::new();
    db.exec("CREATE TABLE scores (player TEXT, pts INTEGER)", Params::none())
        .unwrap();
    db.exec(
        "INSERT INTO scores (player, pts) VALUES ('a', 10), ('b', 10), ('c', 8), ('d', 8), ('e', 5)",
        Params::none(),
    )
    .unwrap();

    let result = rows(
        &db,
        "SELECT player, RANK() OVER (ORDER BY pts DESC) AS r, \
         DENSE_RANK() OVER (ORDER BY pts DESC) AS dr FROM scores",
    );
    let ranks: Vec<(i64, i64)> = result
        .iter()
        .map(|row| {
            (
                row.get("r").unwrap().as_integer().unwrap(),
                row.get("dr").unwrap().as_integer().unwrap(),
            )
        })
        .collect();
    assert_eq!(ranks, vec![(1, 1), (1, 1), (3, 2), (3, 2), (5, 3)]);
}

#[test]
fn window_partition_by() {
    let db = users_db();
    let result = rows(
        &db,
        "SELECT id, ROW_NUMBER() OVER (PARTITION BY status ORDER BY id) AS rn FROM users",
    );
    // id 3 is the first inactive user, id 5 the second.
    let by_id: Vec<(i64, i64)> = result
        .iter()
        .map(|row| {
            (
                row.get("id").unwrap().as_integer().unwrap(),
                row.get("rn").unwrap().as_integer().unwrap(),
            )
        })
        .collect();
    assert!(by_id.contains(&(3, 1)));
    assert!(by_id.contains(&(5, 2)));
    assert!(by_id.contains(&(1, 1)));
    assert!(by_id.contains(&(2, 2)));
}

#[test]
fn boolean_surfaces_as_integer() {
    let db = users_db();
    assert_eq!(first_value(&db, "SELECT 1 < 2"), Value::Integer(1));
    assert_eq!(first_value(&db, "SELECT 1 > 2"), Value::Integer(0));
}

#[test]
fn unknown_table_and_column_errors() {
    let db = users_db();
    assert!(matches!(
        db.query("SELECT * FROM missing").to_array(),
        Err(EngineError::Resolution(_))
    ));
    assert!(matches!(
        db.query("SELECT nope FROM users").to_array(),
        Err(EngineError::Resolution(_))
    ));
}

#[test]
fn named_parameters() {
    let db = users_db();
    let result = db
        .query_with(
            "SELECT id FROM users WHERE age > :min AND age < :max",
            Params::none().bind("min", 20i64).bind("max", 28i64),
        )
        .to_array()
        .unwrap();
    // ages 21, 24, 27 -> ids 2, 3, 4
    assert_eq!(result.len(), 3);
}
