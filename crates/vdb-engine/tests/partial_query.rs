//! Query-builder laws: immutability, window algebra, barriers, CTE
//! bubbling, and the rendering fast path.

mod common;
use common::*;

use vdb_engine::{Cond, EngineError, Params, Value, Vdb};

#[test]
fn fast_path_returns_original_text_verbatim() {
    let db = users_db();
    let original = "SELECT * FROM users -- keep me\nWHERE age > ?";
    let q = db.query_with(original, Params::positional(vec![20i64]));
    let (sql, params) = q.sql().unwrap();
    assert_eq!(sql, original);
    assert_eq!(params.positional_values(), &[Value::Integer(20)]);
}

#[test]
fn operations_leave_the_original_untouched() {
    let db = users_db();
    let q = db.query("SELECT * FROM users");
    let narrowed = q.limit(3).unwrap();

    // The original still renders verbatim and still sees all rows.
    assert_eq!(q.sql().unwrap().0, "SELECT * FROM users");
    assert_eq!(q.to_array().unwrap().len(), 10);
    assert_eq!(narrowed.to_array().unwrap().len(), 3);
}

#[test]
fn limit_narrows_to_minimum() {
    let db = users_db();
    let q = db.query("SELECT * FROM users");

    let narrowed = q.limit(10).unwrap().limit(5).unwrap();
    assert!(narrowed.sql().unwrap().0.ends_with("LIMIT 5"));
    assert_eq!(narrowed.to_array().unwrap().len(), 5);

    // Widening is clamped.
    let clamped = q.limit(3).unwrap().limit(7).unwrap();
    assert!(clamped.sql().unwrap().0.ends_with("LIMIT 3"));
    assert_eq!(clamped.to_array().unwrap().len(), 3);
}

#[test]
fn offsets_accumulate() {
    let db = users_db();
    let q = db.query("SELECT id FROM users");
    let shifted = q.offset(2).unwrap().offset(3).unwrap();
    let ids: Vec<Value> = shifted.column().unwrap();
    assert_eq!(ids.first(), Some(&Value::Integer(6)));
    assert_eq!(ids.len(), 5);
}

#[test]
fn offset_reduces_limit_to_keep_the_window() {
    let db = users_db();
    let q = db.query("SELECT id FROM users");

    let windowed = q.limit(10).unwrap().offset(3).unwrap();
    let (sql, _) = windowed.sql().unwrap();
    assert!(sql.contains("LIMIT 7"));
    assert!(sql.contains("OFFSET 3"));

    // Rows 4..=10 of the ordered insert.
    let ids: Vec<Value> = windowed.column().unwrap();
    assert_eq!(ids.len(), 7);
    assert_eq!(ids.first(), Some(&Value::Integer(4)));
    assert_eq!(ids.last(), Some(&Value::Integer(10)));
}

#[test]
fn offset_past_limit_empties_the_window() {
    let db = users_db();
    let q = db.query("SELECT id FROM users").limit(2).unwrap().offset(5).unwrap();
    assert_eq!(q.to_array().unwrap().len(), 0);
}

#[test]
fn text_limit_participates_in_narrowing() {
    let db = users_db();
    let q = db.query("SELECT * FROM users LIMIT 10");
    let narrowed = q.limit(5).unwrap();
    assert!(narrowed.sql().unwrap().0.ends_with("LIMIT 5"));
}

#[test]
fn predicate_after_window_inserts_barrier() {
    let db = users_db();
    let q = db
        .query("SELECT * FROM users")
        .limit(5)
        .unwrap()
        .eq("status", "active")
        .unwrap();

    let (sql, _) = q.sql().unwrap();
    // The LIMIT 5 stays inside the derived table; the filter is outside.
    assert!(sql.contains("FROM (SELECT * FROM users LIMIT 5)"), "{sql}");
    assert!(sql.ends_with("WHERE status = 'active'"), "{sql}");

    // Active rows among ids 1..=5: 1, 2, 4.
    let ids: Vec<Value> = q.select(&["id"]).unwrap().column().unwrap();
    assert_eq!(
        ids,
        vec![Value::Integer(1), Value::Integer(2), Value::Integer(4)]
    );
}

#[test]
fn predicate_without_window_merges_into_where() {
    let db = users_db();
    let q = db
        .query("SELECT * FROM users WHERE age > 20")
        .eq("status", "active")
        .unwrap();
    let (sql, _) = q.sql().unwrap();
    assert!(!sql.contains("_q"), "no barrier expected: {sql}");
    assert!(sql.contains("age > 20 AND status = 'active'"), "{sql}");
}

#[test]
fn cte_attaches_and_bubbles_through_barriers() {
    let db = users_db();
    let filtered = db.query("SELECT * FROM users WHERE age > 20");
    let q = db
        .query("SELECT * FROM filtered")
        .with_cte("filtered", &filtered)
        .unwrap()
        .limit(10)
        .unwrap()
        .eq("age", 30i64)
        .unwrap();

    let (sql, _) = q.sql().unwrap();
    assert!(sql.starts_with("WITH filtered AS (SELECT * FROM users WHERE age > 20)"), "{sql}");
    assert!(!sql.contains("FROM (WITH"), "{sql}");
    assert!(!sql.contains("FROM ( WITH"), "{sql}");

    let result = q.to_array().unwrap();
    assert_eq!(result.len(), 1);
    assert_eq!(result[0].get("id"), Some(&Value::Integer(5)));
}

#[test]
fn textual_with_clause_bubbles_too() {
    let db = users_db();
    let q = db
        .query("WITH adults AS (SELECT * FROM users WHERE age >= 21) SELECT * FROM adults")
        .limit(3)
        .unwrap()
        .eq("status", "active")
        .unwrap();
    let (sql, _) = q.sql().unwrap();
    assert!(sql.starts_with("WITH adults AS"), "{sql}");
    assert!(!sql.contains("FROM (WITH"), "{sql}");
    // Adults are ids 2..=10; the first three are 2, 3, 4; actives: 2, 4.
    assert_eq!(q.to_array().unwrap().len(), 2);
}

#[test]
fn cte_name_conflict_is_rejected() {
    let db = users_db();
    let sub = db.query("SELECT * FROM users");
    let q = db.query("SELECT * FROM t").with_cte("t", &sub).unwrap();
    assert!(matches!(
        q.with_cte("t", &sub),
        Err(EngineError::CteConflict(_))
    ));
}

#[test]
fn cte_conflict_with_textual_with_is_rejected() {
    let db = users_db();
    let sub = db.query("SELECT * FROM users");
    let q = db.query("WITH t AS (SELECT 1 AS x) SELECT * FROM t");
    assert!(matches!(
        q.with_cte("t", &sub),
        Err(EngineError::CteConflict(_))
    ));
}

#[test]
fn attached_ctes_merge_from_subquery() {
    let db = users_db();
    let base = db.query("SELECT * FROM users WHERE status = 'active'");
    let level1 = db
        .query("SELECT * FROM actives WHERE age > 20")
        .with_cte("actives", &base)
        .unwrap();
    let level2 = db
        .query("SELECT * FROM grown")
        .with_cte("grown", &level1)
        .unwrap();

    let (sql, _) = level2.sql().unwrap();
    assert!(sql.starts_with("WITH "), "{sql}");
    assert!(sql.contains("actives AS"), "{sql}");
    assert!(sql.contains("grown AS"), "{sql}");
    // Active users older than 20: ids 2, 4, 6..=10.
    assert_eq!(level2.to_array().unwrap().len(), 7);
}

#[test]
fn cross_backend_operations_fail() {
    let db1 = users_db();
    let db2 = users_db();
    let q = db1.query("SELECT * FROM users");
    let foreign = db2.query("SELECT id FROM users");

    assert!(matches!(
        q.with_cte("other", &foreign),
        Err(EngineError::CrossBackend)
    ));
    assert!(matches!(
        q.in_query("id", &foreign),
        Err(EngineError::CrossBackend)
    ));
}

#[test]
fn select_checks_column_availability() {
    let db = users_db();
    let q = db.query("SELECT id, name FROM users");
    assert!(q.select(&["id"]).is_ok());
    assert!(matches!(
        q.select(&["id", "age"]),
        Err(EngineError::ColumnNotAvailable(name)) if name == "age"
    ));
    // After narrowing, previously selectable columns are gone.
    let narrowed = q.select(&["id"]).unwrap();
    assert!(matches!(
        narrowed.eq("name", "ada"),
        Err(EngineError::ColumnNotAvailable(_))
    ));
}

#[test]
fn select_over_star_merges_in_place() {
    let db = users_db();
    let q = db.query("SELECT * FROM users").select(&["id", "name"]).unwrap();
    let (sql, _) = q.sql().unwrap();
    assert_eq!(sql, "SELECT id, name FROM users");
}

#[test]
fn select_over_projection_wraps() {
    let db = users_db();
    let q = db
        .query("SELECT id, name, age FROM users")
        .select(&["id", "age"])
        .unwrap();
    let (sql, _) = q.sql().unwrap();
    assert!(sql.contains("_q"), "expected a barrier: {sql}");
    assert_eq!(q.to_array().unwrap()[0].names().len(), 2);
}

#[test]
fn empty_in_list_is_always_false() {
    let db = users_db();
    let q = db
        .query("SELECT * FROM users")
        .in_list("id", Vec::<i64>::new())
        .unwrap();
    let (sql, _) = q.sql().unwrap();
    assert!(sql.contains("1 = 0"), "{sql}");
    assert!(q.to_array().unwrap().is_empty());
}

#[test]
fn in_query_uses_first_selected_column() {
    let db = users_db();
    with_orders(&db);
    let shipped = db.query("SELECT user_id FROM orders WHERE status = 'shipped'");
    let q = db
        .query("SELECT id FROM users")
        .in_query("id", &shipped)
        .unwrap();
    let ids: Vec<Value> = q.column().unwrap();
    assert_eq!(ids, vec![Value::Integer(1), Value::Integer(4)]);
}

#[test]
fn or_where_groups_disjuncts() {
    let db = users_db();
    let q = db
        .query("SELECT id FROM users")
        .or_where(vec![Cond::eq("id", 2i64), Cond::eq("id", 9i64)])
        .unwrap()
        .gt("id", 1i64)
        .unwrap();
    let ids: Vec<Value> = q.column().unwrap();
    assert_eq!(ids, vec![Value::Integer(2), Value::Integer(9)]);
}

#[test]
fn order_spec_with_direction_prefix() {
    let db = users_db();
    let q = db.query("SELECT id FROM users").order(&["-id"]).unwrap().limit(2).unwrap();
    let ids: Vec<Value> = q.column().unwrap();
    assert_eq!(ids, vec![Value::Integer(10), Value::Integer(9)]);
}

#[test]
fn order_after_window_applies_to_the_slice() {
    let db = users_db();
    // First three rows, then reordered: the slice is fixed before the sort.
    let q = db
        .query("SELECT id FROM users")
        .limit(3)
        .unwrap()
        .order(&["-id"])
        .unwrap();
    let ids: Vec<Value> = q.column().unwrap();
    assert_eq!(
        ids,
        vec![Value::Integer(3), Value::Integer(2), Value::Integer(1)]
    );
}

#[test]
fn matches_evaluates_accumulated_predicates() {
    let db = users_db();
    let q = db
        .query("SELECT * FROM users WHERE age > 20")
        .eq("status", "active")
        .unwrap();

    assert!(q
        .matches(&vdb_engine::row! { "age" => 30, "status" => "active" })
        .unwrap());
    assert!(!q
        .matches(&vdb_engine::row! { "age" => 30, "status" => "inactive" })
        .unwrap());
    assert!(!q
        .matches(&vdb_engine::row! { "age" => 18, "status" => "active" })
        .unwrap());
}

#[test]
fn matches_missing_column_is_a_runtime_error() {
    let db = users_db();
    let q = db.query("SELECT * FROM users WHERE age > 20");
    assert!(matches!(
        q.matches(&vdb_engine::row! { "id" => 1 }),
        Err(EngineError::Runtime(_))
    ));
}

#[test]
fn matches_sees_predicates_behind_barriers() {
    let db = users_db();
    let q = db
        .query("SELECT * FROM users WHERE age > 20")
        .limit(5)
        .unwrap()
        .eq("status", "active")
        .unwrap();
    assert!(q
        .matches(&vdb_engine::row! { "age" => 25, "status" => "active" })
        .unwrap());
    assert!(!q
        .matches(&vdb_engine::row! { "age" => 15, "status" => "active" })
        .unwrap());
}

#[test]
fn consumption_helpers() {
    let db = users_db();
    assert_eq!(db.query("SELECT * FROM users").count().unwrap(), 10);
    assert_eq!(
        db.query("SELECT name FROM users WHERE id = 1").field().unwrap(),
        Value::from("user1")
    );
    assert!(db
        .query("SELECT * FROM users WHERE id = 99")
        .one()
        .unwrap()
        .is_none());
    assert_eq!(
        db.query("SELECT id FROM users WHERE id <= 2").column().unwrap(),
        vec![Value::Integer(1), Value::Integer(2)]
    );
}

#[test]
fn count_respects_the_window() {
    let db = users_db();
    let q = db.query("SELECT * FROM users").limit(4).unwrap();
    assert_eq!(q.count().unwrap(), 4);
}

#[test]
fn hydrator_shapes_rows_without_changing_sql() {
    let db = users_db();
    let q = db.query("SELECT id FROM users WHERE id = 1");
    let shaped = q.with_hydrator(std::rc::Rc::new(|row| {
        let id = row.get("id").cloned().unwrap_or(Value::Null);
        vdb_engine::row! { "doubled" => id.mul(&Value::Integer(2)) }
    }));
    assert_eq!(shaped.sql().unwrap().0, q.sql().unwrap().0);
    let result = shaped.to_array().unwrap();
    assert_eq!(result[0].get("doubled"), Some(&Value::Integer(2)));
}

#[test]
fn display_sql_interpolates_parameters() {
    let db = users_db();
    let q = db
        .query_with("SELECT * FROM users WHERE name = ?", Params::positional(vec!["o'hara"]))
        .limit(1)
        .unwrap();
    let display = q.display_sql().unwrap();
    assert!(display.contains("'o''hara'"), "{display}");
}
