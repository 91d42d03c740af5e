//! Statement execution against the mock driver.
//!
//! Covers placeholder rewriting as seen by the driver, positional binding,
//! prepared-form caching and failure handling.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

use sqlbind_client::{
    BoundStatement, Column, Concurrency, Error, PlaceholderStyle, ResultSet, ResultSetMode,
    Scroll, Value,
};
use sqlbind_testing::{MockConnection, MockEvent, init_tracing};

const ORDERED: &str = "select * from T where a=:v and b=:v order by $ord";

fn ordered() -> BoundStatement {
    let mut stmt = BoundStatement::from_sql("ordered", ORDERED);
    stmt.bind_literal("ord", "name").unwrap();
    stmt
}

// =============================================================================
// Rewriting and binding
// =============================================================================

#[tokio::test]
async fn test_scalar_bound_at_every_occurrence() {
    init_tracing();
    let mut conn = MockConnection::new();
    let recorder = conn.recorder();

    let mut stmt = ordered();
    stmt.bind("v", 5).unwrap();
    stmt.execute_query(&mut conn).await.unwrap();

    assert_eq!(
        recorder.prepared_sql(),
        ["select * from T where a=? and b=? order by name"]
    );
    assert_eq!(stmt.prepared_ordering().unwrap(), ["v", "v"]);
    assert_eq!(recorder.executions(), [vec![Value::Int(5), Value::Int(5)]]);
}

#[tokio::test]
async fn test_sequence_expands_independently_at_each_occurrence() {
    let mut conn = MockConnection::new();
    let recorder = conn.recorder();

    let mut stmt = ordered();
    stmt.bind_seq("v", [1, 2, 3]).unwrap();
    stmt.execute(&mut conn).await.unwrap();

    assert_eq!(
        recorder.prepared_sql(),
        ["select * from T where a=?,?,? and b=?,?,? order by name"]
    );
    let expected: Vec<Value> = [1, 2, 3, 1, 2, 3].into_iter().map(Value::Int).collect();
    assert_eq!(recorder.executions(), [expected]);
}

#[tokio::test]
async fn test_unbound_variable_prepares_nothing() {
    let mut conn = MockConnection::new();
    let recorder = conn.recorder();

    let mut stmt = ordered();
    let err = stmt.execute(&mut conn).await.unwrap_err();

    assert!(matches!(err, Error::UnboundVariable { ref name, .. } if name == "v"));
    assert_eq!(err.statement(), Some("ordered"));
    assert!(recorder.events().is_empty());
    assert!(!stmt.is_prepared());
}

#[tokio::test]
async fn test_numbered_marker_styles() {
    let mut stmt = BoundStatement::from_sql("numbered", "select :a, :ids, :a");
    stmt.bind("a", "x").unwrap().bind_seq("ids", [7_i64, 8]).unwrap();

    let mut at = MockConnection::with_style(PlaceholderStyle::AtNumbered);
    stmt.execute(&mut at).await.unwrap();
    assert_eq!(at.recorder().prepared_sql(), ["select @p1, @p2,@p3, @p4"]);

    let mut dollar = MockConnection::with_style(PlaceholderStyle::DollarNumbered);
    stmt.execute(&mut dollar).await.unwrap();
    assert_eq!(dollar.recorder().prepared_sql(), ["select $1, $2,$3, $4"]);
    assert_eq!(
        dollar.recorder().executions()[0],
        [
            Value::from("x"),
            Value::Long(7),
            Value::Long(8),
            Value::from("x")
        ]
    );
}

#[tokio::test]
async fn test_null_and_object_values_rejected_before_execution() {
    let mut conn = MockConnection::new();
    let recorder = conn.recorder();

    let mut stmt = BoundStatement::from_sql("nulls", "update T set a = :a where id = :id");
    stmt.bind("id", 1).unwrap().bind_opt::<i32>("a", None).unwrap();
    let err = stmt.execute(&mut conn).await.unwrap_err();
    assert!(matches!(err, Error::NullBindRejected { ref name, .. } if name == "a"));
    assert!(!stmt.is_prepared());

    stmt.bind("a", Value::object(serde_json::json!({"nested": true})))
        .unwrap();
    let err = stmt.execute(&mut conn).await.unwrap_err();
    assert!(matches!(err, Error::TypeMismatch { ref name, .. } if name == "a"));

    assert!(recorder.executions().is_empty());
}

#[tokio::test]
async fn test_empty_sequence_rejected() {
    let mut conn = MockConnection::new();
    let mut stmt = BoundStatement::from_sql("empty", "select * from T where id in (:ids)");
    stmt.bind_seq("ids", Vec::<i32>::new()).unwrap();

    let err = stmt.execute(&mut conn).await.unwrap_err();
    assert!(matches!(err, Error::EmptySequence { ref name, .. } if name == "ids"));
    assert_eq!(conn.recorder().prepare_count(), 0);
}

#[tokio::test]
async fn test_standard_dynamic_clauses() {
    let mut conn = MockConnection::new();
    let recorder = conn.recorder();

    let mut stmt = BoundStatement::from_sql(
        "dynamic",
        "select $selectclause from $fromclause $joinclause where $whereclause order by $orderclause",
    );
    stmt.bind_literal_list("selectclause", ["u.id", "u.name"])
        .unwrap()
        .bind_literal("fromclause", "users u")
        .unwrap()
        .bind_literal("joinclause", "")
        .unwrap()
        .bind_literal("whereclause", "u.tenant = :tenant")
        .unwrap()
        .bind_literal("orderclause", "u.name")
        .unwrap()
        .bind("tenant", 3)
        .unwrap();

    stmt.execute_query(&mut conn).await.unwrap();
    assert_eq!(
        recorder.prepared_sql(),
        ["select u.id, u.name from users u  where u.tenant = ? order by u.name"]
    );
}

#[tokio::test]
async fn test_query_returns_driver_rows() {
    let mut conn = MockConnection::new();
    conn.recorder().push_result(ResultSet::new(
        vec![Column::new("id", 0, "INT"), Column::new("name", 1, "VARCHAR")],
        vec![
            vec![Value::Int(1), Value::from("alice")],
            vec![Value::Int(2), Value::from("bob")],
        ],
    ));

    let mut stmt = BoundStatement::from_sql("users", "select id, name from users where tenant = :t");
    stmt.bind("t", 1).unwrap();
    let rows = stmt.execute_query(&mut conn).await.unwrap();

    let names: Vec<String> = rows
        .rows()
        .iter()
        .map(|r| r.get_by_name("name").unwrap())
        .collect();
    assert_eq!(names, ["alice", "bob"]);
}

// =============================================================================
// Prepared-form caching
// =============================================================================

#[tokio::test]
async fn test_scalar_rebind_reuses_prepared_statement() {
    let mut conn = MockConnection::new();
    let recorder = conn.recorder();

    let mut stmt = ordered();
    stmt.bind("v", 1).unwrap();
    stmt.execute(&mut conn).await.unwrap();
    stmt.bind("v", 2).unwrap();
    stmt.execute(&mut conn).await.unwrap();

    assert_eq!(recorder.prepare_count(), 1);
    assert_eq!(
        recorder.executions(),
        [
            vec![Value::Int(1), Value::Int(1)],
            vec![Value::Int(2), Value::Int(2)]
        ]
    );
}

#[tokio::test]
async fn test_sequence_length_change_reprepares_and_releases_old_handle() {
    let mut conn = MockConnection::new();
    let recorder = conn.recorder();

    let mut stmt = ordered();
    stmt.bind_seq("v", [1, 2]).unwrap();
    stmt.execute(&mut conn).await.unwrap();
    stmt.bind_seq("v", [1, 2, 3]).unwrap();
    assert!(!stmt.is_prepared());
    stmt.execute(&mut conn).await.unwrap();

    let prepares: Vec<_> = recorder
        .events()
        .into_iter()
        .filter_map(|e| match e {
            MockEvent::Prepare { handle, .. } => Some(handle),
            _ => None,
        })
        .collect();
    assert_eq!(prepares.len(), 2);
    assert_eq!(recorder.unprepared(), [prepares[0]]);
    assert_eq!(
        stmt.prepared_sql(),
        Some("select * from T where a=?,?,? and b=?,?,? order by name")
    );
}

#[tokio::test]
async fn test_literal_rebind_invalidates() {
    let mut conn = MockConnection::new();
    let recorder = conn.recorder();

    let mut stmt = ordered();
    stmt.bind("v", 1).unwrap();
    stmt.execute(&mut conn).await.unwrap();
    stmt.bind_literal("ord", "id desc").unwrap();
    stmt.execute(&mut conn).await.unwrap();

    assert_eq!(
        recorder.prepared_sql(),
        [
            "select * from T where a=? and b=? order by name",
            "select * from T where a=? and b=? order by id desc"
        ]
    );
}

#[tokio::test]
async fn test_other_connection_or_mode_reprepares() {
    let mut first = MockConnection::new();
    let mut second = MockConnection::new();

    let mut stmt = ordered();
    stmt.bind("v", 1).unwrap();
    stmt.execute(&mut first).await.unwrap();
    stmt.execute(&mut second).await.unwrap();
    stmt.execute(&mut second).await.unwrap();
    assert_eq!(first.recorder().prepare_count(), 1);
    assert_eq!(second.recorder().prepare_count(), 1);
    // The handle from the first connection is never sent to the second.
    assert!(second.recorder().unprepared().is_empty());

    let mode = ResultSetMode::new(Scroll::Insensitive, Concurrency::ReadOnly);
    stmt.execute_query_with_mode(&mut second, mode).await.unwrap();
    stmt.execute_query_with_mode(&mut second, mode).await.unwrap();
    assert_eq!(second.recorder().prepare_count(), 2);
    assert!(matches!(
        second.recorder().events().iter().rev().find(|e| matches!(e, MockEvent::Prepare { .. })),
        Some(MockEvent::Prepare { mode: m, .. }) if *m == mode
    ));
}

#[tokio::test]
async fn test_alternating_connections_release_their_own_handles() {
    let mut first = MockConnection::new();
    let mut second = MockConnection::new();

    let mut stmt = ordered();
    stmt.bind("v", 1).unwrap();
    stmt.execute(&mut first).await.unwrap();
    stmt.execute(&mut second).await.unwrap();
    stmt.execute(&mut first).await.unwrap();

    let first_handles: Vec<_> = first
        .recorder()
        .events()
        .into_iter()
        .filter_map(|e| match e {
            MockEvent::Prepare { handle, .. } => Some(handle),
            _ => None,
        })
        .collect();
    assert_eq!(first_handles.len(), 2);
    assert_eq!(first.recorder().unprepared(), [first_handles[0]]);
    assert!(second.recorder().unprepared().is_empty());

    stmt.execute(&mut second).await.unwrap();
    assert_eq!(second.recorder().prepare_count(), 2);
    assert_eq!(second.recorder().unprepared().len(), 1);
    assert_eq!(first.recorder().unprepared().len(), 1);
}

#[tokio::test]
async fn test_reset_bindings_clears_everything() {
    let mut conn = MockConnection::new();

    let mut stmt = ordered();
    stmt.bind("v", 1).unwrap();
    stmt.execute(&mut conn).await.unwrap();
    stmt.reset_bindings();

    assert!(!stmt.is_prepared());
    assert!(stmt.bindings().is_empty());
    assert!(stmt.literals().is_empty());
    assert!(matches!(
        stmt.execute(&mut conn).await.unwrap_err(),
        Error::UnboundVariable { .. }
    ));
}

// =============================================================================
// Driver failures
// =============================================================================

#[tokio::test]
async fn test_prepare_failure_reported_with_sql() {
    let mut conn = MockConnection::new();
    conn.recorder().fail_next_prepare("syntax error");

    let mut stmt = ordered();
    stmt.bind("v", 1).unwrap();
    let err = stmt.execute(&mut conn).await.unwrap_err();

    assert!(err.is_driver());
    assert_eq!(err.sql(), Some("select * from T where a=? and b=? order by name"));
    assert!(err.to_string().contains("syntax error"));
    assert!(!stmt.is_prepared());

    stmt.execute(&mut conn).await.unwrap();
    assert!(stmt.is_prepared());
}

#[tokio::test]
async fn test_execute_failure_leaves_statement_unprepared() {
    let mut conn = MockConnection::new();
    let recorder = conn.recorder();

    let mut stmt = ordered();
    stmt.bind("v", 1).unwrap();
    stmt.execute(&mut conn).await.unwrap();

    recorder.fail_next_execute("deadlock");
    let err = stmt.execute(&mut conn).await.unwrap_err();
    assert!(err.is_driver());
    assert!(!stmt.is_prepared());

    stmt.execute(&mut conn).await.unwrap();
    assert_eq!(recorder.prepare_count(), 2);
    assert_eq!(recorder.unprepared().len(), 1);
}

#[tokio::test]
async fn test_rows_affected_passed_through() {
    let mut conn = MockConnection::new();
    conn.recorder().set_rows_affected(4);

    let mut stmt = BoundStatement::from_sql("delete", "delete from T where id in (:ids)");
    stmt.bind_seq("ids", [1, 2, 3, 4]).unwrap();
    assert_eq!(stmt.execute(&mut conn).await.unwrap().rows_affected, 4);
}

#[tokio::test]
async fn test_dyn_connection() {
    let mut conn = MockConnection::new();
    let recorder = conn.recorder();
    let dyn_conn: &mut dyn sqlbind_client::Connection = &mut conn;

    let mut stmt = BoundStatement::from_sql("dyn", "select :x");
    stmt.bind("x", true).unwrap();
    stmt.execute_query(dyn_conn).await.unwrap();
    assert_eq!(recorder.executions(), [vec![Value::Boolean(true)]]);
}
