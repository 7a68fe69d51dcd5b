//! Tests for the operation facade over the stub driver

mod common;

use common::{init_test_logging, people, StubDriver};
use mysql_helper::prelude::*;

// ==================== Resource Release Tests ====================

#[test]
fn test_every_call_releases_its_connection() {
    init_test_logging();
    let driver = StubDriver::new()
        .with_destination(&["id", "name"])
        .with_column(vec![Value::Int32(1), Value::from("two")])
        .fail_execute_at(1);
    let helper = driver.helper(200);

    let mut failures = 0;
    let outcomes = [
        helper
            .insert_row("app", "users", &[ColumnData::new("id", 1)], false)
            .map(|_| ()),
        // second execute fails
        helper
            .update_row("app", "users", &[ColumnData::new("id", 2)], None, 0)
            .map(|_| ()),
        helper.get_first::<i32>("SELECT v FROM t").map(|_| ()),
        helper.get_object("SELECT v FROM t").map(|_| ()),
        helper.get_object_as::<i64>("SELECT v FROM t").map(|_| ()),
        helper.send_query("DELETE FROM t").map(|_| ()),
        helper.get_data_table("SELECT * FROM missing_table").map(|_| ()),
        helper.insert_row("app", "users", &[], false).map(|_| ()),
        helper.bulk_send_table("app", "users", &people(3), Some(0)),
        helper.bulk_send_column("app", "users", "id", &[Value::Int32(9)]),
    ];

    for outcome in &outcomes {
        if outcome.is_err() {
            failures += 1;
        }
    }

    assert_eq!(failures, 5);
    assert_eq!(driver.opens(), outcomes.len());
    assert_eq!(driver.opens(), driver.closes());
    assert_eq!(driver.commands(), driver.commands_dropped());
}

#[test]
fn test_connection_failure_opens_nothing() {
    let driver = StubDriver::new().fail_connects(usize::MAX);
    let helper = driver.helper(20);

    let err = helper.send_query("SELECT 1").unwrap_err();
    assert!(matches!(err, Error::Connection { .. }));
    assert_eq!(driver.opens(), 0);
    assert_eq!(driver.closes(), 0);
    assert_eq!(driver.commands(), 0);
}

// ==================== Row Operation Tests ====================

#[test]
fn test_insert_row_returns_last_insert_id() {
    let driver = StubDriver::new().with_last_insert_id(42);
    let helper = driver.helper(200);

    let id = helper
        .insert_row(
            "app",
            "users",
            &[ColumnData::new("name", "alice"), ColumnData::new("age", 31)],
            false,
        )
        .unwrap();

    assert_eq!(id, 42);
    let executed = driver.executed();
    assert_eq!(executed.len(), 1);
    assert!(executed[0].sql.starts_with("INSERT INTO `app`.`users`"));
    assert_eq!(
        executed[0].params,
        vec![Value::from("alice"), Value::Int32(31)]
    );
}

#[test]
fn test_insert_row_without_auto_increment() {
    let driver = StubDriver::new();
    let id = driver
        .helper(200)
        .insert_row("app", "tags", &[ColumnData::new("tag", "rust")], true)
        .unwrap();

    assert_eq!(id, 0);
    assert!(driver.executed()[0].sql.contains("ON DUPLICATE KEY UPDATE"));
}

#[test]
fn test_update_row() {
    let driver = StubDriver::new();
    let affected = driver
        .helper(200)
        .update_row(
            "app",
            "users",
            &[ColumnData::new("age", 32), ColumnData::new("nick", Value::Null)],
            Some("name = 'alice'"),
            1,
        )
        .unwrap();

    assert_eq!(affected, 1);
    let stmt = &driver.executed()[0];
    assert!(stmt.sql.starts_with("UPDATE `app`.`users` SET"));
    assert!(stmt.sql.contains("name = 'alice'"));
    assert!(stmt.sql.ends_with("LIMIT 1"));
    assert_eq!(stmt.params, vec![Value::Int32(32), Value::Null]);
}

#[test]
fn test_sql_error_keeps_driver_text() {
    let driver = StubDriver::new().fail_execute_at(0);
    let err = driver
        .helper(200)
        .insert_row("app", "users", &[ColumnData::new("id", 1)], false)
        .unwrap_err();

    assert_eq!(err.category(), ErrorCategory::Execution);
    assert!(err.to_string().contains("Duplicate entry '1'"));
}

// ==================== Query Tests ====================

#[test]
fn test_get_object_empty_result_is_null() {
    let driver = StubDriver::new().with_column(vec![]);
    let helper = driver.helper(200);

    assert_eq!(helper.get_object("SELECT v FROM t").unwrap(), Value::Null);
    assert_eq!(
        helper
            .get_object_as::<Option<String>>("SELECT v FROM t")
            .unwrap(),
        None
    );
}

#[test]
fn test_get_object_as_type_mismatch() {
    let driver = StubDriver::new().with_column(vec![Value::from("abc")]);
    let err = driver
        .helper(200)
        .get_object_as::<i32>("SELECT v FROM t")
        .unwrap_err();

    assert!(matches!(err, Error::TypeMismatch { expected: "i32", .. }));
    assert_eq!(driver.opens(), driver.closes());
}

#[test]
fn test_send_query_returns_affected_rows() {
    let driver = StubDriver::new();
    let affected = driver.helper(200).send_query("DELETE FROM t WHERE id = 1").unwrap();

    assert_eq!(affected, 1);
    assert_eq!(driver.executed()[0].sql, "DELETE FROM t WHERE id = 1");
    assert!(driver.executed()[0].params.is_empty());
}

#[test]
fn test_send_query_passes_batches_verbatim_without_params() {
    let driver = StubDriver::new();
    let sql = "UPDATE a SET n = n + 1; UPDATE b SET n = n - 1";
    driver.helper(200).send_query(sql).unwrap();

    // an empty parameter list lets the driver send plain text
    let executed = driver.executed();
    assert_eq!(executed.len(), 1);
    assert_eq!(executed[0].sql, sql);
    assert!(executed[0].params.is_empty());
}

#[test]
fn test_helper_is_shareable_across_threads() {
    let driver = StubDriver::new().with_column(vec![Value::Int32(7)]);
    let helper = std::sync::Arc::new(driver.helper(200));

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let helper = helper.clone();
            std::thread::spawn(move || helper.get_object_as::<i32>("SELECT v").unwrap())
        })
        .collect();

    for handle in handles {
        assert_eq!(handle.join().unwrap(), 7);
    }
    assert_eq!(driver.opens(), 4);
    assert_eq!(driver.closes(), 4);
}
