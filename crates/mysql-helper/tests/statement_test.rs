//! Tests for the public statement builders

use mysql_helper::prelude::*;
use mysql_helper::statement::{build_insert, build_update};
use proptest::prelude::*;

fn columns(names: &[&str]) -> Vec<ColumnData> {
    names
        .iter()
        .enumerate()
        .map(|(i, n)| ColumnData::new(*n, i as i64))
        .collect()
}

#[test]
fn test_upsert_absent_by_default() {
    let stmt = build_insert("shop", "orders", &columns(&["id", "total"]), false).unwrap();
    assert!(!stmt.sql.contains("DUPLICATE"));
    assert_eq!(stmt.param_count(), 2);
}

#[test]
fn test_identifiers_are_quoted() {
    let stmt = build_insert("shop", "order items", &columns(&["line no"]), false).unwrap();
    assert!(stmt.sql.contains("`shop`.`order items`"));
    assert!(stmt.sql.contains("`line no`"));
}

#[test]
fn test_invalid_identifiers_rejected() {
    let err = build_insert("shop", "", &columns(&["id"]), false).unwrap_err();
    assert!(matches!(err, Error::InvalidArgument { .. }));

    let err = build_insert("shop", "orders ", &columns(&["id"]), false).unwrap_err();
    assert!(err.to_string().contains("ends with whitespace"));

    let long = "c".repeat(65);
    let err = build_update("shop", "orders", &columns(&[long.as_str()]), None, 0).unwrap_err();
    assert!(matches!(err, Error::InvalidArgument { .. }));
}

#[test]
fn test_update_limit_exact() {
    let stmt = build_update("shop", "orders", &columns(&["status"]), Some("id = 3"), 5).unwrap();
    assert!(stmt.sql.ends_with("LIMIT 5"));
    assert_eq!(stmt.sql.matches("LIMIT").count(), 1);
}

fn column_names() -> impl Strategy<Value = Vec<String>> {
    proptest::collection::hash_set("[a-z]{1,12}", 1..12).prop_map(|set| set.into_iter().collect())
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_upsert_reassigns_every_column(names in column_names()) {
        let refs: Vec<&str> = names.iter().map(String::as_str).collect();
        let stmt = build_insert("db", "t", &columns(&refs), true).unwrap();
        let (_, tail) = stmt.sql.split_once("ON DUPLICATE KEY UPDATE").unwrap();

        prop_assert_eq!(tail.matches("VALUES(").count(), names.len());
        for name in &names {
            let quoted = format!("`{}`", name);
            prop_assert!(tail.contains(&quoted));
        }
    }

    #[test]
    fn prop_update_params_follow_columns(names in column_names()) {
        let refs: Vec<&str> = names.iter().map(String::as_str).collect();
        let stmt = build_update("db", "t", &columns(&refs), None, 0).unwrap();

        prop_assert!(!stmt.sql.contains("WHERE"));
        prop_assert_eq!(stmt.param_count(), names.len());
        let expected: Vec<Value> = (0..names.len() as i64).map(Value::Int64).collect();
        prop_assert_eq!(stmt.params, expected);
    }
}
