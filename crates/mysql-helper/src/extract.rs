//! Result extraction
//!
//! Adapts a query's cursor into the shapes the facade returns.

use tracing::debug;

use crate::connection::Command;
use crate::error::Result;
use crate::types::{DataTable, FromValue, Value};

/// First column of every row, converted to `T`.
///
/// A value that does not convert fails with `TypeMismatch` naming its
/// zero-based row index.
pub fn first_column<T: FromValue>(cmd: &mut dyn Command, sql: &str) -> Result<Vec<T>> {
    debug!(sql, "querying first column");
    let mut cursor = cmd.query(sql, &[])?;
    let mut out = Vec::new();

    while let Some(mut row) = cursor.next_row()? {
        let value = if row.is_empty() {
            Value::Null
        } else {
            row.swap_remove(0)
        };
        let idx = out.len();
        out.push(T::from_value(value).map_err(|e| e.at_row(idx))?);
    }

    Ok(out)
}

/// Cell (0, 0), or `Value::Null` when the result set is empty
pub fn scalar(cmd: &mut dyn Command, sql: &str) -> Result<Value> {
    debug!(sql, "querying scalar");
    let mut cursor = cmd.query(sql, &[])?;
    Ok(cursor
        .next_row()?
        .and_then(|row| row.into_iter().next())
        .unwrap_or(Value::Null))
}

/// Cell (0, 0) converted to `T`.
///
/// An empty result converts from `Value::Null`, so it succeeds only for
/// types that accept NULL such as `Option<T>`.
pub fn typed_scalar<T: FromValue>(cmd: &mut dyn Command, sql: &str) -> Result<T> {
    T::from_value(scalar(cmd, sql)?)
}

/// Execute a statement and return the number of rows it changed.
///
/// The count is what the server reports: rows inserted, updated or deleted.
/// For `INSERT ... ON DUPLICATE KEY UPDATE` an updated row counts twice, and
/// statements that return rows (or change nothing) report 0. There is no
/// negative sentinel.
pub fn affected_rows(cmd: &mut dyn Command, sql: &str) -> Result<u64> {
    debug!(sql, "executing query");
    cmd.execute(sql, &[])
}

/// Materialize the whole result set
pub fn full_table(cmd: &mut dyn Command, sql: &str) -> Result<DataTable> {
    debug!(sql, "querying table");
    let mut cursor = cmd.query(sql, &[])?;
    let mut table = DataTable::new(cursor.columns().iter().cloned());

    while let Some(row) = cursor.next_row()? {
        table.push_row(row)?;
    }

    Ok(table)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::RowCursor;
    use crate::error::Error;
    use std::collections::VecDeque;

    struct Rows {
        columns: Vec<String>,
        rows: VecDeque<Vec<Value>>,
    }

    impl RowCursor for Rows {
        fn columns(&self) -> &[String] {
            &self.columns
        }

        fn next_row(&mut self) -> Result<Option<Vec<Value>>> {
            Ok(self.rows.pop_front())
        }
    }

    struct Canned {
        columns: Vec<String>,
        rows: Vec<Vec<Value>>,
    }

    impl Canned {
        fn single(values: Vec<Value>) -> Self {
            Self {
                columns: vec!["v".into()],
                rows: values.into_iter().map(|v| vec![v]).collect(),
            }
        }
    }

    impl Command for Canned {
        fn execute(&mut self, _sql: &str, _params: &[Value]) -> Result<u64> {
            Ok(4)
        }

        fn query(&mut self, _sql: &str, _params: &[Value]) -> Result<Box<dyn RowCursor + '_>> {
            Ok(Box::new(Rows {
                columns: self.columns.clone(),
                rows: self.rows.clone().into(),
            }))
        }

        fn last_insert_id(&self) -> Option<u64> {
            None
        }
    }

    #[test]
    fn test_first_column_typed() {
        let mut cmd = Canned::single(vec![Value::Int32(1), Value::Int32(2), Value::Int32(3)]);
        let values: Vec<i32> = first_column(&mut cmd, "SELECT v FROM t").unwrap();
        assert_eq!(values, vec![1, 2, 3]);
    }

    #[test]
    fn test_first_column_names_bad_row() {
        let mut cmd = Canned::single(vec![
            Value::Int32(1),
            Value::Int32(2),
            Value::String("three".into()),
        ]);
        let err = first_column::<i32>(&mut cmd, "SELECT v FROM t").unwrap_err();
        assert!(matches!(err, Error::TypeMismatch { row: Some(2), .. }));
    }

    #[test]
    fn test_scalar() {
        let mut cmd = Canned::single(vec![Value::from("x"), Value::from("y")]);
        assert_eq!(scalar(&mut cmd, "SELECT v").unwrap(), Value::from("x"));

        let mut empty = Canned::single(vec![]);
        assert_eq!(scalar(&mut empty, "SELECT v").unwrap(), Value::Null);
    }

    #[test]
    fn test_typed_scalar() {
        let mut cmd = Canned::single(vec![Value::Int64(42)]);
        assert_eq!(typed_scalar::<u16>(&mut cmd, "SELECT COUNT(*)").unwrap(), 42);

        let mut empty = Canned::single(vec![]);
        assert_eq!(typed_scalar::<Option<i64>>(&mut empty, "SELECT v").unwrap(), None);
        let err = typed_scalar::<i64>(&mut empty, "SELECT v").unwrap_err();
        assert!(matches!(err, Error::TypeMismatch { row: None, .. }));
    }

    #[test]
    fn test_affected_rows() {
        let mut cmd = Canned::single(vec![]);
        assert_eq!(affected_rows(&mut cmd, "DELETE FROM t").unwrap(), 4);
    }

    #[test]
    fn test_full_table() {
        let mut cmd = Canned {
            columns: vec!["id".into(), "name".into()],
            rows: vec![
                vec![Value::Int32(1), Value::from("a")],
                vec![Value::Int32(2), Value::Null],
            ],
        };
        let table = full_table(&mut cmd, "SELECT id, name FROM t").unwrap();

        assert_eq!(table.columns(), &["id".to_string(), "name".to_string()]);
        assert_eq!(table.len(), 2);
        assert_eq!(table.get(1, "NAME"), Some(&Value::Null));
    }
}
