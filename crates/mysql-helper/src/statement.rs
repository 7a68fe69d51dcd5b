//! Parameterized INSERT / UPDATE construction
//!
//! Statements are generated with sea-query's MySQL backend. Identifiers are
//! validated and backtick-quoted; every value is emitted as a `?` placeholder
//! and carried alongside the SQL in `Statement::params`, in column order.

use sea_query::{
    Alias, Asterisk, Expr, IntoIden, MysqlQueryBuilder, OnConflict, Query, SimpleExpr, TableRef,
};
use tracing::debug;

use crate::connection::Command;
use crate::error::{Error, Result};
use crate::security::{validate_column_set, validate_identifier};
use crate::types::{ColumnData, Value};

/// SQL text plus the values bound to its placeholders, in order
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    /// SQL with one `?` per parameter
    pub sql: String,
    /// Values bound positionally
    pub params: Vec<Value>,
}

impl Statement {
    /// Number of bound parameters
    pub fn param_count(&self) -> usize {
        self.params.len()
    }

    /// Execute on `cmd`, returning the affected row count
    pub fn execute(&self, cmd: &mut dyn Command) -> Result<u64> {
        debug!(sql = %self.sql, params = self.params.len(), "executing statement");
        cmd.execute(&self.sql, &self.params)
    }
}

/// `database`.`table`, or just `table` when no database is given
fn table_ref(database: &str, table: &str) -> Result<TableRef> {
    validate_identifier(table)?;
    if database.is_empty() {
        Ok(TableRef::Table(Alias::new(table).into_iden()))
    } else {
        validate_identifier(database)?;
        Ok(TableRef::SchemaTable(
            Alias::new(database).into_iden(),
            Alias::new(table).into_iden(),
        ))
    }
}

fn placeholders(n: usize) -> Vec<SimpleExpr> {
    (0..n).map(|_| Expr::cust("?")).collect()
}

fn builder_error(e: sea_query::error::Error) -> Error {
    Error::invalid_argument(e.to_string())
}

/// Build `INSERT INTO table (cols) VALUES (?, ...)`.
///
/// With `on_dupe_update`, appends `ON DUPLICATE KEY UPDATE col = VALUES(col)`
/// for every column.
pub fn build_insert(
    database: &str,
    table: &str,
    columns: &[ColumnData],
    on_dupe_update: bool,
) -> Result<Statement> {
    validate_column_set(columns.iter().map(|c| c.column.as_str()))?;
    let tbl = table_ref(database, table)?;

    let col_idens: Vec<_> = columns
        .iter()
        .map(|c| Alias::new(c.column.as_str()).into_iden())
        .collect();

    let mut stmt = Query::insert();
    stmt.into_table(tbl)
        .columns(col_idens.clone())
        .values(placeholders(columns.len()))
        .map_err(builder_error)?;

    if on_dupe_update {
        stmt.on_conflict(OnConflict::new().update_columns(col_idens).to_owned());
    }

    Ok(Statement {
        sql: stmt.to_string(MysqlQueryBuilder),
        params: columns.iter().map(|c| c.value.clone()).collect(),
    })
}

/// Build `UPDATE table SET col = ?, ... [WHERE predicate] [LIMIT n]`.
///
/// An absent or blank predicate updates every row; `limit == 0` means no
/// limit. The predicate is SQL text supplied by the caller and is emitted
/// verbatim.
pub fn build_update(
    database: &str,
    table: &str,
    columns: &[ColumnData],
    where_clause: Option<&str>,
    limit: u64,
) -> Result<Statement> {
    validate_column_set(columns.iter().map(|c| c.column.as_str()))?;
    let tbl = table_ref(database, table)?;

    let assignments: Vec<_> = columns
        .iter()
        .map(|c| (Alias::new(c.column.as_str()), Expr::cust("?")))
        .collect();

    let mut stmt = Query::update();
    stmt.table(tbl).values(assignments);

    if let Some(predicate) = where_clause.map(str::trim).filter(|w| !w.is_empty()) {
        stmt.and_where(Expr::cust(predicate));
    }

    if limit > 0 {
        stmt.limit(limit);
    }

    Ok(Statement {
        sql: stmt.to_string(MysqlQueryBuilder),
        params: columns.iter().map(|c| c.value.clone()).collect(),
    })
}

/// Build one multi-row `INSERT INTO table (cols) VALUES (?, ...), (?, ...)`.
///
/// Every row must supply exactly one value per column; parameters are laid
/// out row-major.
pub fn build_multi_insert<'a, I>(
    database: &str,
    table: &str,
    columns: &[&str],
    rows: I,
) -> Result<Statement>
where
    I: IntoIterator<Item = &'a [Value]>,
{
    validate_column_set(columns.iter().copied())?;
    let tbl = table_ref(database, table)?;

    let mut stmt = Query::insert();
    stmt.into_table(tbl)
        .columns(columns.iter().map(|c| Alias::new(*c).into_iden()));

    let mut params = Vec::new();
    for (idx, row) in rows.into_iter().enumerate() {
        if row.len() != columns.len() {
            return Err(Error::invalid_argument(format!(
                "row {} has {} values, expected {}",
                idx,
                row.len(),
                columns.len()
            )));
        }
        stmt.values(placeholders(row.len())).map_err(builder_error)?;
        params.extend_from_slice(row);
    }

    if params.is_empty() {
        return Err(Error::invalid_argument("no rows to insert"));
    }

    Ok(Statement {
        sql: stmt.to_string(MysqlQueryBuilder),
        params,
    })
}

/// Build `SELECT * FROM table LIMIT 0`, used to read a table's column set
/// without fetching rows.
pub fn build_column_probe(database: &str, table: &str) -> Result<String> {
    let tbl = table_ref(database, table)?;
    Ok(Query::select()
        .column(Asterisk)
        .from(tbl)
        .limit(0)
        .to_string(MysqlQueryBuilder))
}

/// Insert one row, returning the generated AUTO_INCREMENT id (0 if none)
pub fn insert_row(
    cmd: &mut dyn Command,
    database: &str,
    table: &str,
    columns: &[ColumnData],
    on_dupe_update: bool,
) -> Result<u64> {
    let stmt = build_insert(database, table, columns, on_dupe_update)?;
    stmt.execute(cmd)?;
    Ok(cmd.last_insert_id().unwrap_or(0))
}

/// Update rows, returning the affected row count
pub fn update_row(
    cmd: &mut dyn Command,
    database: &str,
    table: &str,
    columns: &[ColumnData],
    where_clause: Option<&str>,
    limit: u64,
) -> Result<u64> {
    build_update(database, table, columns, where_clause, limit)?.execute(cmd)
}
