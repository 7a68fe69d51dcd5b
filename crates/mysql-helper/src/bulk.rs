//! Chunked bulk loading
//!
//! Both forms send one multi-row INSERT per batch over the caller's command.
//! Batches are committed as they go: when a batch fails the remaining ones
//! are skipped and the error is returned, earlier batches stay written.

use std::time::{Duration, Instant};
use tracing::{debug, warn};

use crate::connection::Command;
use crate::error::{Error, Result};
use crate::security::validate_identifier;
use crate::statement::{build_column_probe, build_multi_insert};
use crate::types::{DataTable, Value};

/// Rows per batch when the caller does not choose
pub const DEFAULT_BATCH_SIZE: usize = 100;

/// Most placeholders MySQL accepts in one prepared statement
pub const MAX_PLACEHOLDERS: usize = 65_535;

/// Outcome of a completed bulk load
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BulkResult {
    /// Rows sent
    pub rows_written: u64,
    /// INSERT statements executed
    pub batches: usize,
    /// Wall time spent
    pub duration: Duration,
}

/// Largest row count per batch that stays under the placeholder cap
fn effective_batch_size(requested: usize, width: usize) -> usize {
    let cap = (MAX_PLACEHOLDERS / width.max(1)).max(1);
    requested.min(cap)
}

/// Send `values` into one column of `table`, `DEFAULT_BATCH_SIZE` rows at a
/// time. An empty slice sends nothing.
pub fn load_column(
    cmd: &mut dyn Command,
    database: &str,
    table: &str,
    column: &str,
    values: &[Value],
) -> Result<BulkResult> {
    validate_identifier(column)?;
    let start = Instant::now();
    let mut result = BulkResult::default();

    if values.is_empty() {
        return Ok(result);
    }

    let columns = [column];
    for (batch, chunk) in values.chunks(effective_batch_size(DEFAULT_BATCH_SIZE, 1)).enumerate() {
        let stmt = build_multi_insert(
            database,
            table,
            &columns,
            chunk.iter().map(std::slice::from_ref),
        )?;
        send_batch(cmd, table, batch, chunk.len(), &stmt.sql, &stmt.params, &result)?;
        result.rows_written += chunk.len() as u64;
        result.batches += 1;
    }

    result.duration = start.elapsed();
    debug!(
        table,
        column,
        rows = result.rows_written,
        batches = result.batches,
        "column bulk load complete"
    );
    Ok(result)
}

/// Send every row of `data` into `table` in batches of at most `batch_size`
/// rows.
///
/// Columns are matched by name (case-insensitively) against the destination,
/// which is read with a zero-row SELECT first. A source column the
/// destination lacks fails with `SchemaMismatch` before any row is sent.
pub fn load_table(
    cmd: &mut dyn Command,
    database: &str,
    table: &str,
    data: &DataTable,
    batch_size: usize,
) -> Result<BulkResult> {
    if batch_size == 0 {
        return Err(Error::invalid_argument("batch size must be positive"));
    }

    let start = Instant::now();
    let mut result = BulkResult::default();

    if data.is_empty() {
        return Ok(result);
    }

    let columns: Vec<&str> = data.columns().iter().map(String::as_str).collect();
    check_destination(cmd, database, table, &columns)?;

    let size = effective_batch_size(batch_size, columns.len());
    if size < batch_size {
        debug!(
            requested = batch_size,
            effective = size,
            "batch size reduced to fit placeholder limit"
        );
    }

    for (batch, chunk) in data.rows().chunks(size).enumerate() {
        let rows = chunk.iter().map(Vec::as_slice);
        let stmt = build_multi_insert(database, table, &columns, rows)?;
        send_batch(cmd, table, batch, chunk.len(), &stmt.sql, &stmt.params, &result)?;
        result.rows_written += chunk.len() as u64;
        result.batches += 1;
    }

    result.duration = start.elapsed();
    debug!(
        table,
        rows = result.rows_written,
        batches = result.batches,
        "table bulk load complete"
    );
    Ok(result)
}

fn send_batch(
    cmd: &mut dyn Command,
    table: &str,
    batch: usize,
    rows: usize,
    sql: &str,
    params: &[Value],
    progress: &BulkResult,
) -> Result<()> {
    debug!(table, batch, rows, params = params.len(), "sending batch");
    cmd.execute(sql, params).map(|_| ()).map_err(|e| {
        warn!(
            table,
            batch,
            committed_rows = progress.rows_written,
            error = %e,
            "bulk load aborted"
        );
        e
    })
}

/// Fail with `SchemaMismatch` unless every source column exists in the
/// destination table.
fn check_destination(
    cmd: &mut dyn Command,
    database: &str,
    table: &str,
    columns: &[&str],
) -> Result<()> {
    let probe = build_column_probe(database, table)?;
    let destination: Vec<String> = {
        let cursor = cmd.query(&probe, &[])?;
        cursor.columns().to_vec()
    };

    for column in columns {
        if !destination.iter().any(|d| d.eq_ignore_ascii_case(column)) {
            let qualified = if database.is_empty() {
                table.to_string()
            } else {
                format!("{}.{}", database, table)
            };
            return Err(Error::schema_mismatch(qualified, *column));
        }
    }

    Ok(())
}
