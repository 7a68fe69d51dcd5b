//! Operation facade
//!
//! Each public method acquires a connection from the provider, creates one
//! command, runs a single builder/loader/extractor call and returns. The
//! command is dropped before the connection, and both are released on every
//! exit path, including errors.

use std::sync::Arc;
use tracing::debug;

use crate::acquire::PerCallProvider;
use crate::bulk::{self, DEFAULT_BATCH_SIZE};
use crate::connection::{Command, ConnectionConfig, ConnectionFactory, ConnectionProvider};
use crate::error::Result;
use crate::extract;
use crate::statement;
use crate::types::{ColumnData, DataTable, FromValue, Value};

/// MySQL access helper.
///
/// Synchronous: every call blocks the invoking thread. The helper holds no
/// mutable state, so it can be shared across threads; each call uses its own
/// connection.
pub struct MySqlHelper {
    provider: Arc<dyn ConnectionProvider>,
}

impl MySqlHelper {
    /// Helper that opens a new connection for every operation
    pub fn per_call(factory: Arc<dyn ConnectionFactory>, config: ConnectionConfig) -> Self {
        Self::with_provider(PerCallProvider::new(factory, config))
    }

    /// Helper over any connection strategy
    pub fn with_provider(provider: impl ConnectionProvider + 'static) -> Self {
        Self {
            provider: Arc::new(provider),
        }
    }

    /// Helper over a shared connection strategy
    pub fn from_shared(provider: Arc<dyn ConnectionProvider>) -> Self {
        Self { provider }
    }

    /// Open-per-operation helper using the bundled MySQL driver
    #[cfg(feature = "mysql")]
    pub fn connect(config: ConnectionConfig) -> Result<Self> {
        let factory = crate::mysql::MySqlConnectionFactory::new(&config)?;
        Ok(Self::per_call(Arc::new(factory), config))
    }

    fn with_command<T>(
        &self,
        op: &'static str,
        f: impl FnOnce(&mut dyn Command) -> Result<T>,
    ) -> Result<T> {
        let mut conn = self.provider.acquire()?;
        let mut cmd = conn.create_command()?;
        let result = f(&mut *cmd);
        if let Err(e) = &result {
            debug!(op, error = %e, "operation failed");
        }
        result
    }

    /// Insert one row and return the generated AUTO_INCREMENT id (0 when the
    /// table has none).
    ///
    /// With `on_dupe_update`, a duplicate key updates every supplied column
    /// of the existing row instead of failing.
    pub fn insert_row(
        &self,
        database: &str,
        table: &str,
        columns: &[ColumnData],
        on_dupe_update: bool,
    ) -> Result<u64> {
        self.with_command("insert_row", |cmd| {
            statement::insert_row(cmd, database, table, columns, on_dupe_update)
        })
    }

    /// Update rows matching `where_clause` (all rows when `None` or blank),
    /// at most `limit` of them (`0` for no limit). Returns the affected row
    /// count.
    pub fn update_row(
        &self,
        database: &str,
        table: &str,
        columns: &[ColumnData],
        where_clause: Option<&str>,
        limit: u64,
    ) -> Result<u64> {
        self.with_command("update_row", |cmd| {
            statement::update_row(cmd, database, table, columns, where_clause, limit)
        })
    }

    /// Bulk insert values into a single column
    pub fn bulk_send_column(
        &self,
        database: &str,
        table: &str,
        column: &str,
        values: &[Value],
    ) -> Result<()> {
        self.with_command("bulk_send_column", |cmd| {
            bulk::load_column(cmd, database, table, column, values).map(|_| ())
        })
    }

    /// Bulk insert every row of `data`, `batch_size` rows per statement
    /// (`None` for the default of 100).
    pub fn bulk_send_table(
        &self,
        database: &str,
        table: &str,
        data: &DataTable,
        batch_size: Option<usize>,
    ) -> Result<()> {
        let batch_size = batch_size.unwrap_or(DEFAULT_BATCH_SIZE);
        self.with_command("bulk_send_table", |cmd| {
            bulk::load_table(cmd, database, table, data, batch_size).map(|_| ())
        })
    }

    /// First column of every row of `query`, converted to `T`
    pub fn get_first<T: FromValue>(&self, query: &str) -> Result<Vec<T>> {
        self.with_command("get_first", |cmd| extract::first_column(cmd, query))
    }

    /// First cell of `query`, `Value::Null` when there are no rows
    pub fn get_object(&self, query: &str) -> Result<Value> {
        self.with_command("get_object", |cmd| extract::scalar(cmd, query))
    }

    /// First cell of `query`, converted to `T`
    pub fn get_object_as<T: FromValue>(&self, query: &str) -> Result<T> {
        self.with_command("get_object_as", |cmd| extract::typed_scalar(cmd, query))
    }

    /// Execute a statement, returning the affected row count
    pub fn send_query(&self, query: &str) -> Result<u64> {
        self.with_command("send_query", |cmd| extract::affected_rows(cmd, query))
    }

    /// Whole result set of `query`
    pub fn get_data_table(&self, query: &str) -> Result<DataTable> {
        self.with_command("get_data_table", |cmd| extract::full_table(cmd, query))
    }
}

impl std::fmt::Debug for MySqlHelper {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MySqlHelper").finish_non_exhaustive()
    }
}
