//! Error types for mysql-helper
//!
//! Every public operation surfaces exactly one of these kinds:
//! - Connection: acquisition exhausted its retry budget (retriable)
//! - InvalidArgument: empty column set, duplicate column, bad batch size
//! - SchemaMismatch: bulk source column absent from the destination table
//! - TypeMismatch: a result value could not be cast to the requested type
//! - SqlExecution: the driver rejected a statement (diagnostic preserved)

use std::fmt;
use thiserror::Error;

/// Result type for mysql-helper operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error categories for classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Connection-related errors (retriable)
    Connection,
    /// Caller supplied an argument no statement can be built from
    InvalidArgument,
    /// Source and destination column sets disagree
    Schema,
    /// Value conversion failed
    TypeConversion,
    /// Statement execution failed on the server
    Execution,
    /// Configuration error
    Configuration,
    /// Unknown/other errors
    Other,
}

impl ErrorCategory {
    /// Whether errors in this category are generally retriable
    #[inline]
    pub const fn is_retriable(self) -> bool {
        matches!(self, Self::Connection)
    }
}

/// Main error type for mysql-helper
#[derive(Error, Debug)]
#[allow(missing_docs)]
pub enum Error {
    /// Connection could not be established
    #[error("connection error: {message}")]
    Connection {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Invalid argument passed to an operation
    #[error("invalid argument: {message}")]
    InvalidArgument { message: String },

    /// Bulk source column missing from the destination table
    #[error("schema mismatch: column `{column}` does not exist in {table}")]
    SchemaMismatch { table: String, column: String },

    /// Result value could not be converted to the requested type
    #[error("type mismatch{}: expected {}, found {}", row_suffix(.row), .expected, .found)]
    TypeMismatch {
        row: Option<usize>,
        expected: &'static str,
        found: String,
    },

    /// Statement execution failed
    #[error("sql execution error: {message}")]
    SqlExecution {
        message: String,
        sql: Option<String>,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Configuration error
    #[error("configuration error: {message}")]
    Configuration { message: String },

    /// Internal error
    #[error("internal error: {message}")]
    Internal { message: String },
}

fn row_suffix(row: &Option<usize>) -> String {
    match row {
        Some(idx) => format!(" at row {}", idx),
        None => String::new(),
    }
}

impl Error {
    /// Get the error category
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Connection { .. } => ErrorCategory::Connection,
            Self::InvalidArgument { .. } => ErrorCategory::InvalidArgument,
            Self::SchemaMismatch { .. } => ErrorCategory::Schema,
            Self::TypeMismatch { .. } => ErrorCategory::TypeConversion,
            Self::SqlExecution { .. } => ErrorCategory::Execution,
            Self::Configuration { .. } => ErrorCategory::Configuration,
            Self::Internal { .. } => ErrorCategory::Other,
        }
    }

    /// Whether this error is retriable
    #[inline]
    pub fn is_retriable(&self) -> bool {
        self.category().is_retriable()
    }

    /// Create a connection error
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
            source: None,
        }
    }

    /// Create a connection error with source
    pub fn connection_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Connection {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Create an invalid argument error
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            message: message.into(),
        }
    }

    /// Create a schema mismatch error
    pub fn schema_mismatch(table: impl Into<String>, column: impl Into<String>) -> Self {
        Self::SchemaMismatch {
            table: table.into(),
            column: column.into(),
        }
    }

    /// Create a type mismatch error for a single value
    pub fn type_mismatch(expected: &'static str, found: impl Into<String>) -> Self {
        Self::TypeMismatch {
            row: None,
            expected,
            found: found.into(),
        }
    }

    /// Attach the offending row index to a type mismatch.
    ///
    /// Other kinds pass through unchanged.
    pub fn at_row(self, idx: usize) -> Self {
        match self {
            Self::TypeMismatch {
                expected, found, ..
            } => Self::TypeMismatch {
                row: Some(idx),
                expected,
                found,
            },
            other => other,
        }
    }

    /// Create an execution error
    pub fn execution(message: impl Into<String>) -> Self {
        Self::SqlExecution {
            message: message.into(),
            sql: None,
            source: None,
        }
    }

    /// Create an execution error carrying the statement and driver error
    pub fn execution_with_source(
        sql: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::SqlExecution {
            message: source.to_string(),
            sql: Some(sql.into()),
            source: Some(Box::new(source)),
        }
    }

    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Create an internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// The statement that failed, if this is an execution error
    pub fn sql(&self) -> Option<&str> {
        match self {
            Self::SqlExecution { sql, .. } => sql.as_deref(),
            _ => None,
        }
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Connection => write!(f, "connection"),
            Self::InvalidArgument => write!(f, "invalid_argument"),
            Self::Schema => write!(f, "schema"),
            Self::TypeConversion => write!(f, "type_conversion"),
            Self::Execution => write!(f, "execution"),
            Self::Configuration => write!(f, "configuration"),
            Self::Other => write!(f, "other"),
        }
    }
}
