//! Identifier checks for statement building.
//!
//! Values never reach SQL text: they are always bound as parameters. Names
//! (database, table, column) cannot be bound, so they are validated here and
//! then backtick-quoted by the statement builder.

use std::collections::HashSet;

use crate::error::{Error, Result};

/// Maximum identifier length accepted by MySQL
pub const MAX_IDENTIFIER_LEN: usize = 64;

/// Validate a MySQL identifier (database, table or column name).
///
/// - Must not be empty or whitespace only
/// - Must not end with whitespace (MySQL rejects such names)
/// - Maximum 64 characters
/// - Must not contain NUL
///
/// Backticks are allowed; the quoting layer doubles them.
///
/// # Examples
///
/// ```
/// use mysql_helper::security::validate_identifier;
///
/// assert!(validate_identifier("users").is_ok());
/// assert!(validate_identifier("order items").is_ok());
///
/// assert!(validate_identifier("").is_err());
/// assert!(validate_identifier("users ").is_err());
/// assert!(validate_identifier("a\0b").is_err());
/// ```
pub fn validate_identifier(name: &str) -> Result<()> {
    if name.trim().is_empty() {
        return Err(Error::invalid_argument("identifier cannot be empty"));
    }

    if name.ends_with(char::is_whitespace) {
        return Err(Error::invalid_argument(format!(
            "invalid identifier '{}': ends with whitespace",
            name.escape_debug()
        )));
    }

    let len = name.chars().count();
    if len > MAX_IDENTIFIER_LEN {
        return Err(Error::invalid_argument(format!(
            "identifier too long: {} chars (max {})",
            len, MAX_IDENTIFIER_LEN
        )));
    }

    if name.contains('\0') {
        return Err(Error::invalid_argument(format!(
            "invalid identifier '{}': contains NUL",
            name.escape_debug()
        )));
    }

    Ok(())
}

/// Validate a set of column names: each must be a valid identifier and no
/// two may collide (MySQL column names compare case-insensitively).
pub fn validate_column_set<'a, I>(columns: I) -> Result<()>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut seen = HashSet::new();
    let mut count = 0usize;

    for column in columns {
        validate_identifier(column)?;
        if !seen.insert(column.to_ascii_lowercase()) {
            return Err(Error::invalid_argument(format!(
                "duplicate column '{}'",
                column
            )));
        }
        count += 1;
    }

    if count == 0 {
        return Err(Error::invalid_argument(
            "at least one column is required",
        ));
    }

    Ok(())
}
