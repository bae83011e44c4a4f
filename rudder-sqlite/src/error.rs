//! Error types for SQLite operations.

use rudder_migrate::DriverError;
use thiserror::Error;

/// Result type for SQLite operations.
pub type SqliteResult<T> = Result<T, SqliteError>;

/// Errors that can occur during SQLite operations.
#[derive(Error, Debug)]
pub enum SqliteError {
    /// SQLite driver error.
    #[error("sqlite error: {0}")]
    Sqlite(#[from] tokio_rusqlite::Error),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),
}

impl SqliteError {
    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }
}

impl From<rusqlite::Error> for SqliteError {
    fn from(err: rusqlite::Error) -> Self {
        Self::Sqlite(tokio_rusqlite::Error::Rusqlite(err))
    }
}

/// Convert a rusqlite error, keeping the primary result code.
pub(crate) fn driver_error(err: &rusqlite::Error) -> DriverError {
    match err {
        rusqlite::Error::SqliteFailure(ffi, _) => {
            DriverError::with_code((ffi.extended_code & 0xff).to_string(), err.to_string())
        }
        other => DriverError::new(other.to_string()),
    }
}

impl From<SqliteError> for DriverError {
    fn from(err: SqliteError) -> Self {
        match err {
            SqliteError::Sqlite(tokio_rusqlite::Error::Rusqlite(e)) => driver_error(&e),
            other => DriverError::new(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = SqliteError::config("database path is required");
        assert!(err.to_string().contains("configuration error"));
        assert!(err.to_string().contains("database path is required"));
    }

    #[test]
    fn test_missing_table_keeps_message() {
        let conn = rusqlite::Connection::open_in_memory().unwrap();
        let err = conn
            .prepare("SELECT version_id FROM rudder_db_version")
            .err()
            .unwrap();

        let driver = DriverError::from(SqliteError::from(err));
        assert_eq!(driver.code(), Some("1"));
        assert!(driver.message.contains("no such table"));
    }
}
