//! Error types for PostgreSQL operations.

use rudder_migrate::DriverError;
use thiserror::Error;

/// Result type for PostgreSQL operations.
pub type PgResult<T> = Result<T, PgError>;

/// Errors that can occur during PostgreSQL operations.
#[derive(Error, Debug)]
pub enum PgError {
    /// PostgreSQL error.
    #[error("postgres error: {0}")]
    Postgres(#[from] tokio_postgres::Error),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// Connection error.
    #[error("connection error: {0}")]
    Connection(String),
}

impl PgError {
    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create a connection error.
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection(message.into())
    }

    /// The SQLSTATE reported by the server, if any.
    pub fn sqlstate(&self) -> Option<&str> {
        match self {
            Self::Postgres(e) => e.code().map(|c| c.code()),
            _ => None,
        }
    }
}

/// Convert a driver error, keeping the SQLSTATE.
pub(crate) fn driver_error(err: &tokio_postgres::Error) -> DriverError {
    let message = match err.as_db_error() {
        Some(db) => format!("{}: {}", db.severity(), db.message()),
        None => err.to_string(),
    };
    match err.code() {
        Some(state) => DriverError::with_code(state.code(), message),
        None => DriverError::new(message),
    }
}

impl From<PgError> for DriverError {
    fn from(err: PgError) -> Self {
        match &err {
            PgError::Postgres(e) => driver_error(e),
            _ => DriverError::new(err.to_string()),
        }
    }
}
