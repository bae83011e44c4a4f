//! Error types for MySQL operations.

use rudder_migrate::DriverError;
use thiserror::Error;

/// Result type for MySQL operations.
pub type MysqlResult<T> = Result<T, MysqlError>;

/// Errors that can occur during MySQL operations.
#[derive(Error, Debug)]
pub enum MysqlError {
    /// MySQL driver error.
    #[error("mysql error: {0}")]
    Mysql(#[from] mysql_async::Error),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),
}

impl MysqlError {
    /// Create a configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// The server error number, if the server reported one.
    pub fn server_code(&self) -> Option<u16> {
        match self {
            Self::Mysql(mysql_async::Error::Server(e)) => Some(e.code),
            _ => None,
        }
    }
}

/// Convert a driver error, keeping the server error number.
pub(crate) fn driver_error(err: &mysql_async::Error) -> DriverError {
    match err {
        mysql_async::Error::Server(server) => {
            DriverError::with_code(server.code.to_string(), server.message.clone())
        }
        other => DriverError::new(other.to_string()),
    }
}

impl From<MysqlError> for DriverError {
    fn from(err: MysqlError) -> Self {
        match &err {
            MysqlError::Mysql(e) => driver_error(e),
            MysqlError::Config(_) => DriverError::new(err.to_string()),
        }
    }
}
