//! Error types for the migration engine.

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias for migration operations.
pub type MigrateResult<T> = Result<T, MigrationError>;

/// An error reported by a database driver.
///
/// Drivers translate their native error into this shape so that dialects can
/// classify it without depending on any driver crate. `code` carries the
/// engine's own error identifier (a Postgres SQLSTATE, a MySQL server error
/// number, a SQLite result code).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct DriverError {
    /// Native error code, when the driver reports one.
    pub code: Option<String>,
    /// Human readable message.
    pub message: String,
}

impl DriverError {
    /// Create a driver error without a code.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            code: None,
            message: message.into(),
        }
    }

    /// Create a driver error carrying a native code.
    pub fn with_code(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: Some(code.into()),
            message: message.into(),
        }
    }

    /// The native code, if any.
    pub fn code(&self) -> Option<&str> {
        self.code.as_deref()
    }
}

/// Errors that can occur during migration operations.
#[derive(Debug, Error)]
pub enum MigrationError {
    /// Invalid or incomplete configuration. Always raised before the database
    /// is contacted.
    #[error("Configuration error: {0}")]
    Config(String),

    /// File system error on a specific path.
    #[error("I/O error on '{path}': {source}")]
    Io {
        /// Offending path.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// Invalid migration file or format.
    #[error("Invalid migration: {0}")]
    InvalidMigration(String),

    /// Two migration files in one track share a version.
    #[error("Duplicate migration version {version}: '{first}' and '{second}'")]
    DuplicateVersion {
        /// The shared version identifier.
        version: i64,
        /// First file carrying the version.
        first: String,
        /// Second file carrying the version.
        second: String,
    },

    /// Bookkeeping query or write failed.
    #[error("Database error: {0}")]
    Database(#[from] DriverError),

    /// A migration script failed; nothing after it in the batch was attempted.
    #[error("Migration {version} failed: {source}")]
    Execution {
        /// Version whose script failed.
        version: i64,
        /// Underlying driver error.
        #[source]
        source: DriverError,
    },

    /// An applied version has no file in the catalog, so it cannot be reverted.
    #[error("Migration {0} is applied but has no file in the migrations directory")]
    MissingMigration(i64),

    /// A rollback step did not lower the current version.
    #[error("Rollback made no progress: track is still at version {0}")]
    NoProgress(i64),

    /// Track relocation or validation error.
    #[error("Track error: {0}")]
    Track(String),
}

impl MigrationError {
    /// Create a configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create an I/O error for a path.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Create an invalid migration error.
    pub fn invalid_migration(msg: impl Into<String>) -> Self {
        Self::InvalidMigration(msg.into())
    }

    /// Create a track error.
    pub fn track(msg: impl Into<String>) -> Self {
        Self::Track(msg.into())
    }

    /// Check if this error is a configuration problem.
    pub fn is_config(&self) -> bool {
        matches!(
            self,
            Self::Config(_) | Self::DuplicateVersion { .. } | Self::Track(_)
        )
    }

    /// The failing migration version, when the error belongs to one.
    pub fn failed_version(&self) -> Option<i64> {
        match self {
            Self::Execution { version, .. } => Some(*version),
            Self::MissingMigration(version) => Some(*version),
            _ => None,
        }
    }
}
