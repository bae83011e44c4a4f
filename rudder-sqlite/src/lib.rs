//! SQLite driver for Rudder.
//!
//! Implements [`rudder_migrate::MigrationDatabase`] over `tokio-rusqlite`.
//!
//! # Example
//!
//! ```rust,ignore
//! use rudder_sqlite::SqliteConnection;
//!
//! let conn = SqliteConnection::connect("sqlite://db/app.sqlite3").await?;
//! ```

pub mod config;
pub mod connection;
pub mod error;

pub use config::{DatabasePath, JournalMode, SqliteConfig};
pub use connection::SqliteConnection;
pub use error::{SqliteError, SqliteResult};
