//! MySQL driver for Rudder.
//!
//! Implements [`rudder_migrate::MigrationDatabase`] over `mysql_async`.
//! Connection strings may be `mysql://` URLs or `user:pass@tcp(host:port)/db`
//! DSNs.
//!
//! MySQL commits DDL implicitly, so a failed step may leave schema changes
//! behind even though its version row is never written.
//!
//! # Example
//!
//! ```rust,ignore
//! use rudder_mysql::MysqlConnection;
//!
//! let conn = MysqlConnection::connect("app:secret@tcp(localhost:3306)/app").await?;
//! ```

pub mod config;
pub mod connection;
pub mod error;

pub use config::MysqlConfig;
pub use connection::MysqlConnection;
pub use error::{MysqlError, MysqlResult};
