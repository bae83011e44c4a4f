//! PostgreSQL driver for Rudder.
//!
//! Implements [`rudder_migrate::MigrationDatabase`] over `tokio-postgres`.
//! Scripts without parameters go through the simple query protocol, so a
//! single statement block may contain several statements.
//!
//! # Example
//!
//! ```rust,ignore
//! use rudder_postgres::PgConnection;
//!
//! let conn = PgConnection::connect("postgres://app@localhost/app", Some("tenant_1")).await?;
//! ```

pub mod config;
pub mod connection;
pub mod error;

pub use config::PgConfig;
pub use connection::PgConnection;
pub use error::{PgError, PgResult};
