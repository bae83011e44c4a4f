//! # Rudder
//!
//! Linear, track-aware SQL migrations for PostgreSQL, MySQL, and SQLite.
//!
//! Rudder provides:
//! - Versioned SQL migration files with `-- +rudder Up` / `-- +rudder Down` sections
//! - Independent *tracks*, each with its own directory and history
//! - One transaction per migration, covering the script and its bookkeeping row
//! - Async drivers built on Tokio
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use rudder::prelude::*;
//! use rudder::sqlite::SqliteConnection;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let conf = DbConf::load(&ConfOptions::new().env("test"))?;
//!     let db = SqliteConnection::connect(&conf.open).await?;
//!
//!     let mut engine = MigrationEngine::from_conf(db, &conf);
//!     let report = engine.up().await?;
//!     println!("{}", report.summary());
//!     Ok(())
//! }
//! ```

#![cfg_attr(docsrs, feature(doc_cfg))]
#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

/// Migration engine, catalog, version store, and configuration.
pub mod migrate {
    pub use rudder_migrate::*;
}

/// PostgreSQL driver.
#[cfg(feature = "postgres")]
#[cfg_attr(docsrs, doc(cfg(feature = "postgres")))]
pub mod postgres {
    pub use rudder_postgres::*;
}

/// MySQL driver.
#[cfg(feature = "mysql")]
#[cfg_attr(docsrs, doc(cfg(feature = "mysql")))]
pub mod mysql {
    pub use rudder_mysql::*;
}

/// SQLite driver.
#[cfg(feature = "sqlite")]
#[cfg_attr(docsrs, doc(cfg(feature = "sqlite")))]
pub mod sqlite {
    pub use rudder_sqlite::*;
}

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::migrate::{
        ConfOptions, DbConf, Direction, MigrationDatabase, MigrationEngine, MigrationError,
        MigrationReport, Track, TrackStatus,
    };
}

// Re-export key types at the crate root
pub use migrate::{MigrateResult, MigrationEngine, MigrationError};
