//! # rudder-migrate
//!
//! Linear, track-aware SQL migrations.
//!
//! Migrations are plain SQL files numbered by version. A *track* is an
//! independent line of migrations with its own directory and its own
//! history; the default track uses the migrations root itself.
//!
//! ```text
//! database/
//! ├── dbconf.yml
//! └── master/
//!     └── migrations/
//!         ├── 20240101120000_create_users.sql      # default track
//!         ├── 20240102090000_add_posts.sql
//!         └── billing/                             # track "billing"
//!             └── 20240301093000_add_invoices.sql
//! ```
//!
//! Applied versions are recorded in an append-only `rudder_db_version`
//! table. The table is created on first use.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐     ┌────────────────┐     ┌──────────────────┐
//! │   Catalog    │────▶│ MigrationEngine│────▶│ MigrationDatabase│
//! │ (directory)  │     │  plan + steps  │     │  (driver crate)  │
//! └──────────────┘     └────────────────┘     └──────────────────┘
//!                              │                       ▲
//!                              ▼                       │
//!                      ┌────────────────┐     ┌────────────────┐
//!                      │  VersionStore  │────▶│    Dialect     │
//!                      └────────────────┘     └────────────────┘
//! ```
//!
//! ## Example
//!
//! ```rust,ignore
//! use rudder_migrate::{ConfOptions, DbConf, MigrationEngine};
//!
//! async fn migrate<D: rudder_migrate::MigrationDatabase>(db: D) -> rudder_migrate::MigrateResult<()> {
//!     let conf = DbConf::load(&ConfOptions::new().env("production"))?;
//!     let mut engine = MigrationEngine::from_conf(db, &conf);
//!
//!     let report = engine.up().await?;
//!     println!("{}", report.summary());
//!     Ok(())
//! }
//! ```
//!
//! ## Migration files
//!
//! ```sql
//! -- +rudder Up
//! CREATE TABLE post (id int NOT NULL, title text);
//!
//! -- +rudder Down
//! DROP TABLE post;
//! ```
//!
//! A migration may instead be split into `<version>_<name>.up.sql` and
//! `<version>_<name>.down.sql`.

pub mod catalog;
pub mod config;
pub mod database;
pub mod dialect;
pub mod engine;
pub mod error;
pub mod sql;
pub mod store;
pub mod track;

#[cfg(test)]
pub(crate) mod testing;

pub use catalog::{
    collect_migrations, create_migration, list_migrations, most_recent_version,
    parse_migration_filename, version_after, version_before, Catalog, Migration, MigrationName,
    MigrationSource, ScriptPart,
};
pub use config::{
    expand_env, redact_open, ConfOptions, DbConf, DriverKind, CONFIG_FILE_NAME, DEFAULT_DB,
    DEFAULT_ENV, DEFAULT_PATH,
};
pub use database::{MigrationDatabase, SqlValue, Statement, VersionRow};
pub use dialect::{dialect_by_name, dialect_for, Dialect, DialectKind, VERSION_TABLE};
pub use engine::{
    plan_migrations, Direction, MigrationEngine, MigrationReport, MigrationStatus, MigrationStep,
    TrackStatus,
};
pub use error::{DriverError, MigrateResult, MigrationError};
pub use sql::{parse_annotated, split_statements, MigrationSql};
pub use store::{current_version_from_rows, UpgradeOutcome, VersionState, VersionStore};
pub use track::{move_migration_to_track, MovedMigration, Track, MAX_TRACK_LEN};
