//! SQL dialects for the bookkeeping table.
//!
//! Each supported engine is described by a plain [`Dialect`] record holding
//! its SQL templates and the function that recognizes the engine's
//! "table does not exist" error. Records are looked up by name through a
//! single static table; there is no trait hierarchy.
//!
//! | engine   | placeholders | missing-table signal        |
//! |----------|--------------|-----------------------------|
//! | postgres | `$1, $2`     | SQLSTATE `42P01`            |
//! | mysql    | `?`          | server error `1146`         |
//! | sqlite3  | `?`          | message `no such table: …`  |

use std::fmt;

use crate::database::{SqlValue, Statement};
use crate::error::DriverError;

/// Name of the bookkeeping table.
pub const VERSION_TABLE: &str = "rudder_db_version";

/// Name of the track column added by the schema upgrade.
pub const TRACK_COLUMN: &str = "track";

/// Supported database engines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DialectKind {
    /// PostgreSQL.
    Postgres,
    /// MySQL / MariaDB.
    Mysql,
    /// SQLite 3.
    Sqlite3,
}

impl fmt::Display for DialectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Postgres => write!(f, "postgres"),
            Self::Mysql => write!(f, "mysql"),
            Self::Sqlite3 => write!(f, "sqlite3"),
        }
    }
}

/// SQL templates and error classification for one engine.
pub struct Dialect {
    /// Which engine this record describes.
    pub kind: DialectKind,
    /// Names this dialect is registered under; the first is canonical.
    pub names: &'static [&'static str],
    create_table: &'static str,
    insert_version: &'static str,
    query_versions: &'static str,
    add_track_column: &'static str,
    backfill_track: &'static str,
    reassign_version: &'static str,
    table_exists: &'static str,
    column_exists: &'static str,
    missing_table: fn(&DriverError) -> bool,
}

impl fmt::Debug for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dialect").field("kind", &self.kind).finish()
    }
}

impl PartialEq for Dialect {
    fn eq(&self, other: &Self) -> bool {
        self.kind == other.kind
    }
}

impl Dialect {
    /// Canonical dialect name.
    pub fn name(&self) -> &'static str {
        self.names[0]
    }

    /// DDL creating the bookkeeping table.
    pub fn create_tracking_table_sql(&self) -> &'static str {
        self.create_table
    }

    /// Parameterized insert of one version record: `(version_id, is_applied, track)`.
    pub fn insert_version_sql(&self) -> &'static str {
        self.insert_version
    }

    /// Insert statement for one version record.
    pub fn insert_version(&self, version: i64, applied: bool, track: &str) -> Statement {
        Statement::with_params(
            self.insert_version,
            vec![
                SqlValue::Int(version),
                SqlValue::Bool(applied),
                SqlValue::Text(track.to_string()),
            ],
        )
    }

    /// Query returning `(version_id, is_applied, tstamp)` for a track, most
    /// recent record first.
    pub fn query_applied_versions_sql(&self, track: &str) -> Statement {
        Statement::with_params(self.query_versions, vec![SqlValue::Text(track.to_string())])
    }

    /// DDL adding the track column to a legacy table.
    pub fn alter_table_add_track_column_sql(&self) -> &'static str {
        self.add_track_column
    }

    /// Assign `track` to every record that predates the track column.
    pub fn backfill_track(&self, track: &str) -> Statement {
        Statement::with_params(self.backfill_track, vec![SqlValue::Text(track.to_string())])
    }

    /// Move the records of `version` from track `from` to track `to`.
    pub fn reassign_version(&self, version: i64, from: &str, to: &str) -> Statement {
        Statement::with_params(
            self.reassign_version,
            vec![
                SqlValue::Text(to.to_string()),
                SqlValue::Int(version),
                SqlValue::Text(from.to_string()),
            ],
        )
    }

    /// Count query: 1 when the bookkeeping table exists.
    pub fn table_exists_sql(&self) -> Statement {
        Statement::raw(self.table_exists)
    }

    /// Count query: 1 when the bookkeeping table has the track column.
    pub fn track_column_exists_sql(&self) -> Statement {
        Statement::raw(self.column_exists)
    }

    /// Whether `err` is this engine's "table does not exist" signal.
    ///
    /// Only the engine's documented signal is recognized; every other error is
    /// a real failure.
    pub fn is_missing_table(&self, err: &DriverError) -> bool {
        (self.missing_table)(err)
    }
}

fn postgres_missing_table(err: &DriverError) -> bool {
    err.code() == Some("42P01")
}

fn mysql_missing_table(err: &DriverError) -> bool {
    err.code() == Some("1146")
}

fn sqlite_missing_table(err: &DriverError) -> bool {
    err.message.contains("no such table")
}

static POSTGRES: Dialect = Dialect {
    kind: DialectKind::Postgres,
    names: &["postgres", "postgresql"],
    create_table: r#"CREATE TABLE rudder_db_version (
    id serial NOT NULL,
    version_id bigint NOT NULL,
    is_applied boolean NOT NULL,
    tstamp timestamp NULL default now(),
    track varchar(32) NOT NULL DEFAULT '',
    PRIMARY KEY(id)
)"#,
    insert_version: "INSERT INTO rudder_db_version (version_id, is_applied, track) VALUES ($1, $2, $3)",
    query_versions: "SELECT version_id, is_applied, to_char(tstamp, 'YYYY-MM-DD HH24:MI:SS') \
                     FROM rudder_db_version WHERE track = $1 ORDER BY id DESC",
    add_track_column: "ALTER TABLE rudder_db_version ADD COLUMN track varchar(32) NOT NULL DEFAULT ''",
    backfill_track: "UPDATE rudder_db_version SET track = $1 WHERE track = ''",
    reassign_version: "UPDATE rudder_db_version SET track = $1 WHERE version_id = $2 AND track = $3",
    table_exists: "SELECT COUNT(*) FROM information_schema.tables \
                   WHERE table_schema = current_schema() AND table_name = 'rudder_db_version'",
    column_exists: "SELECT COUNT(*) FROM information_schema.columns \
                    WHERE table_schema = current_schema() AND table_name = 'rudder_db_version' \
                    AND column_name = 'track'",
    missing_table: postgres_missing_table,
};

static MYSQL: Dialect = Dialect {
    kind: DialectKind::Mysql,
    names: &["mysql", "mymysql"],
    create_table: r#"CREATE TABLE rudder_db_version (
    id serial NOT NULL,
    version_id bigint NOT NULL,
    is_applied boolean NOT NULL,
    tstamp timestamp NULL default now(),
    track varchar(32) NOT NULL DEFAULT '',
    PRIMARY KEY(id)
)"#,
    insert_version: "INSERT INTO rudder_db_version (version_id, is_applied, track) VALUES (?, ?, ?)",
    query_versions: "SELECT version_id, is_applied, DATE_FORMAT(tstamp, '%Y-%m-%d %H:%i:%s') \
                     FROM rudder_db_version WHERE track = ? ORDER BY id DESC",
    add_track_column: "ALTER TABLE rudder_db_version ADD COLUMN track varchar(32) NOT NULL DEFAULT ''",
    backfill_track: "UPDATE rudder_db_version SET track = ? WHERE track = ''",
    reassign_version: "UPDATE rudder_db_version SET track = ? WHERE version_id = ? AND track = ?",
    table_exists: "SELECT COUNT(*) FROM information_schema.tables \
                   WHERE table_schema = DATABASE() AND table_name = 'rudder_db_version'",
    column_exists: "SELECT COUNT(*) FROM information_schema.columns \
                    WHERE table_schema = DATABASE() AND table_name = 'rudder_db_version' \
                    AND column_name = 'track'",
    missing_table: mysql_missing_table,
};

static SQLITE3: Dialect = Dialect {
    kind: DialectKind::Sqlite3,
    names: &["sqlite3", "sqlite"],
    create_table: r#"CREATE TABLE rudder_db_version (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    version_id INTEGER NOT NULL,
    is_applied INTEGER NOT NULL,
    tstamp TIMESTAMP DEFAULT (datetime('now')),
    track TEXT NOT NULL DEFAULT ''
)"#,
    insert_version: "INSERT INTO rudder_db_version (version_id, is_applied, track) VALUES (?, ?, ?)",
    query_versions: "SELECT version_id, is_applied, tstamp \
                     FROM rudder_db_version WHERE track = ? ORDER BY id DESC",
    add_track_column: "ALTER TABLE rudder_db_version ADD COLUMN track TEXT NOT NULL DEFAULT ''",
    backfill_track: "UPDATE rudder_db_version SET track = ? WHERE track = ''",
    reassign_version: "UPDATE rudder_db_version SET track = ? WHERE version_id = ? AND track = ?",
    table_exists: "SELECT COUNT(*) FROM sqlite_master \
                   WHERE type = 'table' AND name = 'rudder_db_version'",
    column_exists: "SELECT COUNT(*) FROM pragma_table_info('rudder_db_version') WHERE name = 'track'",
    missing_table: sqlite_missing_table,
};

static DIALECTS: [&Dialect; 3] = [&POSTGRES, &MYSQL, &SQLITE3];

/// Look up a dialect by engine name.
///
/// Returns `None` for unknown names; callers must treat that as a
/// configuration error.
pub fn dialect_by_name(name: &str) -> Option<&'static Dialect> {
    let name = name.trim().to_ascii_lowercase();
    DIALECTS
        .iter()
        .copied()
        .find(|d| d.names.iter().any(|n| *n == name))
}

/// Get the dialect record for a kind.
pub fn dialect_for(kind: DialectKind) -> &'static Dialect {
    match kind {
        DialectKind::Postgres => &POSTGRES,
        DialectKind::Mysql => &MYSQL,
        DialectKind::Sqlite3 => &SQLITE3,
    }
}

/// All registered dialects.
pub fn all_dialects() -> impl Iterator<Item = &'static Dialect> {
    DIALECTS.iter().copied()
}
