//! SQLite configuration.

use std::path::{Path, PathBuf};

use crate::error::{SqliteError, SqliteResult};

/// Where the database lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DatabasePath {
    /// In-memory database, gone when the connection closes.
    Memory,
    /// File-based database.
    File(PathBuf),
}

impl DatabasePath {
    /// Check if this is an in-memory database.
    pub fn is_memory(&self) -> bool {
        matches!(self, Self::Memory)
    }
}

/// SQLite journal mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JournalMode {
    /// Delete the rollback journal after each transaction.
    Delete,
    /// Write-Ahead Logging.
    Wal,
}

impl JournalMode {
    /// Get the SQLite pragma value.
    pub fn as_pragma(&self) -> &'static str {
        match self {
            Self::Delete => "DELETE",
            Self::Wal => "WAL",
        }
    }
}

/// SQLite connection configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SqliteConfig {
    /// Database location.
    pub path: DatabasePath,
    /// Enforce foreign keys.
    pub foreign_keys: bool,
    /// Busy timeout in milliseconds.
    pub busy_timeout_ms: Option<u32>,
    /// Journal mode; `None` keeps the database's own setting.
    pub journal_mode: Option<JournalMode>,
}

impl SqliteConfig {
    /// Configuration for an in-memory database.
    pub fn memory() -> Self {
        Self {
            path: DatabasePath::Memory,
            foreign_keys: true,
            busy_timeout_ms: Some(5000),
            journal_mode: None,
        }
    }

    /// Configuration for a file-based database.
    pub fn file(path: impl AsRef<Path>) -> Self {
        Self {
            path: DatabasePath::File(path.as_ref().to_path_buf()),
            ..Self::memory()
        }
    }

    /// Parse a connection string.
    ///
    /// Supported formats:
    /// - `:memory:` or `sqlite::memory:` - In-memory database
    /// - `sqlite://path/to/db.sqlite` - File-based database
    /// - `file:path/to/db.sqlite` - Alternative format
    /// - `path/to/db.sqlite` - Plain path
    ///
    /// Query parameters `foreign_keys`, `busy_timeout` and `journal_mode`
    /// are honored.
    pub fn from_open(open: &str) -> SqliteResult<Self> {
        let open = open.trim();
        let (location, query) = match open.split_once('?') {
            Some((location, query)) => (location, Some(query)),
            None => (open, None),
        };

        let location = location
            .strip_prefix("sqlite://")
            .or_else(|| location.strip_prefix("sqlite:"))
            .or_else(|| location.strip_prefix("file:"))
            .unwrap_or(location);

        let mut config = match location {
            "" => return Err(SqliteError::config("database path is required")),
            ":memory:" => Self::memory(),
            path => Self::file(path),
        };

        for pair in query.into_iter().flat_map(|q| q.split('&')) {
            let Some((key, value)) = pair.split_once('=') else {
                continue;
            };
            match key {
                "mode" if value == "memory" => config.path = DatabasePath::Memory,
                "foreign_keys" => config.foreign_keys = matches!(value, "true" | "1" | "on"),
                "busy_timeout" => {
                    let ms = value
                        .parse()
                        .map_err(|_| SqliteError::config(format!("invalid busy_timeout '{}'", value)))?;
                    config.busy_timeout_ms = Some(ms);
                }
                "journal_mode" => {
                    config.journal_mode = match value.to_ascii_lowercase().as_str() {
                        "wal" => Some(JournalMode::Wal),
                        "delete" => Some(JournalMode::Delete),
                        other => {
                            return Err(SqliteError::config(format!("unsupported journal_mode '{}'", other)));
                        }
                    };
                }
                _ => {}
            }
        }

        Ok(config)
    }

    /// Pragmas run right after opening a connection.
    pub fn init_sql(&self) -> String {
        let mut sql = String::new();
        if self.foreign_keys {
            sql.push_str("PRAGMA foreign_keys = ON;\n");
        }
        if let Some(timeout) = self.busy_timeout_ms {
            sql.push_str(&format!("PRAGMA busy_timeout = {};\n", timeout));
        }
        if let Some(mode) = self.journal_mode {
            sql.push_str(&format!("PRAGMA journal_mode = {};\n", mode.as_pragma()));
        }
        sql
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_open_formats() {
        assert!(SqliteConfig::from_open(":memory:").unwrap().path.is_memory());
        assert!(SqliteConfig::from_open("sqlite::memory:").unwrap().path.is_memory());
        assert_eq!(
            SqliteConfig::from_open("sqlite://data/app.db").unwrap().path,
            DatabasePath::File(PathBuf::from("data/app.db"))
        );
        assert_eq!(
            SqliteConfig::from_open("db/test.sqlite3").unwrap().path,
            DatabasePath::File(PathBuf::from("db/test.sqlite3"))
        );
        assert!(SqliteConfig::from_open("sqlite://").is_err());
    }

    #[test]
    fn test_query_parameters() {
        let config =
            SqliteConfig::from_open("sqlite://app.db?foreign_keys=false&busy_timeout=250&journal_mode=wal")
                .unwrap();
        assert!(!config.foreign_keys);
        assert_eq!(config.busy_timeout_ms, Some(250));
        assert_eq!(config.journal_mode, Some(JournalMode::Wal));

        assert!(SqliteConfig::from_open("app.db?busy_timeout=soon").is_err());
        assert!(SqliteConfig::from_open("app.db?journal_mode=off").is_err());
    }

    #[test]
    fn test_init_sql() {
        let sql = SqliteConfig::from_open("app.db?journal_mode=wal").unwrap().init_sql();
        assert!(sql.contains("PRAGMA foreign_keys = ON;"));
        assert!(sql.contains("PRAGMA busy_timeout = 5000;"));
        assert!(sql.contains("PRAGMA journal_mode = WAL;"));
    }
}
