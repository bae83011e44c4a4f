//! In-memory `MigrationDatabase` for unit tests.
//!
//! Recognizes the bookkeeping statements of the configured dialect and
//! records every other statement as an executed script. A script containing
//! `FAIL` returns an error, which rolls back its whole transaction.

use crate::database::{MigrationDatabase, Statement, SqlValue, VersionRow};
use crate::dialect::{Dialect, DialectKind};
use crate::error::DriverError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct FakeRow {
    pub version: i64,
    pub applied: bool,
    pub track: String,
}

#[derive(Debug, Clone, Default)]
struct State {
    table: bool,
    track_column: bool,
    rows: Vec<FakeRow>,
    executed: Vec<String>,
}

#[derive(Debug)]
pub(crate) struct FakeDatabase {
    dialect: &'static Dialect,
    state: State,
    pub creates: usize,
    pub queries: usize,
    pub fail_reassign: bool,
}

impl FakeDatabase {
    pub fn new(dialect: &'static Dialect) -> Self {
        Self {
            dialect,
            state: State::default(),
            creates: 0,
            queries: 0,
            fail_reassign: false,
        }
    }

    /// A bookkeeping table created before tracks existed.
    pub fn legacy(dialect: &'static Dialect, versions: &[(i64, bool)]) -> Self {
        let mut db = Self::new(dialect);
        db.state.table = true;
        db.state.rows = versions
            .iter()
            .map(|(version, applied)| FakeRow {
                version: *version,
                applied: *applied,
                track: String::new(),
            })
            .collect();
        db
    }

    pub fn rows(&self) -> &[FakeRow] {
        &self.state.rows
    }

    pub fn rows_for(&self, track: &str) -> Vec<(i64, bool)> {
        self.state
            .rows
            .iter()
            .filter(|r| r.track == track)
            .map(|r| (r.version, r.applied))
            .collect()
    }

    pub fn executed(&self) -> &[String] {
        &self.state.executed
    }

    pub fn has_track_column(&self) -> bool {
        self.state.track_column
    }

    fn missing_table(&self) -> DriverError {
        match self.dialect.kind {
            DialectKind::Postgres => {
                DriverError::with_code("42P01", "relation \"rudder_db_version\" does not exist")
            }
            DialectKind::Mysql => {
                DriverError::with_code("1146", "Table 'app.rudder_db_version' doesn't exist")
            }
            DialectKind::Sqlite3 => DriverError::with_code("1", "no such table: rudder_db_version"),
        }
    }

    fn apply(state: &mut State, dialect: &Dialect, stmt: &Statement) -> Result<u64, DriverError> {
        let sql = stmt.sql.as_str();
        if sql == dialect.create_tracking_table_sql() {
            if state.table {
                return Err(DriverError::new("table rudder_db_version already exists"));
            }
            state.table = true;
            state.track_column = true;
            return Ok(0);
        }
        if sql == dialect.insert_version_sql() {
            match stmt.params.as_slice() {
                [SqlValue::Int(version), SqlValue::Bool(applied), SqlValue::Text(track)] => {
                    state.rows.push(FakeRow {
                        version: *version,
                        applied: *applied,
                        track: track.clone(),
                    });
                    return Ok(1);
                }
                other => return Err(DriverError::new(format!("bad insert params {:?}", other))),
            }
        }
        if sql == dialect.alter_table_add_track_column_sql() {
            if state.track_column {
                return Err(DriverError::new("duplicate column name: track"));
            }
            state.track_column = true;
            return Ok(0);
        }
        if sql == dialect.backfill_track("").sql {
            let Some(SqlValue::Text(track)) = stmt.params.first() else {
                return Err(DriverError::new("bad backfill params"));
            };
            let mut n = 0;
            for row in state.rows.iter_mut().filter(|r| r.track.is_empty()) {
                row.track = track.clone();
                n += 1;
            }
            return Ok(n);
        }
        if sql == dialect.reassign_version(0, "", "").sql {
            let [SqlValue::Text(to), SqlValue::Int(version), SqlValue::Text(from)] =
                stmt.params.as_slice()
            else {
                return Err(DriverError::new("bad reassign params"));
            };
            let mut n = 0;
            for row in state
                .rows
                .iter_mut()
                .filter(|r| r.version == *version && &r.track == from)
            {
                row.track = to.clone();
                n += 1;
            }
            return Ok(n);
        }
        if sql.contains("FAIL") {
            return Err(DriverError::with_code("42601", format!("syntax error in '{}'", sql)));
        }
        state.executed.push(sql.to_string());
        Ok(0)
    }
}

#[async_trait::async_trait]
impl MigrationDatabase for FakeDatabase {
    async fn query_versions(&mut self, stmt: &Statement) -> Result<Vec<VersionRow>, DriverError> {
        self.queries += 1;
        if !self.state.table {
            return Err(self.missing_table());
        }
        let Some(SqlValue::Text(track)) = stmt.params.first() else {
            return Err(DriverError::new("missing track parameter"));
        };
        Ok(self
            .state
            .rows
            .iter()
            .rev()
            .filter(|r| &r.track == track)
            .map(|r| VersionRow {
                version: r.version,
                applied: r.applied,
                tstamp: Some("2024-05-01 12:00:00".to_string()),
            })
            .collect())
    }

    async fn query_count(&mut self, stmt: &Statement) -> Result<i64, DriverError> {
        if stmt.sql == self.dialect.table_exists_sql().sql {
            Ok(self.state.table as i64)
        } else if stmt.sql == self.dialect.track_column_exists_sql().sql {
            Ok((self.state.table && self.state.track_column) as i64)
        } else {
            Err(DriverError::new(format!("unexpected count query '{}'", stmt.sql)))
        }
    }

    async fn execute(&mut self, stmt: &Statement) -> Result<u64, DriverError> {
        if stmt.sql == self.dialect.create_tracking_table_sql() {
            self.creates += 1;
        }
        if stmt.sql == self.dialect.reassign_version(0, "", "").sql {
            if !self.state.table {
                return Err(self.missing_table());
            }
            if self.fail_reassign {
                return Err(DriverError::with_code("40001", "could not serialize access"));
            }
        }
        Self::apply(&mut self.state, self.dialect, stmt)
    }

    async fn transaction(&mut self, stmts: &[Statement]) -> Result<(), (usize, DriverError)> {
        let mut scratch = self.state.clone();
        for (idx, stmt) in stmts.iter().enumerate() {
            if stmt.sql == self.dialect.create_tracking_table_sql() {
                self.creates += 1;
            }
            Self::apply(&mut scratch, self.dialect, stmt).map_err(|e| (idx, e))?;
        }
        self.state = scratch;
        Ok(())
    }
}
