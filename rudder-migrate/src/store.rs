//! Version bookkeeping.
//!
//! History is append-only: every apply or revert inserts one row into
//! `rudder_db_version`. The state of a version is the one recorded by its
//! most recent row, and the current version of a track is the highest
//! version whose most recent row says "applied". Nothing else stores the
//! current version.

use std::collections::{BTreeMap, HashSet};

use chrono::NaiveDateTime;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::database::{MigrationDatabase, Statement, VersionRow};
use crate::dialect::Dialect;
use crate::error::{MigrateResult, MigrationError};
use crate::track::Track;

/// Timestamp format produced by every dialect's version query.
const TSTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Latest recorded state of one version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VersionState {
    /// Whether the version is applied.
    pub applied: bool,
    /// When the latest transition was recorded.
    pub recorded_at: Option<NaiveDateTime>,
}

/// What [`VersionStore::upgrade_bookkeeping_schema`] did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpgradeOutcome {
    /// The track column was added and legacy rows assigned to `track`.
    Upgraded {
        /// Track the legacy rows now belong to.
        track: Track,
    },
    /// The table already had the track column; nothing changed.
    AlreadyUpgraded,
    /// There is no bookkeeping table yet; it will be created with the
    /// track column on first use.
    MissingTable,
}

/// Project version rows (most recent first) onto the current version.
///
/// The first row seen for a version is its latest state. Returns the highest
/// version whose latest state is applied, or 0.
pub fn current_version_from_rows(rows: &[VersionRow]) -> i64 {
    let mut seen = HashSet::new();
    rows.iter()
        .filter(|row| seen.insert(row.version))
        .filter(|row| row.applied)
        .map(|row| row.version)
        .max()
        .unwrap_or(0)
}

/// Reads and writes the bookkeeping table for one track.
#[derive(Debug, Clone)]
pub struct VersionStore {
    dialect: &'static Dialect,
    track: Track,
}

impl VersionStore {
    /// Create a store for `track`.
    pub fn new(dialect: &'static Dialect, track: Track) -> Self {
        Self { dialect, track }
    }

    /// The dialect in use.
    pub fn dialect(&self) -> &'static Dialect {
        self.dialect
    }

    /// The track this store reads and writes.
    pub fn track(&self) -> &Track {
        &self.track
    }

    /// Current version of the track.
    ///
    /// When the bookkeeping table does not exist it is created along with a
    /// seed row for version 0, and 0 is returned.
    pub async fn current_version<D>(&self, db: &mut D) -> MigrateResult<i64>
    where
        D: MigrationDatabase + ?Sized,
    {
        let rows = self.load_rows(db).await?;
        Ok(current_version_from_rows(&rows))
    }

    /// Latest state of every version recorded for the track.
    ///
    /// The seed row for version 0 is not included.
    pub async fn history<D>(&self, db: &mut D) -> MigrateResult<BTreeMap<i64, VersionState>>
    where
        D: MigrationDatabase + ?Sized,
    {
        let rows = self.load_rows(db).await?;
        let mut history = BTreeMap::new();
        for row in rows.into_iter().filter(|r| r.version != 0) {
            history.entry(row.version).or_insert_with(|| VersionState {
                applied: row.applied,
                recorded_at: row.tstamp.as_deref().and_then(parse_tstamp),
            });
        }
        Ok(history)
    }

    /// The insert recording a transition of `version`.
    ///
    /// The engine runs it inside the migration's own transaction.
    pub fn transition_statement(&self, version: i64, applied: bool) -> Statement {
        self.dialect.insert_version(version, applied, self.track.as_str())
    }

    /// Record a transition of `version` on its own.
    pub async fn record_transition<D>(&self, db: &mut D, version: i64, applied: bool) -> MigrateResult<()>
    where
        D: MigrationDatabase + ?Sized,
    {
        db.execute(&self.transition_statement(version, applied)).await?;
        debug!(track = %self.track, version, applied, "Recorded version transition");
        Ok(())
    }

    /// Move the history rows of `version` from track `from` to track `to`.
    ///
    /// Returns the number of rows moved; a missing bookkeeping table has
    /// no rows to move.
    pub async fn reassign_version<D>(
        &self,
        db: &mut D,
        version: i64,
        from: &Track,
        to: &Track,
    ) -> MigrateResult<u64>
    where
        D: MigrationDatabase + ?Sized,
    {
        let stmt = self.dialect.reassign_version(version, from.as_str(), to.as_str());
        let moved = match db.execute(&stmt).await {
            Ok(moved) => moved,
            Err(e) if self.dialect.is_missing_table(&e) => {
                debug!(version, "No bookkeeping table; no history to reassign");
                0
            }
            Err(e) => return Err(e.into()),
        };
        info!(version, from = %from, to = %to, rows = moved, "Reassigned version history");
        Ok(moved)
    }

    /// Add the track column to a bookkeeping table created before tracks
    /// existed, assigning every existing row to this store's track.
    ///
    /// Safe to run repeatedly: the column is probed first and never added
    /// twice.
    pub async fn upgrade_bookkeeping_schema<D>(&self, db: &mut D) -> MigrateResult<UpgradeOutcome>
    where
        D: MigrationDatabase + ?Sized,
    {
        if db.query_count(&self.dialect.table_exists_sql()).await? == 0 {
            info!("No bookkeeping table; nothing to upgrade");
            return Ok(UpgradeOutcome::MissingTable);
        }
        if db.query_count(&self.dialect.track_column_exists_sql()).await? > 0 {
            info!("Bookkeeping table already has a track column");
            return Ok(UpgradeOutcome::AlreadyUpgraded);
        }

        let mut stmts = vec![Statement::raw(self.dialect.alter_table_add_track_column_sql())];
        if !self.track.is_default() {
            stmts.push(self.dialect.backfill_track(self.track.as_str()));
        }
        db.transaction(&stmts).await.map_err(|(_, e)| MigrationError::Database(e))?;

        info!(track = %self.track, "Upgraded bookkeeping table");
        Ok(UpgradeOutcome::Upgraded {
            track: self.track.clone(),
        })
    }

    async fn load_rows<D>(&self, db: &mut D) -> MigrateResult<Vec<VersionRow>>
    where
        D: MigrationDatabase + ?Sized,
    {
        let query = self.dialect.query_applied_versions_sql(self.track.as_str());
        match db.query_versions(&query).await {
            Ok(rows) => Ok(rows),
            Err(e) if self.dialect.is_missing_table(&e) => {
                warn!(dialect = self.dialect.name(), "Bookkeeping table missing; creating it");
                self.create_table(db).await?;
                Ok(Vec::new())
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn create_table<D>(&self, db: &mut D) -> MigrateResult<()>
    where
        D: MigrationDatabase + ?Sized,
    {
        let stmts = [
            Statement::raw(self.dialect.create_tracking_table_sql()),
            self.transition_statement(0, true),
        ];
        db.transaction(&stmts).await.map_err(|(_, e)| MigrationError::Database(e))
    }
}

fn parse_tstamp(s: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(s.trim(), TSTAMP_FORMAT)
        .map_err(|e| debug!(value = %s, error = %e, "Unparseable version timestamp"))
        .ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dialect::{all_dialects, dialect_by_name};
    use crate::testing::FakeDatabase;
    use pretty_assertions::assert_eq;

    fn row(version: i64, applied: bool) -> VersionRow {
        VersionRow {
            version,
            applied,
            tstamp: None,
        }
    }

    fn sqlite() -> &'static Dialect {
        dialect_by_name("sqlite3").unwrap()
    }

    #[test]
    fn test_latest_row_wins() {
        assert_eq!(current_version_from_rows(&[]), 0);
        assert_eq!(current_version_from_rows(&[row(0, true)]), 0);

        // Applied 1 and 2, then reverted 2.
        let rows = [row(2, false), row(2, true), row(1, true), row(0, true)];
        assert_eq!(current_version_from_rows(&rows), 1);

        // Reverted 2, then applied it again.
        let rows = [row(2, true), row(2, false), row(2, true), row(1, true)];
        assert_eq!(current_version_from_rows(&rows), 2);

        // Everything reverted.
        let rows = [row(1, false), row(2, false), row(2, true), row(1, true), row(0, true)];
        assert_eq!(current_version_from_rows(&rows), 0);
    }

    #[tokio::test]
    async fn test_lazy_table_creation_once() {
        for dialect in all_dialects() {
            let mut db = FakeDatabase::new(dialect);
            let store = VersionStore::new(dialect, Track::default());

            assert_eq!(store.current_version(&mut db).await.unwrap(), 0);
            assert_eq!(store.current_version(&mut db).await.unwrap(), 0);

            assert_eq!(db.creates, 1, "{}", dialect.name());
            assert_eq!(db.rows_for(""), vec![(0, true)]);
        }
    }

    #[tokio::test]
    async fn test_seed_row_per_track() {
        let mut db = FakeDatabase::new(sqlite());
        let default = VersionStore::new(sqlite(), Track::default());
        let billing = VersionStore::new(sqlite(), Track::new("billing").unwrap());

        default.current_version(&mut db).await.unwrap();
        default.record_transition(&mut db, 3, true).await.unwrap();

        assert_eq!(billing.current_version(&mut db).await.unwrap(), 0);
        assert_eq!(default.current_version(&mut db).await.unwrap(), 3);
        assert_eq!(db.creates, 1);
    }

    #[tokio::test]
    async fn test_record_and_history() {
        let mut db = FakeDatabase::new(sqlite());
        let store = VersionStore::new(sqlite(), Track::default());
        store.current_version(&mut db).await.unwrap();

        store.record_transition(&mut db, 1, true).await.unwrap();
        store.record_transition(&mut db, 2, true).await.unwrap();
        store.record_transition(&mut db, 2, false).await.unwrap();

        assert_eq!(store.current_version(&mut db).await.unwrap(), 1);

        let history = store.history(&mut db).await.unwrap();
        assert_eq!(history.keys().copied().collect::<Vec<_>>(), vec![1, 2]);
        assert!(history[&1].applied);
        assert!(!history[&2].applied);
        assert_eq!(
            history[&1].recorded_at,
            NaiveDateTime::parse_from_str("2024-05-01 12:00:00", TSTAMP_FORMAT).ok()
        );
    }

    #[tokio::test]
    async fn test_other_errors_are_fatal() {
        struct Broken;

        #[async_trait::async_trait]
        impl MigrationDatabase for Broken {
            async fn query_versions(
                &mut self,
                _: &Statement,
            ) -> Result<Vec<VersionRow>, crate::error::DriverError> {
                Err(crate::error::DriverError::with_code("28P01", "password authentication failed"))
            }
            async fn query_count(&mut self, _: &Statement) -> Result<i64, crate::error::DriverError> {
                unreachable!()
            }
            async fn execute(&mut self, _: &Statement) -> Result<u64, crate::error::DriverError> {
                panic!("must not try to create the table")
            }
            async fn transaction(
                &mut self,
                _: &[Statement],
            ) -> Result<(), (usize, crate::error::DriverError)> {
                panic!("must not try to create the table")
            }
        }

        let pg = dialect_by_name("postgres").unwrap();
        let store = VersionStore::new(pg, Track::default());
        let err = store.current_version(&mut Broken).await.unwrap_err();
        assert!(matches!(err, MigrationError::Database(_)));
        assert!(err.to_string().contains("password authentication failed"));
    }

    #[tokio::test]
    async fn test_upgrade_is_idempotent() {
        let mut db = FakeDatabase::legacy(sqlite(), &[(0, true), (1, true), (2, true)]);
        let store = VersionStore::new(sqlite(), Track::new("main").unwrap());

        let first = store.upgrade_bookkeeping_schema(&mut db).await.unwrap();
        assert_eq!(
            first,
            UpgradeOutcome::Upgraded {
                track: Track::new("main").unwrap()
            }
        );
        assert!(db.has_track_column());
        assert_eq!(db.rows_for("main"), vec![(0, true), (1, true), (2, true)]);

        let second = store.upgrade_bookkeeping_schema(&mut db).await.unwrap();
        assert_eq!(second, UpgradeOutcome::AlreadyUpgraded);
        assert_eq!(db.rows().len(), 3);
        assert_eq!(store.current_version(&mut db).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_upgrade_without_table() {
        let mut db = FakeDatabase::new(sqlite());
        let store = VersionStore::new(sqlite(), Track::default());
        assert_eq!(
            store.upgrade_bookkeeping_schema(&mut db).await.unwrap(),
            UpgradeOutcome::MissingTable
        );
        assert_eq!(db.creates, 0);
    }

    #[tokio::test]
    async fn test_reassign_version() {
        let mut db = FakeDatabase::new(sqlite());
        let store = VersionStore::new(sqlite(), Track::default());
        let v2 = Track::new("v2").unwrap();
        store.current_version(&mut db).await.unwrap();
        store.record_transition(&mut db, 4, true).await.unwrap();
        store.record_transition(&mut db, 5, true).await.unwrap();

        let moved = store
            .reassign_version(&mut db, 4, &Track::default(), &v2)
            .await
            .unwrap();
        assert_eq!(moved, 1);
        assert_eq!(db.rows_for("v2"), vec![(4, true)]);
        assert_eq!(store.current_version(&mut db).await.unwrap(), 5);
    }

    #[tokio::test]
    async fn test_reassign_without_table() {
        let mut db = FakeDatabase::new(sqlite());
        let store = VersionStore::new(sqlite(), Track::default());
        let v2 = Track::new("v2").unwrap();

        let moved = store
            .reassign_version(&mut db, 4, &Track::default(), &v2)
            .await
            .unwrap();
        assert_eq!(moved, 0);
        assert_eq!(db.creates, 0);
    }
}
