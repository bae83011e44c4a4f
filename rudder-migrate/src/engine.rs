//! Migration engine.
//!
//! Every command reduces to [`MigrationEngine::run_migrations`]: move the
//! track from its current version to a target version, one migration per
//! transaction. A step's script and its bookkeeping row commit together or
//! not at all. Steps already committed stay committed when a later one
//! fails, so rerunning the same command resumes where it stopped.

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use chrono::NaiveDateTime;
use serde::Serialize;
use tracing::{debug, error, info};

use crate::catalog::{Catalog, Migration};
use crate::config::DbConf;
use crate::database::{MigrationDatabase, Statement};
use crate::dialect::Dialect;
use crate::error::{MigrateResult, MigrationError};
use crate::store::{UpgradeOutcome, VersionStore};
use crate::track::{move_migration_to_track, MovedMigration, Track};

/// Direction of a migration step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// Apply the up script.
    Up,
    /// Apply the down script.
    Down,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Up => write!(f, "up"),
            Self::Down => write!(f, "down"),
        }
    }
}

/// Migrations to run, in execution order, for moving `current` to `target`.
///
/// Forward plans are ascending over `(current, target]`; reverse plans are
/// descending over `(target, current]`.
pub fn plan_migrations(catalog: &Catalog, current: i64, target: i64) -> (Direction, Vec<&Migration>) {
    if target >= current {
        (Direction::Up, catalog.range(current, target).iter().collect())
    } else {
        (Direction::Down, catalog.range(target, current).iter().rev().collect())
    }
}

/// One executed migration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MigrationStep {
    /// Version migrated.
    pub version: i64,
    /// Migration name.
    pub name: String,
    /// Direction it ran in.
    pub direction: Direction,
    /// Number of script statements executed.
    pub statements: usize,
    /// Wall time of the transaction.
    #[serde(with = "duration_ms")]
    pub duration: Duration,
}

/// Outcome of a batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MigrationReport {
    /// Track the batch ran on.
    pub track: Track,
    /// Version before the batch.
    pub from: i64,
    /// Version after the batch.
    pub to: i64,
    /// Executed steps in order.
    pub steps: Vec<MigrationStep>,
}

impl MigrationReport {
    fn noop(track: &Track, version: i64) -> Self {
        Self {
            track: track.clone(),
            from: version,
            to: version,
            steps: Vec::new(),
        }
    }

    /// Whether nothing ran.
    pub fn is_noop(&self) -> bool {
        self.steps.is_empty()
    }

    /// Total wall time of all steps.
    pub fn duration(&self) -> Duration {
        self.steps.iter().map(|s| s.duration).sum()
    }

    /// Join a following batch onto this one.
    fn extend(&mut self, next: MigrationReport) {
        self.to = next.to;
        self.steps.extend(next.steps);
    }

    /// Human readable one-line summary.
    pub fn summary(&self) -> String {
        if self.is_noop() {
            return format!("No migrations to run; track {} is at version {}", self.track, self.to);
        }
        let applied = self.steps.iter().filter(|s| s.direction == Direction::Up).count();
        let reverted = self.steps.len() - applied;

        let mut parts = Vec::new();
        if applied > 0 {
            parts.push(format!("{} applied", applied));
        }
        if reverted > 0 {
            parts.push(format!("{} reverted", reverted));
        }
        format!(
            "{} in {}ms; track {} moved from {} to {}",
            parts.join(", "),
            self.duration().as_millis(),
            self.track,
            self.from,
            self.to
        )
    }
}

mod duration_ms {
    use std::time::Duration;

    pub fn serialize<S: serde::Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_millis() as u64)
    }
}

/// Status of one migration in a track.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MigrationStatus {
    /// Version identifier.
    pub version: i64,
    /// Migration file, or `None` for an applied version whose file is gone.
    pub file: Option<String>,
    /// Whether the version is applied.
    pub applied: bool,
    /// When the latest transition of this version was recorded.
    pub recorded_at: Option<NaiveDateTime>,
}

/// Status of a whole track.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TrackStatus {
    /// Track name.
    pub track: Track,
    /// Current version.
    pub current_version: i64,
    /// One entry per migration, ascending.
    pub migrations: Vec<MigrationStatus>,
}

impl TrackStatus {
    /// Migrations not yet applied.
    pub fn pending(&self) -> impl Iterator<Item = &MigrationStatus> {
        self.migrations.iter().filter(|m| !m.applied)
    }
}

/// Runs migrations for one track over one database connection.
pub struct MigrationEngine<D: MigrationDatabase> {
    db: D,
    store: VersionStore,
    migrations_root: PathBuf,
}

impl<D: MigrationDatabase> MigrationEngine<D> {
    /// Create an engine for `track`, with track directories under
    /// `migrations_root`.
    pub fn new(db: D, dialect: &'static Dialect, migrations_root: impl Into<PathBuf>, track: Track) -> Self {
        Self {
            db,
            store: VersionStore::new(dialect, track),
            migrations_root: migrations_root.into(),
        }
    }

    /// Create an engine from a resolved configuration.
    pub fn from_conf(db: D, conf: &DbConf) -> Self {
        Self::new(db, conf.dialect, conf.migrations_root.clone(), conf.track.clone())
    }

    /// The track this engine operates on.
    pub fn track(&self) -> &Track {
        self.store.track()
    }

    /// Root of the migrations tree.
    pub fn migrations_root(&self) -> &Path {
        &self.migrations_root
    }

    /// Directory of this engine's track.
    pub fn migrations_dir(&self) -> PathBuf {
        self.track().dir(&self.migrations_root)
    }

    /// Access the underlying connection.
    pub fn database(&mut self) -> &mut D {
        &mut self.db
    }

    /// Release the engine and return the connection.
    pub fn into_database(self) -> D {
        self.db
    }

    /// Load the catalog of this engine's track.
    pub async fn catalog(&self) -> MigrateResult<Catalog> {
        Catalog::load(self.migrations_dir()).await
    }

    /// Current version of the track.
    pub async fn current_version(&mut self) -> MigrateResult<i64> {
        self.store.current_version(&mut self.db).await
    }

    /// Move the track to `target`.
    ///
    /// Stops at the first failing step and reports its version; earlier
    /// steps stay committed.
    pub async fn run_migrations(&mut self, target: i64) -> MigrateResult<MigrationReport> {
        let catalog = self.catalog().await?;
        self.run_with_catalog(&catalog, target).await
    }

    /// Apply every pending migration.
    pub async fn up(&mut self) -> MigrateResult<MigrationReport> {
        let catalog = self.catalog().await?;
        let target = catalog.most_recent_version();
        self.run_with_catalog(&catalog, target).await
    }

    /// Revert the most recent migration.
    pub async fn down(&mut self) -> MigrateResult<MigrationReport> {
        let catalog = self.catalog().await?;
        let current = self.current_version().await?;
        self.run_with_catalog(&catalog, catalog.version_before(current)).await
    }

    /// Revert migrations one step at a time until the track is at 0.
    pub async fn down_all(&mut self) -> MigrateResult<MigrationReport> {
        let catalog = self.catalog().await?;
        let start = self.current_version().await?;
        let mut report = MigrationReport::noop(self.track(), start);

        let mut current = start;
        while current != 0 {
            let step = self.run_with_catalog(&catalog, catalog.version_before(current)).await?;
            let next = self.current_version().await?;
            report.extend(step);
            if next >= current {
                return Err(MigrationError::NoProgress(next));
            }
            current = next;
        }

        Ok(report)
    }

    /// Revert the most recent migration, then apply it again.
    pub async fn redo(&mut self) -> MigrateResult<MigrationReport> {
        let catalog = self.catalog().await?;
        let current = self.current_version().await?;
        if current == 0 {
            info!(track = %self.track(), "Nothing applied; nothing to redo");
            return Ok(MigrationReport::noop(self.track(), 0));
        }

        let mut report = self.run_with_catalog(&catalog, catalog.version_before(current)).await?;
        report.extend(self.run_with_catalog(&catalog, current).await?);
        Ok(report)
    }

    /// Applied state of every migration in the track.
    pub async fn status(&mut self) -> MigrateResult<TrackStatus> {
        let catalog = self.catalog().await?;
        let mut history = self.store.history(&mut self.db).await?;
        let current_version = self.current_version().await?;

        let mut migrations: Vec<MigrationStatus> = catalog
            .migrations()
            .iter()
            .map(|m| {
                let state = history.remove(&m.version);
                MigrationStatus {
                    version: m.version,
                    file: Some(m.primary_file().to_string()),
                    applied: state.as_ref().is_some_and(|s| s.applied),
                    recorded_at: state.and_then(|s| s.recorded_at),
                }
            })
            .collect();

        // Applied versions whose file is no longer in the directory.
        migrations.extend(history.into_iter().filter(|(_, s)| s.applied).map(|(version, s)| {
            MigrationStatus {
                version,
                file: None,
                applied: true,
                recorded_at: s.recorded_at,
            }
        }));
        migrations.sort_by_key(|m| m.version);

        Ok(TrackStatus {
            track: self.track().clone(),
            current_version,
            migrations,
        })
    }

    /// Add the track column to a legacy bookkeeping table.
    pub async fn upgrade_bookkeeping_schema(&mut self) -> MigrateResult<UpgradeOutcome> {
        self.store.upgrade_bookkeeping_schema(&mut self.db).await
    }

    /// Move `<root>/<filename>` into this engine's track and move that
    /// version's history from the default track along with it.
    ///
    /// The bookkeeping table is created first when missing. If the history
    /// cannot be reassigned the file is moved back.
    pub async fn move_migration(&mut self, filename: &str) -> MigrateResult<MovedMigration> {
        let target = self.track().clone();
        self.current_version().await?;

        let moved = move_migration_to_track(&self.migrations_root, filename, &target).await?;
        let reassigned = self
            .store
            .reassign_version(&mut self.db, moved.version, &Track::default_track(), &target)
            .await;

        if let Err(e) = reassigned {
            error!(version = moved.version, error = %e, "History reassignment failed; restoring file");
            tokio::fs::rename(&moved.to, &moved.from)
                .await
                .map_err(|io| MigrationError::io(&moved.to, io))?;
            return Err(e);
        }
        Ok(moved)
    }

    async fn run_with_catalog(&mut self, catalog: &Catalog, target: i64) -> MigrateResult<MigrationReport> {
        let current = self.current_version().await?;
        if target == current {
            debug!(track = %self.track(), version = current, "Already at target version");
            return Ok(MigrationReport::noop(self.track(), current));
        }

        let (direction, plan) = plan_migrations(catalog, current, target);
        if direction == Direction::Down && catalog.get(current).is_none() {
            return Err(MigrationError::MissingMigration(current));
        }

        // Read every script before touching the database so that a broken
        // file aborts the batch with nothing applied.
        let mut scripts = Vec::with_capacity(plan.len());
        for migration in &plan {
            let sql = catalog.load_sql(migration).await?;
            scripts.push(match direction {
                Direction::Up => sql.up,
                Direction::Down => sql.down,
            });
        }

        info!(
            track = %self.track(),
            from = current,
            to = target,
            %direction,
            count = plan.len(),
            "Running migrations"
        );

        let mut report = MigrationReport::noop(self.track(), current);
        for (migration, script) in plan.into_iter().zip(scripts) {
            let step = self.run_step(migration, direction, script).await?;
            report.to = match direction {
                Direction::Up => migration.version,
                Direction::Down => catalog.version_before(migration.version),
            };
            report.steps.push(step);
        }

        Ok(report)
    }

    async fn run_step(
        &mut self,
        migration: &Migration,
        direction: Direction,
        script: Vec<String>,
    ) -> MigrateResult<MigrationStep> {
        let statements = script.len();
        let mut stmts: Vec<Statement> = script.into_iter().map(Statement::raw).collect();
        stmts.push(self.store.transition_statement(migration.version, direction == Direction::Up));

        for stmt in &stmts[..statements] {
            debug!(version = migration.version, sql = %stmt, "Executing");
        }

        let started = Instant::now();
        if let Err((idx, source)) = self.db.transaction(&stmts).await {
            error!(
                track = %self.track(),
                version = migration.version,
                %direction,
                statement = idx + 1,
                error = %source,
                "Migration failed; rolled back"
            );
            return Err(MigrationError::Execution {
                version: migration.version,
                source,
            });
        }
        let duration = started.elapsed();

        info!(
            track = %self.track(),
            version = migration.version,
            name = %migration.name,
            %direction,
            elapsed_ms = duration.as_millis() as u64,
            "Migrated"
        );

        Ok(MigrationStep {
            version: migration.version,
            name: migration.name.clone(),
            direction,
            statements,
            duration,
        })
    }
}
