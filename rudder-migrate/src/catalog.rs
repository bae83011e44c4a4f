//! Migration file discovery.
//!
//! Migrations for one track live in a single directory:
//!
//! ```text
//! migrations/
//! ├── 20240101120000_create_users.sql          # both directions, annotated
//! ├── 20240102090000_add_posts.up.sql          # split pair
//! ├── 20240102090000_add_posts.down.sql
//! ├── README.md                                # ignored
//! └── billing/                                 # another track
//! ```
//!
//! File name parsing is kept apart from directory I/O so that it can be
//! exercised with plain lists of names.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

use crate::error::{MigrateResult, MigrationError};
use crate::sql::{parse_annotated, split_statements, MigrationSql, ANNOTATION_PREFIX};

/// Which part of a migration a file holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ScriptPart {
    /// `<version>_<slug>.sql` with both directions.
    Annotated,
    /// `<version>_<slug>.up.sql`.
    Up,
    /// `<version>_<slug>.down.sql`.
    Down,
}

impl ScriptPart {
    /// Whether this part belongs to an up/down file pair.
    pub fn is_split(&self) -> bool {
        matches!(self, Self::Up | Self::Down)
    }
}

/// A parsed migration file name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationName {
    /// Version identifier.
    pub version: i64,
    /// Human readable part of the name.
    pub slug: String,
    /// Which part the file holds.
    pub part: ScriptPart,
}

/// Parse a migration file name.
///
/// Returns `None` for anything that is not `<version>_<slug>.sql`,
/// `<version>_<slug>.up.sql` or `<version>_<slug>.down.sql` with a positive
/// integer version. Version 0 is reserved for the bookkeeping seed row.
pub fn parse_migration_filename(file_name: &str) -> Option<MigrationName> {
    let stem = file_name.strip_suffix(".sql")?;
    let (stem, part) = if let Some(s) = stem.strip_suffix(".up") {
        (s, ScriptPart::Up)
    } else if let Some(s) = stem.strip_suffix(".down") {
        (s, ScriptPart::Down)
    } else {
        (stem, ScriptPart::Annotated)
    };

    let (version, slug) = stem.split_once('_')?;
    if version.is_empty() || slug.is_empty() || !version.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let version: i64 = version.parse().ok()?;
    if version <= 0 {
        return None;
    }

    Some(MigrationName {
        version,
        slug: slug.to_string(),
        part,
    })
}

/// Where a migration's SQL lives.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum MigrationSource {
    /// One annotated file.
    Annotated {
        /// File name.
        file: String,
    },
    /// An up file and an optional down file.
    Split {
        /// Up file name.
        up: String,
        /// Down file name.
        down: Option<String>,
    },
}

/// A migration discovered in a track directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Migration {
    /// Version identifier.
    pub version: i64,
    /// Human readable name.
    pub name: String,
    /// Source files.
    pub source: MigrationSource,
}

impl Migration {
    /// The file carrying the up direction.
    pub fn primary_file(&self) -> &str {
        match &self.source {
            MigrationSource::Annotated { file } => file,
            MigrationSource::Split { up, .. } => up,
        }
    }

    /// Whether the migration already has a file for `part`.
    pub fn has_part(&self, part: ScriptPart) -> bool {
        match (&self.source, part) {
            (MigrationSource::Annotated { .. }, _) => true,
            (MigrationSource::Split { .. }, ScriptPart::Up) => true,
            (MigrationSource::Split { down, .. }, ScriptPart::Down) => down.is_some(),
            (MigrationSource::Split { .. }, ScriptPart::Annotated) => false,
        }
    }
}

#[derive(Debug)]
struct PendingEntry {
    slug: String,
    annotated: Option<String>,
    up: Option<String>,
    down: Option<String>,
}

/// Build migrations from a list of file names.
///
/// Non-conforming names are skipped. The result is sorted ascending by
/// version; two different migrations sharing a version are rejected.
pub fn collect_migrations<'a, I>(file_names: I) -> MigrateResult<Vec<Migration>>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut entries: BTreeMap<i64, PendingEntry> = BTreeMap::new();

    for file_name in file_names {
        let Some(parsed) = parse_migration_filename(file_name) else {
            debug!(file = %file_name, "Skipping non-migration file");
            continue;
        };

        let entry = entries.entry(parsed.version).or_insert_with(|| PendingEntry {
            slug: parsed.slug.clone(),
            annotated: None,
            up: None,
            down: None,
        });

        let existing = entry
            .annotated
            .as_deref()
            .or(entry.up.as_deref())
            .or(entry.down.as_deref())
            .map(str::to_string);

        let taken = match parsed.part {
            ScriptPart::Annotated => entry.annotated.is_some(),
            ScriptPart::Up => entry.up.is_some(),
            ScriptPart::Down => entry.down.is_some(),
        };

        let clashes = match &existing {
            None => false,
            Some(_) if parsed.part == ScriptPart::Annotated => true,
            Some(_) => entry.annotated.is_some() || entry.slug != parsed.slug || taken,
        };

        if clashes {
            return Err(MigrationError::DuplicateVersion {
                version: parsed.version,
                first: existing.unwrap_or_default(),
                second: file_name.to_string(),
            });
        }

        let slot = match parsed.part {
            ScriptPart::Annotated => &mut entry.annotated,
            ScriptPart::Up => &mut entry.up,
            ScriptPart::Down => &mut entry.down,
        };
        *slot = Some(file_name.to_string());
    }

    let mut migrations = Vec::with_capacity(entries.len());
    for (version, entry) in entries {
        let source = match (entry.annotated, entry.up, entry.down) {
            (Some(file), _, _) => MigrationSource::Annotated { file },
            (None, Some(up), down) => MigrationSource::Split { up, down },
            (None, None, Some(down)) => {
                warn!(file = %down, "Ignoring down script without a matching up script");
                continue;
            }
            (None, None, None) => continue,
        };
        migrations.push(Migration {
            version,
            name: entry.slug,
            source,
        });
    }

    Ok(migrations)
}

/// The ordered migrations of one track directory.
#[derive(Debug, Clone)]
pub struct Catalog {
    dir: PathBuf,
    migrations: Vec<Migration>,
}

impl Catalog {
    /// Build a catalog from file names, without touching the file system.
    pub fn from_file_names<'a, I>(dir: impl Into<PathBuf>, file_names: I) -> MigrateResult<Self>
    where
        I: IntoIterator<Item = &'a str>,
    {
        Ok(Self {
            dir: dir.into(),
            migrations: collect_migrations(file_names)?,
        })
    }

    /// Scan a directory. Subdirectories (other tracks) are ignored.
    ///
    /// A missing directory is an error; an empty one is an empty catalog.
    pub async fn load(dir: impl AsRef<Path>) -> MigrateResult<Self> {
        let dir = dir.as_ref();
        let mut entries = tokio::fs::read_dir(dir)
            .await
            .map_err(|e| MigrationError::io(dir, e))?;

        let mut names = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| MigrationError::io(dir, e))?
        {
            let file_type = entry
                .file_type()
                .await
                .map_err(|e| MigrationError::io(entry.path(), e))?;
            if !file_type.is_file() {
                continue;
            }
            match entry.file_name().into_string() {
                Ok(name) => names.push(name),
                Err(name) => debug!(file = ?name, "Skipping non UTF-8 file name"),
            }
        }
        names.sort();

        let catalog = Self::from_file_names(dir, names.iter().map(String::as_str))?;
        debug!(dir = %dir.display(), count = catalog.len(), "Loaded migration catalog");
        Ok(catalog)
    }

    /// Directory this catalog was read from.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Migrations in ascending version order.
    pub fn migrations(&self) -> &[Migration] {
        &self.migrations
    }

    /// Number of migrations.
    pub fn len(&self) -> usize {
        self.migrations.len()
    }

    /// Whether the directory holds no migrations.
    pub fn is_empty(&self) -> bool {
        self.migrations.is_empty()
    }

    /// Look up a migration by version.
    pub fn get(&self, version: i64) -> Option<&Migration> {
        self.migrations
            .binary_search_by_key(&version, |m| m.version)
            .ok()
            .map(|idx| &self.migrations[idx])
    }

    /// Smallest version strictly greater than `current`, or `current` when
    /// already at the head.
    pub fn version_after(&self, current: i64) -> i64 {
        self.migrations
            .iter()
            .map(|m| m.version)
            .find(|v| *v > current)
            .unwrap_or(current)
    }

    /// Largest version strictly less than `current`, or 0 when nothing
    /// precedes it.
    pub fn version_before(&self, current: i64) -> i64 {
        self.migrations
            .iter()
            .rev()
            .map(|m| m.version)
            .find(|v| *v < current)
            .unwrap_or(0)
    }

    /// Largest version present, or 0 for an empty catalog.
    pub fn most_recent_version(&self) -> i64 {
        self.migrations.last().map(|m| m.version).unwrap_or(0)
    }

    /// Migrations with `low < version <= high`, ascending.
    pub fn range(&self, low: i64, high: i64) -> &[Migration] {
        let start = self.migrations.partition_point(|m| m.version <= low);
        let end = self.migrations.partition_point(|m| m.version <= high);
        if start >= end {
            &[]
        } else {
            &self.migrations[start..end]
        }
    }

    /// Read and parse the SQL of a migration.
    pub async fn load_sql(&self, migration: &Migration) -> MigrateResult<MigrationSql> {
        let with_file = |file: &str, err: MigrationError| match err {
            MigrationError::InvalidMigration(msg) => {
                MigrationError::invalid_migration(format!("{}: {}", file, msg))
            }
            other => other,
        };

        match &migration.source {
            MigrationSource::Annotated { file } => {
                let text = self.read(file).await?;
                parse_annotated(&text).map_err(|e| with_file(file, e))
            }
            MigrationSource::Split { up, down } => {
                let up_text = self.read(up).await?;
                let up_sql = split_statements(&up_text).map_err(|e| with_file(up, e))?;
                let down_sql = match down {
                    Some(down) => {
                        let text = self.read(down).await?;
                        split_statements(&text).map_err(|e| with_file(down, e))?
                    }
                    None => Vec::new(),
                };
                Ok(MigrationSql {
                    up: up_sql,
                    down: down_sql,
                })
            }
        }
    }

    async fn read(&self, file: &str) -> MigrateResult<String> {
        let path = self.dir.join(file);
        tokio::fs::read_to_string(&path)
            .await
            .map_err(|e| MigrationError::io(&path, e))
    }
}

/// List the migrations of a directory, ascending by version.
pub async fn list_migrations(dir: impl AsRef<Path>) -> MigrateResult<Vec<Migration>> {
    Ok(Catalog::load(dir).await?.migrations)
}

/// Smallest version in `dir` greater than `current`, or `current` at the head.
pub async fn version_after(dir: impl AsRef<Path>, current: i64) -> MigrateResult<i64> {
    Ok(Catalog::load(dir).await?.version_after(current))
}

/// Largest version in `dir` less than `current`, or 0.
pub async fn version_before(dir: impl AsRef<Path>, current: i64) -> MigrateResult<i64> {
    Ok(Catalog::load(dir).await?.version_before(current))
}

/// Largest version in `dir`, or 0 when it holds no migrations.
pub async fn most_recent_version(dir: impl AsRef<Path>) -> MigrateResult<i64> {
    Ok(Catalog::load(dir).await?.most_recent_version())
}

/// Turn a free-form name into a file name slug.
pub fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    for c in name.trim().chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c.to_ascii_lowercase());
        } else if !slug.ends_with('_') {
            slug.push('_');
        }
    }
    slug.trim_matches('_').to_string()
}

/// Write an empty annotated migration named after `now` into `dir`.
///
/// The directory is created when missing. An existing file is never
/// overwritten.
pub async fn create_migration(
    dir: impl AsRef<Path>,
    name: &str,
    now: DateTime<Utc>,
) -> MigrateResult<PathBuf> {
    let dir = dir.as_ref();
    let slug = slugify(name);
    if slug.is_empty() {
        return Err(MigrationError::config(format!("'{}' is not a usable migration name", name)));
    }

    tokio::fs::create_dir_all(dir)
        .await
        .map_err(|e| MigrationError::io(dir, e))?;

    let file_name = format!("{}_{}.sql", now.format("%Y%m%d%H%M%S"), slug);
    let path = dir.join(&file_name);
    let template = format!(
        "-- {name}\n\n{prefix} Up\n-- SQL in this section is executed when the migration is applied.\n\n\n\
         {prefix} Down\n-- SQL in this section is executed when the migration is rolled back.\n\n",
        name = name.trim(),
        prefix = ANNOTATION_PREFIX,
    );

    let mut file = tokio::fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(&path)
        .await
        .map_err(|e| MigrationError::io(&path, e))?;
    file.write_all(template.as_bytes())
        .await
        .map_err(|e| MigrationError::io(&path, e))?;
    // tokio file writes complete on a blocking thread; wait for them.
    file.flush().await.map_err(|e| MigrationError::io(&path, e))?;
    file.sync_all().await.map_err(|e| MigrationError::io(&path, e))?;

    Ok(path)
}
