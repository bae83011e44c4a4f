//! Migration tracks.
//!
//! A track is an independent migration history. All tracks share one
//! migrations root: the default track uses the root directory itself, and a
//! named track lives in `<root>/<track>`. In the bookkeeping table the track
//! name isolates each history.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::catalog::{parse_migration_filename, Catalog};
use crate::error::{MigrateResult, MigrationError};

/// Longest track name the bookkeeping column can hold.
pub const MAX_TRACK_LEN: usize = 32;

/// A validated track name. The empty name is the default track.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Track(String);

impl Track {
    /// Validate and wrap a track name.
    ///
    /// Names must fit the bookkeeping column and be a single directory
    /// component made of ASCII letters, digits, `_`, `-` or `.`.
    pub fn new(name: impl Into<String>) -> MigrateResult<Self> {
        let name = name.into();
        if name.is_empty() {
            return Ok(Self::default());
        }
        if name.len() > MAX_TRACK_LEN {
            return Err(MigrationError::config(format!(
                "track '{}' is longer than {} characters",
                name, MAX_TRACK_LEN
            )));
        }
        if name == "." || name == ".." {
            return Err(MigrationError::config(format!("'{}' is not a valid track name", name)));
        }
        if let Some(bad) = name
            .chars()
            .find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.')))
        {
            return Err(MigrationError::config(format!(
                "track '{}' contains invalid character {:?}",
                name, bad
            )));
        }
        Ok(Self(name))
    }

    /// The default track.
    pub fn default_track() -> Self {
        Self::default()
    }

    /// The raw name stored in the bookkeeping table.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether this is the default track.
    pub fn is_default(&self) -> bool {
        self.0.is_empty()
    }

    /// Directory holding this track's migrations under `root`.
    pub fn dir(&self, root: &Path) -> PathBuf {
        if self.is_default() {
            root.to_path_buf()
        } else {
            root.join(&self.0)
        }
    }
}

impl fmt::Display for Track {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_default() {
            write!(f, "(default)")
        } else {
            write!(f, "{}", self.0)
        }
    }
}

/// Outcome of moving a migration file into a track.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MovedMigration {
    /// Version parsed from the file name.
    pub version: i64,
    /// Original location.
    pub from: PathBuf,
    /// New location.
    pub to: PathBuf,
}

/// Move `<root>/<filename>` into the directory of `target`.
///
/// The target must be a named track and the source must exist. The move is
/// refused when the target track already has a migration with the same
/// version, since versions must stay unique inside a track.
pub async fn move_migration_to_track(
    root: &Path,
    filename: &str,
    target: &Track,
) -> MigrateResult<MovedMigration> {
    if target.is_default() {
        return Err(MigrationError::config("a target track is required to move a migration"));
    }
    if filename.is_empty() || Path::new(filename).components().count() != 1 {
        return Err(MigrationError::config(format!(
            "'{}' must be a file name inside the migrations directory",
            filename
        )));
    }

    let name = parse_migration_filename(filename).ok_or_else(|| {
        MigrationError::invalid_migration(format!("'{}' is not a migration file name", filename))
    })?;

    let from = root.join(filename);
    match tokio::fs::metadata(&from).await {
        Ok(meta) if meta.is_file() => {}
        Ok(_) => {
            return Err(MigrationError::config(format!("'{}' is not a file", from.display())));
        }
        Err(e) => return Err(MigrationError::io(&from, e)),
    }

    let target_dir = target.dir(root);
    tokio::fs::create_dir_all(&target_dir)
        .await
        .map_err(|e| MigrationError::io(&target_dir, e))?;

    let existing = Catalog::load(&target_dir).await?;
    if let Some(clash) = existing.get(name.version) {
        // A split migration moves one half at a time; only a different
        // migration with the same version is a clash.
        if clash.name != name.slug || !name.part.is_split() || clash.has_part(name.part) {
            return Err(MigrationError::DuplicateVersion {
                version: name.version,
                first: clash.primary_file().to_string(),
                second: filename.to_string(),
            });
        }
    }

    let to = target_dir.join(filename);
    tokio::fs::rename(&from, &to)
        .await
        .map_err(|e| MigrationError::io(&from, e))?;

    info!(
        version = name.version,
        track = %target,
        from = %from.display(),
        to = %to.display(),
        "Moved migration to track"
    );

    Ok(MovedMigration {
        version: name.version,
        from,
        to,
    })
}
