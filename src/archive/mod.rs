//! Archive directory holding backup artifacts
//!
//! The archive is a plain directory: artifacts are recognized by name, their
//! creation time comes from filesystem metadata, and nothing is locked.
//! Listing always returns artifacts newest first; retention depends on that
//! order.

pub mod file_io;
pub mod naming;

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};
use serde::Serialize;
use tracing::warn;

use crate::error::{BackupError, BackupResult};

/// Metadata about an artifact in the archive
#[derive(Debug, Clone, Serialize)]
pub struct BackupInfo {
    /// Artifact filename
    pub filename: String,
    /// Full path to the artifact
    pub path: PathBuf,
    /// Size in bytes
    pub size_bytes: u64,
    /// Filesystem creation time
    pub created: DateTime<Local>,
    /// Last modification time
    pub modified: DateTime<Local>,
    /// Whether the artifact is gzip-compressed
    pub compressed: bool,
}

impl BackupInfo {
    /// Size in megabytes rounded to two decimals
    pub fn size_mb(&self) -> f64 {
        size_in_mb(self.size_bytes)
    }
}

/// Convert a byte count to megabytes rounded to two decimals
pub fn size_in_mb(bytes: u64) -> f64 {
    (bytes as f64 / (1024.0 * 1024.0) * 100.0).round() / 100.0
}

/// Read-side view of the archive directory
#[derive(Debug, Clone)]
pub struct ArchiveStore {
    dir: PathBuf,
    /// Live database, never treated as an artifact
    live_db: Option<PathBuf>,
}

impl ArchiveStore {
    /// Create a store rooted at `dir`
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            live_db: None,
        }
    }

    /// Exclude the live database from listing and resolution
    ///
    /// Needed when the archive directory also holds the live database.
    pub fn excluding(mut self, live_db: impl Into<PathBuf>) -> Self {
        self.live_db = Some(live_db.into());
        self
    }

    /// Get the archive directory
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path an artifact with this name would have
    pub fn path_for(&self, filename: &str) -> PathBuf {
        self.dir.join(filename)
    }

    /// List all artifacts, newest first
    ///
    /// Entries that vanish or cannot be inspected while listing are skipped.
    pub fn list(&self) -> BackupResult<Vec<BackupInfo>> {
        if !self.dir.exists() {
            return Ok(Vec::new());
        }

        let live_db = self.live_db_key();
        let mut backups = Vec::new();

        for entry in fs::read_dir(&self.dir).map_err(|e| {
            BackupError::Io(format!("Failed to read backup directory: {}", e))
        })? {
            let entry = entry.map_err(|e| {
                BackupError::Io(format!("Failed to read directory entry: {}", e))
            })?;

            let filename = entry.file_name().to_string_lossy().to_string();
            if !naming::is_artifact(&filename) || is_same_file(&entry.path(), live_db.as_deref()) {
                continue;
            }

            match inspect(&entry.path(), filename) {
                Ok(Some(info)) => backups.push(info),
                Ok(None) => {}
                Err(e) => warn!(path = %entry.path().display(), error = %e, "Skipping unreadable backup"),
            }
        }

        sort_newest_first(&mut backups);
        Ok(backups)
    }

    /// Resolve an artifact filename to its path
    ///
    /// Only bare artifact names inside the archive directory resolve.
    pub fn resolve(&self, filename: &str) -> BackupResult<PathBuf> {
        let bare = Path::new(filename)
            .file_name()
            .map_or(false, |name| name == filename);
        if !bare || !naming::is_artifact(filename) {
            return Err(BackupError::ArtifactMissing(filename.to_string()));
        }

        let path = self.path_for(filename);
        if path.is_file() && !is_same_file(&path, self.live_db_key().as_deref()) {
            Ok(path)
        } else {
            Err(BackupError::ArtifactMissing(filename.to_string()))
        }
    }

    /// Get a specific artifact by filename
    pub fn get(&self, filename: &str) -> BackupResult<Option<BackupInfo>> {
        match self.resolve(filename) {
            Ok(path) => Ok(inspect(&path, filename.to_string())?),
            Err(BackupError::ArtifactMissing(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Get the most recent artifact
    pub fn latest(&self) -> BackupResult<Option<BackupInfo>> {
        Ok(self.list()?.into_iter().next())
    }

    fn live_db_key(&self) -> Option<PathBuf> {
        self.live_db
            .as_ref()
            .map(|path| fs::canonicalize(path).unwrap_or_else(|_| path.clone()))
    }
}

fn is_same_file(path: &Path, live_db: Option<&Path>) -> bool {
    match live_db {
        Some(live_db) => fs::canonicalize(path).map_or(false, |p| p == live_db),
        None => false,
    }
}

fn inspect(path: &Path, filename: String) -> BackupResult<Option<BackupInfo>> {
    let metadata = fs::metadata(path)?;
    if !metadata.is_file() {
        return Ok(None);
    }

    let created = file_io::creation_time(&metadata)?;
    let modified = metadata.modified()?;

    Ok(Some(BackupInfo {
        compressed: naming::is_compressed(&filename),
        filename,
        path: path.to_path_buf(),
        size_bytes: metadata.len(),
        created: DateTime::<Local>::from(created),
        modified: DateTime::<Local>::from(modified),
    }))
}

/// Sort by creation time descending, newest first
///
/// Ties fall back to the filename, whose embedded timestamp orders the same
/// way.
pub fn sort_newest_first(backups: &mut [BackupInfo]) {
    backups.sort_by(|a, b| {
        b.created
            .cmp(&a.created)
            .then_with(|| b.filename.cmp(&a.filename))
    });
}
