//! Backup manager for the data usage database
//!
//! Takes consistent snapshots of the live SQLite database through the online
//! backup API, optionally gzips them, records the result in the live
//! database and then enforces the retention policy.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Local, NaiveDateTime};
use rusqlite::{Connection, DatabaseName, OpenFlags};
use serde::Serialize;
use tracing::{debug, error, info, warn};

use super::lock::database_lock;
use super::metadata;
use super::retention::{CleanupReport, RetentionPolicy};
use crate::archive::naming::{self, TIMESTAMP_FORMAT};
use crate::archive::{file_io, size_in_mb, ArchiveStore, BackupInfo};
use crate::config::{BackupConfig, BackupPaths};
use crate::error::{BackupError, BackupResult};

/// A finished backup artifact
#[derive(Debug, Clone, Serialize)]
pub struct BackupArtifact {
    /// Artifact filename
    pub filename: String,
    /// Absolute path to the artifact
    pub path: PathBuf,
    /// Size in bytes
    pub size_bytes: u64,
    /// Size in megabytes, two decimals
    pub size_mb: f64,
    /// Timestamp embedded in the name (`YYYYMMDD_HHMMSS`)
    pub timestamp: String,
    /// Whether the artifact is gzip-compressed
    pub compressed: bool,
}

/// Result of a backup run
#[derive(Debug, Clone, Serialize)]
pub struct BackupReport {
    /// The artifact that was written
    pub artifact: BackupArtifact,
    /// Whether the backup rows were written to the live database
    pub metadata_recorded: bool,
    /// Retention cleanup run after the backup
    pub cleanup: CleanupReport,
}

/// Manages backup creation and retention
pub struct BackupManager {
    /// Live database and archive locations
    paths: BackupPaths,
    /// Settings loaded from the archive directory
    config: BackupConfig,
    /// Artifact listing
    store: ArchiveStore,
    /// Shared with every manager on the same live database
    lock: Arc<Mutex<()>>,
}

impl BackupManager {
    /// Open a manager, creating the archive directory and loading its config
    pub fn open(paths: BackupPaths) -> BackupResult<Self> {
        paths.ensure_directories()?;
        let config = BackupConfig::load(&paths);
        Ok(Self::with_config(paths, config))
    }

    /// Create a manager with an explicit config
    pub fn with_config(paths: BackupPaths, config: BackupConfig) -> Self {
        let store = ArchiveStore::new(paths.backup_dir()).excluding(paths.db_path());
        let lock = database_lock(paths.db_path());
        Self {
            paths,
            config,
            store,
            lock,
        }
    }

    /// Get the paths in use
    pub fn paths(&self) -> &BackupPaths {
        &self.paths
    }

    /// Get the active config
    pub fn config(&self) -> &BackupConfig {
        &self.config
    }

    /// Get the active config for modification
    pub fn config_mut(&mut self) -> &mut BackupConfig {
        &mut self.config
    }

    /// Persist the active config to the archive directory
    pub fn save_config(&self) -> BackupResult<()> {
        self.config.save(&self.paths)?;
        info!(path = %self.paths.config_file().display(), "Configuration saved successfully");
        Ok(())
    }

    /// Get the archive store
    pub fn store(&self) -> &ArchiveStore {
        &self.store
    }

    /// Create a backup of the live database
    ///
    /// `label` replaces the default `data_usage_backup` prefix.
    pub fn create_backup(&self, label: Option<&str>) -> BackupResult<BackupReport> {
        self.create_backup_at(label, Local::now().naive_local())
    }

    /// Create a backup whose name carries `timestamp`
    pub fn create_backup_at(
        &self,
        label: Option<&str>,
        timestamp: NaiveDateTime,
    ) -> BackupResult<BackupReport> {
        let _guard = self.lock_database();
        self.create_backup_locked(label, timestamp)
    }

    /// List all available backups, newest first
    pub fn list_backups(&self) -> BackupResult<Vec<BackupInfo>> {
        self.store.list()
    }

    /// Apply the retention policy now
    pub fn cleanup(&self) -> CleanupReport {
        self.cleanup_at(Local::now())
    }

    /// Apply the retention policy as of `now`
    pub fn cleanup_at(&self, now: DateTime<Local>) -> CleanupReport {
        RetentionPolicy::from_config(&self.config).cleanup(&self.store, now)
    }

    /// Hold the live database lock
    pub(crate) fn lock_database(&self) -> MutexGuard<'_, ()> {
        self.lock.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Backup, metadata and cleanup; caller holds the database lock
    fn create_backup_locked(
        &self,
        label: Option<&str>,
        timestamp: NaiveDateTime,
    ) -> BackupResult<BackupReport> {
        let mut report = self.snapshot_locked(label, timestamp)?;
        report.cleanup = self.cleanup();
        Ok(report)
    }

    /// Backup and metadata without retention; caller holds the database lock
    ///
    /// The returned report carries an empty cleanup. Callers that still hold
    /// paths into the archive run retention themselves once done with them.
    pub(crate) fn snapshot_locked(
        &self,
        label: Option<&str>,
        timestamp: NaiveDateTime,
    ) -> BackupResult<BackupReport> {
        let artifact = self.snapshot(label, timestamp).map_err(|e| {
            error!(error = %e, "Failed to create backup");
            e
        })?;

        let metadata_recorded = self.record_metadata(&artifact, timestamp);

        info!(
            artifact = %artifact.filename,
            size_mb = artifact.size_mb,
            "Backup created successfully"
        );

        Ok(BackupReport {
            artifact,
            metadata_recorded,
            cleanup: CleanupReport::default(),
        })
    }

    fn snapshot(&self, label: Option<&str>, timestamp: NaiveDateTime) -> BackupResult<BackupArtifact> {
        let db_path = self.paths.db_path();
        if !db_path.is_file() {
            return Err(BackupError::SourceMissing(db_path.to_path_buf()));
        }

        self.paths.ensure_directories()?;

        let compressed = self.config.compress_backups;
        let filename = naming::artifact_name(label, timestamp, compressed)?;
        let final_path = self.store.path_for(&filename);
        if final_path.exists() {
            return Err(BackupError::Io(format!("Backup already exists: {}", filename)));
        }

        let raw_name = naming::artifact_name(label, timestamp, false)?;
        let raw_partial = self.store.path_for(&naming::partial_name(&raw_name));
        let gz_partial = self.store.path_for(&naming::partial_name(&filename));

        let written = self.write_artifact(&raw_partial, &gz_partial, &final_path, compressed);
        if written.is_err() {
            for staged in [&raw_partial, &gz_partial] {
                if staged.exists() {
                    let _ = fs::remove_file(staged);
                }
            }
        }
        written?;

        let size_bytes = fs::metadata(&final_path)?.len();

        Ok(BackupArtifact {
            filename,
            path: final_path,
            size_bytes,
            size_mb: size_in_mb(size_bytes),
            timestamp: timestamp.format(TIMESTAMP_FORMAT).to_string(),
            compressed,
        })
    }

    /// Stage the snapshot under `.partial` names and move it into place
    fn write_artifact(
        &self,
        raw_partial: &Path,
        gz_partial: &Path,
        final_path: &Path,
        compressed: bool,
    ) -> BackupResult<()> {
        // Leftover from an interrupted run
        if raw_partial.exists() {
            fs::remove_file(raw_partial)?;
        }

        online_backup(self.paths.db_path(), raw_partial)?;

        if compressed {
            if gz_partial.exists() {
                fs::remove_file(gz_partial)?;
            }
            file_io::compress_file(raw_partial, gz_partial)
                .map_err(|e| BackupError::Io(format!("Failed to compress backup: {}", e)))?;
            fs::remove_file(raw_partial)?;
            fs::rename(gz_partial, final_path)?;
        } else {
            fs::rename(raw_partial, final_path)?;
        }

        Ok(())
    }

    fn record_metadata(&self, artifact: &BackupArtifact, timestamp: NaiveDateTime) -> bool {
        match metadata::record_backup(self.paths.db_path(), timestamp, artifact.size_mb) {
            Ok(()) => true,
            Err(e) => {
                warn!(
                    artifact = %artifact.filename,
                    error = %e,
                    "Failed to update backup info in database"
                );
                false
            }
        }
    }
}

/// Copy the live database with SQLite's online backup API
///
/// The copy is switched to rollback-journal mode so it is a single
/// self-contained file.
fn online_backup(db_path: &Path, dest: &Path) -> BackupResult<()> {
    let source = Connection::open_with_flags(db_path, OpenFlags::SQLITE_OPEN_READ_WRITE)?;
    source.busy_timeout(Duration::from_secs(5))?;
    source.backup(DatabaseName::Main, dest, None)?;
    drop(source);

    let snapshot = Connection::open(dest)?;
    let mode: String =
        snapshot.pragma_update_and_check(None, "journal_mode", "DELETE", |row| row.get(0))?;
    debug!(journal_mode = %mode, "SQLite backup completed successfully");

    Ok(())
}
