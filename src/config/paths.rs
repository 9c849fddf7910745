//! Path management for the backup tool
//!
//! Resolves the live database, the archive directory and the files kept
//! inside the archive directory.
//!
//! ## Path Resolution Order
//!
//! 1. Explicit `--db-path` / `--backup-dir` arguments
//! 2. `USAGE_BACKUP_DB` / `USAGE_BACKUP_DIR` environment variables
//! 3. `data_usage.db` and `backups/` relative to the working directory

use std::path::{Path, PathBuf};

use crate::error::{BackupError, BackupResult};

/// Default live database file name
pub const DEFAULT_DB_FILE: &str = "data_usage.db";

/// Default archive directory name
pub const DEFAULT_BACKUP_DIR: &str = "backups";

/// Name of the configuration file inside the archive directory
pub const CONFIG_FILE: &str = "backup_config.json";

/// Name of the log file inside the archive directory
pub const LOG_FILE: &str = "backup.log";

/// Manages all paths used by the backup tool
#[derive(Debug, Clone)]
pub struct BackupPaths {
    /// Live database file
    db_path: PathBuf,
    /// Archive directory holding artifacts and the config file
    backup_dir: PathBuf,
}

impl BackupPaths {
    /// Create a new BackupPaths instance
    ///
    /// Relative paths are resolved against the current working directory so
    /// that scheduled jobs see the same absolute locations.
    pub fn new(db_path: impl AsRef<Path>, backup_dir: impl AsRef<Path>) -> BackupResult<Self> {
        Ok(Self {
            db_path: absolutize(db_path.as_ref())?,
            backup_dir: absolutize(backup_dir.as_ref())?,
        })
    }

    /// Resolve paths from the defaults relative to the working directory
    pub fn from_defaults() -> BackupResult<Self> {
        Self::new(DEFAULT_DB_FILE, DEFAULT_BACKUP_DIR)
    }

    /// Get the live database path
    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    /// Get the archive directory
    pub fn backup_dir(&self) -> &Path {
        &self.backup_dir
    }

    /// Get the path to the configuration file
    pub fn config_file(&self) -> PathBuf {
        self.backup_dir.join(CONFIG_FILE)
    }

    /// Get the path to the log file
    pub fn log_file(&self) -> PathBuf {
        self.backup_dir.join(LOG_FILE)
    }

    /// Ensure the archive directory exists
    pub fn ensure_directories(&self) -> BackupResult<()> {
        std::fs::create_dir_all(&self.backup_dir)
            .map_err(|e| BackupError::Io(format!("Failed to create backup directory: {}", e)))
    }
}

fn absolutize(path: &Path) -> BackupResult<PathBuf> {
    if path.is_absolute() {
        return Ok(path.to_path_buf());
    }
    let cwd = std::env::current_dir()
        .map_err(|e| BackupError::Config(format!("Could not determine working directory: {}", e)))?;
    Ok(cwd.join(path))
}
