//! Custom error types for the backup tool
//!
//! This module defines the error hierarchy for backup, restore, verification
//! and schedule operations using thiserror for ergonomic error definitions.

use std::path::PathBuf;

use thiserror::Error;

/// The main error type for backup operations
#[derive(Error, Debug)]
pub enum BackupError {
    /// The live database file does not exist
    #[error("Database file not found: {}", .0.display())]
    SourceMissing(PathBuf),

    /// The requested artifact is not in the archive directory
    #[error("Backup file not found: {0}")]
    ArtifactMissing(String),

    /// A destructive operation was requested without confirmation
    #[error("Restore of '{0}' requires confirmation")]
    ConfirmationRequired(String),

    /// A compressed artifact could not be decompressed
    #[error("Failed to decompress {artifact}: {reason}")]
    DecompressFailed { artifact: String, reason: String },

    /// An artifact failed its integrity check or could not be opened
    #[error("Backup verification failed for {artifact}: {reason}")]
    CorruptArchive { artifact: String, reason: String },

    /// File I/O errors (copy, compress, delete)
    #[error("I/O error: {0}")]
    Io(String),

    /// SQLite errors outside of verification
    #[error("Database error: {0}")]
    Database(String),

    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Artifact labels are restricted to a safe character set
    #[error("Invalid backup name '{0}': use letters, digits, '_' or '-'")]
    InvalidLabel(String),

    /// The host job table rejected the schedule
    #[error("Failed to install schedule: {0}")]
    ScheduleInstallFailed(String),
}

impl BackupError {
    /// Check if this is a "not found" error
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::SourceMissing(_) | Self::ArtifactMissing(_))
    }

    /// Process exit code the CLI reports for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::ConfirmationRequired(_) => 2,
            _ => 1,
        }
    }
}

impl From<std::io::Error> for BackupError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

impl From<serde_json::Error> for BackupError {
    fn from(err: serde_json::Error) -> Self {
        Self::Config(err.to_string())
    }
}

impl From<rusqlite::Error> for BackupError {
    fn from(err: rusqlite::Error) -> Self {
        Self::Database(err.to_string())
    }
}

/// Result type alias for backup operations
pub type BackupResult<T> = Result<T, BackupError>;
