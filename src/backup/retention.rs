//! Retention policy for archived artifacts
//!
//! Cleanup runs in two passes over the newest-first listing: first every
//! artifact created before the retention cutoff is deleted, then the archive
//! is listed again and the tail beyond `max_backups` is deleted. Cleanup is
//! housekeeping; failures are logged and reported, never returned as errors.

use chrono::{DateTime, Local, TimeDelta};
use serde::Serialize;
use tracing::{error, info, warn};

use crate::archive::{ArchiveStore, BackupInfo};
use crate::config::BackupConfig;

/// Age and count thresholds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetentionPolicy {
    /// Artifacts older than this many days are deleted
    pub retention_days: u32,
    /// At most this many artifacts are kept
    pub max_backups: u32,
}

/// Outcome of a cleanup run
#[derive(Debug, Clone, Default, Serialize)]
pub struct CleanupReport {
    /// Filenames deleted
    pub removed: Vec<String>,
    /// Filenames that should have been deleted but could not be
    pub failed: Vec<String>,
}

impl CleanupReport {
    /// Number of artifacts deleted
    pub fn removed_count(&self) -> usize {
        self.removed.len()
    }

    /// Whether every deletion succeeded
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }
}

impl RetentionPolicy {
    /// Build the policy from the loaded config
    pub fn from_config(config: &BackupConfig) -> Self {
        Self {
            retention_days: config.retention_days,
            max_backups: config.max_backups,
        }
    }

    /// Oldest creation time that survives the age pass
    ///
    /// `None` when the window reaches past the representable range, in
    /// which case nothing is old enough to delete.
    pub fn cutoff(&self, now: DateTime<Local>) -> Option<DateTime<Local>> {
        TimeDelta::try_days(i64::from(self.retention_days))
            .and_then(|window| now.checked_sub_signed(window))
    }

    /// Artifacts strictly older than the cutoff
    pub fn expired<'a>(&self, backups: &'a [BackupInfo], now: DateTime<Local>) -> Vec<&'a BackupInfo> {
        match self.cutoff(now) {
            Some(cutoff) => backups.iter().filter(|b| b.created < cutoff).collect(),
            None => Vec::new(),
        }
    }

    /// Artifacts beyond `max_backups` in a newest-first listing
    pub fn excess<'a>(&self, backups: &'a [BackupInfo]) -> &'a [BackupInfo] {
        let keep = (self.max_backups as usize).min(backups.len());
        &backups[keep..]
    }

    /// Apply the policy to the archive
    pub fn cleanup(&self, store: &ArchiveStore, now: DateTime<Local>) -> CleanupReport {
        let mut report = CleanupReport::default();

        let backups = match store.list() {
            Ok(backups) => backups,
            Err(e) => {
                error!(error = %e, "Failed to cleanup old backups");
                return report;
            }
        };

        for backup in self.expired(&backups, now) {
            remove(backup, "Removed old backup", &mut report);
        }

        let remaining = match store.list() {
            Ok(backups) => backups,
            Err(e) => {
                error!(error = %e, "Failed to cleanup old backups");
                return report;
            }
        };

        for backup in self.excess(&remaining) {
            remove(backup, "Removed excess backup", &mut report);
        }

        if report.removed_count() > 0 {
            info!(
                removed = report.removed_count(),
                failed = report.failed.len(),
                "Cleanup completed"
            );
        }

        report
    }
}

fn remove(backup: &BackupInfo, message: &str, report: &mut CleanupReport) {
    match std::fs::remove_file(&backup.path) {
        Ok(()) => {
            info!(artifact = %backup.filename, "{}", message);
            report.removed.push(backup.filename.clone());
        }
        Err(e) => {
            warn!(artifact = %backup.filename, error = %e, "Failed to delete backup");
            report.failed.push(backup.filename.clone());
        }
    }
}
