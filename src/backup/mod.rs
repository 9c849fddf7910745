//! Backup lifecycle for the data usage database
//!
//! Creates, verifies, restores and prunes point-in-time copies of the live
//! SQLite database.
//!
//! # Architecture
//!
//! - `BackupManager`: snapshots the live database, records backup health
//!   in it and enforces the retention policy after every backup
//! - `RetentionPolicy`: age and count based cleanup of the archive
//! - `RestoreManager`: verifies artifacts and restores them over the live
//!   database behind a confirmation gate and a safety copy
//!
//! Backup and restore of one live database are serialized by a process-wide
//! lock keyed on the database path.
//!
//! # Example
//!
//! ```rust,ignore
//! use usage_backup::backup::{BackupManager, RestoreManager};
//! use usage_backup::config::BackupPaths;
//!
//! let paths = BackupPaths::new("data_usage.db", "backups")?;
//! let manager = BackupManager::open(paths)?;
//!
//! let report = manager.create_backup(Some("nightly"))?;
//! println!("{} ({} MB)", report.artifact.filename, report.artifact.size_mb);
//!
//! let restore = RestoreManager::new(&manager);
//! restore.verify_backup(&report.artifact.filename)?;
//! restore.restore(&report.artifact.filename, true)?;
//! ```

mod lock;
mod manager;
pub mod metadata;
mod restore;
mod retention;
mod verify;

pub use manager::{BackupArtifact, BackupManager, BackupReport};
pub use restore::{RestoreManager, RestoreReport};
pub use retention::{CleanupReport, RetentionPolicy};
pub use verify::{integrity_check, VerifyReport};
