//! Backup lifecycle manager for the data usage SQLite database
//!
//! Takes consistent snapshots of a live SQLite database into an archive
//! directory, optionally gzip-compressed, prunes them by age and count,
//! verifies their integrity, restores them over the live database and
//! registers a recurring backup job with cron.
//!
//! # Architecture
//!
//! The crate is organized into the following modules:
//!
//! - `config`: Paths and the persisted backup settings
//! - `error`: Custom error types
//! - `archive`: Artifact naming, listing and file helpers
//! - `backup`: Backup, retention, restore and verification engines
//! - `schedule`: Recurring backup registration in the crontab
//! - `cli`: Command handlers for the `usage-backup` binary
//! - `display`: Terminal formatting
//! - `logging`: Subscriber setup for the binary
//!
//! # Example
//!
//! ```rust,ignore
//! use usage_backup::backup::BackupManager;
//! use usage_backup::config::BackupPaths;
//!
//! let manager = BackupManager::open(BackupPaths::from_defaults()?)?;
//! let report = manager.create_backup(None)?;
//! ```

pub mod archive;
pub mod backup;
pub mod cli;
pub mod config;
pub mod display;
pub mod error;
pub mod logging;
pub mod schedule;

pub use error::{BackupError, BackupResult};
