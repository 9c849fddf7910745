//! Configuration module for the backup tool
//!
//! This module provides configuration management including:
//! - Live database and archive directory path resolution
//! - Backup settings persistence

pub mod paths;
pub mod settings;

pub use paths::BackupPaths;
pub use settings::{BackupConfig, BackupSchedule};
