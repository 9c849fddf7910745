//! Backup configuration
//!
//! Persisted as `backup_config.json` in the archive directory. Built-in
//! defaults apply for every key missing from the file, and keys this tool
//! does not know about are carried through a load/save cycle untouched.

use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::paths::BackupPaths;
use crate::archive::file_io;
use crate::error::BackupResult;

/// How often the scheduled backup job runs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum, Default)]
#[serde(rename_all = "lowercase")]
pub enum BackupSchedule {
    /// At the top of every hour
    Hourly,
    /// 02:00 every day (default)
    #[default]
    Daily,
    /// 02:00 every Sunday
    Weekly,
    /// 02:00 on the first of the month
    Monthly,
}

impl BackupSchedule {
    /// Lowercase name as stored in the config file
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Hourly => "hourly",
            Self::Daily => "daily",
            Self::Weekly => "weekly",
            Self::Monthly => "monthly",
        }
    }
}

impl std::fmt::Display for BackupSchedule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Backup settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackupConfig {
    /// Artifacts older than this many days are removed by cleanup
    #[serde(default = "default_retention_days")]
    pub retention_days: u32,

    /// Upper bound on the number of artifacts kept
    #[serde(default = "default_max_backups")]
    pub max_backups: u32,

    /// Whether new artifacts are gzip-compressed
    #[serde(default = "default_compress_backups")]
    pub compress_backups: bool,

    /// Schedule last installed into the job table
    #[serde(default)]
    pub backup_schedule: BackupSchedule,

    /// Operator contact; recorded only
    #[serde(default)]
    pub notification_email: Option<String>,

    /// Abort a restore when the pre-restore safety copy cannot be taken
    #[serde(default)]
    pub require_safety_copy: bool,

    /// Keys written by other tools
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

fn default_retention_days() -> u32 {
    30
}

fn default_max_backups() -> u32 {
    50
}

fn default_compress_backups() -> bool {
    true
}

impl Default for BackupConfig {
    fn default() -> Self {
        Self {
            retention_days: default_retention_days(),
            max_backups: default_max_backups(),
            compress_backups: default_compress_backups(),
            backup_schedule: BackupSchedule::default(),
            notification_email: None,
            require_safety_copy: false,
            extra: serde_json::Map::new(),
        }
    }
}

impl BackupConfig {
    /// Load the config file, falling back to defaults
    ///
    /// A missing file yields the defaults silently. A file that cannot be
    /// read or parsed is reported with a warning and also yields the
    /// defaults; it never fails the calling operation.
    pub fn load(paths: &BackupPaths) -> Self {
        let config_path = paths.config_file();

        if !config_path.exists() {
            debug!(path = %config_path.display(), "No backup config found, using defaults");
            return Self::default();
        }

        match file_io::read_json_required::<Self, _>(&config_path) {
            Ok(config) => config,
            Err(e) => {
                warn!(
                    path = %config_path.display(),
                    error = %e,
                    "Failed to load config, using defaults"
                );
                Self::default()
            }
        }
    }

    /// Save the config to the archive directory
    pub fn save(&self, paths: &BackupPaths) -> BackupResult<()> {
        paths.ensure_directories()?;
        file_io::write_json_atomic(paths.config_file(), self)
    }

    /// Flattened key/value view for display
    pub fn entries(&self) -> Vec<(String, String)> {
        match serde_json::to_value(self) {
            Ok(serde_json::Value::Object(map)) => map
                .into_iter()
                .map(|(key, value)| {
                    let rendered = match value {
                        serde_json::Value::String(s) => s,
                        other => other.to_string(),
                    };
                    (key, rendered)
                })
                .collect(),
            _ => Vec::new(),
        }
    }
}
