//! Artifact naming convention
//!
//! Artifacts are named `{label}_{YYYYMMDD_HHMMSS}.db`, with a trailing
//! `.gz` when compressed. Listing and cleanup rely only on these suffixes to
//! recognize artifacts.

use chrono::NaiveDateTime;

use crate::error::{BackupError, BackupResult};

/// Label used when the caller does not name the backup
pub const DEFAULT_LABEL: &str = "data_usage_backup";

/// Label of the automatic copy taken before a restore
pub const PRE_RESTORE_LABEL: &str = "pre_restore";

/// Second-resolution timestamp embedded in artifact names
pub const TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S";

const DB_SUFFIX: &str = ".db";
const GZ_SUFFIX: &str = ".gz";

/// Suffix of an artifact that is still being written
pub const PARTIAL_SUFFIX: &str = ".partial";

/// Build the artifact file name for a backup taken at `timestamp`
pub fn artifact_name(
    label: Option<&str>,
    timestamp: NaiveDateTime,
    compressed: bool,
) -> BackupResult<String> {
    let label = match label {
        Some(label) => validate_label(label)?,
        None => DEFAULT_LABEL,
    };

    let mut name = format!("{}_{}{}", label, timestamp.format(TIMESTAMP_FORMAT), DB_SUFFIX);
    if compressed {
        name.push_str(GZ_SUFFIX);
    }
    Ok(name)
}

/// Check that a label only uses characters safe in a file name
pub fn validate_label(label: &str) -> BackupResult<&str> {
    let valid = !label.is_empty()
        && label
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');

    if valid {
        Ok(label)
    } else {
        Err(BackupError::InvalidLabel(label.to_string()))
    }
}

/// Whether a file name denotes a backup artifact
pub fn is_artifact(filename: &str) -> bool {
    filename.ends_with(DB_SUFFIX) || filename.ends_with(".db.gz")
}

/// Whether an artifact is gzip-compressed
pub fn is_compressed(filename: &str) -> bool {
    filename.ends_with(GZ_SUFFIX)
}

/// Name of the staging file for an artifact
pub fn partial_name(filename: &str) -> String {
    format!("{}{}", filename, PARTIAL_SUFFIX)
}
