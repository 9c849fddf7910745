//! Backup display formatting
//!
//! Formats archive listings, configuration and operation results for
//! terminal output.

use chrono::{DateTime, Local, TimeDelta};
use tabled::settings::Style;
use tabled::{Table, Tabled};

use crate::archive::BackupInfo;
use crate::backup::metadata::BackupStatus;
use crate::backup::{BackupReport, CleanupReport, RestoreReport, VerifyReport};
use crate::config::BackupConfig;

#[derive(Tabled)]
struct BackupRow {
    #[tabled(rename = "#")]
    index: usize,
    #[tabled(rename = "Filename")]
    filename: String,
    #[tabled(rename = "Size")]
    size: String,
    #[tabled(rename = "Created")]
    created: String,
    #[tabled(rename = "Age")]
    age: String,
    #[tabled(rename = "Compressed")]
    compressed: &'static str,
}

#[derive(Tabled)]
struct ConfigRow {
    #[tabled(rename = "Setting")]
    key: String,
    #[tabled(rename = "Value")]
    value: String,
}

/// Format the archive listing as a table
///
/// The verbose form adds the path and modification time of each artifact
/// below the table.
pub fn format_backup_list(backups: &[BackupInfo], verbose: bool, now: DateTime<Local>) -> String {
    if backups.is_empty() {
        return "No backups found.\nCreate one with: usage-backup create\n".to_string();
    }

    let rows: Vec<BackupRow> = backups
        .iter()
        .enumerate()
        .map(|(i, backup)| BackupRow {
            index: i + 1,
            filename: backup.filename.clone(),
            size: format!("{:.2} MB", backup.size_mb()),
            created: backup.created.format("%Y-%m-%d %H:%M:%S").to_string(),
            age: format_duration(now.signed_duration_since(backup.created)),
            compressed: if backup.compressed { "yes" } else { "no" },
        })
        .collect();

    let mut output = Table::new(rows).with(Style::psql()).to_string();
    output.push('\n');

    if verbose {
        output.push('\n');
        for backup in backups {
            output.push_str(&format!(
                "{}\n  Path: {}\n  Size: {} ({} bytes)\n  Modified: {}\n  Compressed: {}\n",
                backup.filename,
                backup.path.display(),
                format_size(backup.size_bytes),
                backup.size_bytes,
                backup.modified.format("%Y-%m-%d %H:%M:%S"),
                if backup.compressed { "yes" } else { "no" },
            ));
        }
    }

    let total: u64 = backups.iter().map(|b| b.size_bytes).sum();
    output.push_str(&format!(
        "\nTotal: {} backup(s), {}\n",
        backups.len(),
        format_size(total)
    ));
    output
}

/// Format the backup health rows read back from the live database
pub fn format_status(status: &BackupStatus) -> String {
    format!(
        "Last backup: {}\nLast backup size: {}\n",
        status.last_backup.as_deref().unwrap_or("never"),
        status.last_backup_size.as_deref().unwrap_or("unknown"),
    )
}

/// Format the effective configuration as a table
pub fn format_config(config: &BackupConfig) -> String {
    let rows: Vec<ConfigRow> = config
        .entries()
        .into_iter()
        .map(|(key, value)| ConfigRow { key, value })
        .collect();

    let mut output = Table::new(rows).with(Style::psql()).to_string();
    output.push('\n');
    output
}

pub fn format_backup_report(report: &BackupReport) -> String {
    let artifact = &report.artifact;
    let mut output = format!(
        "Backup created: {}\nLocation: {}\nSize: {} MB{}\n",
        artifact.filename,
        artifact.path.display(),
        artifact.size_mb,
        if artifact.compressed { " (compressed)" } else { "" },
    );

    if !report.metadata_recorded {
        output.push_str("Warning: backup status could not be recorded in the database\n");
    }
    if report.cleanup.removed_count() > 0 || !report.cleanup.is_clean() {
        output.push_str(&format_cleanup_report(&report.cleanup));
    }
    output
}

pub fn format_cleanup_report(report: &CleanupReport) -> String {
    let mut output = if report.removed.is_empty() {
        "No backups to clean up.\n".to_string()
    } else {
        format!("Removed {} old backup(s):\n", report.removed_count())
    };

    for filename in &report.removed {
        output.push_str(&format!("  - {}\n", filename));
    }
    for filename in &report.failed {
        output.push_str(&format!("  ! could not remove {}\n", filename));
    }
    output
}

pub fn format_restore_report(report: &RestoreReport) -> String {
    let mut output = String::new();
    match &report.safety_copy {
        Some(copy) => output.push_str(&format!("Pre-restore backup saved: {}\n", copy.filename)),
        None => output.push_str("Warning: no pre-restore backup was taken\n"),
    }
    output.push_str(&format!(
        "Restored {} to {}\n",
        report.filename,
        report.db_path.display()
    ));
    if report.cleanup.removed_count() > 0 || !report.cleanup.is_clean() {
        output.push_str(&format_cleanup_report(&report.cleanup));
    }
    output
}

pub fn format_verify_report(report: &VerifyReport) -> String {
    format!(
        "Backup verified: {}\nTables found: {}\nIntegrity: ok\n",
        report.filename, report.tables_found
    )
}

/// Format a duration in human-readable form
pub fn format_duration(duration: TimeDelta) -> String {
    let total_seconds = duration.num_seconds().max(0);

    if total_seconds < 60 {
        return format!("{}s", total_seconds);
    }

    let minutes = total_seconds / 60;
    if minutes < 60 {
        return format!("{}m", minutes);
    }

    let hours = minutes / 60;
    if hours < 24 {
        return format!("{}h", hours);
    }

    let days = hours / 24;
    if days < 30 {
        return format!("{}d", days);
    }

    format!("{}mo", days / 30)
}

/// Format a file size in human-readable form
pub fn format_size(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes >= GB {
        format!("{:.1} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.1} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.1} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}
