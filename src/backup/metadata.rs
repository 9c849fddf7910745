//! Backup health rows kept in the live database
//!
//! After each backup two key/value rows are upserted into the application's
//! `system_info` metrics table so the dashboard can report backup health
//! from the database it already reads.

use std::path::Path;
use std::time::Duration;

use chrono::NaiveDateTime;
use rusqlite::{params, Connection, OpenFlags, OptionalExtension};

use crate::error::BackupResult;

/// Metrics table in the live database
pub const METRICS_TABLE: &str = "system_info";

/// Key holding the timestamp of the last backup
pub const LAST_BACKUP_KEY: &str = "last_backup";

/// Key holding the size of the last backup
pub const LAST_BACKUP_SIZE_KEY: &str = "last_backup_size";

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Last recorded backup, as read back from the live database
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BackupStatus {
    pub last_backup: Option<String>,
    pub last_backup_size: Option<String>,
}

/// Upsert the `last_backup` and `last_backup_size` rows
pub fn record_backup(db_path: &Path, taken_at: NaiveDateTime, size_mb: f64) -> BackupResult<()> {
    let mut conn = Connection::open_with_flags(db_path, OpenFlags::SQLITE_OPEN_READ_WRITE)?;
    conn.busy_timeout(BUSY_TIMEOUT)?;

    let tx = conn.transaction()?;
    upsert(
        &tx,
        LAST_BACKUP_KEY,
        &taken_at.format("%Y-%m-%dT%H:%M:%S").to_string(),
    )?;
    upsert(&tx, LAST_BACKUP_SIZE_KEY, &format!("{} MB", size_mb))?;
    tx.commit()?;

    Ok(())
}

/// Read the backup rows back from the live database
pub fn read_status(db_path: &Path) -> BackupResult<BackupStatus> {
    let conn = Connection::open_with_flags(db_path, OpenFlags::SQLITE_OPEN_READ_ONLY)?;
    Ok(BackupStatus {
        last_backup: lookup(&conn, LAST_BACKUP_KEY)?,
        last_backup_size: lookup(&conn, LAST_BACKUP_SIZE_KEY)?,
    })
}

fn upsert(conn: &Connection, key: &str, value: &str) -> rusqlite::Result<()> {
    // Update first: the table is not guaranteed to carry a unique key
    let updated = conn.execute(
        &format!(
            "UPDATE {} SET metric_value = ?1, updated_at = CURRENT_TIMESTAMP WHERE metric_name = ?2",
            METRICS_TABLE
        ),
        params![value, key],
    )?;

    if updated == 0 {
        conn.execute(
            &format!(
                "INSERT INTO {} (metric_name, metric_value, updated_at) VALUES (?1, ?2, CURRENT_TIMESTAMP)",
                METRICS_TABLE
            ),
            params![key, value],
        )?;
    }
    Ok(())
}

fn lookup(conn: &Connection, key: &str) -> rusqlite::Result<Option<String>> {
    conn.query_row(
        &format!(
            "SELECT metric_value FROM {} WHERE metric_name = ?1",
            METRICS_TABLE
        ),
        params![key],
        |row| row.get(0),
    )
    .optional()
}
