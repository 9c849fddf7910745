//! Artifact verification
//!
//! Opens an artifact as a standalone read-only database and runs SQLite's
//! integrity check. The live database is never touched.

use std::path::Path;

use rusqlite::{Connection, OpenFlags};
use serde::Serialize;
use tracing::{error, info};

use crate::archive::{file_io, naming, ArchiveStore};
use crate::error::{BackupError, BackupResult};

/// Result of a successful verification
#[derive(Debug, Clone, Serialize)]
pub struct VerifyReport {
    /// Artifact filename
    pub filename: String,
    /// Number of tables in the artifact
    pub tables_found: usize,
    /// Whether the artifact was compressed
    pub compressed: bool,
}

/// Verify the named artifact in `store`
pub fn verify_artifact(store: &ArchiveStore, filename: &str) -> BackupResult<VerifyReport> {
    let result = verify_inner(store, filename);
    match &result {
        Ok(report) => info!(
            artifact = %report.filename,
            tables_found = report.tables_found,
            "Backup verification successful"
        ),
        Err(e) => error!(artifact = %filename, error = %e, "Backup verification failed"),
    }
    result
}

fn verify_inner(store: &ArchiveStore, filename: &str) -> BackupResult<VerifyReport> {
    let path = store.resolve(filename)?;
    let compressed = naming::is_compressed(filename);

    // Dropped at the end of this function on every path
    let decompressed = if compressed {
        let temp = file_io::decompress_to_temp(&path, store.dir(), ".verify-").map_err(|e| {
            BackupError::DecompressFailed {
                artifact: filename.to_string(),
                reason: e.to_string(),
            }
        })?;
        Some(temp)
    } else {
        None
    };

    let target = decompressed.as_ref().map_or(path.as_path(), |temp| temp.path());
    let tables_found = integrity_check(target).map_err(|reason| BackupError::CorruptArchive {
        artifact: filename.to_string(),
        reason,
    })?;

    Ok(VerifyReport {
        filename: filename.to_string(),
        tables_found,
        compressed,
    })
}

/// Run `PRAGMA integrity_check` and count tables
///
/// Anything other than the single row `ok` is a failure; the rows SQLite
/// reported are joined into the error text.
pub fn integrity_check(path: &Path) -> Result<usize, String> {
    let conn = Connection::open_with_flags(
        path,
        OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
    )
    .map_err(|e| e.to_string())?;

    let problems: Vec<String> = {
        let mut stmt = conn
            .prepare("PRAGMA integrity_check")
            .map_err(|e| e.to_string())?;
        let rows = stmt
            .query_map([], |row| row.get::<_, String>(0))
            .map_err(|e| e.to_string())?;
        rows.collect::<Result<_, _>>().map_err(|e| e.to_string())?
    };

    if problems.len() != 1 || problems[0] != "ok" {
        return Err(problems.join("; "));
    }

    let tables: i64 = conn
        .query_row(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table'",
            [],
            |row| row.get(0),
        )
        .map_err(|e| e.to_string())?;

    Ok(tables as usize)
}
