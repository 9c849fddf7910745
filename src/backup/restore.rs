//! Backup restoration
//!
//! Replaces the live database with an archived artifact. A pre-restore
//! safety copy of the live database is taken first so the restore can be
//! undone.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{Local, NaiveDateTime};
use serde::Serialize;
use tracing::{error, info, warn};

use super::manager::{BackupArtifact, BackupManager};
use super::retention::CleanupReport;
use super::verify::{self, VerifyReport};
use crate::archive::naming::{self, PRE_RESTORE_LABEL};
use crate::archive::file_io;
use crate::error::{BackupError, BackupResult};

/// SQLite files that belong to whatever database sits at the live path
const SIDECAR_SUFFIXES: [&str; 3] = ["-wal", "-shm", "-journal"];

/// Handles restoring and verifying backups
pub struct RestoreManager<'a> {
    backups: &'a BackupManager,
}

/// Result of a restore operation
#[derive(Debug, Clone, Serialize)]
pub struct RestoreReport {
    /// Artifact that was restored
    pub filename: String,
    /// Live database that was replaced
    pub db_path: PathBuf,
    /// Safety copy taken beforehand, if it succeeded
    pub safety_copy: Option<BackupArtifact>,
    /// Whether the artifact had to be decompressed
    pub decompressed: bool,
    /// Retention run after the database was replaced
    pub cleanup: CleanupReport,
}

impl<'a> RestoreManager<'a> {
    /// Create a new RestoreManager
    pub fn new(backups: &'a BackupManager) -> Self {
        Self { backups }
    }

    /// Restore the live database from an artifact
    ///
    /// Refuses without touching anything unless `confirmed` is set.
    pub fn restore(&self, filename: &str, confirmed: bool) -> BackupResult<RestoreReport> {
        self.restore_at(filename, confirmed, Local::now().naive_local())
    }

    /// Restore with the safety copy named after `timestamp`
    pub fn restore_at(
        &self,
        filename: &str,
        confirmed: bool,
        timestamp: NaiveDateTime,
    ) -> BackupResult<RestoreReport> {
        if !confirmed {
            warn!(artifact = %filename, "Restore operation requires confirmation");
            return Err(BackupError::ConfirmationRequired(filename.to_string()));
        }

        let result = self.restore_confirmed(filename, timestamp);
        match &result {
            Ok(report) => info!(
                artifact = %report.filename,
                db = %report.db_path.display(),
                "Database restored successfully"
            ),
            Err(e) => error!(artifact = %filename, error = %e, "Failed to restore backup"),
        }
        result
    }

    /// Verify an artifact's integrity
    pub fn verify_backup(&self, filename: &str) -> BackupResult<VerifyReport> {
        verify::verify_artifact(self.backups.store(), filename)
    }

    fn restore_confirmed(
        &self,
        filename: &str,
        timestamp: NaiveDateTime,
    ) -> BackupResult<RestoreReport> {
        let store = self.backups.store();
        let artifact_path = store.resolve(filename)?;

        let _guard = self.backups.lock_database();

        // Retention waits until the artifact has been read
        let safety_copy = self.take_safety_copy(timestamp)?;

        let compressed = naming::is_compressed(filename);
        // Removed when dropped, whether or not the restore succeeds
        let decompressed = if compressed {
            let temp = file_io::decompress_to_temp(&artifact_path, store.dir(), ".restore-")
                .map_err(|e| BackupError::DecompressFailed {
                    artifact: filename.to_string(),
                    reason: e.to_string(),
                })?;
            Some(temp)
        } else {
            None
        };
        let source = decompressed
            .as_ref()
            .map_or(artifact_path.as_path(), |temp| temp.path());

        let db_path = self.backups.paths().db_path();
        install_database(source, db_path)?;
        drop(decompressed);

        let cleanup = self.backups.cleanup();

        Ok(RestoreReport {
            filename: filename.to_string(),
            db_path: db_path.to_path_buf(),
            safety_copy,
            decompressed: compressed,
            cleanup,
        })
    }

    /// Back up the live database before it is replaced
    ///
    /// Failure only aborts the restore when the config requires a safety
    /// copy.
    fn take_safety_copy(&self, timestamp: NaiveDateTime) -> BackupResult<Option<BackupArtifact>> {
        let result = self
            .safety_copy_label(timestamp)
            .and_then(|label| self.backups.snapshot_locked(Some(&label), timestamp));

        match result {
            Ok(report) => {
                info!(
                    artifact = %report.artifact.filename,
                    "Current database backed up before restore"
                );
                Ok(Some(report.artifact))
            }
            Err(e) if self.backups.config().require_safety_copy => {
                error!(error = %e, "Safety copy failed, aborting restore");
                Err(e)
            }
            Err(e) => {
                warn!(error = %e, "Safety copy failed, restoring without one");
                Ok(None)
            }
        }
    }

    /// `pre_restore`, or `pre_restore-N` when that name is taken this second
    fn safety_copy_label(&self, timestamp: NaiveDateTime) -> BackupResult<String> {
        let compressed = self.backups.config().compress_backups;
        let store = self.backups.store();

        let mut label = PRE_RESTORE_LABEL.to_string();
        let mut attempt = 1;
        while store
            .path_for(&naming::artifact_name(Some(&label), timestamp, compressed)?)
            .exists()
        {
            attempt += 1;
            label = format!("{}-{}", PRE_RESTORE_LABEL, attempt);
        }
        Ok(label)
    }
}

/// Put the database file at `source` in place of `db_path`
///
/// The copy is fully staged before anything at the live path changes. The
/// live sidecars are removed only then, since the old state lives in the
/// safety copy and stale sidecars would be replayed onto the restored file.
fn install_database(source: &Path, db_path: &Path) -> BackupResult<()> {
    let staged = file_io::stage_copy(source, db_path)
        .map_err(|e| BackupError::Io(format!("Failed to stage database: {}", e)))?;

    remove_sidecars(db_path)?;

    staged
        .persist(db_path)
        .map_err(|e| BackupError::Io(format!("Failed to replace database: {}", e.error)))?;
    Ok(())
}

fn remove_sidecars(db_path: &Path) -> BackupResult<()> {
    for suffix in SIDECAR_SUFFIXES {
        let mut sidecar = db_path.as_os_str().to_owned();
        sidecar.push(suffix);
        let sidecar = PathBuf::from(sidecar);
        if sidecar.exists() {
            fs::remove_file(&sidecar).map_err(|e| {
                BackupError::Io(format!("Failed to remove {}: {}", sidecar.display(), e))
            })?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backup::manager::tests::{at, create_test_manager};
    use rusqlite::Connection;

    fn usage_snapshot(path: &Path) -> Vec<(i64, i64, String, f64)> {
        let conn = Connection::open(path).unwrap();
        let mut stmt = conn
            .prepare("SELECT id, location_id, date, total_gb FROM daily_usage ORDER BY id")
            .unwrap();
        let rows = stmt
            .query_map([], |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?)))
            .unwrap();
        rows.collect::<Result<_, _>>().unwrap()
    }

    fn location_count(path: &Path) -> i64 {
        Connection::open(path)
            .unwrap()
            .query_row("SELECT COUNT(*) FROM locations", [], |row| row.get(0))
            .unwrap()
    }

    fn dir_count(path: &Path) -> usize {
        fs::read_dir(path).unwrap().count()
    }

    #[test]
    fn test_round_trip_after_corruption() {
        for compress in [false, true] {
            let (manager, _temp) = create_test_manager(compress);
            let db = manager.paths().db_path().to_path_buf();
            let before = usage_snapshot(&db);

            let report = manager.create_backup_at(Some("nightly"), at(2, 0, 0)).unwrap();

            {
                let conn = Connection::open(&db).unwrap();
                conn.execute_batch("DELETE FROM daily_usage; DELETE FROM locations;")
                    .unwrap();
            }
            assert!(usage_snapshot(&db).is_empty());

            let restore = RestoreManager::new(&manager);
            let result = restore.restore(&report.artifact.filename, true).unwrap();

            assert_eq!(result.decompressed, compress);
            assert_eq!(usage_snapshot(&db), before);
            assert_eq!(location_count(&db), 2);
        }
    }

    #[test]
    fn test_restore_over_overwritten_file() {
        let (manager, _temp) = create_test_manager(true);
        let db = manager.paths().db_path().to_path_buf();
        let report = manager.create_backup_at(None, at(2, 0, 0)).unwrap();

        fs::write(&db, b"this is no longer a database").unwrap();

        let restore = RestoreManager::new(&manager);
        let result = restore.restore(&report.artifact.filename, true).unwrap();

        // The live file was garbage, so no safety copy could be made
        assert!(result.safety_copy.is_none());
        assert_eq!(usage_snapshot(&db).len(), 5);
    }

    #[test]
    fn test_confirmation_gate() {
        let (manager, _temp) = create_test_manager(false);
        let db = manager.paths().db_path().to_path_buf();
        let report = manager.create_backup_at(None, at(2, 0, 0)).unwrap();

        let bytes_before = fs::read(&db).unwrap();
        let mtime_before = fs::metadata(&db).unwrap().modified().unwrap();
        let files_before = dir_count(manager.paths().backup_dir());

        let restore = RestoreManager::new(&manager);
        let err = restore.restore(&report.artifact.filename, false).unwrap_err();

        assert!(matches!(err, BackupError::ConfirmationRequired(_)));
        assert_eq!(fs::read(&db).unwrap(), bytes_before);
        assert_eq!(fs::metadata(&db).unwrap().modified().unwrap(), mtime_before);
        assert_eq!(dir_count(manager.paths().backup_dir()), files_before);
    }

    #[test]
    fn test_confirmation_checked_before_existence() {
        let (manager, _temp) = create_test_manager(false);
        let restore = RestoreManager::new(&manager);
        let err = restore.restore("missing_20240101_000000.db", false).unwrap_err();
        assert!(matches!(err, BackupError::ConfirmationRequired(_)));
    }

    #[test]
    fn test_missing_artifact() {
        let (manager, _temp) = create_test_manager(false);
        let restore = RestoreManager::new(&manager);
        let err = restore.restore("missing_20240101_000000.db", true).unwrap_err();
        assert!(matches!(err, BackupError::ArtifactMissing(_)));
        assert!(manager.list_backups().unwrap().is_empty());
    }

    #[test]
    fn test_restore_takes_safety_copy() {
        let (manager, _temp) = create_test_manager(false);
        let report = manager.create_backup_at(None, at(2, 0, 0)).unwrap();

        let restore = RestoreManager::new(&manager);
        let result = restore.restore(&report.artifact.filename, true).unwrap();

        let safety = result.safety_copy.unwrap();
        assert!(safety.filename.starts_with("pre_restore_"));
        assert!(safety.path.exists());
        assert_eq!(manager.list_backups().unwrap().len(), 2);
    }

    #[test]
    fn test_required_safety_copy_aborts() {
        let (mut manager, _temp) = create_test_manager(false);
        manager.config_mut().require_safety_copy = true;
        let db = manager.paths().db_path().to_path_buf();
        let report = manager.create_backup_at(None, at(2, 0, 0)).unwrap();

        fs::remove_file(&db).unwrap();

        let restore = RestoreManager::new(&manager);
        let err = restore.restore(&report.artifact.filename, true).unwrap_err();
        assert!(matches!(err, BackupError::SourceMissing(_)));
        assert!(!db.exists());
    }

    #[test]
    fn test_restore_recreates_missing_database() {
        let (manager, _temp) = create_test_manager(true);
        let db = manager.paths().db_path().to_path_buf();
        let report = manager.create_backup_at(None, at(2, 0, 0)).unwrap();

        fs::remove_file(&db).unwrap();

        let restore = RestoreManager::new(&manager);
        let result = restore.restore(&report.artifact.filename, true).unwrap();
        assert!(result.safety_copy.is_none());
        assert_eq!(location_count(&db), 2);
    }

    #[test]
    fn test_corrupt_gzip_leaves_live_database() {
        let (manager, _temp) = create_test_manager(true);
        let db = manager.paths().db_path().to_path_buf();
        let broken = manager.store().path_for("broken_20240101_000000.db.gz");
        fs::write(&broken, b"not gzip at all").unwrap();
        let before = usage_snapshot(&db);

        let restore = RestoreManager::new(&manager);
        let err = restore.restore("broken_20240101_000000.db.gz", true).unwrap_err();

        assert!(matches!(err, BackupError::DecompressFailed { .. }));
        assert_eq!(usage_snapshot(&db), before);
        let leftovers: Vec<String> = fs::read_dir(manager.paths().backup_dir())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
            .filter(|name| name.ends_with(".tmp"))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[test]
    fn test_verify_is_idempotent() {
        let (manager, _temp) = create_test_manager(true);
        let report = manager.create_backup_at(Some("nightly"), at(2, 0, 0)).unwrap();
        let restore = RestoreManager::new(&manager);
        let files_before = dir_count(manager.paths().backup_dir());

        let first = restore.verify_backup(&report.artifact.filename).unwrap();
        let second = restore.verify_backup(&report.artifact.filename).unwrap();

        assert_eq!(first.tables_found, second.tables_found);
        assert!(first.compressed);
        assert_eq!(dir_count(manager.paths().backup_dir()), files_before);
    }

    #[test]
    fn test_manual_decompression_passes_same_check() {
        let (mut manager, _temp) = create_test_manager(true);
        let gz = manager.create_backup_at(Some("gz"), at(2, 0, 0)).unwrap();
        manager.config_mut().compress_backups = false;
        let plain = manager.create_backup_at(Some("plain"), at(2, 0, 0)).unwrap();

        let temp = file_io::decompress_to_temp(
            &gz.artifact.path,
            manager.paths().backup_dir(),
            ".manual-",
        )
        .unwrap();

        let from_gz = verify::integrity_check(temp.path()).unwrap();
        let from_plain = verify::integrity_check(&plain.artifact.path).unwrap();
        assert_eq!(from_gz, from_plain);
        assert_eq!(from_gz, 3);
    }

    #[test]
    fn test_restore_oldest_at_backup_limit() {
        let (mut manager, _temp) = create_test_manager(true);
        manager.config_mut().max_backups = 2;
        let db = manager.paths().db_path().to_path_buf();
        let before = usage_snapshot(&db);

        let oldest = manager.create_backup_at(None, at(1, 0, 0)).unwrap();
        std::thread::sleep(std::time::Duration::from_millis(25));
        manager.create_backup_at(None, at(1, 1, 0)).unwrap();

        Connection::open(&db)
            .unwrap()
            .execute_batch("DELETE FROM daily_usage;")
            .unwrap();

        let restore = RestoreManager::new(&manager);
        let report = restore
            .restore_at(&oldest.artifact.filename, true, at(3, 0, 0))
            .unwrap();

        assert_eq!(usage_snapshot(&db), before);
        assert_eq!(
            report.safety_copy.unwrap().filename,
            "pre_restore_20240301_030000.db.gz"
        );
        // Retention still applies, but only after the artifact was read
        assert_eq!(report.cleanup.removed, vec![oldest.artifact.filename]);
        assert_eq!(manager.list_backups().unwrap().len(), 2);
    }

    #[test]
    fn test_failed_install_keeps_live_wal() {
        let (manager, temp) = create_test_manager(false);
        let db = manager.paths().db_path().to_path_buf();

        // Held open so the insert stays in the WAL
        let writer = Connection::open(&db).unwrap();
        writer
            .execute(
                "INSERT INTO daily_usage (location_id, date, total_gb) VALUES (1, '2024-02-28', 1.0)",
                [],
            )
            .unwrap();
        let mut wal = db.as_os_str().to_owned();
        wal.push("-wal");
        let wal = PathBuf::from(wal);
        assert!(wal.exists());

        let err = install_database(&temp.path().join("vanished.db"), &db).unwrap_err();
        assert!(matches!(err, BackupError::Io(_)));

        assert!(wal.exists());
        assert_eq!(usage_snapshot(&db).len(), 6);
        let staged: Vec<String> = fs::read_dir(temp.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
            .filter(|name| name.ends_with(".tmp"))
            .collect();
        assert!(staged.is_empty());
        drop(writer);
    }

    #[test]
    fn test_restores_in_same_second_keep_both_safety_copies() {
        let (manager, _temp) = create_test_manager(false);
        let report = manager.create_backup_at(None, at(2, 0, 0)).unwrap();
        let restore = RestoreManager::new(&manager);

        let first = restore
            .restore_at(&report.artifact.filename, true, at(3, 0, 0))
            .unwrap();
        let second = restore
            .restore_at(&report.artifact.filename, true, at(3, 0, 0))
            .unwrap();

        assert_eq!(
            first.safety_copy.unwrap().filename,
            "pre_restore_20240301_030000.db"
        );
        assert_eq!(
            second.safety_copy.unwrap().filename,
            "pre_restore-2_20240301_030000.db"
        );
        assert_eq!(manager.list_backups().unwrap().len(), 3);
    }
}
