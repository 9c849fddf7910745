use std::fs;
use std::path::Path;

use assert_cmd::Command;
use predicates::prelude::*;
use rusqlite::Connection;
use tempfile::TempDir;

fn create_db(path: &Path) {
    let conn = Connection::open(path).unwrap();
    conn.execute_batch(
        "CREATE TABLE daily_usage (day TEXT PRIMARY KEY, bytes INTEGER NOT NULL);
         CREATE TABLE system_info (
             metric_name TEXT PRIMARY KEY,
             metric_value TEXT,
             updated_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP
         );
         INSERT INTO daily_usage VALUES ('2024-03-01', 1024), ('2024-03-02', 2048);",
    )
    .unwrap();
}

fn usage_backup(temp_dir: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("usage-backup").unwrap();
    cmd.env_remove("USAGE_BACKUP_DB")
        .env_remove("USAGE_BACKUP_DIR")
        .env("USAGE_BACKUP_LOG", "warn")
        .arg("--db-path")
        .arg(temp_dir.path().join("data_usage.db"))
        .arg("--backup-dir")
        .arg(temp_dir.path().join("backups"));
    cmd
}

fn artifacts(temp_dir: &TempDir) -> Vec<String> {
    let mut names: Vec<String> = fs::read_dir(temp_dir.path().join("backups"))
        .unwrap()
        .filter_map(|e| e.ok())
        .map(|e| e.file_name().to_string_lossy().to_string())
        .filter(|name| name.ends_with(".db") || name.ends_with(".db.gz"))
        .collect();
    names.sort();
    names
}

#[test]
fn create_list_verify() {
    let temp_dir = TempDir::new().unwrap();
    create_db(&temp_dir.path().join("data_usage.db"));

    usage_backup(&temp_dir)
        .args(["create", "--name", "manual"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Backup created: manual_"));

    let names = artifacts(&temp_dir);
    assert_eq!(names.len(), 1);
    assert!(names[0].ends_with(".db.gz"));

    usage_backup(&temp_dir)
        .arg("list")
        .assert()
        .success()
        .stdout(predicate::str::contains(names[0].as_str()))
        .stdout(predicate::str::contains("Compressed"))
        .stdout(predicate::function(|out: &str| {
            out.lines()
                .any(|line| line.contains("manual_") && line.trim_end().ends_with("yes"))
        }))
        .stdout(predicate::str::contains("Total: 1 backup(s)"));

    usage_backup(&temp_dir)
        .args(["verify", "latest"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Tables found: 2"));
}

#[test]
fn create_in_auto_mode_is_quiet() {
    let temp_dir = TempDir::new().unwrap();
    create_db(&temp_dir.path().join("data_usage.db"));

    usage_backup(&temp_dir)
        .args(["create", "--auto"])
        .assert()
        .success()
        .stdout(predicate::str::is_empty());

    assert_eq!(artifacts(&temp_dir).len(), 1);
    assert!(temp_dir.path().join("backups").join("backup.log").exists());
}

#[test]
fn create_without_database_fails() {
    let temp_dir = TempDir::new().unwrap();

    usage_backup(&temp_dir)
        .arg("create")
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Database file not found"));
}

#[test]
fn create_rejects_unsafe_name() {
    let temp_dir = TempDir::new().unwrap();
    create_db(&temp_dir.path().join("data_usage.db"));

    usage_backup(&temp_dir)
        .args(["create", "--name", "../escape"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Invalid backup name"));
}

#[test]
fn restore_requires_confirmation() {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("data_usage.db");
    create_db(&db_path);

    usage_backup(&temp_dir).arg("create").assert().success();
    let before = fs::read(&db_path).unwrap();

    usage_backup(&temp_dir)
        .args(["restore", "latest"])
        .assert()
        .code(2)
        .stdout(predicate::str::contains("--confirm"));

    assert_eq!(fs::read(&db_path).unwrap(), before);
}

#[test]
fn restore_with_confirmation() {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("data_usage.db");
    create_db(&db_path);

    usage_backup(&temp_dir)
        .args(["create", "--name", "known_good"])
        .assert()
        .success();
    let artifact = artifacts(&temp_dir).remove(0);

    Connection::open(&db_path)
        .unwrap()
        .execute("DELETE FROM daily_usage", [])
        .unwrap();

    usage_backup(&temp_dir)
        .args(["restore", artifact.as_str(), "--confirm"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Pre-restore backup saved: pre_restore_"));

    let rows: i64 = Connection::open(&db_path)
        .unwrap()
        .query_row("SELECT COUNT(*) FROM daily_usage", [], |row| row.get(0))
        .unwrap();
    assert_eq!(rows, 2);
}

#[test]
fn verify_missing_backup_fails() {
    let temp_dir = TempDir::new().unwrap();

    usage_backup(&temp_dir)
        .args(["verify", "nothing_20240101_000000.db"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Backup file not found"));
}

#[test]
fn list_empty_archive() {
    let temp_dir = TempDir::new().unwrap();

    usage_backup(&temp_dir)
        .arg("list")
        .assert()
        .success()
        .stdout(predicate::str::contains("No backups found."));
}

#[test]
fn cleanup_with_nothing_to_remove() {
    let temp_dir = TempDir::new().unwrap();

    usage_backup(&temp_dir)
        .arg("cleanup")
        .assert()
        .success()
        .stdout(predicate::str::contains("No backups to clean up."));
}

#[test]
fn show_config_defaults() {
    let temp_dir = TempDir::new().unwrap();

    usage_backup(&temp_dir)
        .arg("show-config")
        .assert()
        .success()
        .stdout(predicate::str::contains("retention_days"))
        .stdout(predicate::str::contains("max_backups"))
        .stdout(predicate::str::contains("backup_config.json"));
}

#[test]
fn install_schedule_rejects_unknown_period() {
    let temp_dir = TempDir::new().unwrap();

    usage_backup(&temp_dir)
        .args(["install-schedule", "fortnightly"])
        .assert()
        .failure();
}
