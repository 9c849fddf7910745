//! In-process mutual exclusion per live database
//!
//! Backup and restore both read or replace the live database file. Every
//! manager opened on the same database path shares one mutex, so a server
//! handling several requests never interleaves the two.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, OnceLock, PoisonError};

type Registry = Mutex<HashMap<PathBuf, Arc<Mutex<()>>>>;

static LOCKS: OnceLock<Registry> = OnceLock::new();

/// Get the lock guarding the database at `db_path`
pub fn database_lock(db_path: &Path) -> Arc<Mutex<()>> {
    let key = lock_key(db_path);
    let registry = LOCKS.get_or_init(Default::default);
    let mut locks = registry.lock().unwrap_or_else(PoisonError::into_inner);
    locks.entry(key).or_default().clone()
}

/// Canonical key for a database path
///
/// The file itself may not exist yet (a restore can recreate it), so the
/// parent directory is canonicalized instead.
fn lock_key(db_path: &Path) -> PathBuf {
    match (db_path.parent(), db_path.file_name()) {
        (Some(parent), Some(name)) => std::fs::canonicalize(parent)
            .map(|dir| dir.join(name))
            .unwrap_or_else(|_| db_path.to_path_buf()),
        _ => db_path.to_path_buf(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_same_path_shares_lock() {
        let temp_dir = TempDir::new().unwrap();
        let db = temp_dir.path().join("data_usage.db");
        let dotted = temp_dir.path().join(".").join("data_usage.db");

        let a = database_lock(&db);
        let b = database_lock(&dotted);
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn test_different_paths_get_different_locks() {
        let temp_dir = TempDir::new().unwrap();
        let a = database_lock(&temp_dir.path().join("one.db"));
        let b = database_lock(&temp_dir.path().join("two.db"));
        assert!(!Arc::ptr_eq(&a, &b));
    }
}
