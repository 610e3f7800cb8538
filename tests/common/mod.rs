//! Shared fixtures for integration tests.

#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::Arc;

use tempfile::TempDir;

use sleuth::repository::{run_migrations, DieselRecordRepository, SqlitePool};

/// Read a file from `tests/fixtures`.
pub fn fixture(name: &str) -> String {
    let path = PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name);
    std::fs::read_to_string(&path).unwrap_or_else(|e| panic!("{}: {}", path.display(), e))
}

/// A migrated SQLite store in a temporary directory.
pub async fn sqlite_store() -> (TempDir, Arc<DieselRecordRepository>) {
    let dir = tempfile::tempdir().unwrap();
    let url = format!("sqlite:{}", dir.path().join("sleuth.db").display());
    run_migrations(&url).await.unwrap();
    let store = Arc::new(DieselRecordRepository::new(SqlitePool::new(&url)));
    (dir, store)
}
