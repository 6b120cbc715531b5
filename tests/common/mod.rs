#![allow(dead_code)]

use std::path::PathBuf;
use std::time::Instant;
use tempfile::TempDir;
use tracing::info;
use ultimate_portfolio::StoreController;
use ultimate_portfolio::storage::SqliteStorage;

pub mod cli;
pub mod fixtures;

pub fn init_test_logging() {
    ultimate_portfolio::logging::init_test_logging();
}

pub struct TestLogGuard {
    name: String,
    start: Instant,
}

impl Drop for TestLogGuard {
    fn drop(&mut self) {
        info!(
            "{}: assertions passed (elapsed {:?})",
            self.name,
            self.start.elapsed()
        );
    }
}

pub fn test_log(name: &str) -> TestLogGuard {
    init_test_logging();
    info!("{name}: starting");
    TestLogGuard {
        name: name.to_string(),
        start: Instant::now(),
    }
}

pub fn test_db() -> SqliteStorage {
    init_test_logging();
    SqliteStorage::open_memory().expect("Failed to create test database")
}

pub fn test_controller() -> StoreController {
    init_test_logging();
    StoreController::open_memory().expect("Failed to create test controller")
}

/// A database file inside a temporary `.portfolio` directory.
pub fn test_db_path() -> (PathBuf, TempDir) {
    init_test_logging();
    let dir = TempDir::new().expect("Failed to create temp dir");
    let db_path = dir.path().join(".portfolio").join("portfolio.db");
    std::fs::create_dir_all(db_path.parent().unwrap()).unwrap();
    (db_path, dir)
}

/// Two controllers on the same database file, each with its own session.
pub fn shared_controllers() -> (StoreController, StoreController, TempDir) {
    let (db_path, dir) = test_db_path();
    let first = StoreController::new(SqliteStorage::open(&db_path).unwrap()).unwrap();
    let second = StoreController::new(SqliteStorage::open(&db_path).unwrap()).unwrap();
    (first, second, dir)
}
