//! Test Database Manager
//!
//! Isolated store instances for journey tests: each test gets its own
//! temp-dir database that disappears when the manager drops.

use std::path::PathBuf;

use pibrain_core::{Store, StoreConfig, VecMode};
use tempfile::TempDir;

/// An isolated store on a temporary database
pub struct TestDb {
    pub store: Store,
    /// Kept alive to prevent premature deletion
    _temp_dir: TempDir,
    db_path: PathBuf,
}

impl TestDb {
    /// A store with the vector extension loaded
    pub fn new() -> Self {
        Self::with_vec_mode(VecMode::Required)
    }

    /// A store without the vector extension
    pub fn without_vec() -> Self {
        Self::with_vec_mode(VecMode::Skipped)
    }

    fn with_vec_mode(vec_mode: VecMode) -> Self {
        let temp_dir = TempDir::new().expect("failed to create temp directory");
        let db_path = temp_dir.path().join("test_brain.db");
        let store = Store::open(StoreConfig::new(&db_path).with_vec_mode(vec_mode))
            .expect("failed to open test store");
        Self {
            store,
            _temp_dir: temp_dir,
            db_path,
        }
    }

    pub fn db_path(&self) -> &PathBuf {
        &self.db_path
    }

    /// Reopen the same database file with a (possibly different) vec mode
    pub fn reopen(self, vec_mode: VecMode) -> Self {
        let Self {
            store,
            _temp_dir,
            db_path,
        } = self;
        drop(store);
        let store = Store::open(StoreConfig::new(&db_path).with_vec_mode(vec_mode))
            .expect("failed to reopen test store");
        Self {
            store,
            _temp_dir,
            db_path,
        }
    }
}

impl Default for TestDb {
    fn default() -> Self {
        Self::new()
    }
}
