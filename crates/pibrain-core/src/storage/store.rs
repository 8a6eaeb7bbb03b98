//! SQLite store
//!
//! Owns the database connections and the vector capability. Uses separate
//! reader/writer connections behind mutexes so every method takes `&self`
//! and the store is `Send + Sync`.

use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard};

use rusqlite::Connection;

use crate::error::{Result, StoreError};
use crate::files::{NodeFileStore, NullFileStore};
use crate::paths;
use crate::storage::migrations::{self, Capabilities};

// ============================================================================
// CONFIGURATION
// ============================================================================

/// How the sqlite-vec extension is loaded
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum VecMode {
    /// Fail `open` when the extension cannot be loaded (default)
    #[default]
    Required,
    /// Try to load; continue without vector search on failure
    Optional,
    /// Do not load; vector search returns empty results
    Skipped,
}

/// Store configuration
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Database file path
    pub db_path: PathBuf,
    /// Vector extension loading behavior
    pub vec_mode: VecMode,
    /// Whether the process is running under a test harness. Set once from
    /// the environment in [`StoreConfig::from_env`]; never read ambiently.
    pub test_mode: bool,
    /// Explicit override for the production-database guard
    pub allow_production_db: bool,
}

impl StoreConfig {
    /// Configuration for an explicit database path
    pub fn new(db_path: impl Into<PathBuf>) -> Self {
        Self {
            db_path: db_path.into(),
            vec_mode: VecMode::default(),
            test_mode: false,
            allow_production_db: false,
        }
    }

    /// Default configuration: production database path, test mode taken
    /// from the `PI_BRAIN_TEST` environment variable.
    pub fn from_env() -> Result<Self> {
        let test_mode = std::env::var("PI_BRAIN_TEST")
            .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
            .unwrap_or(false);
        Ok(Self {
            db_path: paths::default_db_path()?,
            vec_mode: VecMode::default(),
            test_mode,
            allow_production_db: false,
        })
    }

    pub fn with_vec_mode(mut self, mode: VecMode) -> Self {
        self.vec_mode = mode;
        self
    }

    pub fn with_test_mode(mut self, test_mode: bool) -> Self {
        self.test_mode = test_mode;
        self
    }

    pub fn with_allow_production_db(mut self, allow: bool) -> Self {
        self.allow_production_db = allow;
        self
    }
}

// ============================================================================
// STORE
// ============================================================================

/// Store statistics
#[derive(Debug, Clone, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreStats {
    pub nodes: i64,
    pub edges: i64,
    pub lessons: i64,
    pub embeddings: i64,
    pub schema_version: u32,
    pub vec_loaded: bool,
}

/// The session-memory store
///
/// All methods take `&self`; writes serialize through the writer
/// connection's mutex, reads go through the reader connection.
pub struct Store {
    writer: Mutex<Connection>,
    reader: Mutex<Connection>,
    vec_loaded: bool,
    pub(crate) files: Arc<dyn NodeFileStore>,
}

impl std::fmt::Debug for Store {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Store")
            .field("vec_loaded", &self.vec_loaded)
            .finish_non_exhaustive()
    }
}

/// Register sqlite-vec so every subsequently opened connection resolves
/// the vec0 module. Process-global and idempotent.
#[allow(clippy::missing_transmute_annotations)]
pub(crate) fn register_vec_extension() {
    use rusqlite::ffi::sqlite3_auto_extension;
    use sqlite_vec::sqlite3_vec_init;

    unsafe {
        sqlite3_auto_extension(Some(std::mem::transmute(sqlite3_vec_init as *const ())));
    }
}

/// Probe whether the vec function set resolves on this connection
fn probe_vec(conn: &Connection) -> std::result::Result<String, rusqlite::Error> {
    conn.query_row("SELECT vec_version()", [], |row| row.get(0))
}

impl Store {
    /// Apply PRAGMAs to a connection
    fn configure_connection(conn: &Connection) -> Result<()> {
        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA synchronous = NORMAL;
             PRAGMA foreign_keys = ON;
             PRAGMA busy_timeout = 5000;",
        )?;
        Ok(())
    }

    /// Open the store with the default (no-op) file store
    pub fn open(config: StoreConfig) -> Result<Self> {
        Self::open_with_files(config, Arc::new(NullFileStore))
    }

    /// Open the store with an external JSON node-file store
    pub fn open_with_files(
        config: StoreConfig,
        files: Arc<dyn NodeFileStore>,
    ) -> Result<Self> {
        if config.test_mode && !config.allow_production_db {
            if let Ok(production) = paths::default_db_path() {
                if config.db_path == production {
                    return Err(StoreError::TestAccessViolation(config.db_path));
                }
            }
        }

        if let Some(parent) = config.db_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        if config.vec_mode != VecMode::Skipped {
            register_vec_extension();
        }

        let mut writer = Connection::open(&config.db_path)?;
        Self::configure_connection(&writer)?;

        let vec_loaded = match config.vec_mode {
            VecMode::Skipped => false,
            VecMode::Optional => match probe_vec(&writer) {
                Ok(version) => {
                    tracing::debug!("sqlite-vec {} loaded", version);
                    true
                }
                Err(e) => {
                    tracing::warn!("sqlite-vec unavailable, continuing without: {}", e);
                    false
                }
            },
            VecMode::Required => match probe_vec(&writer) {
                Ok(version) => {
                    tracing::debug!("sqlite-vec {} loaded", version);
                    true
                }
                Err(e) => {
                    return Err(StoreError::VectorExtensionUnavailable(e.to_string()));
                }
            },
        };

        migrations::apply_migrations(
            &mut writer,
            Capabilities { sqlite_vec: vec_loaded },
            config.vec_mode == VecMode::Required,
        )?;

        let reader = Connection::open(&config.db_path)?;
        Self::configure_connection(&reader)?;

        Ok(Self {
            writer: Mutex::new(writer),
            reader: Mutex::new(reader),
            vec_loaded,
            files,
        })
    }

    /// Is the vector function set resolvable on this store?
    pub fn is_vec_loaded(&self) -> bool {
        self.vec_loaded
    }

    pub(crate) fn write(&self) -> Result<MutexGuard<'_, Connection>> {
        self.writer
            .lock()
            .map_err(|_| StoreError::Backend("writer lock poisoned".to_string()))
    }

    pub(crate) fn read(&self) -> Result<MutexGuard<'_, Connection>> {
        self.reader
            .lock()
            .map_err(|_| StoreError::Backend("reader lock poisoned".to_string()))
    }

    // ========================================================================
    // MAINTENANCE
    // ========================================================================

    /// Row counts and schema version
    pub fn stats(&self) -> Result<StoreStats> {
        let conn = self.read()?;
        let count = |table: &str| -> Result<i64> {
            Ok(conn.query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| row.get(0))?)
        };
        let nodes = count("nodes")?;
        let edges = count("edges")?;
        let lessons = count("lessons")?;
        let embeddings = count("node_embeddings")?;
        let schema_version = migrations::current_version(&conn)?;
        Ok(StoreStats {
            nodes,
            edges,
            lessons,
            embeddings,
            schema_version,
            vec_loaded: self.vec_loaded,
        })
    }

    /// Copy the database to `path` via `VACUUM INTO`
    pub fn backup_to(&self, path: &std::path::Path) -> Result<()> {
        let path_str = path
            .to_str()
            .ok_or_else(|| StoreError::Backend("backup path is not valid UTF-8".to_string()))?;
        let conn = self.read()?;
        // VACUUM INTO doesn't support parameterized queries; escape single quotes
        conn.execute_batch(&format!("VACUUM INTO '{}'", path_str.replace('\'', "''")))?;
        Ok(())
    }

    /// Merge FTS segments and refresh the query planner's statistics
    pub fn optimize(&self) -> Result<()> {
        let conn = self.write()?;
        conn.execute_batch(
            "INSERT INTO nodes_fts(nodes_fts) VALUES('optimize');
             PRAGMA optimize;",
        )?;
        Ok(())
    }

    /// Run `PRAGMA integrity_check`; true when the database is clean
    pub fn integrity_check(&self) -> Result<bool> {
        let conn = self.read()?;
        let result: String = conn.query_row("PRAGMA integrity_check", [], |row| row.get(0))?;
        Ok(result == "ok")
    }
}

// ============================================================================
// TESTS
// ============================================================================
