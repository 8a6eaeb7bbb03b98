//! Error types for the storage core

use std::path::PathBuf;

/// Storage error type
#[non_exhaustive]
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Test mode tried to open the production database without the override
    #[error("test mode refused to open production database at {0} (set allow_production_db to override)")]
    TestAccessViolation(PathBuf),
    /// The vector extension was required but could not be loaded
    #[error("vector extension unavailable: {0}")]
    VectorExtensionUnavailable(String),
    /// A migration's requirements are unmet and the caller made them mandatory
    #[error("migration {version} blocked: requires {missing}")]
    MigrationBlocked { version: u32, missing: String },
    /// An operation referenced a node that does not exist
    #[error("node not found: {0}")]
    NodeMissing(String),
    /// A relationship failed validation
    #[error("invalid relationship: {0}")]
    InvalidRelationship(String),
    /// A foreign key invariant was broken
    #[error("foreign key violation: {0}")]
    ForeignKeyViolation(String),
    /// Database error
    #[error("database error: {0}")]
    Database(rusqlite::Error),
    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    /// Anything else that went wrong in the storage backend
    #[error("storage backend error: {0}")]
    Backend(String),
}

/// Storage result type
pub type Result<T> = std::result::Result<T, StoreError>;

impl From<rusqlite::Error> for StoreError {
    fn from(e: rusqlite::Error) -> Self {
        if let rusqlite::Error::SqliteFailure(err, ref msg) = e {
            if err.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_FOREIGNKEY {
                return StoreError::ForeignKeyViolation(
                    msg.clone().unwrap_or_else(|| "FOREIGN KEY constraint failed".to_string()),
                );
            }
        }
        StoreError::Database(e)
    }
}
