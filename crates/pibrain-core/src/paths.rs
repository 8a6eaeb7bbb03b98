//! Default on-disk locations
//!
//! Everything lives under `~/.pi-brain/data/`: the database at `brain.db`
//! and the JSON node tree at `nodes/YYYY/MM/<nodeId>-v<version>.json`.

use std::path::PathBuf;

use chrono::{DateTime, Datelike, Utc};
use directories::BaseDirs;

use crate::error::{Result, StoreError};

/// `~/.pi-brain/data/`
pub fn data_dir() -> Result<PathBuf> {
    let base = BaseDirs::new()
        .ok_or_else(|| StoreError::Backend("could not determine home directory".to_string()))?;
    Ok(base.home_dir().join(".pi-brain").join("data"))
}

/// `~/.pi-brain/data/brain.db`
pub fn default_db_path() -> Result<PathBuf> {
    Ok(data_dir()?.join("brain.db"))
}

/// `~/.pi-brain/data/nodes/`
pub fn nodes_dir() -> Result<PathBuf> {
    Ok(data_dir()?.join("nodes"))
}

/// Relative path of a versioned node payload inside the nodes tree,
/// bucketed by the node's own timestamp: `YYYY/MM/<nodeId>-v<version>.json`
pub fn node_file_rel_path(node_id: &str, version: i64, timestamp: DateTime<Utc>) -> PathBuf {
    PathBuf::from(format!("{:04}", timestamp.year()))
        .join(format!("{:02}", timestamp.month()))
        .join(format!("{node_id}-v{version}.json"))
}
