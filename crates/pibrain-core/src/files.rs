//! External JSON node-file store interface
//!
//! The full analyzer payload of every node version lives as JSON outside
//! the database; the store only keeps the `data_file` path. This trait is
//! the seam: the shipping implementation lives with the analyzer, tests
//! plug in [`NullFileStore`].

use crate::error::Result;
use crate::model::Node;

/// Access to the on-disk JSON node tree
pub trait NodeFileStore: Send + Sync {
    /// Persist the versioned payload for `node`.
    ///
    /// Returns the `data_file` path the payload was written to, or `None`
    /// when the implementation does not persist payloads.
    fn write_payload(&self, node: &Node) -> Result<Option<String>>;

    /// Read just the summary out of a payload file. Used where the full
    /// payload would be wasteful (bridge descriptions).
    fn read_summary(&self, data_file: &str) -> Option<String>;

    /// Load a specific prior version of a node from the JSON tree
    fn read_version(&self, node_id: &str, version: i64) -> Option<Node>;
}

/// A file store that stores nothing. Default for tests and for callers
/// that manage payload files themselves.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullFileStore;

impl NodeFileStore for NullFileStore {
    fn write_payload(&self, _node: &Node) -> Result<Option<String>> {
        Ok(None)
    }

    fn read_summary(&self, _data_file: &str) -> Option<String> {
        None
    }

    fn read_version(&self, _node_id: &str, _version: i64) -> Option<Node> {
        None
    }
}
