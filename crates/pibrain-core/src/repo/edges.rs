//! Edge repository - typed directed links between nodes

use chrono::Utc;
use rusqlite::{params, OptionalExtension, Row};

use crate::error::Result;
use crate::model::{generate_edge_id, CreatedBy, Edge, EdgeMetadata, EdgeType};
use crate::repo::nodes::parse_timestamp;
use crate::storage::Store;

const EDGE_COLUMNS: &str =
    "id, source_node_id, target_node_id, type, metadata, created_at, created_by, confidence, similarity";

/// Convert an `edges` row to an [`Edge`], parsing the JSON metadata and
/// narrowing the string fields to their enums.
pub(crate) fn row_to_edge(row: &Row) -> rusqlite::Result<Edge> {
    let edge_type: String = row.get("type")?;
    let metadata: String = row.get("metadata")?;
    let created_at: String = row.get("created_at")?;
    let created_by: String = row.get("created_by")?;

    let edge_type = EdgeType::parse_name(&edge_type).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            0,
            rusqlite::types::Type::Text,
            Box::new(std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                format!("unknown edge type '{edge_type}'"),
            )),
        )
    })?;

    Ok(Edge {
        id: row.get("id")?,
        source_node_id: row.get("source_node_id")?,
        target_node_id: row.get("target_node_id")?,
        edge_type,
        metadata: EdgeMetadata::from_json(&metadata),
        created_at: parse_timestamp(&created_at, "created_at")?,
        created_by: CreatedBy::parse_name(&created_by),
        confidence: row.get("confidence")?,
        similarity: row.get("similarity")?,
    })
}

impl Store {
    /// Persist an edge. An empty id gets a generated one; the stored edge
    /// is returned.
    pub fn create_edge(&self, edge: &Edge) -> Result<Edge> {
        let mut stored = edge.clone();
        if stored.id.is_empty() {
            stored.id = generate_edge_id();
        }
        if stored.created_at.timestamp() == 0 {
            stored.created_at = Utc::now();
        }

        let conn = self.write()?;
        conn.execute(
            &format!("INSERT INTO edges ({EDGE_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)"),
            params![
                stored.id,
                stored.source_node_id,
                stored.target_node_id,
                stored.edge_type.as_str(),
                stored.metadata.to_json(),
                stored.created_at.to_rfc3339(),
                stored.created_by.as_str(),
                stored.confidence,
                stored.similarity,
            ],
        )?;
        Ok(stored)
    }

    pub fn get_edge(&self, id: &str) -> Result<Option<Edge>> {
        let conn = self.read()?;
        Ok(conn
            .query_row(
                &format!("SELECT {EDGE_COLUMNS} FROM edges WHERE id = ?1"),
                params![id],
                row_to_edge,
            )
            .optional()?)
    }

    /// Outgoing edges of a node
    pub fn get_edges_from(&self, node_id: &str) -> Result<Vec<Edge>> {
        let conn = self.read()?;
        let mut stmt = conn.prepare_cached(&format!(
            "SELECT {EDGE_COLUMNS} FROM edges WHERE source_node_id = ?1 ORDER BY created_at"
        ))?;
        let edges = stmt
            .query_map(params![node_id], row_to_edge)?
            .collect::<rusqlite::Result<_>>()?;
        Ok(edges)
    }

    /// Incoming edges of a node
    pub fn get_edges_to(&self, node_id: &str) -> Result<Vec<Edge>> {
        let conn = self.read()?;
        let mut stmt = conn.prepare_cached(&format!(
            "SELECT {EDGE_COLUMNS} FROM edges WHERE target_node_id = ?1 ORDER BY created_at"
        ))?;
        let edges = stmt
            .query_map(params![node_id], row_to_edge)?
            .collect::<rusqlite::Result<_>>()?;
        Ok(edges)
    }

    /// All edges touching a node, in either direction
    pub fn get_node_edges(&self, node_id: &str) -> Result<Vec<Edge>> {
        let conn = self.read()?;
        let mut stmt = conn.prepare_cached(&format!(
            "SELECT {EDGE_COLUMNS} FROM edges
             WHERE source_node_id = ?1 OR target_node_id = ?1
             ORDER BY created_at"
        ))?;
        let edges = stmt
            .query_map(params![node_id], row_to_edge)?
            .collect::<rusqlite::Result<_>>()?;
        Ok(edges)
    }

    /// Does an edge (source, target[, type]) exist?
    pub fn edge_exists(
        &self,
        source: &str,
        target: &str,
        edge_type: Option<EdgeType>,
    ) -> Result<bool> {
        let conn = self.read()?;
        let count: i64 = match edge_type {
            Some(t) => conn.query_row(
                "SELECT COUNT(*) FROM edges
                 WHERE source_node_id = ?1 AND target_node_id = ?2 AND type = ?3",
                params![source, target, t.as_str()],
                |row| row.get(0),
            )?,
            None => conn.query_row(
                "SELECT COUNT(*) FROM edges
                 WHERE source_node_id = ?1 AND target_node_id = ?2",
                params![source, target],
                |row| row.get(0),
            )?,
        };
        Ok(count > 0)
    }

    /// Delete an edge by id; returns whether a row existed
    pub fn delete_edge(&self, id: &str) -> Result<bool> {
        let conn = self.write()?;
        let deleted = conn.execute("DELETE FROM edges WHERE id = ?1", params![id])?;
        Ok(deleted > 0)
    }
}

// ============================================================================
// TESTS
// ============================================================================
