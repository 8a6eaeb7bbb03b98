//! Relationship store
//!
//! Validates and persists analyzer-produced typed relationships. A
//! relationship whose target is only known as a textual description is
//! stored as a *pending* edge - a self-loop carrying the description in
//! its metadata - and resolved to a real target later, once semantic
//! search has found one.

use chrono::Utc;
use rusqlite::params;
use serde::{Deserialize, Serialize};

use crate::error::{Result, StoreError};
use crate::model::{CreatedBy, Edge, EdgeType};
use crate::repo::row_to_edge;
use crate::storage::Store;

/// A typed relationship as produced by the analyzer
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelationshipInput {
    pub source_node_id: String,
    /// Must name an AutoMem edge type (RELATES_TO, DERIVED_FROM, ...)
    #[serde(rename = "type")]
    pub relationship_type: String,
    /// Known target node, when the analyzer could resolve one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_node_id: Option<String>,
    /// Textual description of the target, for later resolution
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_description: Option<String>,
    pub confidence: f64,
    pub reason: String,
}

/// Validate a relationship input, returning its parsed edge type.
///
/// Reject reasons carry specific messages so per-item batch reporting
/// stays useful.
pub fn validate_relationship(input: &RelationshipInput) -> Result<EdgeType> {
    let edge_type = EdgeType::parse_name(&input.relationship_type)
        .filter(EdgeType::is_automem)
        .ok_or_else(|| {
            StoreError::InvalidRelationship(format!(
                "unknown relationship type '{}'",
                input.relationship_type
            ))
        })?;

    if !(0.0..=1.0).contains(&input.confidence) {
        return Err(StoreError::InvalidRelationship(format!(
            "confidence {} outside [0, 1]",
            input.confidence
        )));
    }

    let has_target = input
        .target_node_id
        .as_deref()
        .is_some_and(|t| !t.is_empty());
    let has_description = input
        .target_description
        .as_deref()
        .is_some_and(|d| !d.is_empty());
    if !has_target && !has_description {
        return Err(StoreError::InvalidRelationship(
            "neither targetNodeId nor targetDescription present".to_string(),
        ));
    }

    if input.reason.trim().is_empty() {
        return Err(StoreError::InvalidRelationship(
            "reason must not be blank".to_string(),
        ));
    }

    Ok(edge_type)
}

impl Store {
    /// Validate and persist one relationship.
    ///
    /// With a known target this creates a normal daemon edge; without
    /// one it creates a pending self-loop carrying the description.
    pub fn store_relationship(&self, input: &RelationshipInput) -> Result<Edge> {
        let edge_type = validate_relationship(input)?;

        let target = input
            .target_node_id
            .as_deref()
            .filter(|t| !t.is_empty());

        let mut edge = Edge::new(
            input.source_node_id.clone(),
            target.unwrap_or(&input.source_node_id),
            edge_type,
        );
        edge.created_by = CreatedBy::Daemon;
        edge.confidence = Some(input.confidence);
        edge.metadata.reason = Some(input.reason.clone());
        if target.is_none() {
            edge.metadata.unresolved_target = input.target_description.clone();
        }

        self.create_edge(&edge)
    }

    /// Persist a batch, reporting per item; validation failures do not
    /// stop the rest of the batch.
    pub fn store_relationships(
        &self,
        inputs: &[RelationshipInput],
    ) -> Vec<Result<Edge>> {
        inputs
            .iter()
            .map(|input| self.store_relationship(input))
            .collect()
    }

    /// Pending edges awaiting target resolution, optionally restricted
    /// to one source node.
    pub fn find_unresolved_relationships(&self, node_id: Option<&str>) -> Result<Vec<Edge>> {
        let conn = self.read()?;
        let base = "SELECT id, source_node_id, target_node_id, type, metadata, created_at,
                           created_by, confidence, similarity
                    FROM edges
                    WHERE source_node_id = target_node_id
                      AND json_extract(metadata, '$.unresolvedTarget') IS NOT NULL";

        let edges = match node_id {
            Some(node_id) => {
                let mut stmt = conn.prepare(&format!(
                    "{base} AND source_node_id = ?1 ORDER BY created_at"
                ))?;
                let rows = stmt
                    .query_map(params![node_id], row_to_edge)?
                    .collect::<rusqlite::Result<Vec<_>>>()?;
                rows
            }
            None => {
                let mut stmt = conn.prepare(&format!("{base} ORDER BY created_at"))?;
                let rows = stmt
                    .query_map([], row_to_edge)?
                    .collect::<rusqlite::Result<Vec<_>>>()?;
                rows
            }
        };
        Ok(edges)
    }

    /// Point a pending edge at a real target.
    ///
    /// Moves `unresolvedTarget` into `resolvedFrom`, stamps `resolvedAt`,
    /// and rewrites `target_node_id`. Returns false when the edge does
    /// not exist or is not pending.
    pub fn resolve_relationship(&self, edge_id: &str, new_target: &str) -> Result<bool> {
        let Some(edge) = self.get_edge(edge_id)? else {
            return Ok(false);
        };
        if !edge.is_pending() {
            return Ok(false);
        }

        let mut metadata = edge.metadata.clone();
        metadata.resolved_from = metadata.unresolved_target.take();
        metadata.resolved_at = Some(Utc::now());

        let conn = self.write()?;
        let rows = conn.execute(
            "UPDATE edges SET target_node_id = ?1, metadata = ?2 WHERE id = ?3",
            params![new_target, metadata.to_json(), edge_id],
        )?;
        Ok(rows > 0)
    }
}

// ============================================================================
// TESTS
// ============================================================================
