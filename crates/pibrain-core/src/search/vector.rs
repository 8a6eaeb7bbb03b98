//! Semantic search - KNN over the vec0 virtual table
//!
//! The query joins the vector hits back through `node_embeddings` to the
//! node rows. Filters are applied after the KNN constraint, so filtered
//! searches overfetch (k = limit x 5) to keep the post-filter result set
//! full.

use rusqlite::types::Value;

use crate::error::Result;
use crate::index::{is_dimension_mismatch, serialize_embedding};
use crate::model::Node;
use crate::repo::row_to_node;
use crate::storage::filters::build_filter_clause;
use crate::storage::{NodeFilters, Store};

/// Hard ceiling on the KNN overfetch
const MAX_K: i64 = 1000;

/// Options for a semantic search
#[derive(Debug, Clone, Default)]
pub struct VectorSearchOptions {
    pub limit: Option<i64>,
    pub filters: NodeFilters,
    /// Drop hits whose distance exceeds this bound
    pub max_distance: Option<f64>,
}

/// One semantic hit
#[derive(Debug, Clone)]
pub struct VectorHit {
    pub node: Node,
    /// Raw vec0 distance; smaller is closer
    pub distance: f64,
    /// `1 / (1 + distance)`, monotonic in closeness
    pub score: f64,
}

/// Distance to similarity score
pub(crate) fn distance_to_score(distance: f64) -> f64 {
    1.0 / (1.0 + distance)
}

impl Store {
    /// KNN search with a caller-supplied query vector.
    ///
    /// Returns an empty result when the vector extension is not loaded or
    /// when the query vector's dimension does not match the index.
    pub fn search_by_vector(
        &self,
        query: &[f32],
        options: &VectorSearchOptions,
    ) -> Result<Vec<VectorHit>> {
        if !self.is_vec_loaded() {
            return Ok(vec![]);
        }

        let limit = crate::storage::clamp_limit(options.limit);
        let overfetch = if options.filters.is_empty() { 1 } else { 5 };
        let k = (limit * overfetch).min(MAX_K);

        let (filter_clause, filter_params) = build_filter_clause(&options.filters, "n");

        let mut params: Vec<Value> = vec![
            Value::Blob(serialize_embedding(query)),
            Value::Integer(k),
        ];
        params.extend(filter_params);

        let conn = self.read()?;
        let mut stmt = match conn.prepare(&format!(
            "SELECT n.*, v.distance AS distance
             FROM node_embeddings_vec v
             JOIN node_embeddings e ON e.rowid = v.rowid
             JOIN nodes n ON n.id = e.node_id
             WHERE v.embedding MATCH ?1 AND k = ?2{filter_clause}
             ORDER BY v.distance"
        )) {
            Ok(stmt) => stmt,
            Err(e) if is_dimension_mismatch(&e) => {
                tracing::warn!("vector search degraded to empty: {}", e);
                return Ok(vec![]);
            }
            Err(e) => return Err(e.into()),
        };

        let rows = stmt.query_map(rusqlite::params_from_iter(params.iter()), |row| {
            let node = row_to_node(row)?;
            let distance: f64 = row.get("distance")?;
            Ok((node, distance))
        });
        let rows = match rows {
            Ok(rows) => rows,
            Err(e) if is_dimension_mismatch(&e) => {
                tracing::warn!("vector search degraded to empty: {}", e);
                return Ok(vec![]);
            }
            Err(e) => return Err(e.into()),
        };

        let mut hits = Vec::new();
        for row in rows {
            let (node, distance) = match row {
                Ok(pair) => pair,
                Err(e) if is_dimension_mismatch(&e) => {
                    tracing::warn!("vector search degraded to empty: {}", e);
                    return Ok(vec![]);
                }
                Err(e) => return Err(e.into()),
            };
            if let Some(max) = options.max_distance {
                if distance > max {
                    continue;
                }
            }
            hits.push(VectorHit {
                score: distance_to_score(distance),
                node,
                distance,
            });
            if hits.len() as i64 >= limit {
                break;
            }
        }
        Ok(hits)
    }

    /// Nodes semantically closest to an existing node, excluding itself
    pub fn find_similar_nodes(&self, node_id: &str, limit: i64) -> Result<Vec<VectorHit>> {
        let Some(vector) = self.get_node_embedding(node_id)? else {
            return Ok(vec![]);
        };

        let mut hits = self.search_by_vector(
            &vector,
            &VectorSearchOptions {
                limit: Some(limit + 1),
                ..Default::default()
            },
        )?;
        hits.retain(|hit| hit.node.id != node_id);
        hits.truncate(limit.max(0) as usize);
        Ok(hits)
    }
}

// ============================================================================
// TESTS
// ============================================================================
