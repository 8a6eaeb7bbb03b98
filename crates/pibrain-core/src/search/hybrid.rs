//! Hybrid search - weighted fusion of lexical, semantic, structural, and
//! temporal signals
//!
//! Candidates come from the vector index and the FTS index (top limit x 3
//! each, deduplicated), get enriched with edge and tag counts in batched
//! queries, and are scored as a normalized weighted sum of eight
//! components, each in [0, 1].

use std::collections::HashMap;

use chrono::{DateTime, Utc};

use crate::error::Result;
use crate::model::Node;
use crate::search::keyword::SearchRequest;
use crate::search::vector::{distance_to_score, VectorSearchOptions};
use crate::storage::{clamp_limit, clamp_offset, NodeFilters, Store};

const SECONDS_PER_DAY: f64 = 86_400.0;
/// Decay constant shared by the temporal and recency components
const DECAY_DAYS: f64 = 30.0;
/// Edge count at which the relation component saturates
const RELATION_SATURATION: f64 = 10.0;
/// Candidate overfetch per source
const CANDIDATE_MULTIPLIER: i64 = 3;

// ============================================================================
// WEIGHTS
// ============================================================================

/// Component weights. The defaults intentionally sum to more than one;
/// the final score divides by the sum of the weights that were active
/// for the query, which normalizes it back into [0, 1].
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct HybridWeights {
    pub vector: f64,
    pub keyword: f64,
    pub relation: f64,
    pub content: f64,
    pub temporal: f64,
    pub tag: f64,
    pub importance: f64,
    pub recency: f64,
}

impl Default for HybridWeights {
    fn default() -> Self {
        Self {
            vector: 0.25,
            keyword: 0.15,
            relation: 0.25,
            content: 0.25,
            temporal: 0.15,
            tag: 0.10,
            importance: 0.05,
            recency: 0.10,
        }
    }
}

// ============================================================================
// QUERY & RESPONSE
// ============================================================================

/// Parameters for a hybrid search
#[derive(Debug, Clone, Default)]
pub struct HybridQuery {
    /// Free-text query; feeds the FTS candidates and the content score
    pub query: String,
    /// Pre-computed query embedding from the external provider
    pub query_vector: Option<Vec<f32>>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
    /// Include rows where `archived = 1`
    pub include_archived: bool,
    /// Tags that boost candidates carrying them
    pub boost_tags: Vec<String>,
    /// Anchor for the temporal component; without it the component is a
    /// neutral 0.5
    pub reference_time: Option<DateTime<Utc>>,
    /// Per-call weight overrides
    pub weights: Option<HybridWeights>,
    pub filters: NodeFilters,
}

/// Per-component score breakdown, each value in [0, 1]
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreBreakdown {
    /// `1 / (1 + distance)`; `None` when no vector source contributed
    pub vector: Option<f64>,
    /// `|rank| / (|rank| + 1)`; `None` when no keyword source contributed
    pub keyword: Option<f64>,
    pub relation: f64,
    pub content: f64,
    pub temporal: f64,
    pub tag: f64,
    pub importance: f64,
    pub recency: f64,
}

/// One hybrid hit
#[derive(Debug, Clone)]
pub struct HybridHit {
    pub node: Node,
    /// Normalized weighted sum in [0, 1]
    pub score: f64,
    pub breakdown: ScoreBreakdown,
}

/// A page of hybrid hits
#[derive(Debug, Clone)]
pub struct HybridResponse {
    pub results: Vec<HybridHit>,
    /// Candidates considered before pagination
    pub total_candidates: usize,
    /// Whether the vector index contributed candidates
    pub vector_search_used: bool,
    pub limit: i64,
    pub offset: i64,
}

// ============================================================================
// COMPONENT SCORES
// ============================================================================

/// Tokens longer than two characters, case-folded
fn content_tokens(text: &str) -> Vec<String> {
    text.split_whitespace()
        .filter(|t| t.chars().count() > 2)
        .map(|t| t.to_lowercase())
        .collect()
}

/// Overlap between query tokens and summary tokens, over query tokens
pub(crate) fn content_score(query: &str, summary: &str) -> f64 {
    let query_tokens = content_tokens(query);
    if query_tokens.is_empty() {
        return 0.0;
    }
    let summary_tokens = content_tokens(summary);
    let matched = query_tokens
        .iter()
        .filter(|t| summary_tokens.contains(t))
        .count();
    matched as f64 / query_tokens.len() as f64
}

/// FTS rank (negative) to a bounded keyword score
pub(crate) fn keyword_score(rank: f64) -> f64 {
    let magnitude = rank.abs();
    magnitude / (magnitude + 1.0)
}

/// Exponential decay over an absolute day distance
fn day_decay(days: f64) -> f64 {
    (-days.abs() / DECAY_DAYS).exp()
}

struct Candidate {
    node: Node,
    summary: String,
    distance: Option<f64>,
    rank: Option<f64>,
    edge_count: i64,
    boost_matches: usize,
}

/// Which components carry weight for this query
#[derive(Debug, Clone, Copy)]
struct ActiveComponents {
    vector: bool,
    keyword: bool,
    tag: bool,
}

fn score_candidate(
    candidate: &Candidate,
    query: &HybridQuery,
    weights: &HybridWeights,
    active: ActiveComponents,
    now: DateTime<Utc>,
) -> (f64, ScoreBreakdown) {
    let vector = candidate.distance.map(distance_to_score);
    let keyword = candidate.rank.map(keyword_score);
    let relation = ((candidate.edge_count as f64) / RELATION_SATURATION).min(1.0);
    let content = content_score(&query.query, &candidate.summary);
    let temporal = match query.reference_time {
        Some(reference) => {
            let days = (candidate.node.timestamp - reference).num_seconds() as f64
                / SECONDS_PER_DAY;
            day_decay(days)
        }
        None => 0.5,
    };
    let tag = if query.boost_tags.is_empty() {
        0.0
    } else {
        candidate.boost_matches as f64 / query.boost_tags.len() as f64
    };
    let importance = candidate.node.importance.unwrap_or(0.5);
    let age_days = (now - candidate.node.timestamp).num_seconds() as f64 / SECONDS_PER_DAY;
    let recency = day_decay(age_days.max(0.0));

    let mut weighted = relation * weights.relation
        + content * weights.content
        + temporal * weights.temporal
        + importance * weights.importance
        + recency * weights.recency;
    let mut active_sum =
        weights.relation + weights.content + weights.temporal + weights.importance + weights.recency;

    if active.vector {
        weighted += vector.unwrap_or(0.0) * weights.vector;
        active_sum += weights.vector;
    }
    if active.keyword {
        weighted += keyword.unwrap_or(0.0) * weights.keyword;
        active_sum += weights.keyword;
    }
    if active.tag {
        weighted += tag * weights.tag;
        active_sum += weights.tag;
    }

    let score = if active_sum > 0.0 { weighted / active_sum } else { 0.0 };
    (
        score,
        ScoreBreakdown {
            vector,
            keyword,
            relation,
            content,
            temporal,
            tag,
            importance,
            recency,
        },
    )
}

// ============================================================================
// ENRICHMENT
// ============================================================================

fn in_placeholders(count: usize) -> String {
    std::iter::repeat_n("?", count).collect::<Vec<_>>().join(", ")
}

impl Store {
    /// Count edges touching each id, undirected, each edge once
    fn edge_counts(&self, ids: &[String]) -> Result<HashMap<String, i64>> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }
        let conn = self.read()?;
        let marks = in_placeholders(ids.len());
        let sql = format!(
            "SELECT node_id, COUNT(*) FROM (
                 SELECT source_node_id AS node_id, id FROM edges WHERE source_node_id IN ({marks})
                 UNION
                 SELECT target_node_id AS node_id, id FROM edges WHERE target_node_id IN ({marks})
             ) GROUP BY node_id"
        );
        let mut stmt = conn.prepare(&sql)?;
        let params: Vec<&str> = ids.iter().chain(ids.iter()).map(|s| s.as_str()).collect();
        let rows = stmt.query_map(rusqlite::params_from_iter(params), |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
        })?;
        let mut counts = HashMap::new();
        for row in rows {
            let (id, count) = row?;
            counts.insert(id, count);
        }
        Ok(counts)
    }

    /// How many of the boost tags each node carries, over the union of
    /// node tags, lesson tags, and topics
    fn boost_tag_matches(
        &self,
        ids: &[String],
        boost_tags: &[String],
    ) -> Result<HashMap<String, usize>> {
        if ids.is_empty() || boost_tags.is_empty() {
            return Ok(HashMap::new());
        }
        let conn = self.read()?;
        let tag_marks = in_placeholders(boost_tags.len());
        let sql = format!(
            "SELECT COUNT(DISTINCT tag) FROM (
                 SELECT tag FROM tags WHERE node_id = ?1 AND tag IN ({tag_marks})
                 UNION
                 SELECT lesson_tags.tag FROM lessons
                 JOIN lesson_tags ON lesson_tags.lesson_id = lessons.id
                 WHERE lessons.node_id = ?1 AND lesson_tags.tag IN ({tag_marks})
                 UNION
                 SELECT topic AS tag FROM topics WHERE node_id = ?1 AND topic IN ({tag_marks})
             )"
        );
        let mut stmt = conn.prepare(&sql)?;
        let mut matches = HashMap::new();
        for id in ids {
            let mut params: Vec<&str> = vec![id.as_str()];
            for _ in 0..3 {
                params.extend(boost_tags.iter().map(|t| t.as_str()));
            }
            let count: i64 =
                stmt.query_row(rusqlite::params_from_iter(params), |row| row.get(0))?;
            matches.insert(id.clone(), count as usize);
        }
        Ok(matches)
    }

    // ========================================================================
    // HYBRID SEARCH
    // ========================================================================

    /// Multi-signal search over the node graph
    pub fn hybrid_search(&self, query: &HybridQuery) -> Result<HybridResponse> {
        let limit = clamp_limit(query.limit);
        let offset = clamp_offset(query.offset);
        let weights = query.weights.unwrap_or_default();

        let has_text = !query.query.trim().is_empty();
        let vector_search_used =
            query.query_vector.is_some() && self.is_vec_loaded();

        if !has_text && !vector_search_used {
            return Ok(HybridResponse {
                results: vec![],
                total_candidates: 0,
                vector_search_used: false,
                limit,
                offset,
            });
        }

        // ---- Candidate gathering: both sources, dedup by node id -------
        let mut candidates: Vec<Candidate> = Vec::new();
        let mut by_id: HashMap<String, usize> = HashMap::new();

        if let Some(vector) = query.query_vector.as_deref() {
            let hits = self.search_by_vector(
                vector,
                &VectorSearchOptions {
                    limit: Some(limit * CANDIDATE_MULTIPLIER),
                    filters: query.filters.clone(),
                    max_distance: None,
                },
            )?;
            for hit in hits {
                by_id.insert(hit.node.id.clone(), candidates.len());
                candidates.push(Candidate {
                    node: hit.node,
                    summary: String::new(),
                    distance: Some(hit.distance),
                    rank: None,
                    edge_count: 0,
                    boost_matches: 0,
                });
            }
        }

        if has_text {
            let response = self.search_nodes_advanced(&SearchRequest {
                query: query.query.clone(),
                filters: query.filters.clone(),
                limit: Some(limit * CANDIDATE_MULTIPLIER),
                ..Default::default()
            })?;
            for hit in response.results {
                match by_id.get(&hit.node.id) {
                    Some(&i) => candidates[i].rank = Some(hit.rank),
                    None => {
                        by_id.insert(hit.node.id.clone(), candidates.len());
                        candidates.push(Candidate {
                            summary: hit.node.summary.clone(),
                            node: hit.node,
                            distance: None,
                            rank: Some(hit.rank),
                            edge_count: 0,
                            boost_matches: 0,
                        });
                    }
                }
            }
        }

        // ---- Archived filter ------------------------------------------
        if !query.include_archived {
            candidates.retain(|c| !c.node.archived);
        }

        // ---- Enrichment (batched) -------------------------------------
        let ids: Vec<String> = candidates.iter().map(|c| c.node.id.clone()).collect();
        let edge_counts = self.edge_counts(&ids)?;
        let boost_matches = self.boost_tag_matches(&ids, &query.boost_tags)?;
        for candidate in candidates.iter_mut() {
            candidate.edge_count = edge_counts.get(&candidate.node.id).copied().unwrap_or(0);
            candidate.boost_matches = boost_matches
                .get(&candidate.node.id)
                .copied()
                .unwrap_or(0);
            if candidate.summary.is_empty() {
                candidate.summary = self
                    .node_summary(&candidate.node.id)?
                    .unwrap_or_default();
            }
        }

        // ---- Scoring ---------------------------------------------------
        let active = ActiveComponents {
            vector: vector_search_used,
            keyword: has_text,
            tag: !query.boost_tags.is_empty(),
        };
        let now = Utc::now();
        let total_candidates = candidates.len();

        let mut scored: Vec<HybridHit> = candidates
            .into_iter()
            .map(|mut candidate| {
                let (score, breakdown) =
                    score_candidate(&candidate, query, &weights, active, now);
                candidate.node.summary = std::mem::take(&mut candidate.summary);
                HybridHit {
                    node: candidate.node,
                    score,
                    breakdown,
                }
            })
            .collect();

        // Stable sort keeps candidate order for tied scores.
        scored.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        let results: Vec<HybridHit> = scored
            .into_iter()
            .skip(offset as usize)
            .take(limit as usize)
            .collect();

        Ok(HybridResponse {
            results,
            total_candidates,
            vector_search_used,
            limit,
            offset,
        })
    }

    /// The hybrid breakdown for a single node.
    ///
    /// The vector and keyword components stay `None` unless the caller
    /// supplies a distance and rank from their own search.
    pub fn calculate_node_hybrid_score(
        &self,
        node_id: &str,
        query: &HybridQuery,
        distance: Option<f64>,
        rank: Option<f64>,
    ) -> Result<Option<(f64, ScoreBreakdown)>> {
        let Some(node) = self.get_node(node_id)? else {
            return Ok(None);
        };

        let ids = vec![node.id.clone()];
        let edge_count = self.edge_counts(&ids)?.get(&node.id).copied().unwrap_or(0);
        let boost_matches = self
            .boost_tag_matches(&ids, &query.boost_tags)?
            .get(&node.id)
            .copied()
            .unwrap_or(0);

        let candidate = Candidate {
            summary: node.summary.clone(),
            node,
            distance,
            rank,
            edge_count,
            boost_matches,
        };
        let active = ActiveComponents {
            vector: distance.is_some(),
            keyword: rank.is_some(),
            tag: !query.boost_tags.is_empty(),
        };
        let weights = query.weights.unwrap_or_default();
        Ok(Some(score_candidate(
            &candidate,
            query,
            &weights,
            active,
            Utc::now(),
        )))
    }
}

// ============================================================================
// TESTS
// ============================================================================
