//! Bridge discovery - best-first multi-hop path search
//!
//! Explores outgoing edges from a seed set, decaying the path score by
//! edge confidence and a per-hop factor, and surfaces the highest-scoring
//! multi-node paths as human-readable "bridges" between work segments.

use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::collections::HashMap;

use crate::error::Result;
use crate::model::{Edge, Node};
use crate::storage::Store;

/// Confidence assumed for edges that carry none
const DEFAULT_EDGE_CONFIDENCE: f64 = 0.7;
/// Per-hop score decay
const HOP_DECAY: f64 = 0.9;
/// Hard bound on queue iterations
const MAX_ITERATIONS: usize = 1000;

/// Options for [`Store::discover_bridges`]
#[derive(Debug, Clone)]
pub struct BridgeOptions {
    /// Paths to return (discovery gathers up to twice this many)
    pub limit: usize,
    /// Longest path, counted in nodes along it
    pub max_depth: usize,
    /// Partial paths below this score are abandoned
    pub min_score: f64,
}

impl Default for BridgeOptions {
    fn default() -> Self {
        Self {
            limit: 5,
            max_depth: 2,
            min_score: 0.1,
        }
    }
}

/// A discovered multi-hop path
#[derive(Debug, Clone)]
pub struct BridgePath {
    pub node_ids: Vec<String>,
    pub nodes: Vec<Node>,
    pub edges: Vec<Edge>,
    /// Confidence-decayed cumulative score
    pub score: f64,
    /// Rendered `summary -[edge type]-> summary` chain
    pub description: String,
}

/// A partial path in the priority queue, ordered by score descending
struct PathState {
    score: f64,
    current: String,
    node_ids: Vec<String>,
    edges: Vec<Edge>,
}

impl PartialEq for PathState {
    fn eq(&self, other: &Self) -> bool {
        self.score.total_cmp(&other.score) == Ordering::Equal
    }
}
impl Eq for PathState {}

impl PartialOrd for PathState {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
impl Ord for PathState {
    fn cmp(&self, other: &Self) -> Ordering {
        self.score.total_cmp(&other.score)
    }
}

impl Store {
    fn cached_node(
        &self,
        cache: &mut HashMap<String, Option<Node>>,
        id: &str,
    ) -> Result<Option<Node>> {
        if let Some(cached) = cache.get(id) {
            return Ok(cached.clone());
        }
        let node = self.get_node(id)?;
        cache.insert(id.to_string(), node.clone());
        Ok(node)
    }

    /// Short human label for a node: payload summary, else project
    /// basename, else an id prefix.
    fn bridge_label(&self, node: &Node) -> String {
        if let Some(summary) = self.files.read_summary(&node.data_file) {
            if !summary.is_empty() {
                return summary;
            }
        }
        if !node.summary.is_empty() {
            return node.summary.clone();
        }
        let basename = node.project_basename();
        if !basename.is_empty() {
            return basename.to_string();
        }
        node.id.chars().take(8).collect()
    }

    fn describe_path(&self, nodes: &[Node], edges: &[Edge]) -> String {
        let mut description = String::new();
        for (i, node) in nodes.iter().enumerate() {
            if i > 0 {
                let edge_type = edges[i - 1].edge_type.display_name();
                description.push_str(&format!(" -[{edge_type}]-> "));
            }
            description.push_str(&self.bridge_label(node));
        }
        description
    }

    /// Best-first multi-hop discovery from a seed set.
    ///
    /// Every seed starts at score 1; expanding along an edge multiplies
    /// by the edge's confidence (0.7 when absent) and the per-hop decay.
    /// Paths revisiting one of their own nodes are not expanded, paths
    /// whose score falls below `min_score` are dropped, and the whole
    /// exploration is bounded at 1000 iterations.
    pub fn discover_bridges(
        &self,
        seeds: &[String],
        options: &BridgeOptions,
    ) -> Result<Vec<BridgePath>> {
        let mut queue: BinaryHeap<PathState> = seeds
            .iter()
            .map(|seed| PathState {
                score: 1.0,
                current: seed.clone(),
                node_ids: vec![seed.clone()],
                edges: vec![],
            })
            .collect();

        let mut cache: HashMap<String, Option<Node>> = HashMap::new();
        let mut discoveries: Vec<BridgePath> = Vec::new();

        for _ in 0..MAX_ITERATIONS {
            let Some(state) = queue.pop() else {
                break;
            };

            if state.node_ids.len() > 1 {
                let mut nodes = Vec::with_capacity(state.node_ids.len());
                let mut complete = true;
                for id in &state.node_ids {
                    match self.cached_node(&mut cache, id)? {
                        Some(node) => nodes.push(node),
                        None => {
                            complete = false;
                            break;
                        }
                    }
                }
                if complete {
                    let description = self.describe_path(&nodes, &state.edges);
                    discoveries.push(BridgePath {
                        node_ids: state.node_ids.clone(),
                        nodes,
                        edges: state.edges.clone(),
                        score: state.score,
                        description,
                    });
                }
            }

            if discoveries.len() >= options.limit * 2 {
                break;
            }

            if state.node_ids.len() <= options.max_depth {
                for edge in self.get_edges_from(&state.current)? {
                    if state.node_ids.contains(&edge.target_node_id) {
                        continue;
                    }
                    let confidence = edge.confidence.unwrap_or(DEFAULT_EDGE_CONFIDENCE);
                    let new_score = state.score * confidence * HOP_DECAY;
                    if new_score < options.min_score {
                        continue;
                    }

                    let mut node_ids = state.node_ids.clone();
                    node_ids.push(edge.target_node_id.clone());
                    let mut edges = state.edges.clone();
                    let current = edge.target_node_id.clone();
                    edges.push(edge);

                    queue.push(PathState {
                        score: new_score,
                        current,
                        node_ids,
                        edges,
                    });
                }
            }
        }

        discoveries.sort_by(|a, b| b.score.total_cmp(&a.score));
        discoveries.truncate(options.limit);
        Ok(discoveries)
    }
}

// ============================================================================
// TESTS
// ============================================================================
