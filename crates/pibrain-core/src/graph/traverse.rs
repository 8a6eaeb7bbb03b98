//! Bounded graph traversal - connected nodes, subgraphs, shortest paths

use std::collections::{HashSet, VecDeque};

use rusqlite::types::Value;

use crate::error::Result;
use crate::model::{Edge, EdgeType, Node};
use crate::repo::row_to_node;
use crate::storage::Store;

const MAX_TRAVERSAL_DEPTH: u32 = 5;
const MAX_PATH_DEPTH: u32 = 20;
const DEFAULT_PATH_DEPTH: u32 = 10;

/// Which edge directions a traversal follows
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Direction {
    Incoming,
    Outgoing,
    #[default]
    Both,
}

/// Options for [`Store::get_connected_nodes`]
#[derive(Debug, Clone, Default)]
pub struct TraversalOptions {
    /// Hop bound, clamped to [1, 5]; default 1
    pub depth: Option<u32>,
    pub direction: Direction,
    /// Only follow edges of these types
    pub edge_types: Option<Vec<EdgeType>>,
}

/// An edge met during traversal, with where and how it was found
#[derive(Debug, Clone)]
pub struct TraversedEdge {
    pub edge: Edge,
    /// Hops from the root at which the edge was first seen
    pub hop_distance: u32,
    /// Orientation relative to the root side of the walk: `Outgoing`
    /// when the edge pointed away from the frontier node
    pub orientation: Direction,
}

/// Traversal result: reachable nodes plus the edges that connect them
#[derive(Debug, Clone, Default)]
pub struct ConnectedNodes {
    /// Reachable nodes, most recent first; excludes the root
    pub nodes: Vec<Node>,
    /// Every edge met, once each
    pub edges: Vec<TraversedEdge>,
}

/// A subgraph spanning several roots
#[derive(Debug, Clone, Default)]
pub struct Subgraph {
    /// Union of roots and everything reachable from them
    pub nodes: Vec<Node>,
    pub edges: Vec<TraversedEdge>,
}

/// A shortest path between two nodes
#[derive(Debug, Clone)]
pub struct GraphPath {
    pub nodes: Vec<Node>,
    pub edges: Vec<Edge>,
}

fn edge_type_allowed(edge: &Edge, allowed: &Option<Vec<EdgeType>>) -> bool {
    match allowed {
        Some(types) => types.contains(&edge.edge_type),
        None => true,
    }
}

impl Store {
    fn load_nodes_by_ids(&self, ids: &HashSet<String>) -> Result<Vec<Node>> {
        if ids.is_empty() {
            return Ok(vec![]);
        }
        let conn = self.read()?;
        let marks: Vec<&str> = ids.iter().map(|_| "?").collect();
        let mut stmt = conn.prepare(&format!(
            "SELECT * FROM nodes WHERE id IN ({}) ORDER BY timestamp DESC",
            marks.join(", ")
        ))?;
        let params: Vec<Value> = ids.iter().map(|id| Value::Text(id.clone())).collect();
        let nodes = stmt
            .query_map(rusqlite::params_from_iter(params), row_to_node)?
            .collect::<rusqlite::Result<_>>()?;
        Ok(nodes)
    }

    /// Depth-bounded BFS from a root node.
    ///
    /// Each edge is recorded exactly once, keyed by id, at the hop where
    /// it was first seen; nodes come back ordered by `timestamp DESC`
    /// and never include the root itself.
    pub fn get_connected_nodes(
        &self,
        root: &str,
        options: &TraversalOptions,
    ) -> Result<ConnectedNodes> {
        let depth = options.depth.unwrap_or(1).clamp(1, MAX_TRAVERSAL_DEPTH);

        let mut visited: HashSet<String> = HashSet::from([root.to_string()]);
        let mut seen_edges: HashSet<String> = HashSet::new();
        let mut edges: Vec<TraversedEdge> = Vec::new();
        let mut frontier: Vec<String> = vec![root.to_string()];

        for hop in 1..=depth {
            let mut next_frontier: Vec<String> = Vec::new();

            for node_id in &frontier {
                let mut directed: Vec<(Edge, Direction)> = Vec::new();
                if options.direction != Direction::Incoming {
                    for edge in self.get_edges_from(node_id)? {
                        directed.push((edge, Direction::Outgoing));
                    }
                }
                if options.direction != Direction::Outgoing {
                    for edge in self.get_edges_to(node_id)? {
                        directed.push((edge, Direction::Incoming));
                    }
                }

                for (edge, orientation) in directed {
                    if !edge_type_allowed(&edge, &options.edge_types) {
                        continue;
                    }
                    let other = if orientation == Direction::Outgoing {
                        edge.target_node_id.clone()
                    } else {
                        edge.source_node_id.clone()
                    };
                    if seen_edges.insert(edge.id.clone()) {
                        edges.push(TraversedEdge {
                            edge,
                            hop_distance: hop,
                            orientation,
                        });
                    }
                    if visited.insert(other.clone()) {
                        next_frontier.push(other);
                    }
                }
            }

            if next_frontier.is_empty() {
                break;
            }
            frontier = next_frontier;
        }

        visited.remove(root);
        let nodes = self.load_nodes_by_ids(&visited)?;
        Ok(ConnectedNodes { nodes, edges })
    }

    /// Union of per-root traversals, with the roots themselves included
    /// in the node set and edges deduplicated by id.
    pub fn get_subgraph(&self, roots: &[String], options: &TraversalOptions) -> Result<Subgraph> {
        let mut node_ids: HashSet<String> = roots.iter().cloned().collect();
        let mut seen_edges: HashSet<String> = HashSet::new();
        let mut edges: Vec<TraversedEdge> = Vec::new();

        for root in roots {
            let connected = self.get_connected_nodes(root, options)?;
            for node in connected.nodes {
                node_ids.insert(node.id);
            }
            for traversed in connected.edges {
                if seen_edges.insert(traversed.edge.id.clone()) {
                    edges.push(traversed);
                }
            }
        }

        let nodes = self.load_nodes_by_ids(&node_ids)?;
        Ok(Subgraph { nodes, edges })
    }

    /// Breadth-first shortest path over undirected edges.
    ///
    /// `max_depth` bounds the hop count, default 10, clamped to [1, 20].
    /// Returns the first shortest path found, or `None`.
    pub fn find_path(
        &self,
        from: &str,
        to: &str,
        max_depth: Option<u32>,
    ) -> Result<Option<GraphPath>> {
        let max_depth = max_depth
            .unwrap_or(DEFAULT_PATH_DEPTH)
            .clamp(1, MAX_PATH_DEPTH);

        if from == to {
            return Ok(self.get_node(from)?.map(|node| GraphPath {
                nodes: vec![node],
                edges: vec![],
            }));
        }

        let mut visited: HashSet<String> = HashSet::from([from.to_string()]);
        let mut queue: VecDeque<(String, Vec<String>, Vec<Edge>)> =
            VecDeque::from([(from.to_string(), vec![from.to_string()], vec![])]);

        while let Some((current, path_nodes, path_edges)) = queue.pop_front() {
            if path_edges.len() as u32 >= max_depth {
                continue;
            }

            for edge in self.get_node_edges(&current)? {
                let other = if edge.source_node_id == current {
                    edge.target_node_id.clone()
                } else {
                    edge.source_node_id.clone()
                };
                if !visited.insert(other.clone()) {
                    continue;
                }

                let mut next_nodes = path_nodes.clone();
                next_nodes.push(other.clone());
                let mut next_edges = path_edges.clone();
                next_edges.push(edge);

                if other == to {
                    let mut nodes = Vec::with_capacity(next_nodes.len());
                    for id in &next_nodes {
                        match self.get_node(id)? {
                            Some(node) => nodes.push(node),
                            None => return Ok(None),
                        }
                    }
                    return Ok(Some(GraphPath {
                        nodes,
                        edges: next_edges,
                    }));
                }
                queue.push_back((other, next_nodes, next_edges));
            }
        }

        Ok(None)
    }

    /// Nodes this node descends from: traversal pinned to incoming edges
    pub fn get_ancestors(&self, node_id: &str, depth: Option<u32>) -> Result<ConnectedNodes> {
        self.get_connected_nodes(
            node_id,
            &TraversalOptions {
                depth: Some(depth.unwrap_or(MAX_TRAVERSAL_DEPTH)),
                direction: Direction::Incoming,
                edge_types: None,
            },
        )
    }

    /// Nodes descending from this node: traversal pinned to outgoing edges
    pub fn get_descendants(&self, node_id: &str, depth: Option<u32>) -> Result<ConnectedNodes> {
        self.get_connected_nodes(
            node_id,
            &TraversalOptions {
                depth: Some(depth.unwrap_or(MAX_TRAVERSAL_DEPTH)),
                direction: Direction::Outgoing,
                edge_types: None,
            },
        )
    }
}

// ============================================================================
// TESTS
// ============================================================================
