//! Graph engine - traversal and bridge discovery

pub mod bridge;
pub mod traverse;

pub use bridge::{BridgeOptions, BridgePath};
pub use traverse::{
    ConnectedNodes, Direction, GraphPath, Subgraph, TraversalOptions, TraversedEdge,
};
