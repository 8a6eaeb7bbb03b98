//! # Pi-Brain Core
//!
//! Storage layer of a personal session-memory knowledge graph: analyzed
//! coding-session nodes connected by typed edges, with row, full-text,
//! and vector indexes cooperating to answer hybrid search, graph
//! traversal, and path-explanation queries.
//!
//! - **Relational store**: rusqlite with WAL, enforced foreign keys, and
//!   requirement-gated forward migrations
//! - **Vector index**: sqlite-vec (`vec0`) KNN over node embeddings,
//!   loaded as an optional capability
//! - **FTS5**: composed per-node documents (summary, decisions, lessons,
//!   tags, topics) with quoted-term queries and manual highlights
//! - **Hybrid search**: eight-signal weighted fusion normalized to [0, 1]
//! - **Graph engine**: bounded BFS traversal and best-first bridge
//!   discovery with confidence-decayed scoring
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use pibrain_core::{Node, Store, StoreConfig};
//!
//! let store = Store::open(StoreConfig::from_env()?)?;
//!
//! let mut node = Node::new("sessions/2026-03-07.jsonl");
//! node.summary = "Implemented token refresh".to_string();
//! store.create_node(&node, false)?;
//!
//! let hits = store.search_nodes("token refresh", &Default::default(), 10)?;
//! ```
//!
//! The session analyzer, the embedding provider, and the JSON node-file
//! store are external collaborators; the core consumes node payloads,
//! query vectors, and a [`NodeFileStore`] implementation.

#![warn(rustdoc::missing_crate_level_docs)]

// ============================================================================
// MODULES
// ============================================================================

pub mod error;
pub mod files;
pub mod graph;
pub mod index;
pub mod model;
pub mod paths;
pub mod readers;
pub mod relationships;
pub mod repo;
pub mod search;
pub mod storage;

#[cfg(test)]
pub(crate) mod testutil;

// ============================================================================
// PUBLIC API RE-EXPORTS
// ============================================================================

// Errors
pub use error::{Result, StoreError};

// Data model
pub use model::{
    generate_edge_id, generate_node_id, CreatedBy, DaemonDecision, Decision, Edge, EdgeClass,
    EdgeMetadata, EdgeType, Lesson, LessonLevel, ModelQuirk, Node, NodeType, Outcome,
    QuirkFrequency, ToolError, LESSON_LEVELS,
};

// Store
pub use storage::{NodeFilters, Store, StoreConfig, StoreStats, VecMode};

// External collaborators
pub use files::{NodeFileStore, NullFileStore};

// Repositories
pub use repo::next_node_version;

// Indexing pipeline
pub use index::{
    build_embedding_text, compose_fts_doc, deserialize_embedding, is_rich_embedding_format,
    serialize_embedding, FtsDoc, EMBEDDING_DIM, EMBEDDING_TEXT_MARKER,
};

// Search
pub use search::{
    build_match_query, FtsField, Highlight, HybridHit, HybridQuery, HybridResponse,
    HybridWeights, ScoreBreakdown, SearchHit, SearchRequest, SearchResponse, VectorHit,
    VectorSearchOptions,
};

// Graph engine
pub use graph::{
    BridgeOptions, BridgePath, ConnectedNodes, Direction, GraphPath, Subgraph,
    TraversalOptions, TraversedEdge,
};

// Relationships
pub use relationships::{validate_relationship, RelationshipInput};

// Readers
pub use readers::{
    FailurePattern, FailurePatternFilters, InsightRecord, LessonFilters, LessonPattern,
    LessonRecord, LessonsByLevel, LevelLessons, Listing, ModelQuirkRecord, ModelStats, Page,
    PromptEffectivenessRecord, QuirkFilters,
};

// ============================================================================
// VERSION INFO
// ============================================================================

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// ============================================================================
// PRELUDE
// ============================================================================

/// Convenient imports for common usage
pub mod prelude {
    pub use crate::{
        Edge, EdgeType, HybridQuery, Node, NodeFilters, NodeType, Outcome,
        RelationshipInput, Result, Store, StoreConfig, StoreError, VecMode,
    };
}
