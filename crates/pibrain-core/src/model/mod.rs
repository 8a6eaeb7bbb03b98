//! Data model - session nodes, typed edges, and their enums

mod edge;
mod node;

pub use edge::{
    generate_edge_id, CreatedBy, Edge, EdgeClass, EdgeMetadata, EdgeType,
};
pub use node::{
    generate_node_id, DaemonDecision, Decision, Lesson, LessonLevel, ModelQuirk, Node, NodeType,
    Outcome, QuirkFrequency, ToolError, LESSON_LEVELS,
};
