//! Test Data Factory
//!
//! Realistic session nodes and helpers shared by the journey tests.

use chrono::{DateTime, Duration, Utc};
use pibrain_core::{
    Decision, Edge, EdgeType, Lesson, LessonLevel, Node, NodeType, Outcome, Store, EMBEDDING_DIM,
};

/// A coding-session node with a realistic payload
pub fn session_node(summary: &str) -> Node {
    let mut node = Node::new(format!("sessions/{}.jsonl", slug(summary)));
    node.computer = "laptop".to_string();
    node.node_type = NodeType::Coding;
    node.project = format!("/home/dev/projects/{}", slug(summary));
    node.outcome = Outcome::Success;
    node.had_clear_goal = true;
    node.tokens_used = 12_000;
    node.cost = 0.85;
    node.duration_minutes = 42.0;
    node.analyzer_version = "1.2.0".to_string();
    node.summary = summary.to_string();
    node.tags = vec!["fixture".to_string()];
    node
}

/// A node with its work timestamp pushed into the past
pub fn aged_node(summary: &str, days_ago: i64) -> Node {
    let mut node = session_node(summary);
    node.timestamp = Utc::now() - Duration::days(days_ago);
    node
}

/// A node with decisions and lessons attached
pub fn rich_node(summary: &str) -> Node {
    let mut node = session_node(summary);
    node.key_decisions = vec![Decision {
        what: "Kept the schema forward-only".to_string(),
        why: "rollbacks multiply failure modes".to_string(),
    }];
    node.lessons = vec![Lesson {
        level: LessonLevel::Project,
        summary: "Batch writes into one transaction".to_string(),
        details: "halves wall time on spinning disks".to_string(),
        confidence: 0.9,
        tags: vec!["sqlite".to_string()],
    }];
    node.topics = vec!["storage".to_string()];
    node
}

/// An edge with a specific confidence
pub fn confident_edge(from: &str, to: &str, edge_type: EdgeType, confidence: f64) -> Edge {
    let mut edge = Edge::new(from, to, edge_type);
    edge.confidence = Some(confidence);
    edge
}

/// Deterministic embedding vector, distinct per seed
pub fn embedding(seed: f32) -> Vec<f32> {
    (0..EMBEDDING_DIM)
        .map(|i| ((i as f32 + seed) * 0.01).sin())
        .collect()
}

/// Create a node and give it an embedding
pub fn ingest_with_embedding(store: &Store, node: &Node, seed: f32) {
    store.create_node(node, false).expect("create node");
    store
        .store_embedding_with_vec(
            &node.id,
            &embedding(seed),
            "test-model",
            &pibrain_core::build_embedding_text(node),
        )
        .expect("store embedding");
}

/// Reference timestamp helper
pub fn days_ago(days: i64) -> DateTime<Utc> {
    Utc::now() - Duration::days(days)
}

fn slug(text: &str) -> String {
    text.to_lowercase()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '-' })
        .collect()
}
