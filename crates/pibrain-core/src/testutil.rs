//! Shared fixtures for the colocated unit tests

use chrono::{Duration, Utc};
use tempfile::TempDir;

use crate::model::{
    Decision, Lesson, LessonLevel, Node, NodeType, Outcome,
};
use crate::storage::{Store, StoreConfig, VecMode};

/// A store on a temp-dir database with the vector extension loaded
pub(crate) fn temp_store() -> (TempDir, Store) {
    let dir = TempDir::new().expect("temp dir");
    let store =
        Store::open(StoreConfig::new(dir.path().join("test.db"))).expect("test store");
    (dir, store)
}

/// A store that skips the vector extension entirely
pub(crate) fn temp_store_no_vec() -> (TempDir, Store) {
    let dir = TempDir::new().expect("temp dir");
    let store = Store::open(
        StoreConfig::new(dir.path().join("test.db")).with_vec_mode(VecMode::Skipped),
    )
    .expect("test store");
    (dir, store)
}

/// A fully populated node with deterministic content derived from `seed`
pub(crate) fn sample_node(seed: &str) -> Node {
    let mut node = Node::new(format!("sessions/{seed}.jsonl"));
    node.computer = "devbox".to_string();
    node.node_type = NodeType::Coding;
    node.project = format!("/home/dev/projects/{seed}");
    node.outcome = Outcome::Success;
    node.had_clear_goal = true;
    node.tokens_used = 4200;
    node.cost = 0.37;
    node.duration_minutes = 25.0;
    node.analyzer_version = "1.0.0".to_string();
    node.summary = format!("Worked on {seed} improvements");
    node.key_decisions = vec![Decision {
        what: format!("Used approach {seed}"),
        why: "it fit the existing architecture".to_string(),
    }];
    node.lessons = vec![Lesson {
        level: LessonLevel::Project,
        summary: format!("Lesson about {seed}"),
        details: "details worth keeping".to_string(),
        confidence: 0.8,
        tags: vec!["testing".to_string()],
    }];
    node.tags = vec![seed.to_string(), "rust".to_string()];
    node.topics = vec!["storage".to_string()];
    node
}

/// A node with an explicit timestamp offset into the past
pub(crate) fn sample_node_aged(seed: &str, days_ago: i64) -> Node {
    let mut node = sample_node(seed);
    node.timestamp = Utc::now() - Duration::days(days_ago);
    node
}

/// A deterministic 768-dimension unit-ish vector
pub(crate) fn sample_vector(seed: f32) -> Vec<f32> {
    (0..crate::index::EMBEDDING_DIM)
        .map(|i| ((i as f32 + seed) * 0.01).sin())
        .collect()
}
