//! FTS document composition
//!
//! The five FTS columns are derived text, not raw column copies, so the
//! pipeline writes them explicitly instead of relying on triggers.

use rusqlite::{params, Connection};

use crate::model::Node;

/// The composed per-node FTS document
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FtsDoc {
    pub summary: String,
    pub decisions: String,
    pub lessons: String,
    pub tags: String,
    pub topics: String,
}

/// Compose the searchable document for a node.
///
/// - `decisions` joins each key decision as "what why"
/// - `lessons` joins every lesson as "summary details"
/// - `tags` unions node-level and lesson-level tags, first occurrence wins
/// - `topics` is the space-joined topic list
pub fn compose_fts_doc(node: &Node) -> FtsDoc {
    let decisions = node
        .key_decisions
        .iter()
        .map(|d| format!("{} {}", d.what, d.why))
        .collect::<Vec<_>>()
        .join(" ");

    let lessons = node
        .lessons
        .iter()
        .map(|l| format!("{} {}", l.summary, l.details))
        .collect::<Vec<_>>()
        .join(" ");

    let mut tags: Vec<&str> = Vec::new();
    for tag in node
        .tags
        .iter()
        .chain(node.lessons.iter().flat_map(|l| l.tags.iter()))
    {
        if !tags.contains(&tag.as_str()) {
            tags.push(tag);
        }
    }

    FtsDoc {
        summary: node.summary.clone(),
        decisions,
        lessons,
        tags: tags.join(" "),
        topics: node.topics.join(" "),
    }
}

/// Replace the FTS row for a node with its freshly composed document.
/// Runs inside the caller's transaction.
pub(crate) fn write_fts_row(conn: &Connection, node: &Node) -> rusqlite::Result<()> {
    let doc = compose_fts_doc(node);
    conn.execute("DELETE FROM nodes_fts WHERE node_id = ?1", params![node.id])?;
    conn.execute(
        "INSERT INTO nodes_fts (node_id, summary, decisions, lessons, tags, topics)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![node.id, doc.summary, doc.decisions, doc.lessons, doc.tags, doc.topics],
    )?;
    Ok(())
}

// ============================================================================
// TESTS
// ============================================================================
