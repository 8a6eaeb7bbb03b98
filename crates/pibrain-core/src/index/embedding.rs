//! Embedding text, binary codec, and the vector-table pairing

use chrono::Utc;
use rusqlite::params;

use crate::error::Result;
use crate::model::Node;
use crate::storage::Store;

/// Dimension of the vec0 virtual table
pub const EMBEDDING_DIM: usize = 768;

/// Version marker appended to every rich embedding text
pub const EMBEDDING_TEXT_MARKER: &str = "[emb:v2]";

// ============================================================================
// RICH EMBEDDING TEXT
// ============================================================================

/// Build the canonical text a node is embedded from.
///
/// Shape:
/// ```text
/// [coding] Implemented token refresh
///
/// Decisions:
/// - Store refresh tokens server-side (why: rotation)
///
/// Lessons:
/// - Always pin the JWT library version
///
/// [emb:v2]
/// ```
/// Lessons appear in canonical level order. Sections are omitted when empty.
pub fn build_embedding_text(node: &Node) -> String {
    let mut text = format!("[{}] {}", node.node_type, node.summary);

    if !node.key_decisions.is_empty() {
        text.push_str("\n\nDecisions:");
        for decision in &node.key_decisions {
            text.push_str(&format!("\n- {} (why: {})", decision.what, decision.why));
        }
    }

    if !node.lessons.is_empty() {
        let mut lessons = node.lessons.clone();
        lessons.sort_by_key(|l| l.level.rank());
        text.push_str("\n\nLessons:");
        for lesson in &lessons {
            text.push_str(&format!("\n- {}", lesson.summary));
        }
    }

    text.push_str("\n\n");
    text.push_str(EMBEDDING_TEXT_MARKER);
    text
}

/// Recognize text produced by [`build_embedding_text`] (any version).
///
/// True iff the text carries the v2 marker, or has both a leading `[...]`
/// type tag and a Decisions/Lessons block (the v1 shape).
pub fn is_rich_embedding_format(text: &str) -> bool {
    if text.contains(EMBEDDING_TEXT_MARKER) {
        return true;
    }
    let has_leading_tag = text.starts_with('[') && text.contains("] ");
    has_leading_tag
        && (text.contains("\n\nDecisions:\n-") || text.contains("\n\nLessons:\n-"))
}

// ============================================================================
// BINARY CODEC
// ============================================================================

/// Serialize a vector as little-endian IEEE-754 float32, 4 x dim bytes,
/// no header.
pub fn serialize_embedding(vector: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(vector.len() * 4);
    for value in vector {
        bytes.extend_from_slice(&value.to_le_bytes());
    }
    bytes
}

/// Inverse of [`serialize_embedding`]; `None` when the length is not a
/// multiple of four.
pub fn deserialize_embedding(bytes: &[u8]) -> Option<Vec<f32>> {
    if bytes.len() % 4 != 0 {
        return None;
    }
    Some(
        bytes
            .chunks_exact(4)
            .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
            .collect(),
    )
}

/// Does this rusqlite error look like a vec0 dimension mismatch?
pub(crate) fn is_dimension_mismatch(e: &rusqlite::Error) -> bool {
    e.to_string().to_lowercase().contains("dimension")
}

// ============================================================================
// STORE OPERATIONS
// ============================================================================

impl Store {
    /// Upsert a node's embedding blob and its vector-table pairing.
    ///
    /// The vec row is keyed by the rowid of the `node_embeddings` row,
    /// fetched explicitly after the upsert. A dimension mismatch on the
    /// vec insert is logged and recovered (the blob stays); everything
    /// else propagates and rolls the transaction back.
    pub fn store_embedding_with_vec(
        &self,
        node_id: &str,
        vector: &[f32],
        model: &str,
        input_text: &str,
    ) -> Result<()> {
        let blob = serialize_embedding(vector);
        let now = Utc::now().to_rfc3339();

        let mut conn = self.write()?;
        let tx = conn.transaction()?;

        tx.execute(
            "INSERT INTO node_embeddings (node_id, embedding, embedding_model, input_text, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(node_id) DO UPDATE SET
                embedding = excluded.embedding,
                embedding_model = excluded.embedding_model,
                input_text = excluded.input_text,
                created_at = excluded.created_at",
            params![node_id, blob, model, input_text, now],
        )?;

        let rowid: i64 = tx.query_row(
            "SELECT rowid FROM node_embeddings WHERE node_id = ?1",
            params![node_id],
            |row| row.get(0),
        )?;

        if self.is_vec_loaded() {
            tx.execute(
                "DELETE FROM node_embeddings_vec WHERE rowid = ?1",
                params![rowid],
            )?;
            match tx.execute(
                "INSERT INTO node_embeddings_vec (rowid, embedding) VALUES (?1, ?2)",
                params![rowid, blob],
            ) {
                Err(e) if is_dimension_mismatch(&e) => {
                    tracing::warn!(
                        "Skipping vec row for {}: dimension mismatch ({} floats): {}",
                        node_id,
                        vector.len(),
                        e
                    );
                }
                other => {
                    other?;
                }
            }
        }

        tx.commit()?;
        Ok(())
    }

    /// Load a node's embedding vector, if one is stored
    pub fn get_node_embedding(&self, node_id: &str) -> Result<Option<Vec<f32>>> {
        use rusqlite::OptionalExtension;

        let conn = self.read()?;
        let bytes: Option<Vec<u8>> = conn
            .query_row(
                "SELECT embedding FROM node_embeddings WHERE node_id = ?1",
                params![node_id],
                |row| row.get(0),
            )
            .optional()?;
        Ok(bytes.and_then(|b| deserialize_embedding(&b)))
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Decision, Lesson, LessonLevel, NodeType};
    use crate::testutil::{sample_node, sample_vector, temp_store};

    #[test]
    fn rich_text_shape() {
        let mut node = Node::new("s.jsonl");
        node.node_type = NodeType::Debugging;
        node.summary = "Fixed the retry loop".to_string();
        node.key_decisions = vec![Decision {
            what: "Capped retries at 3".to_string(),
            why: "unbounded loops hung the daemon".to_string(),
        }];
        node.lessons = vec![
            Lesson::new(LessonLevel::Tool, "Check exit codes"),
            Lesson::new(LessonLevel::Project, "Log retry counts"),
        ];

        let text = build_embedding_text(&node);
        assert!(text.starts_with("[debugging] Fixed the retry loop"));
        assert!(text.contains("\n\nDecisions:\n- Capped retries at 3 (why: unbounded loops hung the daemon)"));
        // Lessons sorted into canonical order: project before tool.
        let project_pos = text.find("Log retry counts").unwrap();
        let tool_pos = text.find("Check exit codes").unwrap();
        assert!(project_pos < tool_pos);
        assert!(text.ends_with(EMBEDDING_TEXT_MARKER));
    }

    #[test]
    fn rich_text_omits_empty_sections() {
        let mut node = Node::new("s.jsonl");
        node.summary = "Just a summary".to_string();
        let text = build_embedding_text(&node);
        assert!(!text.contains("Decisions:"));
        assert!(!text.contains("Lessons:"));
        assert!(text.ends_with(EMBEDDING_TEXT_MARKER));
    }

    #[test]
    fn built_text_is_always_recognized() {
        for node in [
            Node::new("a.jsonl"),
            sample_node("alpha"),
            {
                let mut n = sample_node("beta");
                n.key_decisions.clear();
                n
            },
        ] {
            assert!(is_rich_embedding_format(&build_embedding_text(&node)));
        }
    }

    #[test]
    fn v1_shape_without_marker_is_recognized() {
        let v1 = "[coding] Did things\n\nDecisions:\n- a (why: b)";
        assert!(is_rich_embedding_format(v1));
        assert!(!is_rich_embedding_format("plain summary text"));
        assert!(!is_rich_embedding_format("[coding] tagged but flat"));
    }

    #[test]
    fn codec_roundtrip_is_bit_exact() {
        let vector = vec![0.0f32, -1.5, 3.25, f32::MIN_POSITIVE, 1e30, -0.0];
        let bytes = serialize_embedding(&vector);
        assert_eq!(bytes.len(), vector.len() * 4);
        let back = deserialize_embedding(&bytes).unwrap();
        assert_eq!(back.len(), vector.len());
        for (a, b) in vector.iter().zip(back.iter()) {
            assert_eq!(a.to_bits(), b.to_bits());
        }
    }

    #[test]
    fn codec_is_little_endian() {
        let bytes = serialize_embedding(&[1.0f32]);
        assert_eq!(bytes, 1.0f32.to_le_bytes().to_vec());
    }

    #[test]
    fn deserialize_rejects_ragged_input() {
        assert!(deserialize_embedding(&[1, 2, 3]).is_none());
        assert_eq!(deserialize_embedding(&[]), Some(vec![]));
    }

    #[test]
    fn embedding_rows_pair_by_rowid() {
        let (_dir, store) = temp_store();
        let node = sample_node("pairing");
        store.create_node(&node, false).unwrap();

        let vector = sample_vector(1.0);
        store
            .store_embedding_with_vec(&node.id, &vector, "test-model", "input text")
            .unwrap();

        let conn = store.read().unwrap();
        let (emb_rowid, model, input): (i64, String, String) = conn
            .query_row(
                "SELECT rowid, embedding_model, input_text FROM node_embeddings WHERE node_id = ?1",
                params![node.id],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
            )
            .unwrap();
        assert_eq!(model, "test-model");
        assert_eq!(input, "input text");

        let vec_count: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM node_embeddings_vec WHERE rowid = ?1",
                params![emb_rowid],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(vec_count, 1);
    }

    #[test]
    fn upsert_replaces_the_existing_pair() {
        let (_dir, store) = temp_store();
        let node = sample_node("upsert");
        store.create_node(&node, false).unwrap();

        store
            .store_embedding_with_vec(&node.id, &sample_vector(1.0), "m", "t1")
            .unwrap();
        store
            .store_embedding_with_vec(&node.id, &sample_vector(2.0), "m", "t2")
            .unwrap();

        let stored = store.get_node_embedding(&node.id).unwrap().unwrap();
        assert_eq!(stored, sample_vector(2.0));

        let conn = store.read().unwrap();
        let vec_rows: i64 = conn
            .query_row("SELECT COUNT(*) FROM node_embeddings_vec", [], |row| row.get(0))
            .unwrap();
        assert_eq!(vec_rows, 1);
    }

    #[test]
    fn dimension_mismatch_keeps_the_blob_and_skips_the_vec_row() {
        let (_dir, store) = temp_store();
        let node = sample_node("mismatch");
        store.create_node(&node, false).unwrap();

        let short = vec![0.5f32; 8];
        store
            .store_embedding_with_vec(&node.id, &short, "m", "t")
            .unwrap();

        assert_eq!(store.get_node_embedding(&node.id).unwrap().unwrap(), short);

        let conn = store.read().unwrap();
        let vec_rows: i64 = conn
            .query_row("SELECT COUNT(*) FROM node_embeddings_vec", [], |row| row.get(0))
            .unwrap();
        assert_eq!(vec_rows, 0);
    }

    #[test]
    fn embedding_requires_an_existing_node() {
        let (_dir, store) = temp_store();
        let err = store
            .store_embedding_with_vec("feedfacedeadbeef", &sample_vector(0.0), "m", "t")
            .unwrap_err();
        assert!(matches!(err, crate::error::StoreError::ForeignKeyViolation(_)));
    }
}
