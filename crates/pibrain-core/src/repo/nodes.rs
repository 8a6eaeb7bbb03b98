//! Node repository - row-level CRUD, cascading lifecycle, versioning

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};

use crate::error::{Result, StoreError};
use crate::index;
use crate::model::{
    DaemonDecision, Lesson, LessonLevel, ModelQuirk, Node, NodeType, Outcome, QuirkFrequency,
    ToolError,
};
use crate::storage::Store;

// ============================================================================
// ROW MAPPING
// ============================================================================

/// Parse an RFC 3339 timestamp column
pub(crate) fn parse_timestamp(value: &str, field: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(
                0,
                rusqlite::types::Type::Text,
                Box::new(std::io::Error::new(
                    std::io::ErrorKind::InvalidData,
                    format!("invalid {field} timestamp '{value}': {e}"),
                )),
            )
        })
}

fn parse_optional_timestamp(value: Option<String>) -> Option<DateTime<Utc>> {
    value.and_then(|s| {
        DateTime::parse_from_rfc3339(&s)
            .map(|dt| dt.with_timezone(&Utc))
            .ok()
    })
}

/// Convert a `nodes` row to a [`Node`]. Side tables and the summary are
/// not touched here; bulk queries stay single-table.
pub(crate) fn row_to_node(row: &Row) -> rusqlite::Result<Node> {
    let node_type: String = row.get("type")?;
    let outcome: String = row.get("outcome")?;
    let timestamp: String = row.get("timestamp")?;
    let analyzed_at: String = row.get("analyzed_at")?;
    let created_at: String = row.get("created_at")?;
    let updated_at: String = row.get("updated_at")?;
    let signals: Option<String> = row.get("signals")?;
    let previous_versions: String = row.get("previous_versions")?;

    Ok(Node {
        id: row.get("id")?,
        version: row.get("version")?,
        session_file: row.get("session_file")?,
        segment_start: row.get("segment_start")?,
        segment_end: row.get("segment_end")?,
        computer: row.get("computer")?,
        node_type: NodeType::parse_name(&node_type),
        project: row.get("project")?,
        is_new_project: row.get::<_, i64>("is_new_project")? != 0,
        had_clear_goal: row.get::<_, i64>("had_clear_goal")? != 0,
        outcome: Outcome::parse_name(&outcome),
        tokens_used: row.get("tokens_used")?,
        cost: row.get("cost")?,
        duration_minutes: row.get("duration_minutes")?,
        user_message_count: row.get("user_message_count")?,
        assistant_message_count: row.get("assistant_message_count")?,
        clarifying_question_count: row.get("clarifying_question_count")?,
        prompted_question_count: row.get("prompted_question_count")?,
        timestamp: parse_timestamp(&timestamp, "timestamp")?,
        analyzed_at: parse_timestamp(&analyzed_at, "analyzed_at")?,
        analyzer_version: row.get("analyzer_version")?,
        data_file: row.get("data_file")?,
        signals: signals.and_then(|s| serde_json::from_str(&s).ok()),
        created_at: parse_timestamp(&created_at, "created_at")?,
        updated_at: parse_timestamp(&updated_at, "updated_at")?,
        relevance_score: row.get("relevance_score")?,
        last_accessed: parse_optional_timestamp(row.get("last_accessed")?),
        archived: row.get::<_, Option<i64>>("archived")?.unwrap_or(0) != 0,
        importance: row.get("importance")?,
        previous_versions: serde_json::from_str(&previous_versions).unwrap_or_default(),
        ..Default::default()
    })
}

// ============================================================================
// VERSIONING POLICY
// ============================================================================

/// Derive the next version of a node from a fresh reanalysis.
///
/// The new node keeps the identity and creation time of the prior row,
/// bumps the version, appends the prior version reference, and gets a
/// fresh `analyzed_at`.
pub fn next_node_version(prior: &Node, mut fresh: Node) -> Node {
    fresh.id = prior.id.clone();
    fresh.version = prior.version + 1;
    fresh.previous_versions = prior.previous_versions.clone();
    fresh.previous_versions.push(prior.version_ref());
    fresh.analyzed_at = Utc::now();
    fresh.created_at = prior.created_at;
    fresh
}

// ============================================================================
// WRITE HELPERS
// ============================================================================

/// SET clause matching the parameter order of [`node_row_params`]; the id
/// parameter (?1) doubles as the WHERE key.
const NODE_UPDATE_ASSIGNMENTS: &str = "version = ?2, session_file = ?3, segment_start = ?4,
    segment_end = ?5, computer = ?6, type = ?7, project = ?8, is_new_project = ?9,
    had_clear_goal = ?10, outcome = ?11, tokens_used = ?12, cost = ?13, duration_minutes = ?14,
    user_message_count = ?15, assistant_message_count = ?16, clarifying_question_count = ?17,
    prompted_question_count = ?18, timestamp = ?19, analyzed_at = ?20, analyzer_version = ?21,
    data_file = ?22, signals = ?23, previous_versions = ?24, created_at = ?25, updated_at = ?26,
    relevance_score = ?27, last_accessed = ?28, archived = ?29, importance = ?30";

const NODE_COLUMNS: &str = "id, version, session_file, segment_start, segment_end, computer,
    type, project, is_new_project, had_clear_goal, outcome,
    tokens_used, cost, duration_minutes,
    user_message_count, assistant_message_count, clarifying_question_count, prompted_question_count,
    timestamp, analyzed_at, analyzer_version, data_file, signals, previous_versions,
    created_at, updated_at, relevance_score, last_accessed, archived, importance";

fn node_row_params(node: &Node) -> Vec<rusqlite::types::Value> {
    use rusqlite::types::Value;

    let optional_int = |v: Option<i64>| v.map(Value::Integer).unwrap_or(Value::Null);
    let optional_real = |v: Option<f64>| v.map(Value::Real).unwrap_or(Value::Null);

    vec![
        Value::Text(node.id.clone()),
        Value::Integer(node.version),
        Value::Text(node.session_file.clone()),
        optional_int(node.segment_start),
        optional_int(node.segment_end),
        Value::Text(node.computer.clone()),
        Value::Text(node.node_type.as_str().to_string()),
        Value::Text(node.project.clone()),
        Value::Integer(node.is_new_project as i64),
        Value::Integer(node.had_clear_goal as i64),
        Value::Text(node.outcome.as_str().to_string()),
        Value::Integer(node.tokens_used),
        Value::Real(node.cost),
        Value::Real(node.duration_minutes),
        optional_int(node.user_message_count),
        optional_int(node.assistant_message_count),
        optional_int(node.clarifying_question_count),
        optional_int(node.prompted_question_count),
        Value::Text(node.timestamp.to_rfc3339()),
        Value::Text(node.analyzed_at.to_rfc3339()),
        Value::Text(node.analyzer_version.clone()),
        Value::Text(node.data_file.clone()),
        node.signals
            .as_ref()
            .and_then(|s| serde_json::to_string(s).ok())
            .map(Value::Text)
            .unwrap_or(Value::Null),
        Value::Text(serde_json::to_string(&node.previous_versions).unwrap_or_else(|_| "[]".into())),
        Value::Text(node.created_at.to_rfc3339()),
        Value::Text(node.updated_at.to_rfc3339()),
        optional_real(node.relevance_score),
        node.last_accessed
            .map(|t| Value::Text(t.to_rfc3339()))
            .unwrap_or(Value::Null),
        Value::Integer(node.archived as i64),
        optional_real(node.importance),
    ]
}

/// Insert every side-table row owned by the node
fn insert_side_rows(conn: &Connection, node: &Node) -> Result<()> {
    let now = Utc::now().to_rfc3339();

    for tag in &node.tags {
        conn.execute(
            "INSERT INTO tags (node_id, tag) VALUES (?1, ?2)",
            params![node.id, tag],
        )?;
    }
    for topic in &node.topics {
        conn.execute(
            "INSERT INTO topics (node_id, topic) VALUES (?1, ?2)",
            params![node.id, topic],
        )?;
    }
    for lesson in &node.lessons {
        conn.execute(
            "INSERT INTO lessons (node_id, level, summary, details, confidence, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                node.id,
                lesson.level.as_str(),
                lesson.summary,
                lesson.details,
                lesson.confidence,
                now
            ],
        )?;
        let lesson_id = conn.last_insert_rowid();
        for tag in &lesson.tags {
            conn.execute(
                "INSERT INTO lesson_tags (lesson_id, tag) VALUES (?1, ?2)",
                params![lesson_id, tag],
            )?;
        }
    }
    for quirk in &node.model_quirks {
        conn.execute(
            "INSERT INTO model_quirks (node_id, model, quirk, frequency, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                node.id,
                quirk.model,
                quirk.quirk,
                quirk.frequency.map(|f| f.as_str()),
                now
            ],
        )?;
    }
    for tool_error in &node.tool_errors {
        conn.execute(
            "INSERT INTO tool_errors (node_id, tool, error, resolution, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![node.id, tool_error.tool, tool_error.error, tool_error.resolution, now],
        )?;
    }
    for decision in &node.daemon_decisions {
        conn.execute(
            "INSERT INTO daemon_decisions (node_id, decision, reasoning, outcome, user_feedback, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                node.id,
                decision.decision,
                decision.reasoning,
                decision.outcome,
                decision.user_feedback,
                now
            ],
        )?;
    }
    Ok(())
}

fn delete_side_rows(conn: &Connection, node_id: &str) -> Result<()> {
    // lesson_tags cascade from lessons
    for sql in [
        "DELETE FROM tags WHERE node_id = ?1",
        "DELETE FROM topics WHERE node_id = ?1",
        "DELETE FROM lessons WHERE node_id = ?1",
        "DELETE FROM model_quirks WHERE node_id = ?1",
        "DELETE FROM tool_errors WHERE node_id = ?1",
        "DELETE FROM daemon_decisions WHERE node_id = ?1",
    ] {
        conn.execute(sql, params![node_id])?;
    }
    Ok(())
}

// ============================================================================
// READ HELPERS
// ============================================================================

fn load_side_tables(conn: &Connection, node: &mut Node) -> Result<()> {
    let mut stmt = conn.prepare_cached("SELECT tag FROM tags WHERE node_id = ?1")?;
    node.tags = stmt
        .query_map(params![node.id], |row| row.get(0))?
        .collect::<rusqlite::Result<_>>()?;

    let mut stmt = conn.prepare_cached("SELECT topic FROM topics WHERE node_id = ?1")?;
    node.topics = stmt
        .query_map(params![node.id], |row| row.get(0))?
        .collect::<rusqlite::Result<_>>()?;

    let mut stmt = conn.prepare_cached(
        "SELECT id, level, summary, details, confidence FROM lessons WHERE node_id = ?1 ORDER BY id",
    )?;
    let lessons: Vec<(i64, Lesson)> = stmt
        .query_map(params![node.id], |row| {
            let level: String = row.get("level")?;
            Ok((
                row.get("id")?,
                Lesson {
                    level: LessonLevel::parse_name(&level).unwrap_or(LessonLevel::Task),
                    summary: row.get("summary")?,
                    details: row.get("details")?,
                    confidence: row.get("confidence")?,
                    tags: vec![],
                },
            ))
        })?
        .collect::<rusqlite::Result<_>>()?;

    let mut tag_stmt =
        conn.prepare_cached("SELECT tag FROM lesson_tags WHERE lesson_id = ?1")?;
    node.lessons = lessons
        .into_iter()
        .map(|(lesson_id, mut lesson)| {
            lesson.tags = tag_stmt
                .query_map(params![lesson_id], |row| row.get(0))?
                .collect::<rusqlite::Result<_>>()?;
            Ok(lesson)
        })
        .collect::<Result<_>>()?;

    let mut stmt = conn.prepare_cached(
        "SELECT model, quirk, frequency FROM model_quirks WHERE node_id = ?1 ORDER BY id",
    )?;
    node.model_quirks = stmt
        .query_map(params![node.id], |row| {
            let frequency: Option<String> = row.get("frequency")?;
            Ok(ModelQuirk {
                model: row.get("model")?,
                quirk: row.get("quirk")?,
                frequency: frequency.as_deref().and_then(QuirkFrequency::parse_name),
            })
        })?
        .collect::<rusqlite::Result<_>>()?;

    let mut stmt = conn.prepare_cached(
        "SELECT tool, error, resolution FROM tool_errors WHERE node_id = ?1 ORDER BY id",
    )?;
    node.tool_errors = stmt
        .query_map(params![node.id], |row| {
            Ok(ToolError {
                tool: row.get("tool")?,
                error: row.get("error")?,
                resolution: row.get("resolution")?,
            })
        })?
        .collect::<rusqlite::Result<_>>()?;

    let mut stmt = conn.prepare_cached(
        "SELECT decision, reasoning, outcome, user_feedback FROM daemon_decisions
         WHERE node_id = ?1 ORDER BY id",
    )?;
    node.daemon_decisions = stmt
        .query_map(params![node.id], |row| {
            Ok(DaemonDecision {
                decision: row.get("decision")?,
                reasoning: row.get("reasoning")?,
                outcome: row.get("outcome")?,
                user_feedback: row.get("user_feedback")?,
            })
        })?
        .collect::<rusqlite::Result<_>>()?;

    Ok(())
}

fn fts_summary(conn: &Connection, node_id: &str) -> Result<Option<String>> {
    let mut stmt =
        conn.prepare_cached("SELECT summary FROM nodes_fts WHERE node_id = ?1")?;
    Ok(stmt
        .query_row(params![node_id], |row| row.get(0))
        .optional()?)
}

// ============================================================================
// STORE OPERATIONS
// ============================================================================

impl Store {
    /// Insert a node and all its side rows in one transaction, projecting
    /// it into the FTS index unless `skip_fts` is set.
    pub fn create_node(&self, node: &Node, skip_fts: bool) -> Result<()> {
        let mut conn = self.write()?;
        let tx = conn.transaction()?;

        let placeholders: Vec<String> = (1..=30).map(|i| format!("?{i}")).collect();
        tx.execute(
            &format!(
                "INSERT INTO nodes ({NODE_COLUMNS}) VALUES ({})",
                placeholders.join(", ")
            ),
            rusqlite::params_from_iter(node_row_params(node)),
        )?;

        insert_side_rows(&tx, node)?;
        if !skip_fts {
            index::write_fts_row(&tx, node)?;
        }

        tx.commit()?;
        Ok(())
    }

    /// Replace a node's row, side rows, and index projections, and write
    /// the versioned payload to the external JSON store.
    ///
    /// Fails with [`StoreError::NodeMissing`] when no row exists.
    pub fn update_node(&self, node: &Node) -> Result<Node> {
        if !self.node_exists(&node.id)? {
            return Err(StoreError::NodeMissing(node.id.clone()));
        }

        let mut stored = node.clone();
        stored.updated_at = Utc::now();
        if let Some(data_file) = self.files.write_payload(&stored)? {
            stored.data_file = data_file;
        }

        let mut conn = self.write()?;
        let tx = conn.transaction()?;

        // Update in place: a delete would cascade away the node's edges.
        tx.execute(
            &format!("UPDATE nodes SET {NODE_UPDATE_ASSIGNMENTS} WHERE id = ?1"),
            rusqlite::params_from_iter(node_row_params(&stored)),
        )?;

        delete_side_rows(&tx, &stored.id)?;
        insert_side_rows(&tx, &stored)?;
        index::write_fts_row(&tx, &stored)?;

        tx.commit()?;
        Ok(stored)
    }

    /// Load a node with its side tables and summary. Bulk read paths
    /// (search, traversal) return bare rows instead.
    pub fn get_node(&self, id: &str) -> Result<Option<Node>> {
        let conn = self.read()?;
        let node = conn
            .query_row("SELECT * FROM nodes WHERE id = ?1", params![id], row_to_node)
            .optional()?;

        let Some(mut node) = node else {
            return Ok(None);
        };
        load_side_tables(&conn, &mut node)?;
        if let Some(summary) = fts_summary(&conn, id)? {
            node.summary = summary;
        }
        Ok(Some(node))
    }

    /// Does a row with this id exist?
    pub fn node_exists(&self, id: &str) -> Result<bool> {
        let conn = self.read()?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM nodes WHERE id = ?1",
            params![id],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    /// Fetch a specific version of a node. The current version answers
    /// from the database; prior versions come from the JSON node tree.
    pub fn get_node_version(&self, id: &str, version: i64) -> Result<Option<Node>> {
        if let Some(node) = self.get_node(id)? {
            if node.version == version {
                return Ok(Some(node));
            }
        }
        Ok(self.files.read_version(id, version))
    }

    /// Delete a node. Side tables cascade through foreign keys; the FTS
    /// row and the vec row live outside FK enforcement and are cleared
    /// explicitly. Returns whether a row existed.
    pub fn delete_node(&self, id: &str) -> Result<bool> {
        let mut conn = self.write()?;
        let tx = conn.transaction()?;

        let embedding_rowid: Option<i64> = tx
            .query_row(
                "SELECT rowid FROM node_embeddings WHERE node_id = ?1",
                params![id],
                |row| row.get(0),
            )
            .optional()?;
        if let Some(rowid) = embedding_rowid {
            if self.is_vec_loaded() {
                tx.execute(
                    "DELETE FROM node_embeddings_vec WHERE rowid = ?1",
                    params![rowid],
                )?;
            }
        }

        tx.execute("DELETE FROM nodes_fts WHERE node_id = ?1", params![id])?;
        let deleted = tx.execute("DELETE FROM nodes WHERE id = ?1", params![id])?;

        tx.commit()?;
        Ok(deleted > 0)
    }

    /// Cheap summary accessor backed by the FTS row
    pub fn node_summary(&self, id: &str) -> Result<Option<String>> {
        let conn = self.read()?;
        fts_summary(&conn, id)
    }

    // ========================================================================
    // CONSOLIDATION FIELDS
    // ========================================================================

    /// Stamp `last_accessed` with the current time
    pub fn record_access(&self, id: &str) -> Result<bool> {
        let conn = self.write()?;
        let rows = conn.execute(
            "UPDATE nodes SET last_accessed = ?1 WHERE id = ?2",
            params![Utc::now().to_rfc3339(), id],
        )?;
        Ok(rows > 0)
    }

    pub fn set_archived(&self, id: &str, archived: bool) -> Result<bool> {
        let conn = self.write()?;
        let rows = conn.execute(
            "UPDATE nodes SET archived = ?1 WHERE id = ?2",
            params![archived as i64, id],
        )?;
        Ok(rows > 0)
    }

    /// Set importance, clamped to [0, 1]
    pub fn set_importance(&self, id: &str, importance: f64) -> Result<bool> {
        let conn = self.write()?;
        let rows = conn.execute(
            "UPDATE nodes SET importance = ?1 WHERE id = ?2",
            params![importance.clamp(0.0, 1.0), id],
        )?;
        Ok(rows > 0)
    }

    /// Set relevance score, clamped to [0, 1]
    pub fn set_relevance_score(&self, id: &str, score: f64) -> Result<bool> {
        let conn = self.write()?;
        let rows = conn.execute(
            "UPDATE nodes SET relevance_score = ?1 WHERE id = ?2",
            params![score.clamp(0.0, 1.0), id],
        )?;
        Ok(rows > 0)
    }
}

// ============================================================================
// TESTS
// ============================================================================
