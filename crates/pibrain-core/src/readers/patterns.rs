//! Failure patterns, model stats, lesson patterns, and quirk listings

use chrono::{DateTime, Utc};
use rusqlite::types::Value;
use rusqlite::{params, Row};
use serde::Serialize;

use crate::error::Result;
use crate::model::QuirkFrequency;
use crate::readers::{Listing, Page};
use crate::repo::nodes::parse_timestamp;
use crate::storage::Store;

// ============================================================================
// FAILURE PATTERNS
// ============================================================================

/// A recurring failure mined across sessions
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FailurePattern {
    pub id: i64,
    pub pattern: String,
    pub description: String,
    pub occurrences: i64,
    /// Projects the pattern was seen in
    pub projects: Vec<String>,
    pub first_seen: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
}

#[derive(Debug, Clone, Default)]
pub struct FailurePatternFilters {
    /// Substring match over the recorded project list
    pub project: Option<String>,
    pub min_occurrences: Option<i64>,
}

fn row_to_failure_pattern(row: &Row) -> rusqlite::Result<FailurePattern> {
    let projects: String = row.get("projects")?;
    let first_seen: String = row.get("first_seen")?;
    let last_seen: String = row.get("last_seen")?;
    Ok(FailurePattern {
        id: row.get("id")?,
        pattern: row.get("pattern")?,
        description: row.get("description")?,
        occurrences: row.get("occurrences")?,
        projects: serde_json::from_str(&projects).unwrap_or_default(),
        first_seen: parse_timestamp(&first_seen, "first_seen")?,
        last_seen: parse_timestamp(&last_seen, "last_seen")?,
    })
}

impl Store {
    /// Record one occurrence of a failure pattern, creating it on first
    /// sight and folding the project into its project list.
    pub fn record_failure_pattern(
        &self,
        pattern: &str,
        description: &str,
        project: Option<&str>,
    ) -> Result<()> {
        let now = Utc::now().to_rfc3339();
        let mut conn = self.write()?;
        let tx = conn.transaction()?;

        let existing: Option<(i64, String)> = {
            use rusqlite::OptionalExtension;
            tx.query_row(
                "SELECT id, projects FROM failure_patterns WHERE pattern = ?1",
                params![pattern],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?
        };

        match existing {
            Some((id, projects_json)) => {
                let mut projects: Vec<String> =
                    serde_json::from_str(&projects_json).unwrap_or_default();
                if let Some(project) = project {
                    if !projects.iter().any(|p| p == project) {
                        projects.push(project.to_string());
                    }
                }
                tx.execute(
                    "UPDATE failure_patterns
                     SET occurrences = occurrences + 1, last_seen = ?1, projects = ?2
                     WHERE id = ?3",
                    params![now, serde_json::to_string(&projects).unwrap_or_default(), id],
                )?;
            }
            None => {
                let projects: Vec<&str> = project.into_iter().collect();
                tx.execute(
                    "INSERT INTO failure_patterns
                         (pattern, description, occurrences, projects, first_seen, last_seen)
                     VALUES (?1, ?2, 1, ?3, ?4, ?4)",
                    params![
                        pattern,
                        description,
                        serde_json::to_string(&projects).unwrap_or_default(),
                        now
                    ],
                )?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    /// Failure patterns ordered by importance then recency
    pub fn list_failure_patterns(
        &self,
        filters: &FailurePatternFilters,
        page: Page,
    ) -> Result<Listing<FailurePattern>> {
        let (limit, offset) = page.clamped();

        let mut clause = String::new();
        let mut params: Vec<Value> = Vec::new();
        if let Some(project) = &filters.project {
            clause.push_str(" AND projects LIKE ?");
            params.push(Value::Text(format!("%{project}%")));
        }
        if let Some(min) = filters.min_occurrences {
            clause.push_str(" AND occurrences >= ?");
            params.push(Value::Integer(min));
        }

        let conn = self.read()?;
        let total: i64 = conn.query_row(
            &format!("SELECT COUNT(*) FROM failure_patterns WHERE 1=1{clause}"),
            rusqlite::params_from_iter(params.iter()),
            |row| row.get(0),
        )?;

        params.push(Value::Integer(limit));
        params.push(Value::Integer(offset));
        let mut stmt = conn.prepare(&format!(
            "SELECT * FROM failure_patterns WHERE 1=1{clause}
             ORDER BY occurrences DESC, last_seen DESC
             LIMIT ? OFFSET ?"
        ))?;
        let items = stmt
            .query_map(rusqlite::params_from_iter(params.iter()), row_to_failure_pattern)?
            .collect::<rusqlite::Result<_>>()?;

        Ok(Listing {
            items,
            total,
            limit,
            offset,
        })
    }
}

// ============================================================================
// MODEL STATS
// ============================================================================

/// Per-model usage aggregates
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelStats {
    pub model: String,
    pub sessions: i64,
    pub successes: i64,
    pub failures: i64,
    pub total_cost: f64,
    pub total_tokens: i64,
    pub quirk_count: i64,
    pub last_used: Option<DateTime<Utc>>,
}

impl Store {
    /// Fold one session's numbers into a model's aggregates
    pub fn upsert_model_stats(
        &self,
        model: &str,
        success: bool,
        cost: f64,
        tokens: i64,
    ) -> Result<()> {
        let conn = self.write()?;
        conn.execute(
            "INSERT INTO model_stats (model, sessions, successes, failures, total_cost, total_tokens, last_used)
             VALUES (?1, 1, ?2, ?3, ?4, ?5, ?6)
             ON CONFLICT(model) DO UPDATE SET
                sessions = sessions + 1,
                successes = successes + excluded.successes,
                failures = failures + excluded.failures,
                total_cost = total_cost + excluded.total_cost,
                total_tokens = total_tokens + excluded.total_tokens,
                last_used = excluded.last_used",
            params![
                model,
                success as i64,
                (!success) as i64,
                cost,
                tokens,
                Utc::now().to_rfc3339()
            ],
        )?;
        Ok(())
    }

    /// Model aggregates, most used first
    pub fn list_model_stats(&self, page: Page) -> Result<Listing<ModelStats>> {
        let (limit, offset) = page.clamped();
        let conn = self.read()?;

        let total: i64 =
            conn.query_row("SELECT COUNT(*) FROM model_stats", [], |row| row.get(0))?;

        let mut stmt = conn.prepare(
            "SELECT * FROM model_stats ORDER BY sessions DESC, model ASC LIMIT ?1 OFFSET ?2",
        )?;
        let items = stmt
            .query_map(params![limit, offset], |row| {
                let last_used: Option<String> = row.get("last_used")?;
                Ok(ModelStats {
                    model: row.get("model")?,
                    sessions: row.get("sessions")?,
                    successes: row.get("successes")?,
                    failures: row.get("failures")?,
                    total_cost: row.get("total_cost")?,
                    total_tokens: row.get("total_tokens")?,
                    quirk_count: row.get("quirk_count")?,
                    last_used: last_used.and_then(|s| {
                        DateTime::parse_from_rfc3339(&s)
                            .map(|dt| dt.with_timezone(&Utc))
                            .ok()
                    }),
                })
            })?
            .collect::<rusqlite::Result<_>>()?;

        Ok(Listing {
            items,
            total,
            limit,
            offset,
        })
    }
}

// ============================================================================
// LESSON PATTERNS
// ============================================================================

/// A lesson shape recurring across nodes
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LessonPattern {
    pub id: i64,
    pub pattern: String,
    pub level: String,
    pub occurrences: i64,
    pub confidence: f64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Store {
    /// Record one occurrence of a lesson pattern at a level, folding the
    /// confidence in as a running maximum.
    pub fn record_lesson_pattern(
        &self,
        pattern: &str,
        level: &str,
        confidence: f64,
    ) -> Result<()> {
        let now = Utc::now().to_rfc3339();
        let mut conn = self.write()?;
        let tx = conn.transaction()?;

        let existing: Option<i64> = {
            use rusqlite::OptionalExtension;
            tx.query_row(
                "SELECT id FROM lesson_patterns WHERE pattern = ?1 AND level = ?2",
                params![pattern, level],
                |row| row.get(0),
            )
            .optional()?
        };

        match existing {
            Some(id) => {
                tx.execute(
                    "UPDATE lesson_patterns
                     SET occurrences = occurrences + 1,
                         confidence = MAX(confidence, ?1),
                         updated_at = ?2
                     WHERE id = ?3",
                    params![confidence, now, id],
                )?;
            }
            None => {
                tx.execute(
                    "INSERT INTO lesson_patterns
                         (pattern, level, occurrences, confidence, created_at, updated_at)
                     VALUES (?1, ?2, 1, ?3, ?4, ?4)",
                    params![pattern, level, confidence, now],
                )?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    /// Lesson patterns, most frequent first
    pub fn list_lesson_patterns(
        &self,
        level: Option<&str>,
        page: Page,
    ) -> Result<Listing<LessonPattern>> {
        let (limit, offset) = page.clamped();
        let mut clause = String::new();
        let mut params: Vec<Value> = Vec::new();
        if let Some(level) = level {
            clause.push_str(" AND level = ?");
            params.push(Value::Text(level.to_string()));
        }

        let conn = self.read()?;
        let total: i64 = conn.query_row(
            &format!("SELECT COUNT(*) FROM lesson_patterns WHERE 1=1{clause}"),
            rusqlite::params_from_iter(params.iter()),
            |row| row.get(0),
        )?;

        params.push(Value::Integer(limit));
        params.push(Value::Integer(offset));
        let mut stmt = conn.prepare(&format!(
            "SELECT * FROM lesson_patterns WHERE 1=1{clause}
             ORDER BY occurrences DESC, updated_at DESC
             LIMIT ? OFFSET ?"
        ))?;
        let items = stmt
            .query_map(rusqlite::params_from_iter(params.iter()), |row| {
                let created_at: String = row.get("created_at")?;
                let updated_at: String = row.get("updated_at")?;
                Ok(LessonPattern {
                    id: row.get("id")?,
                    pattern: row.get("pattern")?,
                    level: row.get("level")?,
                    occurrences: row.get("occurrences")?,
                    confidence: row.get("confidence")?,
                    created_at: parse_timestamp(&created_at, "created_at")?,
                    updated_at: parse_timestamp(&updated_at, "updated_at")?,
                })
            })?
            .collect::<rusqlite::Result<_>>()?;

        Ok(Listing {
            items,
            total,
            limit,
            offset,
        })
    }
}

// ============================================================================
// MODEL QUIRKS
// ============================================================================

/// A stored model quirk observation
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelQuirkRecord {
    pub id: i64,
    pub node_id: String,
    pub model: String,
    pub quirk: String,
    pub frequency: Option<QuirkFrequency>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default)]
pub struct QuirkFilters {
    pub model: Option<String>,
    /// Keep quirks observed at least this often. Rows without a recorded
    /// frequency are excluded when this is set.
    pub min_frequency: Option<QuirkFrequency>,
}

impl Store {
    /// Model quirks, newest first
    pub fn list_model_quirks(
        &self,
        filters: &QuirkFilters,
        page: Page,
    ) -> Result<Listing<ModelQuirkRecord>> {
        let (limit, offset) = page.clamped();
        let mut clause = String::new();
        let mut params: Vec<Value> = Vec::new();
        if let Some(model) = &filters.model {
            clause.push_str(" AND model = ?");
            params.push(Value::Text(model.clone()));
        }
        if let Some(min) = filters.min_frequency {
            clause.push_str(
                " AND frequency IS NOT NULL
                  AND (CASE frequency
                        WHEN 'once' THEN 0 WHEN 'sometimes' THEN 1
                        WHEN 'often' THEN 2 WHEN 'always' THEN 3 END) >= ?",
            );
            params.push(Value::Integer(min.rank() as i64));
        }

        let conn = self.read()?;
        let total: i64 = conn.query_row(
            &format!("SELECT COUNT(*) FROM model_quirks WHERE 1=1{clause}"),
            rusqlite::params_from_iter(params.iter()),
            |row| row.get(0),
        )?;

        params.push(Value::Integer(limit));
        params.push(Value::Integer(offset));
        let mut stmt = conn.prepare(&format!(
            "SELECT * FROM model_quirks WHERE 1=1{clause}
             ORDER BY created_at DESC, id DESC
             LIMIT ? OFFSET ?"
        ))?;
        let items = stmt
            .query_map(rusqlite::params_from_iter(params.iter()), |row| {
                let frequency: Option<String> = row.get("frequency")?;
                let created_at: String = row.get("created_at")?;
                Ok(ModelQuirkRecord {
                    id: row.get("id")?,
                    node_id: row.get("node_id")?,
                    model: row.get("model")?,
                    quirk: row.get("quirk")?,
                    frequency: frequency.as_deref().and_then(QuirkFrequency::parse_name),
                    created_at: parse_timestamp(&created_at, "created_at")?,
                })
            })?
            .collect::<rusqlite::Result<_>>()?;

        Ok(Listing {
            items,
            total,
            limit,
            offset,
        })
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ModelQuirk;
    use crate::testutil::{sample_node, temp_store};

    #[test]
    fn failure_patterns_upsert_and_order() {
        let (_dir, store) = temp_store();
        store
            .record_failure_pattern("timeout-loop", "retry storms", Some("/p/alpha"))
            .unwrap();
        store
            .record_failure_pattern("timeout-loop", "retry storms", Some("/p/beta"))
            .unwrap();
        store
            .record_failure_pattern("rare-glitch", "one-off", None)
            .unwrap();

        let listing = store
            .list_failure_patterns(&FailurePatternFilters::default(), Page::default())
            .unwrap();
        assert_eq!(listing.total, 2);
        assert_eq!(listing.items[0].pattern, "timeout-loop");
        assert_eq!(listing.items[0].occurrences, 2);
        assert_eq!(listing.items[0].projects.len(), 2);

        let filtered = store
            .list_failure_patterns(
                &FailurePatternFilters {
                    min_occurrences: Some(2),
                    ..Default::default()
                },
                Page::default(),
            )
            .unwrap();
        assert_eq!(filtered.total, 1);

        let by_project = store
            .list_failure_patterns(
                &FailurePatternFilters {
                    project: Some("alpha".to_string()),
                    ..Default::default()
                },
                Page::default(),
            )
            .unwrap();
        assert_eq!(by_project.total, 1);
    }

    #[test]
    fn model_stats_accumulate() {
        let (_dir, store) = temp_store();
        store.upsert_model_stats("opus", true, 0.50, 1000).unwrap();
        store.upsert_model_stats("opus", false, 0.25, 500).unwrap();
        store.upsert_model_stats("haiku", true, 0.01, 100).unwrap();

        let listing = store.list_model_stats(Page::default()).unwrap();
        assert_eq!(listing.total, 2);
        let opus = &listing.items[0];
        assert_eq!(opus.model, "opus");
        assert_eq!(opus.sessions, 2);
        assert_eq!(opus.successes, 1);
        assert_eq!(opus.failures, 1);
        assert!((opus.total_cost - 0.75).abs() < 1e-9);
        assert_eq!(opus.total_tokens, 1500);
        assert!(opus.last_used.is_some());
    }

    #[test]
    fn lesson_patterns_upsert_by_pattern_and_level() {
        let (_dir, store) = temp_store();
        store
            .record_lesson_pattern("pin dependencies", "project", 0.5)
            .unwrap();
        store
            .record_lesson_pattern("pin dependencies", "project", 0.8)
            .unwrap();
        store
            .record_lesson_pattern("pin dependencies", "tool", 0.4)
            .unwrap();

        let all = store.list_lesson_patterns(None, Page::default()).unwrap();
        assert_eq!(all.total, 2);
        assert_eq!(all.items[0].occurrences, 2);
        assert!((all.items[0].confidence - 0.8).abs() < 1e-9);

        let tool_only = store
            .list_lesson_patterns(Some("tool"), Page::default())
            .unwrap();
        assert_eq!(tool_only.total, 1);
        assert_eq!(tool_only.items[0].occurrences, 1);
    }

    #[test]
    fn quirk_listing_filters_by_minimum_frequency() {
        let (_dir, store) = temp_store();
        let mut node = sample_node("quirky");
        node.model_quirks = vec![
            ModelQuirk {
                model: "opus".to_string(),
                quirk: "over-explains".to_string(),
                frequency: Some(QuirkFrequency::Always),
            },
            ModelQuirk {
                model: "opus".to_string(),
                quirk: "drops imports".to_string(),
                frequency: Some(QuirkFrequency::Once),
            },
            ModelQuirk {
                model: "opus".to_string(),
                quirk: "frequency unknown".to_string(),
                frequency: None,
            },
        ];
        store.create_node(&node, false).unwrap();

        let all = store
            .list_model_quirks(&QuirkFilters::default(), Page::default())
            .unwrap();
        assert_eq!(all.total, 3);

        let frequent = store
            .list_model_quirks(
                &QuirkFilters {
                    min_frequency: Some(QuirkFrequency::Sometimes),
                    ..Default::default()
                },
                Page::default(),
            )
            .unwrap();
        // The null-frequency row is excluded, not treated as matching.
        assert_eq!(frequent.total, 1);
        assert_eq!(frequent.items[0].quirk, "over-explains");
    }

    #[test]
    fn pagination_clamps() {
        let (_dir, store) = temp_store();
        for i in 0..3 {
            store
                .record_failure_pattern(&format!("p{i}"), "", None)
                .unwrap();
        }
        let listing = store
            .list_failure_patterns(
                &FailurePatternFilters::default(),
                Page {
                    limit: Some(0),
                    offset: Some(-5),
                },
            )
            .unwrap();
        assert_eq!(listing.limit, 1);
        assert_eq!(listing.offset, 0);
        assert_eq!(listing.items.len(), 1);
        assert_eq!(listing.total, 3);
    }
}
