//! Lesson listings - filtered pages and the per-level digest

use chrono::{DateTime, Utc};
use rusqlite::types::Value;
use rusqlite::{params, Row};
use serde::Serialize;

use crate::error::Result;
use crate::model::{LessonLevel, LESSON_LEVELS};
use crate::readers::{Listing, Page};
use crate::repo::nodes::parse_timestamp;
use crate::storage::Store;

/// A stored lesson with its owning node
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LessonRecord {
    pub id: i64,
    pub node_id: String,
    pub level: LessonLevel,
    pub summary: String,
    pub details: String,
    pub confidence: f64,
    pub created_at: DateTime<Utc>,
    pub tags: Vec<String>,
}

/// Filters for [`Store::list_lessons`]
#[derive(Debug, Clone, Default)]
pub struct LessonFilters {
    pub level: Option<LessonLevel>,
    /// Every listed tag must be present on the lesson (AND semantics,
    /// resolved through `lesson_tags`)
    pub tags: Vec<String>,
    /// Restrict to lessons of one node
    pub node_id: Option<String>,
}

/// Count and most recent lessons for one level
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LevelLessons {
    pub level: LessonLevel,
    pub count: i64,
    pub recent: Vec<LessonRecord>,
}

/// Per-level digest over all seven canonical levels
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LessonsByLevel {
    pub levels: Vec<LevelLessons>,
}

fn row_to_lesson(row: &Row) -> rusqlite::Result<LessonRecord> {
    let level: String = row.get("level")?;
    let created_at: String = row.get("created_at")?;
    Ok(LessonRecord {
        id: row.get("id")?,
        node_id: row.get("node_id")?,
        level: LessonLevel::parse_name(&level).unwrap_or(LessonLevel::Task),
        summary: row.get("summary")?,
        details: row.get("details")?,
        confidence: row.get("confidence")?,
        created_at: parse_timestamp(&created_at, "created_at")?,
        tags: vec![],
    })
}

impl Store {
    fn attach_lesson_tags(&self, lessons: &mut [LessonRecord]) -> Result<()> {
        let conn = self.read()?;
        let mut stmt =
            conn.prepare_cached("SELECT tag FROM lesson_tags WHERE lesson_id = ?1")?;
        for lesson in lessons.iter_mut() {
            lesson.tags = stmt
                .query_map(params![lesson.id], |row| row.get(0))?
                .collect::<rusqlite::Result<_>>()?;
        }
        Ok(())
    }

    /// Lessons ordered newest first, ties broken by id
    pub fn list_lessons(
        &self,
        filters: &LessonFilters,
        page: Page,
    ) -> Result<Listing<LessonRecord>> {
        let (limit, offset) = page.clamped();

        let mut clause = String::new();
        let mut params: Vec<Value> = Vec::new();
        if let Some(level) = filters.level {
            clause.push_str(" AND level = ?");
            params.push(Value::Text(level.as_str().to_string()));
        }
        if let Some(node_id) = &filters.node_id {
            clause.push_str(" AND node_id = ?");
            params.push(Value::Text(node_id.clone()));
        }
        for tag in &filters.tags {
            clause.push_str(
                " AND EXISTS (SELECT 1 FROM lesson_tags
                              WHERE lesson_tags.lesson_id = lessons.id
                                AND lesson_tags.tag = ?)",
            );
            params.push(Value::Text(tag.clone()));
        }

        let conn = self.read()?;
        let total: i64 = conn.query_row(
            &format!("SELECT COUNT(*) FROM lessons WHERE 1=1{clause}"),
            rusqlite::params_from_iter(params.iter()),
            |row| row.get(0),
        )?;

        params.push(Value::Integer(limit));
        params.push(Value::Integer(offset));
        let mut stmt = conn.prepare(&format!(
            "SELECT * FROM lessons WHERE 1=1{clause}
             ORDER BY created_at DESC, id DESC
             LIMIT ? OFFSET ?"
        ))?;
        let mut items: Vec<LessonRecord> = stmt
            .query_map(rusqlite::params_from_iter(params.iter()), row_to_lesson)?
            .collect::<rusqlite::Result<_>>()?;
        drop(stmt);
        drop(conn);

        self.attach_lesson_tags(&mut items)?;
        Ok(Listing {
            items,
            total,
            limit,
            offset,
        })
    }

    /// Count plus the most recent lessons for each of the seven
    /// canonical levels, in canonical order.
    pub fn get_lessons_by_level(&self, recent_limit: i64) -> Result<LessonsByLevel> {
        let recent_limit = recent_limit.clamp(1, 500);
        let mut levels = Vec::with_capacity(LESSON_LEVELS.len());

        for level in LESSON_LEVELS {
            let count: i64 = {
                let conn = self.read()?;
                conn.query_row(
                    "SELECT COUNT(*) FROM lessons WHERE level = ?1",
                    params![level.as_str()],
                    |row| row.get(0),
                )?
            };
            let recent = self
                .list_lessons(
                    &LessonFilters {
                        level: Some(level),
                        ..Default::default()
                    },
                    Page {
                        limit: Some(recent_limit),
                        offset: None,
                    },
                )?
                .items;
            levels.push(LevelLessons {
                level,
                count,
                recent,
            });
        }

        Ok(LessonsByLevel { levels })
    }
}

// ============================================================================
// TESTS
// ============================================================================
