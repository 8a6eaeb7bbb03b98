//! Aggregated insights and prompt effectiveness measurements

use chrono::{DateTime, Utc};
use rusqlite::types::Value;
use rusqlite::{params, Row};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::readers::{Listing, Page};
use crate::repo::nodes::parse_timestamp;
use crate::storage::Store;

/// An insight distilled across many sessions
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InsightRecord {
    pub id: String,
    pub insight: String,
    pub category: String,
    pub confidence: f64,
    /// Opaque example payloads, stored verbatim
    #[serde(default)]
    pub examples: Vec<serde_json::Value>,
    #[serde(default)]
    pub models: Vec<String>,
    #[serde(default)]
    pub tools: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// One effectiveness measurement of an insight in a prompt version
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PromptEffectivenessRecord {
    #[serde(default)]
    pub id: i64,
    pub insight_id: String,
    pub prompt_version: String,
    pub improvement: f64,
    pub significant: bool,
    pub sample_size: i64,
    pub measured_at: DateTime<Utc>,
}

fn row_to_insight(row: &Row) -> rusqlite::Result<InsightRecord> {
    let examples: String = row.get("examples")?;
    let models: String = row.get("models")?;
    let tools: String = row.get("tools")?;
    let created_at: String = row.get("created_at")?;
    let updated_at: String = row.get("updated_at")?;
    Ok(InsightRecord {
        id: row.get("id")?,
        insight: row.get("insight")?,
        category: row.get("category")?,
        confidence: row.get("confidence")?,
        examples: serde_json::from_str(&examples).unwrap_or_default(),
        models: serde_json::from_str(&models).unwrap_or_default(),
        tools: serde_json::from_str(&tools).unwrap_or_default(),
        created_at: parse_timestamp(&created_at, "created_at")?,
        updated_at: parse_timestamp(&updated_at, "updated_at")?,
    })
}

fn row_to_effectiveness(row: &Row) -> rusqlite::Result<PromptEffectivenessRecord> {
    let measured_at: String = row.get("measured_at")?;
    Ok(PromptEffectivenessRecord {
        id: row.get("id")?,
        insight_id: row.get("insight_id")?,
        prompt_version: row.get("prompt_version")?,
        improvement: row.get("improvement")?,
        significant: row.get::<_, i64>("significant")? != 0,
        sample_size: row.get("sample_size")?,
        measured_at: parse_timestamp(&measured_at, "measured_at")?,
    })
}

impl Store {
    /// Insert or replace an insight by id
    pub fn record_insight(&self, insight: &InsightRecord) -> Result<()> {
        let conn = self.write()?;
        conn.execute(
            "INSERT INTO aggregated_insights
                 (id, insight, category, confidence, examples, models, tools, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
             ON CONFLICT(id) DO UPDATE SET
                insight = excluded.insight,
                category = excluded.category,
                confidence = excluded.confidence,
                examples = excluded.examples,
                models = excluded.models,
                tools = excluded.tools,
                updated_at = excluded.updated_at",
            params![
                insight.id,
                insight.insight,
                insight.category,
                insight.confidence,
                serde_json::to_string(&insight.examples).unwrap_or_else(|_| "[]".into()),
                serde_json::to_string(&insight.models).unwrap_or_else(|_| "[]".into()),
                serde_json::to_string(&insight.tools).unwrap_or_else(|_| "[]".into()),
                insight.created_at.to_rfc3339(),
                insight.updated_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    /// Delete an insight; its effectiveness rows cascade
    pub fn delete_insight(&self, id: &str) -> Result<bool> {
        let conn = self.write()?;
        let rows = conn.execute(
            "DELETE FROM aggregated_insights WHERE id = ?1",
            params![id],
        )?;
        Ok(rows > 0)
    }

    /// Insights, most confident first
    pub fn list_insights(
        &self,
        category: Option<&str>,
        page: Page,
    ) -> Result<Listing<InsightRecord>> {
        let (limit, offset) = page.clamped();
        let mut clause = String::new();
        let mut params: Vec<Value> = Vec::new();
        if let Some(category) = category {
            clause.push_str(" AND category = ?");
            params.push(Value::Text(category.to_string()));
        }

        let conn = self.read()?;
        let total: i64 = conn.query_row(
            &format!("SELECT COUNT(*) FROM aggregated_insights WHERE 1=1{clause}"),
            rusqlite::params_from_iter(params.iter()),
            |row| row.get(0),
        )?;

        params.push(Value::Integer(limit));
        params.push(Value::Integer(offset));
        let mut stmt = conn.prepare(&format!(
            "SELECT * FROM aggregated_insights WHERE 1=1{clause}
             ORDER BY confidence DESC, updated_at DESC
             LIMIT ? OFFSET ?"
        ))?;
        let items = stmt
            .query_map(rusqlite::params_from_iter(params.iter()), row_to_insight)?
            .collect::<rusqlite::Result<_>>()?;

        Ok(Listing {
            items,
            total,
            limit,
            offset,
        })
    }

    /// Record a measurement; one row per (insight, prompt version),
    /// later measurements replace earlier ones.
    pub fn record_prompt_effectiveness(
        &self,
        record: &PromptEffectivenessRecord,
    ) -> Result<()> {
        let conn = self.write()?;
        conn.execute(
            "INSERT INTO prompt_effectiveness
                 (insight_id, prompt_version, improvement, significant, sample_size, measured_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)
             ON CONFLICT(insight_id, prompt_version) DO UPDATE SET
                improvement = excluded.improvement,
                significant = excluded.significant,
                sample_size = excluded.sample_size,
                measured_at = excluded.measured_at",
            params![
                record.insight_id,
                record.prompt_version,
                record.improvement,
                record.significant as i64,
                record.sample_size,
                record.measured_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    /// Measurements, newest first
    pub fn list_prompt_effectiveness(
        &self,
        insight_id: Option<&str>,
        significant_only: bool,
        page: Page,
    ) -> Result<Listing<PromptEffectivenessRecord>> {
        let (limit, offset) = page.clamped();
        let mut clause = String::new();
        let mut params: Vec<Value> = Vec::new();
        if let Some(insight_id) = insight_id {
            clause.push_str(" AND insight_id = ?");
            params.push(Value::Text(insight_id.to_string()));
        }
        if significant_only {
            clause.push_str(" AND significant = 1");
        }

        let conn = self.read()?;
        let total: i64 = conn.query_row(
            &format!("SELECT COUNT(*) FROM prompt_effectiveness WHERE 1=1{clause}"),
            rusqlite::params_from_iter(params.iter()),
            |row| row.get(0),
        )?;

        params.push(Value::Integer(limit));
        params.push(Value::Integer(offset));
        let mut stmt = conn.prepare(&format!(
            "SELECT * FROM prompt_effectiveness WHERE 1=1{clause}
             ORDER BY measured_at DESC, id DESC
             LIMIT ? OFFSET ?"
        ))?;
        let items = stmt
            .query_map(
                rusqlite::params_from_iter(params.iter()),
                row_to_effectiveness,
            )?
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
