//! Full-text search over the composed node documents
//!
//! Query preparation quotes every token so user input can never be
//! misread as FTS5 syntax; field restriction narrows terms to a subset
//! of the indexed columns; highlights are computed here rather than with
//! the FTS snippet() function so the window and marking rules stay fixed.

use rusqlite::types::Value;

use crate::error::Result;
use crate::model::Node;
use crate::repo::row_to_node;
use crate::storage::filters::build_filter_clause;
use crate::storage::{clamp_limit, clamp_offset, NodeFilters, Store};

// ============================================================================
// QUERY PREPARATION
// ============================================================================

/// The searchable FTS columns
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FtsField {
    Summary,
    Decisions,
    Lessons,
    Tags,
    Topics,
}

impl FtsField {
    pub fn as_str(&self) -> &'static str {
        match self {
            FtsField::Summary => "summary",
            FtsField::Decisions => "decisions",
            FtsField::Lessons => "lessons",
            FtsField::Tags => "tags",
            FtsField::Topics => "topics",
        }
    }
}

/// Quote a single token as an FTS5 string, doubling embedded quotes
fn quote_token(token: &str) -> String {
    format!("\"{}\"", token.replace('"', "\"\""))
}

/// Turn a free-text query into a safe FTS5 MATCH expression.
///
/// Tokens are split on whitespace and individually quoted. When `fields`
/// restricts the search, every term is prefixed with the column set.
/// Returns `None` for a query with no tokens.
pub fn build_match_query(query: &str, fields: Option<&[FtsField]>) -> Option<String> {
    let tokens: Vec<&str> = query.split_whitespace().collect();
    if tokens.is_empty() {
        return None;
    }

    let prefix = match fields {
        Some(fields) if !fields.is_empty() => {
            let cols: Vec<&str> = fields.iter().map(|f| f.as_str()).collect();
            format!("{{{}}}: ", cols.join(" "))
        }
        _ => String::new(),
    };

    Some(
        tokens
            .iter()
            .map(|t| format!("{prefix}{}", quote_token(t)))
            .collect::<Vec<_>>()
            .join(" "),
    )
}

// ============================================================================
// HIGHLIGHTS
// ============================================================================

const HIGHLIGHT_WINDOW: usize = 100;

/// A marked-up snippet from one matching field
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Highlight {
    pub field: FtsField,
    pub snippet: String,
}

/// Wrap every case-insensitive occurrence of a query word in `<mark>`
fn mark_words(window: &str, words: &[String]) -> String {
    let lower = window.to_ascii_lowercase();
    let mut out = String::with_capacity(window.len());
    let mut pos = 0;

    while pos < window.len() {
        let mut next: Option<(usize, usize)> = None;
        for word in words {
            if word.is_empty() {
                continue;
            }
            if let Some(i) = lower[pos..].find(word.as_str()) {
                let at = pos + i;
                if next.is_none_or(|(s, _)| at < s) {
                    next = Some((at, word.len()));
                }
            }
        }
        match next {
            Some((start, len)) => {
                out.push_str(&window[pos..start]);
                out.push_str("<mark>");
                out.push_str(&window[start..start + len]);
                out.push_str("</mark>");
                pos = start + len;
            }
            None => {
                out.push_str(&window[pos..]);
                break;
            }
        }
    }
    out
}

/// Extract a highlight snippet for one field, or `None` when no query
/// word occurs in it.
///
/// The window of ~100 characters is centred on the first (lowest-index)
/// occurrence of any query word, snapped outward-in to word boundaries,
/// with `...` marking interior cuts.
pub fn extract_highlight(text: &str, words: &[String]) -> Option<String> {
    let lower = text.to_ascii_lowercase();
    let mut first: Option<usize> = None;
    for word in words {
        if word.is_empty() {
            continue;
        }
        if let Some(i) = lower.find(word.as_str()) {
            first = Some(first.map_or(i, |f| f.min(i)));
        }
    }
    let idx = first?;

    let half = HIGHLIGHT_WINDOW / 2;
    let mut start = idx.saturating_sub(half);
    let mut end = (idx + half).min(text.len());
    while start > 0 && !text.is_char_boundary(start) {
        start -= 1;
    }
    while end < text.len() && !text.is_char_boundary(end) {
        end += 1;
    }

    // Snap the left edge forward to the next word start.
    if start > 0 && !text[..start].ends_with(' ') {
        if let Some(space) = text[start..end].find(' ') {
            let candidate = start + space + 1;
            if candidate <= idx {
                start = candidate;
            }
        }
    }
    // Snap the right edge back to the previous word end.
    if end < text.len() && !text[end..].starts_with(' ') {
        if let Some(space) = text[start..end].rfind(' ') {
            let candidate = start + space;
            if candidate > idx {
                end = candidate;
            }
        }
    }

    let mut snippet = mark_words(&text[start..end], words);
    if start > 0 {
        snippet = format!("...{snippet}");
    }
    if end < text.len() {
        snippet = format!("{snippet}...");
    }
    Some(snippet)
}

/// Lowercased whitespace tokens of the query, for highlight matching
fn highlight_words(query: &str) -> Vec<String> {
    query
        .split_whitespace()
        .map(|w| w.to_ascii_lowercase())
        .collect()
}

// ============================================================================
// SEARCH
// ============================================================================

/// Parameters for an advanced search
#[derive(Debug, Clone, Default)]
pub struct SearchRequest {
    pub query: String,
    /// Restrict matching to a subset of the FTS columns
    pub fields: Option<Vec<FtsField>>,
    pub filters: NodeFilters,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

/// One search hit with its rank and highlights
#[derive(Debug, Clone)]
pub struct SearchHit {
    pub node: Node,
    /// FTS5 rank; negative, more negative is better
    pub rank: f64,
    pub highlights: Vec<Highlight>,
}

/// A page of search hits
#[derive(Debug, Clone)]
pub struct SearchResponse {
    pub results: Vec<SearchHit>,
    pub total: i64,
    pub limit: i64,
    pub offset: i64,
}

impl SearchResponse {
    fn empty(limit: i64, offset: i64) -> Self {
        Self {
            results: vec![],
            total: 0,
            limit,
            offset,
        }
    }
}

impl Store {
    /// Simple lexical search: best-ranked nodes for a query
    pub fn search_nodes(&self, query: &str, filters: &NodeFilters, limit: i64) -> Result<Vec<Node>> {
        let response = self.search_nodes_advanced(&SearchRequest {
            query: query.to_string(),
            filters: filters.clone(),
            limit: Some(limit),
            ..Default::default()
        })?;
        Ok(response.results.into_iter().map(|hit| hit.node).collect())
    }

    /// Lexical search with rank, highlights, and pagination
    pub fn search_nodes_advanced(&self, request: &SearchRequest) -> Result<SearchResponse> {
        let limit = clamp_limit(request.limit);
        let offset = clamp_offset(request.offset);

        let Some(match_query) = build_match_query(&request.query, request.fields.as_deref())
        else {
            return Ok(SearchResponse::empty(limit, offset));
        };

        let (filter_clause, filter_params) = build_filter_clause(&request.filters, "n");
        let conn = self.read()?;

        let mut params: Vec<Value> = vec![Value::Text(match_query.clone())];
        params.extend(filter_params.iter().cloned());

        let total: i64 = conn.query_row(
            &format!(
                "SELECT COUNT(*) FROM nodes_fts
                 JOIN nodes n ON n.id = nodes_fts.node_id
                 WHERE nodes_fts MATCH ?1{filter_clause}"
            ),
            rusqlite::params_from_iter(params.iter()),
            |row| row.get(0),
        )?;

        params.push(Value::Integer(limit));
        params.push(Value::Integer(offset));

        let mut stmt = conn.prepare(&format!(
            "SELECT n.*, nodes_fts.rank AS fts_rank,
                    nodes_fts.summary AS fts_summary,
                    nodes_fts.decisions AS fts_decisions,
                    nodes_fts.lessons AS fts_lessons,
                    nodes_fts.tags AS fts_tags,
                    nodes_fts.topics AS fts_topics
             FROM nodes_fts
             JOIN nodes n ON n.id = nodes_fts.node_id
             WHERE nodes_fts MATCH ?1{filter_clause}
             ORDER BY nodes_fts.rank
             LIMIT ? OFFSET ?"
        ))?;

        let words = highlight_words(&request.query);
        let rows = stmt.query_map(rusqlite::params_from_iter(params.iter()), |row| {
            let mut node = row_to_node(row)?;
            let summary: String = row.get("fts_summary")?;
            node.summary = summary.clone();
            let rank: f64 = row.get("fts_rank")?;
            let fields = [
                (FtsField::Summary, summary),
                (FtsField::Decisions, row.get("fts_decisions")?),
                (FtsField::Lessons, row.get("fts_lessons")?),
                (FtsField::Tags, row.get("fts_tags")?),
                (FtsField::Topics, row.get("fts_topics")?),
            ];
            Ok((node, rank, fields))
        })?;

        let mut results = Vec::new();
        for row in rows {
            let (node, rank, fields) = row?;
            let highlights = fields
                .into_iter()
                .filter_map(|(field, text)| {
                    extract_highlight(&text, &words).map(|snippet| Highlight { field, snippet })
                })
                .collect();
            results.push(SearchHit {
                node,
                rank,
                highlights,
            });
        }

        Ok(SearchResponse {
            results,
            total,
            limit,
            offset,
        })
    }
}

// ============================================================================
// TESTS
// ============================================================================
