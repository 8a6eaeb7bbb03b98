//! Dynamic node filter composition
//!
//! One immutable filter record, one pure builder that turns it into a
//! parameterised predicate fragment. The fragment starts with ` AND ` so
//! it can be appended to any WHERE clause that already has at least one
//! condition; `table_alias` qualifies the node columns for use inside
//! joined queries.

use chrono::{DateTime, Utc};
use rusqlite::types::Value;

use crate::model::{NodeType, Outcome};

/// Filter options recognized by node queries
#[derive(Debug, Clone, Default)]
pub struct NodeFilters {
    /// Substring match on the project path
    pub project: Option<String>,
    /// Exact match on the project path
    pub exact_project: Option<String>,
    pub node_type: Option<NodeType>,
    pub outcome: Option<Outcome>,
    /// Inclusive timestamp range start
    pub from: Option<DateTime<Utc>>,
    /// Inclusive timestamp range end
    pub to: Option<DateTime<Utc>>,
    pub computer: Option<String>,
    pub had_clear_goal: Option<bool>,
    pub is_new_project: Option<bool>,
    pub session_file: Option<String>,
    /// Every listed tag must be present on the node (node tags, lesson
    /// tags, or topics)
    pub tags: Vec<String>,
    /// Same semantics as `tags`
    pub topics: Vec<String>,
}

impl NodeFilters {
    pub fn is_empty(&self) -> bool {
        self.project.is_none()
            && self.exact_project.is_none()
            && self.node_type.is_none()
            && self.outcome.is_none()
            && self.from.is_none()
            && self.to.is_none()
            && self.computer.is_none()
            && self.had_clear_goal.is_none()
            && self.is_new_project.is_none()
            && self.session_file.is_none()
            && self.tags.is_empty()
            && self.topics.is_empty()
    }
}

/// A tag-like term must appear in at least one of the three tag sources
/// owned by the node.
fn tag_presence_clause(alias: &str) -> String {
    format!(
        "(EXISTS (SELECT 1 FROM tags WHERE tags.node_id = {alias}.id AND tags.tag = ?)
          OR EXISTS (SELECT 1 FROM lessons
                     JOIN lesson_tags ON lesson_tags.lesson_id = lessons.id
                     WHERE lessons.node_id = {alias}.id AND lesson_tags.tag = ?)
          OR EXISTS (SELECT 1 FROM topics WHERE topics.node_id = {alias}.id AND topics.topic = ?))"
    )
}

/// Build the predicate fragment and parameter list for `filters`.
///
/// Returns an empty fragment when no conditions apply. Parameters are
/// positional and line up with the `?` placeholders in the fragment.
pub fn build_filter_clause(filters: &NodeFilters, alias: &str) -> (String, Vec<Value>) {
    let mut clauses: Vec<String> = Vec::new();
    let mut params: Vec<Value> = Vec::new();

    if let Some(project) = &filters.project {
        clauses.push(format!("{alias}.project LIKE ?"));
        params.push(Value::Text(format!("%{project}%")));
    }
    if let Some(project) = &filters.exact_project {
        clauses.push(format!("{alias}.project = ?"));
        params.push(Value::Text(project.clone()));
    }
    if let Some(node_type) = filters.node_type {
        clauses.push(format!("{alias}.type = ?"));
        params.push(Value::Text(node_type.as_str().to_string()));
    }
    if let Some(outcome) = filters.outcome {
        clauses.push(format!("{alias}.outcome = ?"));
        params.push(Value::Text(outcome.as_str().to_string()));
    }
    if let Some(from) = filters.from {
        clauses.push(format!("{alias}.timestamp >= ?"));
        params.push(Value::Text(from.to_rfc3339()));
    }
    if let Some(to) = filters.to {
        clauses.push(format!("{alias}.timestamp <= ?"));
        params.push(Value::Text(to.to_rfc3339()));
    }
    if let Some(computer) = &filters.computer {
        clauses.push(format!("{alias}.computer = ?"));
        params.push(Value::Text(computer.clone()));
    }
    if let Some(had_clear_goal) = filters.had_clear_goal {
        clauses.push(format!("{alias}.had_clear_goal = ?"));
        params.push(Value::Integer(had_clear_goal as i64));
    }
    if let Some(is_new_project) = filters.is_new_project {
        clauses.push(format!("{alias}.is_new_project = ?"));
        params.push(Value::Integer(is_new_project as i64));
    }
    if let Some(session_file) = &filters.session_file {
        clauses.push(format!("{alias}.session_file = ?"));
        params.push(Value::Text(session_file.clone()));
    }
    for term in filters.tags.iter().chain(filters.topics.iter()) {
        clauses.push(tag_presence_clause(alias));
        for _ in 0..3 {
            params.push(Value::Text(term.clone()));
        }
    }

    if clauses.is_empty() {
        (String::new(), params)
    } else {
        (format!(" AND {}", clauses.join(" AND ")), params)
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn empty_filters_build_nothing() {
        let (clause, params) = build_filter_clause(&NodeFilters::default(), "n");
        assert!(clause.is_empty());
        assert!(params.is_empty());
    }

    #[test]
    fn project_filter_is_substring_match() {
        let filters = NodeFilters {
            project: Some("brain".to_string()),
            ..Default::default()
        };
        let (clause, params) = build_filter_clause(&filters, "n");
        assert_eq!(clause, " AND n.project LIKE ?");
        assert_eq!(params, vec![Value::Text("%brain%".to_string())]);
    }

    #[test]
    fn exact_project_is_equality() {
        let filters = NodeFilters {
            exact_project: Some("/home/dev/p".to_string()),
            ..Default::default()
        };
        let (clause, params) = build_filter_clause(&filters, "nodes");
        assert_eq!(clause, " AND nodes.project = ?");
        assert_eq!(params.len(), 1);
    }

    #[test]
    fn timestamp_range_is_inclusive() {
        let from = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        let to = Utc.with_ymd_and_hms(2026, 2, 1, 0, 0, 0).unwrap();
        let filters = NodeFilters {
            from: Some(from),
            to: Some(to),
            ..Default::default()
        };
        let (clause, params) = build_filter_clause(&filters, "n");
        assert!(clause.contains("n.timestamp >= ?"));
        assert!(clause.contains("n.timestamp <= ?"));
        assert_eq!(params.len(), 2);
    }

    #[test]
    fn booleans_become_integers() {
        let filters = NodeFilters {
            had_clear_goal: Some(true),
            is_new_project: Some(false),
            ..Default::default()
        };
        let (clause, params) = build_filter_clause(&filters, "n");
        assert!(clause.contains("n.had_clear_goal = ?"));
        assert!(clause.contains("n.is_new_project = ?"));
        assert_eq!(params, vec![Value::Integer(1), Value::Integer(0)]);
    }

    #[test]
    fn each_tag_gets_its_own_presence_clause() {
        let filters = NodeFilters {
            tags: vec!["auth".to_string(), "jwt".to_string()],
            ..Default::default()
        };
        let (clause, params) = build_filter_clause(&filters, "n");
        // AND semantics: two separate EXISTS groups, three params each.
        assert_eq!(clause.matches("EXISTS (SELECT 1 FROM tags").count(), 2);
        assert_eq!(params.len(), 6);
    }

    #[test]
    fn topics_share_tag_semantics() {
        let filters = NodeFilters {
            topics: vec!["storage".to_string()],
            ..Default::default()
        };
        let (clause, params) = build_filter_clause(&filters, "n");
        assert!(clause.contains("topics.topic = ?"));
        assert_eq!(params.len(), 3);
    }

    #[test]
    fn enum_filters_use_persisted_names() {
        let filters = NodeFilters {
            node_type: Some(NodeType::Debugging),
            outcome: Some(Outcome::Failed),
            ..Default::default()
        };
        let (_, params) = build_filter_clause(&filters, "n");
        assert_eq!(
            params,
            vec![
                Value::Text("debugging".to_string()),
                Value::Text("failed".to_string())
            ]
        );
    }
}
