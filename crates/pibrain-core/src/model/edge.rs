//! Typed directed edges between session nodes
//!
//! Edge types fall into three families:
//! - structural: how session segments relate mechanically (forks, resumes)
//! - semantic: similarity and cross-reference links found by the daemon
//! - AutoMem: analyzer-asserted typed relationships (RELATES_TO, ...)

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ============================================================================
// EDGE TYPES
// ============================================================================

/// Which family an edge type belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EdgeClass {
    Structural,
    Semantic,
    AutoMem,
}

/// The closed set of edge types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EdgeType {
    // ========== Structural ==========
    #[serde(rename = "fork")]
    Fork,
    #[serde(rename = "branch")]
    Branch,
    #[serde(rename = "tree_jump")]
    TreeJump,
    #[serde(rename = "resume")]
    Resume,
    #[serde(rename = "compaction")]
    Compaction,
    #[serde(rename = "continuation")]
    Continuation,
    #[serde(rename = "handoff")]
    Handoff,

    // ========== Semantic ==========
    #[serde(rename = "semantic")]
    Semantic,
    #[serde(rename = "reference")]
    Reference,
    #[serde(rename = "lesson_application")]
    LessonApplication,
    #[serde(rename = "failure_pattern")]
    FailurePattern,
    #[serde(rename = "project_related")]
    ProjectRelated,
    #[serde(rename = "technique_shared")]
    TechniqueShared,

    // ========== AutoMem ==========
    #[serde(rename = "RELATES_TO")]
    RelatesTo,
    #[serde(rename = "LEADS_TO")]
    LeadsTo,
    #[serde(rename = "OCCURRED_BEFORE")]
    OccurredBefore,
    #[serde(rename = "PREFERS_OVER")]
    PrefersOver,
    #[serde(rename = "EXEMPLIFIES")]
    Exemplifies,
    #[serde(rename = "CONTRADICTS")]
    Contradicts,
    #[serde(rename = "REINFORCES")]
    Reinforces,
    #[serde(rename = "INVALIDATED_BY")]
    InvalidatedBy,
    #[serde(rename = "EVOLVED_INTO")]
    EvolvedInto,
    #[serde(rename = "DERIVED_FROM")]
    DerivedFrom,
    #[serde(rename = "PART_OF")]
    PartOf,
}

impl EdgeType {
    /// The persisted string form
    pub fn as_str(&self) -> &'static str {
        match self {
            EdgeType::Fork => "fork",
            EdgeType::Branch => "branch",
            EdgeType::TreeJump => "tree_jump",
            EdgeType::Resume => "resume",
            EdgeType::Compaction => "compaction",
            EdgeType::Continuation => "continuation",
            EdgeType::Handoff => "handoff",
            EdgeType::Semantic => "semantic",
            EdgeType::Reference => "reference",
            EdgeType::LessonApplication => "lesson_application",
            EdgeType::FailurePattern => "failure_pattern",
            EdgeType::ProjectRelated => "project_related",
            EdgeType::TechniqueShared => "technique_shared",
            EdgeType::RelatesTo => "RELATES_TO",
            EdgeType::LeadsTo => "LEADS_TO",
            EdgeType::OccurredBefore => "OCCURRED_BEFORE",
            EdgeType::PrefersOver => "PREFERS_OVER",
            EdgeType::Exemplifies => "EXEMPLIFIES",
            EdgeType::Contradicts => "CONTRADICTS",
            EdgeType::Reinforces => "REINFORCES",
            EdgeType::InvalidatedBy => "INVALIDATED_BY",
            EdgeType::EvolvedInto => "EVOLVED_INTO",
            EdgeType::DerivedFrom => "DERIVED_FROM",
            EdgeType::PartOf => "PART_OF",
        }
    }

    /// Parse the persisted string form; `None` for anything unknown
    pub fn parse_name(s: &str) -> Option<Self> {
        let t = match s {
            "fork" => EdgeType::Fork,
            "branch" => EdgeType::Branch,
            "tree_jump" => EdgeType::TreeJump,
            "resume" => EdgeType::Resume,
            "compaction" => EdgeType::Compaction,
            "continuation" => EdgeType::Continuation,
            "handoff" => EdgeType::Handoff,
            "semantic" => EdgeType::Semantic,
            "reference" => EdgeType::Reference,
            "lesson_application" => EdgeType::LessonApplication,
            "failure_pattern" => EdgeType::FailurePattern,
            "project_related" => EdgeType::ProjectRelated,
            "technique_shared" => EdgeType::TechniqueShared,
            "RELATES_TO" => EdgeType::RelatesTo,
            "LEADS_TO" => EdgeType::LeadsTo,
            "OCCURRED_BEFORE" => EdgeType::OccurredBefore,
            "PREFERS_OVER" => EdgeType::PrefersOver,
            "EXEMPLIFIES" => EdgeType::Exemplifies,
            "CONTRADICTS" => EdgeType::Contradicts,
            "REINFORCES" => EdgeType::Reinforces,
            "INVALIDATED_BY" => EdgeType::InvalidatedBy,
            "EVOLVED_INTO" => EdgeType::EvolvedInto,
            "DERIVED_FROM" => EdgeType::DerivedFrom,
            "PART_OF" => EdgeType::PartOf,
            _ => return None,
        };
        Some(t)
    }

    /// Which family the type belongs to
    pub fn class(&self) -> EdgeClass {
        match self {
            EdgeType::Fork
            | EdgeType::Branch
            | EdgeType::TreeJump
            | EdgeType::Resume
            | EdgeType::Compaction
            | EdgeType::Continuation
            | EdgeType::Handoff => EdgeClass::Structural,
            EdgeType::Semantic
            | EdgeType::Reference
            | EdgeType::LessonApplication
            | EdgeType::FailurePattern
            | EdgeType::ProjectRelated
            | EdgeType::TechniqueShared => EdgeClass::Semantic,
            _ => EdgeClass::AutoMem,
        }
    }

    /// True for analyzer-asserted typed relationships
    pub fn is_automem(&self) -> bool {
        self.class() == EdgeClass::AutoMem
    }

    /// Human-readable form: lowercase, underscores as spaces
    pub fn display_name(&self) -> String {
        self.as_str().to_lowercase().replace('_', " ")
    }
}

impl std::fmt::Display for EdgeType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ============================================================================
// PROVENANCE
// ============================================================================

/// Who created an edge
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum CreatedBy {
    /// Session-boundary detection
    Boundary,
    /// The background daemon
    #[default]
    Daemon,
    /// An explicit user action
    User,
}

impl CreatedBy {
    pub fn as_str(&self) -> &'static str {
        match self {
            CreatedBy::Boundary => "boundary",
            CreatedBy::Daemon => "daemon",
            CreatedBy::User => "user",
        }
    }

    pub fn parse_name(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "boundary" => CreatedBy::Boundary,
            "user" => CreatedBy::User,
            _ => CreatedBy::Daemon,
        }
    }
}

// ============================================================================
// METADATA
// ============================================================================

/// Typed view of the edge `metadata` JSON column
///
/// Known fields get accessors; anything else the analyzer attached rides
/// along in `extra` and survives round-trips untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EdgeMetadata {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    /// Textual description of a target that could not yet be resolved.
    /// Present iff the edge is a pending placeholder.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unresolved_target: Option<String>,
    /// Original description, preserved after resolution
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resolved_from: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resolved_at: Option<DateTime<Utc>>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl EdgeMetadata {
    /// Serialize to the persisted JSON form
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| "{}".to_string())
    }

    /// Parse the persisted JSON form, tolerating anything malformed
    pub fn from_json(s: &str) -> Self {
        serde_json::from_str(s).unwrap_or_default()
    }
}

// ============================================================================
// EDGE
// ============================================================================

/// A typed, directed, optionally confidence-weighted link between nodes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Edge {
    /// `edg_` + 12 hex characters
    pub id: String,
    pub source_node_id: String,
    pub target_node_id: String,
    pub edge_type: EdgeType,
    #[serde(default)]
    pub metadata: EdgeMetadata,
    pub created_at: DateTime<Utc>,
    pub created_by: CreatedBy,
    /// Analyzer confidence in the relationship, 0.0 - 1.0
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
    /// Embedding similarity that produced the edge, 0.0 - 1.0
    #[serde(skip_serializing_if = "Option::is_none")]
    pub similarity: Option<f64>,
}

impl Edge {
    /// Create an edge with a freshly generated id
    pub fn new(
        source: impl Into<String>,
        target: impl Into<String>,
        edge_type: EdgeType,
    ) -> Self {
        Self {
            id: generate_edge_id(),
            source_node_id: source.into(),
            target_node_id: target.into(),
            edge_type,
            metadata: EdgeMetadata::default(),
            created_at: Utc::now(),
            created_by: CreatedBy::default(),
            confidence: None,
            similarity: None,
        }
    }

    /// A pending edge is a self-loop whose metadata carries the textual
    /// description of a target awaiting resolution.
    pub fn is_pending(&self) -> bool {
        self.source_node_id == self.target_node_id
            && self
                .metadata
                .unresolved_target
                .as_deref()
                .is_some_and(|t| !t.is_empty())
    }
}

/// Generate an edge id: `edg_` + 12 hex characters
pub fn generate_edge_id() -> String {
    format!("edg_{}", &Uuid::new_v4().simple().to_string()[..12])
}

// ============================================================================
// TESTS
// ============================================================================
