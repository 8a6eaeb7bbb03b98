//! Session Node - The fundamental unit of the memory graph
//!
//! Each node is one version of an analyzed work segment:
//! - Row attributes (session reference, project, outcome, counters)
//! - Analyzer payload (summary, key decisions, lessons, tags, topics)
//! - Consolidation fields (relevance, importance, archive state)

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ============================================================================
// NODE TYPES
// ============================================================================

/// Kind of work a session segment represents
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum NodeType {
    /// Writing new code
    Coding,
    /// Chasing a defect
    Debugging,
    /// Restructuring without behavior change
    Refactoring,
    /// Reading, exploring, comparing options
    Research,
    /// Designing before building
    Planning,
    /// Environment, tooling, infrastructure setup
    Configuration,
    /// Writing docs or comments
    Documentation,
    /// Reviewing someone else's work
    Review,
    /// Anything that fits nowhere else
    #[default]
    Other,
}

impl NodeType {
    /// Convert to string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeType::Coding => "coding",
            NodeType::Debugging => "debugging",
            NodeType::Refactoring => "refactoring",
            NodeType::Research => "research",
            NodeType::Planning => "planning",
            NodeType::Configuration => "configuration",
            NodeType::Documentation => "documentation",
            NodeType::Review => "review",
            NodeType::Other => "other",
        }
    }

    /// Parse from string name, falling back to `Other`
    pub fn parse_name(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "coding" => NodeType::Coding,
            "debugging" => NodeType::Debugging,
            "refactoring" => NodeType::Refactoring,
            "research" => NodeType::Research,
            "planning" => NodeType::Planning,
            "configuration" => NodeType::Configuration,
            "documentation" => NodeType::Documentation,
            "review" => NodeType::Review,
            _ => NodeType::Other,
        }
    }
}

impl std::fmt::Display for NodeType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ============================================================================
// OUTCOME
// ============================================================================

/// How the analyzed segment ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    /// The stated goal was reached
    Success,
    /// Progress was made but the goal was not reached
    #[default]
    Partial,
    /// The attempt failed
    Failed,
    /// The user walked away mid-task
    Abandoned,
}

impl Outcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Outcome::Success => "success",
            Outcome::Partial => "partial",
            Outcome::Failed => "failed",
            Outcome::Abandoned => "abandoned",
        }
    }

    pub fn parse_name(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "success" => Outcome::Success,
            "failed" => Outcome::Failed,
            "abandoned" => Outcome::Abandoned,
            _ => Outcome::Partial,
        }
    }
}

impl std::fmt::Display for Outcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ============================================================================
// LESSONS
// ============================================================================

/// Scope a lesson applies at, ordered from broadest to narrowest concern
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LessonLevel {
    Project,
    Task,
    User,
    Model,
    Tool,
    Skill,
    Subagent,
}

/// Canonical ordering of lesson levels, used wherever lessons are grouped
/// or rendered level-by-level.
pub const LESSON_LEVELS: [LessonLevel; 7] = [
    LessonLevel::Project,
    LessonLevel::Task,
    LessonLevel::User,
    LessonLevel::Model,
    LessonLevel::Tool,
    LessonLevel::Skill,
    LessonLevel::Subagent,
];

impl LessonLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LessonLevel::Project => "project",
            LessonLevel::Task => "task",
            LessonLevel::User => "user",
            LessonLevel::Model => "model",
            LessonLevel::Tool => "tool",
            LessonLevel::Skill => "skill",
            LessonLevel::Subagent => "subagent",
        }
    }

    pub fn parse_name(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "project" => Some(LessonLevel::Project),
            "task" => Some(LessonLevel::Task),
            "user" => Some(LessonLevel::User),
            "model" => Some(LessonLevel::Model),
            "tool" => Some(LessonLevel::Tool),
            "skill" => Some(LessonLevel::Skill),
            "subagent" => Some(LessonLevel::Subagent),
            _ => None,
        }
    }

    /// Position in the canonical order
    pub fn rank(&self) -> usize {
        LESSON_LEVELS.iter().position(|l| l == self).unwrap_or(0)
    }
}

impl std::fmt::Display for LessonLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One lesson extracted from a session segment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Lesson {
    pub level: LessonLevel,
    pub summary: String,
    #[serde(default)]
    pub details: String,
    /// Analyzer confidence in the lesson, 0.0 - 1.0
    #[serde(default = "default_confidence")]
    pub confidence: f64,
    #[serde(default)]
    pub tags: Vec<String>,
}

fn default_confidence() -> f64 {
    0.5
}

impl Lesson {
    pub fn new(level: LessonLevel, summary: impl Into<String>) -> Self {
        Self {
            level,
            summary: summary.into(),
            details: String::new(),
            confidence: default_confidence(),
            tags: vec![],
        }
    }
}

// ============================================================================
// ANALYZER PAYLOAD PIECES
// ============================================================================

/// A key decision made during the segment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Decision {
    /// What was decided
    pub what: String,
    /// Why it was decided that way
    pub why: String,
}

/// How often a model quirk was observed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QuirkFrequency {
    Once,
    Sometimes,
    Often,
    Always,
}

impl QuirkFrequency {
    pub fn as_str(&self) -> &'static str {
        match self {
            QuirkFrequency::Once => "once",
            QuirkFrequency::Sometimes => "sometimes",
            QuirkFrequency::Often => "often",
            QuirkFrequency::Always => "always",
        }
    }

    pub fn parse_name(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "once" => Some(QuirkFrequency::Once),
            "sometimes" => Some(QuirkFrequency::Sometimes),
            "often" => Some(QuirkFrequency::Often),
            "always" => Some(QuirkFrequency::Always),
            _ => None,
        }
    }

    /// Ordering rank: once < sometimes < often < always
    pub fn rank(&self) -> u8 {
        match self {
            QuirkFrequency::Once => 0,
            QuirkFrequency::Sometimes => 1,
            QuirkFrequency::Often => 2,
            QuirkFrequency::Always => 3,
        }
    }
}

impl std::fmt::Display for QuirkFrequency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// An observed model behavior worth remembering
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelQuirk {
    pub model: String,
    pub quirk: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub frequency: Option<QuirkFrequency>,
}

/// A tool failure encountered during the segment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolError {
    pub tool: String,
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resolution: Option<String>,
}

/// A decision the background daemon made about this node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DaemonDecision {
    pub decision: String,
    pub reasoning: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub outcome: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_feedback: Option<String>,
}

// ============================================================================
// SESSION NODE
// ============================================================================

/// A versioned record of one analyzed session segment
///
/// The row attributes are persisted in the `nodes` table; tags, topics,
/// lessons, quirks, tool errors and daemon decisions land in side tables
/// owned by the node; the full payload (including `key_decisions`) is
/// written to the external JSON node-file store under `data_file`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Node {
    /// 16 hex character identifier
    pub id: String,
    /// Analysis version, starts at 1 and increments on reanalysis
    pub version: i64,
    /// Session transcript this segment was cut from
    pub session_file: String,
    /// First message offset of the segment
    pub segment_start: Option<i64>,
    /// Last message offset of the segment
    pub segment_end: Option<i64>,
    /// Machine the session ran on
    pub computer: String,
    pub node_type: NodeType,
    /// Project path the segment worked in
    pub project: String,
    pub is_new_project: bool,
    pub had_clear_goal: bool,
    pub outcome: Outcome,

    // ========== Counters ==========
    pub tokens_used: i64,
    pub cost: f64,
    pub duration_minutes: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_message_count: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assistant_message_count: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub clarifying_question_count: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prompted_question_count: Option<i64>,

    // ========== Timestamps ==========
    /// When the work happened
    pub timestamp: DateTime<Utc>,
    /// When the analyzer produced this version
    pub analyzed_at: DateTime<Utc>,
    pub analyzer_version: String,
    /// Path of the full JSON payload in the external node-file store
    pub data_file: String,
    /// Opaque analyzer signals, stored verbatim
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signals: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,

    // ========== Consolidation ==========
    #[serde(skip_serializing_if = "Option::is_none")]
    pub relevance_score: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_accessed: Option<DateTime<Utc>>,
    #[serde(default)]
    pub archived: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub importance: Option<f64>,

    /// All prior `{id}-v{n}` references in ascending order
    #[serde(default)]
    pub previous_versions: Vec<String>,

    // ========== Analyzer payload ==========
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub key_decisions: Vec<Decision>,
    #[serde(default)]
    pub lessons: Vec<Lesson>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub topics: Vec<String>,
    #[serde(default)]
    pub model_quirks: Vec<ModelQuirk>,
    #[serde(default)]
    pub tool_errors: Vec<ToolError>,
    #[serde(default)]
    pub daemon_decisions: Vec<DaemonDecision>,
}

impl Default for Node {
    fn default() -> Self {
        let now = Utc::now();
        Self {
            id: String::new(),
            version: 1,
            session_file: String::new(),
            segment_start: None,
            segment_end: None,
            computer: String::new(),
            node_type: NodeType::Other,
            project: String::new(),
            is_new_project: false,
            had_clear_goal: false,
            outcome: Outcome::Partial,
            tokens_used: 0,
            cost: 0.0,
            duration_minutes: 0.0,
            user_message_count: None,
            assistant_message_count: None,
            clarifying_question_count: None,
            prompted_question_count: None,
            timestamp: now,
            analyzed_at: now,
            analyzer_version: String::new(),
            data_file: String::new(),
            signals: None,
            created_at: now,
            updated_at: now,
            relevance_score: None,
            last_accessed: None,
            archived: false,
            importance: None,
            previous_versions: vec![],
            summary: String::new(),
            key_decisions: vec![],
            lessons: vec![],
            tags: vec![],
            topics: vec![],
            model_quirks: vec![],
            tool_errors: vec![],
            daemon_decisions: vec![],
        }
    }
}

impl Node {
    /// Create a node with a freshly generated id
    pub fn new(session_file: impl Into<String>) -> Self {
        Self {
            id: generate_node_id(),
            session_file: session_file.into(),
            ..Default::default()
        }
    }

    /// Version reference of this node, e.g. `a1b2c3d4e5f60718-v2`
    pub fn version_ref(&self) -> String {
        format!("{}-v{}", self.id, self.version)
    }

    /// Last path component of the project, or the whole path if it has none
    pub fn project_basename(&self) -> &str {
        self.project
            .trim_end_matches('/')
            .rsplit('/')
            .next()
            .unwrap_or(&self.project)
    }
}

/// Generate a 16 hex character node id
pub fn generate_node_id() -> String {
    Uuid::new_v4().simple().to_string()[..16].to_string()
}

// ============================================================================
// TESTS
// ============================================================================
