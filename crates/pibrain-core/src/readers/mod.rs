//! Readers - filtered, paginated reads over the aggregated tables

pub mod insights;
pub mod lessons;
pub mod patterns;

pub use insights::{InsightRecord, PromptEffectivenessRecord};
pub use lessons::{LessonFilters, LessonRecord, LessonsByLevel, LevelLessons};
pub use patterns::{
    FailurePattern, FailurePatternFilters, LessonPattern, ModelQuirkRecord, ModelStats,
    QuirkFilters,
};

use crate::storage::{clamp_limit, clamp_offset};

/// Pagination request shared by all list APIs
#[derive(Debug, Clone, Copy, Default)]
pub struct Page {
    /// Clamped to [1, 500], default 20
    pub limit: Option<i64>,
    /// Clamped to >= 0
    pub offset: Option<i64>,
}

impl Page {
    pub(crate) fn clamped(&self) -> (i64, i64) {
        (clamp_limit(self.limit), clamp_offset(self.offset))
    }
}

/// One page of a listing plus the unpaginated total
#[derive(Debug, Clone)]
pub struct Listing<T> {
    pub items: Vec<T>,
    pub total: i64,
    pub limit: i64,
    pub offset: i64,
}
