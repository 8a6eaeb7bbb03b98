//! Search - lexical (FTS5), semantic (vector KNN), and hybrid fusion

pub mod hybrid;
pub mod keyword;
pub mod vector;

pub use hybrid::{HybridHit, HybridQuery, HybridResponse, HybridWeights, ScoreBreakdown};
pub use keyword::{
    build_match_query, extract_highlight, FtsField, Highlight, SearchHit, SearchRequest,
    SearchResponse,
};
pub use vector::{VectorHit, VectorSearchOptions};
