//! Indexing pipeline
//!
//! Every node write is projected into three representations in the same
//! transaction as the row itself:
//! - the composed FTS document (`nodes_fts`)
//! - the rich embedding text handed to the embedding provider
//! - the binary vector pair (`node_embeddings` + `node_embeddings_vec`)

mod document;
mod embedding;

pub use document::{compose_fts_doc, FtsDoc};
pub use embedding::{
    build_embedding_text, deserialize_embedding, is_rich_embedding_format,
    serialize_embedding, EMBEDDING_DIM, EMBEDDING_TEXT_MARKER,
};

pub(crate) use document::write_fts_row;
pub(crate) use embedding::is_dimension_mismatch;
