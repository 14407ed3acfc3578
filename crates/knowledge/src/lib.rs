//! Knowledge store for reference documents
//!
//! Two retrieval strategies share one hit shape:
//! - keyword search over an in-memory snapshot of small text files
//! - nearest-neighbour search over a persisted chunk/embedding index
//!
//! [`KnowledgeBase`] picks between them.

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub mod base;
pub mod chunk;
pub mod store;
pub mod vector;

pub use base::KnowledgeBase;
pub use chunk::chunk_text;
pub use store::{KnowledgeItem, KnowledgeStore};
pub use vector::{cosine_similarity, IndexFile, VectorIndex, VectorRecord};

/// Knowledge errors
#[derive(Error, Debug)]
pub enum KnowledgeError {
    #[error("knowledge io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("knowledge json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("embedding failed: {0}")]
    Embedding(#[from] seopilot_provider::ProviderError),

    #[error("embedding backend returned {got} vectors for {expected} inputs")]
    VectorCount { expected: usize, got: usize },
}

pub type Result<T> = std::result::Result<T, KnowledgeError>;

/// One search result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KnowledgeHit {
    /// Source identifier (file name)
    pub title: String,
    pub snippet: String,
    pub score: f32,
    /// Chunk position when the hit came from the vector index
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chunk_index: Option<usize>,
}

/// Cut `text` to at most `max_chars` characters on a char boundary
pub fn truncate_chars(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => text[..idx].to_string(),
        None => text.to_string(),
    }
}
