//! Persisted content embeddings.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Vector type used for article deduplication
pub const ARTICLE_VECTOR_TYPE: &str = "article";

/// A stored embedding. Never mutated once created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VectorRecord {
    /// Content hash (see [`content_hash`])
    pub id: String,
    pub content: String,
    pub vector: Vec<f32>,
    pub vector_dim: usize,
    pub vector_type: String,
}

impl VectorRecord {
    pub fn new(content: impl Into<String>, vector: Vec<f32>, vector_type: impl Into<String>) -> Self {
        let content = content.into();
        Self {
            id: content_hash(&content),
            vector_dim: vector.len(),
            content,
            vector,
            vector_type: vector_type.into(),
        }
    }
}

/// First 16 hex chars of SHA-256(content)
pub fn content_hash(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    let result = hasher.finalize();
    hex::encode(&result[..8])
}
