//! Vector Store Abstraction Layer
//!
//! The pipeline consumes the vector index through one narrow call: given a
//! query vector, return the best-scoring chunks above a threshold.
//!
//! ```text
//!   EmbeddingVector ──▶ VectorStore::search(top_k, threshold) ──▶ [RetrievedChunk]
//!                                 ▲
//!                          ┌──────┴──────┐
//!                          │   Qdrant    │   (REST)
//!                          └─────────────┘
//! ```
//!
//! # Contract
//!
//! - Results are sorted by descending score and hold at most `top_k` chunks.
//! - The threshold is handed to the backend as a filter. Implementations do
//!   not re-filter, so score semantics are whatever the index uses.
//! - An empty result is not an error.
//! - A query vector whose length differs from the index dimensionality fails
//!   with `AppError::DimensionMismatch`.

use crate::types::{EmbeddingVector, Result, RetrievedChunk};
use async_trait::async_trait;

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Search for the chunks most similar to `embedding`.
    async fn search(
        &self,
        embedding: &EmbeddingVector,
        top_k: usize,
        threshold: f32,
    ) -> Result<Vec<RetrievedChunk>>;

    /// Dimensionality the index was created with.
    async fn dimensions(&self) -> Result<usize>;
}

/// Sort chunks by descending score (stable for ties) and cap them at `top_k`.
pub fn rank_chunks(mut chunks: Vec<RetrievedChunk>, top_k: usize) -> Vec<RetrievedChunk> {
    chunks.sort_by(|a, b| b.score.total_cmp(&a.score));
    chunks.truncate(top_k);
    chunks
}
