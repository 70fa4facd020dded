//! Vector store trait and types

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::{EmbeddedChunk, Result, SearchResult, SparseVector};

/// A stored chunk returned by scrolling the collection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredChunk {
    pub id: String,
    pub content: String,
    pub metadata: serde_json::Value,
}

/// One page of a scroll over the collection.
#[derive(Debug, Clone)]
pub struct ScrollPage {
    pub chunks: Vec<StoredChunk>,
    /// Opaque cursor for the next page; `None` when exhausted.
    pub next_offset: Option<String>,
}

/// Point and vector counts reported by the backing collection.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct CollectionStats {
    pub points_count: u64,
    pub vectors_count: u64,
}

/// Trait for vector stores (Qdrant in production, in-memory for tests)
///
/// The store holds one named dense vector per point and an optional named
/// sparse vector. Searches return provider-scored results ranked descending;
/// rank fusion across the two searches is the retrieval engine's concern.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Upsert a batch of embedded chunks, returning assigned point ids.
    async fn upsert(&self, chunks: Vec<EmbeddedChunk>) -> Result<Vec<String>>;

    /// Nearest-neighbor search over the dense vector.
    async fn search_dense(&self, vector: &[f32], limit: usize) -> Result<Vec<SearchResult>>;

    /// Nearest-neighbor search over the sparse vector.
    async fn search_sparse(
        &self,
        vector: &SparseVector,
        limit: usize,
    ) -> Result<Vec<SearchResult>>;

    /// Scroll stored chunks from an opaque offset.
    async fn scroll(&self, offset: Option<String>, limit: usize) -> Result<ScrollPage>;

    /// Delete a point by id. Returns whether a point was removed.
    async fn delete(&self, id: &str) -> Result<bool>;

    /// Collection introspection (point/vector counts).
    async fn stats(&self) -> Result<CollectionStats>;
}
