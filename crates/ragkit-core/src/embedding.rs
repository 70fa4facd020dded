//! Embedding capability traits

use async_trait::async_trait;

use crate::{Result, SparseVector};

/// Trait for dense (semantic) embedders.
#[async_trait]
pub trait DenseEmbedder: Send + Sync {
    /// Embed a single query string.
    async fn embed_query(&self, text: &str) -> Result<Vec<f32>>;

    /// Embed a batch of document texts.
    async fn embed_documents(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;
}

/// Trait for sparse (lexical) embedders, e.g. BM42-style term weighting.
///
/// Sparse embedding is optional: when unavailable the retrieval engine
/// degrades to dense-only search.
#[async_trait]
pub trait SparseEmbedder: Send + Sync {
    /// Embed a batch of texts into sparse index/value pairs.
    async fn embed(&self, texts: &[String]) -> Result<Vec<SparseVector>>;
}
