//! Reranking capability trait

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::Result;

/// One entry of a reranker's returned ranking.
///
/// `index` refers back into the submitted document list.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RerankEntry {
    pub index: usize,
    pub relevance_score: f32,
}

/// Trait for external relevance-scoring providers (Cohere, Jina, ...)
#[async_trait]
pub trait Reranker: Send + Sync {
    /// Stable provider name (e.g. "cohere").
    fn name(&self) -> &str;

    /// Score `documents` against `query`, returning the top `top_k`
    /// entries ordered by descending relevance.
    async fn rerank(
        &self,
        query: &str,
        documents: &[String],
        top_k: usize,
    ) -> Result<Vec<RerankEntry>>;
}
