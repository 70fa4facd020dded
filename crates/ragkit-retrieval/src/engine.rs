//! Hybrid retrieval engine
//!
//! Runs dense retrieval always and sparse retrieval when available, fuses
//! the two rankings with weighted RRF, then optionally reranks. Sparse
//! failures degrade to dense-only rather than failing the search.

use serde_json::Value;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, warn};

use ragkit_core::{
    CollectionStats, DenseEmbedder, EmbeddedChunk, Error, Reranker, Result, RetrievalConfig,
    ScrollPage, SearchResult, SparseEmbedder, VectorStore,
};

use crate::fusion;

/// A document to be indexed, prior to embedding.
#[derive(Debug, Clone)]
pub struct DocumentInput {
    pub content: String,
    pub metadata: Value,
}

/// One indexed chunk projected for the document listing.
#[derive(Debug, Clone, serde::Serialize)]
pub struct DocumentEntry {
    pub id: String,
    pub filename: String,
    pub file_type: String,
    pub file_size: u64,
    pub upload_date: u64,
    pub chunk_count: u64,
}

/// One page of the document listing.
#[derive(Debug, Clone, serde::Serialize)]
pub struct DocumentPage {
    pub documents: Vec<DocumentEntry>,
    pub next_offset: Option<String>,
}

/// Per-call overrides for `search`. Unset fields fall back to the
/// configured defaults.
#[derive(Debug, Clone, Default)]
pub struct SearchOptions {
    pub limit: Option<usize>,
    pub min_score: Option<f32>,
    /// Session context accompanying the query. Carried for diagnostics;
    /// scoring is driven by the query alone.
    pub context: Option<String>,
}

/// Per-call overrides for `rerank`. Unset fields fall back to the
/// configured defaults.
#[derive(Debug, Clone, Default)]
pub struct RerankOptions {
    pub top_k: Option<usize>,
    pub min_score: Option<f32>,
}

/// Counters and effective settings exposed through the stats surface.
#[derive(Debug, Clone, serde::Serialize)]
pub struct RetrievalStats {
    pub total_searches: u64,
    pub hybrid_searches: u64,
    pub degraded_searches: u64,
    pub rerank_requests: u64,
    pub rerank_failures: u64,
    pub dense_weight: f32,
    pub sparse_weight: f32,
    pub hybrid_enabled: bool,
    pub rerank_enabled: bool,
    pub collection: CollectionStats,
}

pub struct RetrievalEngine {
    dense_embedder: Arc<dyn DenseEmbedder>,
    sparse_embedder: Option<Arc<dyn SparseEmbedder>>,
    store: Arc<dyn VectorStore>,
    reranker: Option<Box<dyn Reranker>>,
    config: RetrievalConfig,
    total_searches: AtomicU64,
    hybrid_searches: AtomicU64,
    degraded_searches: AtomicU64,
    rerank_requests: AtomicU64,
    rerank_failures: AtomicU64,
}

impl RetrievalEngine {
    pub fn new(
        dense_embedder: Arc<dyn DenseEmbedder>,
        sparse_embedder: Option<Arc<dyn SparseEmbedder>>,
        store: Arc<dyn VectorStore>,
        reranker: Option<Box<dyn Reranker>>,
        config: RetrievalConfig,
    ) -> Self {
        Self {
            dense_embedder,
            sparse_embedder,
            store,
            reranker,
            config,
            total_searches: AtomicU64::new(0),
            hybrid_searches: AtomicU64::new(0),
            degraded_searches: AtomicU64::new(0),
            rerank_requests: AtomicU64::new(0),
            rerank_failures: AtomicU64::new(0),
        }
    }

    /// Run a hybrid search for `query`.
    ///
    /// Results are sorted by score descending, cut to the limit, then
    /// filtered by the minimum score; both default from configuration and
    /// can be overridden per call. When the sparse side fails or is
    /// unavailable the search degrades to dense-only with raw similarity
    /// scores.
    pub async fn search(
        &self,
        query: &str,
        options: &SearchOptions,
    ) -> Result<Vec<SearchResult>> {
        if query.trim().is_empty() {
            return Err(Error::EmptyQuery);
        }
        self.total_searches.fetch_add(1, Ordering::Relaxed);

        let limit = options.limit.unwrap_or(self.config.limit);
        let min_score = options.min_score.unwrap_or(self.config.min_score);

        // Over-fetch from each source so fusion has enough candidates.
        let fetch_limit = limit * 2;

        let dense_vector = self.dense_embedder.embed_query(query).await?;
        let dense_results = self.store.search_dense(&dense_vector, fetch_limit).await?;

        let sparse_results = if self.config.hybrid_enabled {
            match &self.sparse_embedder {
                Some(embedder) => match self.sparse_search(embedder, query, fetch_limit).await {
                    Ok(results) => Some(results),
                    Err(e) => {
                        warn!("Sparse search failed, degrading to dense-only: {}", e);
                        self.degraded_searches.fetch_add(1, Ordering::Relaxed);
                        None
                    }
                },
                None => {
                    self.degraded_searches.fetch_add(1, Ordering::Relaxed);
                    None
                }
            }
        } else {
            None
        };

        let mut results = match sparse_results {
            Some(sparse) => {
                self.hybrid_searches.fetch_add(1, Ordering::Relaxed);
                fusion::fuse(
                    dense_results,
                    sparse,
                    self.config.rrf_k,
                    self.config.dense_weight,
                    self.config.sparse_weight,
                )
            }
            None => dense_results,
        };

        results.truncate(limit);
        results.retain(|r| r.score >= min_score);

        debug!(
            query,
            count = results.len(),
            has_context = options.context.as_deref().is_some_and(|c| !c.is_empty()),
            "Search complete"
        );
        Ok(results)
    }

    async fn sparse_search(
        &self,
        embedder: &Arc<dyn SparseEmbedder>,
        query: &str,
        limit: usize,
    ) -> Result<Vec<SearchResult>> {
        let mut vectors = embedder.embed(&[query.to_string()]).await?;
        let vector = vectors
            .pop()
            .ok_or_else(|| Error::Embedding("Sparse embedder returned no vector".to_string()))?;
        self.store.search_sparse(&vector, limit).await
    }

    /// Rerank `results` against `query`.
    ///
    /// Never aborts the pipeline: when reranking is disabled, unconfigured,
    /// or fails, the input ordering is returned unchanged. Top-k and the
    /// score floor default from configuration and can be overridden per
    /// call.
    pub async fn rerank(
        &self,
        query: &str,
        results: Vec<SearchResult>,
        options: &RerankOptions,
    ) -> Vec<SearchResult> {
        if !self.config.rerank.enabled || results.is_empty() {
            return results;
        }
        let Some(reranker) = &self.reranker else {
            return results;
        };
        self.rerank_requests.fetch_add(1, Ordering::Relaxed);

        let top_k = options.top_k.unwrap_or(self.config.rerank.top_k);
        let min_score = options.min_score.unwrap_or(self.config.rerank.min_score);

        let documents: Vec<String> = results.iter().map(|r| r.content.clone()).collect();
        let entries = match reranker.rerank(query, &documents, top_k).await {
            Ok(entries) => entries,
            Err(e) => {
                warn!(provider = reranker.name(), "Rerank failed, keeping fused order: {}", e);
                self.rerank_failures.fetch_add(1, Ordering::Relaxed);
                return results;
            }
        };

        let mut reranked = Vec::with_capacity(entries.len());
        for entry in entries {
            if entry.relevance_score < min_score {
                continue;
            }
            if let Some(result) = results.get(entry.index) {
                let mut result = result.clone();
                result.score = entry.relevance_score;
                reranked.push(result);
            }
        }

        // A reranker that drops everything is treated as a failure signal.
        if reranked.is_empty() {
            return results;
        }
        reranked
    }

    /// Embed and index documents in store-friendly batches.
    pub async fn add_documents(&self, documents: Vec<DocumentInput>) -> Result<Vec<String>> {
        let mut ids = Vec::with_capacity(documents.len());

        for batch in documents.chunks(self.config.batch_size) {
            let texts: Vec<String> = batch.iter().map(|d| d.content.clone()).collect();
            let dense = self.dense_embedder.embed_documents(&texts).await?;

            let sparse = match &self.sparse_embedder {
                Some(embedder) => embedder
                    .embed(&texts)
                    .await?
                    .into_iter()
                    .map(Some)
                    .collect(),
                None => vec![None; batch.len()],
            };

            let chunks: Vec<EmbeddedChunk> = batch
                .iter()
                .zip(dense)
                .zip(sparse)
                .map(|((doc, dense_embedding), sparse_embedding)| EmbeddedChunk {
                    content: doc.content.clone(),
                    dense_embedding,
                    sparse_embedding,
                    metadata: doc.metadata.clone(),
                })
                .collect();

            ids.extend(self.store.upsert(chunks).await?);
        }

        Ok(ids)
    }

    pub async fn delete_document(&self, id: &str) -> Result<bool> {
        self.store.delete(id).await
    }

    /// List indexed chunks with their document metadata projected out.
    pub async fn list_documents(
        &self,
        offset: Option<String>,
        limit: usize,
    ) -> Result<DocumentPage> {
        let page = self.store.scroll(offset, limit).await?;

        let documents = page
            .chunks
            .into_iter()
            .map(|chunk| DocumentEntry {
                id: chunk.id,
                filename: ragkit_core::document_label(&chunk.metadata),
                file_type: chunk
                    .metadata
                    .get("file_type")
                    .and_then(|v| v.as_str())
                    .unwrap_or("unknown")
                    .to_string(),
                file_size: chunk
                    .metadata
                    .get("file_size")
                    .and_then(|v| v.as_u64())
                    .unwrap_or(0),
                upload_date: chunk
                    .metadata
                    .get("load_timestamp")
                    .and_then(|v| v.as_u64())
                    .unwrap_or(0),
                chunk_count: chunk
                    .metadata
                    .get("total_chunks")
                    .and_then(|v| v.as_u64())
                    .unwrap_or(1),
            })
            .collect();

        Ok(DocumentPage {
            documents,
            next_offset: page.next_offset,
        })
    }

    pub async fn stats(&self) -> Result<RetrievalStats> {
        let collection = self.store.stats().await?;
        Ok(RetrievalStats {
            total_searches: self.total_searches.load(Ordering::Relaxed),
            hybrid_searches: self.hybrid_searches.load(Ordering::Relaxed),
            degraded_searches: self.degraded_searches.load(Ordering::Relaxed),
            rerank_requests: self.rerank_requests.load(Ordering::Relaxed),
            rerank_failures: self.rerank_failures.load(Ordering::Relaxed),
            dense_weight: self.config.dense_weight,
            sparse_weight: self.config.sparse_weight,
            hybrid_enabled: self.config.hybrid_enabled,
            rerank_enabled: self.config.rerank.enabled,
            collection,
        })
    }

    pub fn config(&self) -> &RetrievalConfig {
        &self.config
    }
}
