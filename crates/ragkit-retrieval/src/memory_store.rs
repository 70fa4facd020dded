//! In-memory vector store
//!
//! Backing store for tests and infrastructure-free runs. Dense search is
//! cosine similarity, sparse search is a dot product over matching indices.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::RwLock;
use uuid::Uuid;

use ragkit_core::{
    CollectionStats, EmbeddedChunk, Error, Result, ScrollPage, SearchResult, SparseVector,
    StoredChunk, VectorStore,
};

struct StoredPoint {
    content: String,
    dense: Vec<f32>,
    sparse: Option<SparseVector>,
    metadata: serde_json::Value,
}

/// In-memory vector store keyed by point id.
#[derive(Default)]
pub struct MemoryVectorStore {
    points: RwLock<HashMap<String, StoredPoint>>,
}

impl MemoryVectorStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
        if a.len() != b.len() {
            return 0.0;
        }

        let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
        let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
        let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

        if norm_a == 0.0 || norm_b == 0.0 {
            return 0.0;
        }
        dot / (norm_a * norm_b)
    }

    fn sparse_dot(query: &SparseVector, stored: &SparseVector) -> f32 {
        let stored_map: HashMap<u32, f32> = stored
            .indices
            .iter()
            .copied()
            .zip(stored.values.iter().copied())
            .collect();

        query
            .indices
            .iter()
            .zip(query.values.iter())
            .filter_map(|(index, value)| stored_map.get(index).map(|s| s * value))
            .sum()
    }

    fn ranked(&self, mut scored: Vec<SearchResult>, limit: usize) -> Vec<SearchResult> {
        scored.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        scored.truncate(limit);
        scored
    }
}

#[async_trait]
impl VectorStore for MemoryVectorStore {
    async fn upsert(&self, chunks: Vec<EmbeddedChunk>) -> Result<Vec<String>> {
        let mut points = self
            .points
            .write()
            .map_err(|e| Error::VectorStore(format!("Lock error: {}", e)))?;

        let mut ids = Vec::with_capacity(chunks.len());
        for chunk in chunks {
            let id = Uuid::new_v4().to_string();
            points.insert(
                id.clone(),
                StoredPoint {
                    content: chunk.content,
                    dense: chunk.dense_embedding,
                    sparse: chunk.sparse_embedding,
                    metadata: chunk.metadata,
                },
            );
            ids.push(id);
        }
        Ok(ids)
    }

    async fn search_dense(&self, vector: &[f32], limit: usize) -> Result<Vec<SearchResult>> {
        let points = self
            .points
            .read()
            .map_err(|e| Error::VectorStore(format!("Lock error: {}", e)))?;

        let scored = points
            .iter()
            .map(|(id, point)| SearchResult {
                id: id.clone(),
                content: point.content.clone(),
                score: Self::cosine_similarity(vector, &point.dense),
                metadata: point.metadata.clone(),
            })
            .collect();

        Ok(self.ranked(scored, limit))
    }

    async fn search_sparse(
        &self,
        vector: &SparseVector,
        limit: usize,
    ) -> Result<Vec<SearchResult>> {
        let points = self
            .points
            .read()
            .map_err(|e| Error::VectorStore(format!("Lock error: {}", e)))?;

        let scored = points
            .iter()
            .filter_map(|(id, point)| {
                point.sparse.as_ref().map(|stored| SearchResult {
                    id: id.clone(),
                    content: point.content.clone(),
                    score: Self::sparse_dot(vector, stored),
                    metadata: point.metadata.clone(),
                })
            })
            .collect();

        Ok(self.ranked(scored, limit))
    }

    async fn scroll(&self, offset: Option<String>, limit: usize) -> Result<ScrollPage> {
        let points = self
            .points
            .read()
            .map_err(|e| Error::VectorStore(format!("Lock error: {}", e)))?;

        // Iterate in id order so the cursor is stable across calls.
        let mut ids: Vec<&String> = points.keys().collect();
        ids.sort();

        let start = match &offset {
            Some(cursor) => ids.iter().position(|id| *id == cursor).unwrap_or(0),
            None => 0,
        };

        let page_ids = &ids[start.min(ids.len())..(start + limit).min(ids.len())];
        let chunks = page_ids
            .iter()
            .map(|id| {
                let point = &points[id.as_str()];
                StoredChunk {
                    id: (**id).clone(),
                    content: point.content.clone(),
                    metadata: point.metadata.clone(),
                }
            })
            .collect();

        let next_offset = ids.get(start + limit).map(|id| (**id).clone());
        Ok(ScrollPage {
            chunks,
            next_offset,
        })
    }

    async fn delete(&self, id: &str) -> Result<bool> {
        let mut points = self
            .points
            .write()
            .map_err(|e| Error::VectorStore(format!("Lock error: {}", e)))?;
        Ok(points.remove(id).is_some())
    }

    async fn stats(&self) -> Result<CollectionStats> {
        let points = self
            .points
            .read()
            .map_err(|e| Error::VectorStore(format!("Lock error: {}", e)))?;

        let vectors = points
            .values()
            .map(|p| 1 + p.sparse.is_some() as u64)
            .sum();

        Ok(CollectionStats {
            points_count: points.len() as u64,
            vectors_count: vectors,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn chunk(content: &str, dense: Vec<f32>) -> EmbeddedChunk {
        EmbeddedChunk {
            content: content.to_string(),
            dense_embedding: dense,
            sparse_embedding: None,
            metadata: json!({}),
        }
    }

    #[tokio::test]
    async fn test_upsert_and_dense_search() {
        let store = MemoryVectorStore::new();
        store
            .upsert(vec![
                chunk("first", vec![1.0, 0.0]),
                chunk("second", vec![0.0, 1.0]),
            ])
            .await
            .unwrap();

        let results = store.search_dense(&[1.0, 0.1], 10).await.unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].content, "first");
        assert!(results[0].score > results[1].score);
    }

    #[tokio::test]
    async fn test_sparse_search_skips_dense_only_points() {
        let store = MemoryVectorStore::new();
        let mut with_sparse = chunk("sparse", vec![0.5, 0.5]);
        with_sparse.sparse_embedding = Some(SparseVector {
            indices: vec![3, 9],
            values: vec![0.7, 0.2],
        });
        store
            .upsert(vec![with_sparse, chunk("dense only", vec![1.0, 0.0])])
            .await
            .unwrap();

        let query = SparseVector {
            indices: vec![3],
            values: vec![1.0],
        };
        let results = store.search_sparse(&query, 10).await.unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].content, "sparse");
        assert!((results[0].score - 0.7).abs() < 1e-6);
    }

    #[tokio::test]
    async fn test_scroll_pagination() {
        let store = MemoryVectorStore::new();
        store
            .upsert((0..5).map(|i| chunk(&format!("c{}", i), vec![1.0])).collect())
            .await
            .unwrap();

        let first = store.scroll(None, 2).await.unwrap();
        assert_eq!(first.chunks.len(), 2);
        let second = store.scroll(first.next_offset.clone(), 2).await.unwrap();
        assert_eq!(second.chunks.len(), 2);
        assert_ne!(first.chunks[0].id, second.chunks[0].id);

        let third = store.scroll(second.next_offset.clone(), 2).await.unwrap();
        assert_eq!(third.chunks.len(), 1);
        assert!(third.next_offset.is_none());
    }

    #[tokio::test]
    async fn test_delete_and_stats() {
        let store = MemoryVectorStore::new();
        let ids = store.upsert(vec![chunk("a", vec![1.0])]).await.unwrap();

        assert_eq!(store.stats().await.unwrap().points_count, 1);
        assert!(store.delete(&ids[0]).await.unwrap());
        assert!(!store.delete(&ids[0]).await.unwrap());
        assert_eq!(store.stats().await.unwrap().points_count, 0);
    }
}
