//! Qdrant-backed vector store
//!
//! Stores chunks as points carrying a named dense vector and an optional
//! named sparse vector, with content and metadata in the payload. The
//! collection is created on first upsert using the dense embedding width.

use async_trait::async_trait;
use qdrant_client::qdrant::{
    CreateCollectionBuilder, DeletePointsBuilder, Distance, NamedVectors, PointId, PointStruct,
    PointsIdsList, ScrollPointsBuilder, SearchPointsBuilder, SparseVectorParamsBuilder,
    SparseVectorsConfigBuilder, Vector, VectorParamsBuilder, VectorsConfigBuilder,
    point_id::PointIdOptions,
};
use qdrant_client::{Payload, Qdrant};
use serde_json::json;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::info;
use uuid::Uuid;

use ragkit_core::{
    CollectionStats, EmbeddedChunk, Error, QdrantConfig, Result, ScrollPage, SearchResult,
    SparseVector, StoredChunk, VectorStore,
};

const DENSE_VECTOR: &str = "dense";
const SPARSE_VECTOR: &str = "sparse";

pub struct QdrantStore {
    client: Qdrant,
    collection_name: String,
    collection_ready: AtomicBool,
}

impl QdrantStore {
    /// Connect to a Qdrant instance. Collection creation is deferred to the
    /// first upsert, which knows the dense embedding width.
    pub fn connect(config: &QdrantConfig) -> Result<Self> {
        let mut builder = Qdrant::from_url(&config.url);
        if let Some(api_key) = &config.api_key {
            builder = builder.api_key(api_key.clone());
        }
        let client = builder
            .build()
            .map_err(|e| Error::VectorStore(format!("Qdrant connection failed: {}", e)))?;

        Ok(Self {
            client,
            collection_name: config.collection_name.clone(),
            collection_ready: AtomicBool::new(false),
        })
    }

    async fn ensure_collection(&self, vector_size: u64) -> Result<()> {
        if self.collection_ready.load(Ordering::Acquire) {
            return Ok(());
        }

        let exists = self
            .client
            .collection_exists(&self.collection_name)
            .await
            .map_err(|e| Error::VectorStore(format!("Qdrant collection check failed: {}", e)))?;

        if !exists {
            let mut vectors = VectorsConfigBuilder::default();
            vectors.add_named_vector_params(
                DENSE_VECTOR,
                VectorParamsBuilder::new(vector_size, Distance::Cosine),
            );

            let mut sparse = SparseVectorsConfigBuilder::default();
            sparse.add_named_vector_params(SPARSE_VECTOR, SparseVectorParamsBuilder::default());

            self.client
                .create_collection(
                    CreateCollectionBuilder::new(&self.collection_name)
                        .vectors_config(vectors)
                        .sparse_vectors_config(sparse),
                )
                .await
                .map_err(|e| {
                    Error::VectorStore(format!(
                        "Failed to create collection '{}': {}",
                        self.collection_name, e
                    ))
                })?;
            info!(collection = %self.collection_name, "Created Qdrant collection");
        }

        self.collection_ready.store(true, Ordering::Release);
        Ok(())
    }

    fn chunk_to_point(chunk: EmbeddedChunk) -> Result<PointStruct> {
        let mut vectors = NamedVectors::default()
            .add_vector(DENSE_VECTOR, Vector::new_dense(chunk.dense_embedding));
        if let Some(sparse) = chunk.sparse_embedding {
            vectors = vectors.add_vector(
                SPARSE_VECTOR,
                Vector::new_sparse(sparse.indices, sparse.values),
            );
        }

        let payload = Payload::try_from(json!({
            "content": chunk.content,
            "metadata": chunk.metadata,
        }))
        .map_err(|e| Error::Serialization(format!("Payload conversion failed: {}", e)))?;

        Ok(PointStruct::new(
            Uuid::new_v4().to_string(),
            vectors,
            payload,
        ))
    }

    fn point_id_string(id: Option<&PointId>) -> String {
        match id.and_then(|p| p.point_id_options.as_ref()) {
            Some(PointIdOptions::Uuid(uuid)) => uuid.clone(),
            Some(PointIdOptions::Num(num)) => num.to_string(),
            None => String::new(),
        }
    }

    fn payload_fields(
        payload: std::collections::HashMap<String, qdrant_client::qdrant::Value>,
    ) -> (String, serde_json::Value) {
        let mut content = String::new();
        let mut metadata = serde_json::Value::Null;
        for (key, value) in payload {
            match key.as_str() {
                "content" => {
                    if let serde_json::Value::String(text) = value.into_json() {
                        content = text;
                    }
                }
                "metadata" => metadata = value.into_json(),
                _ => {}
            }
        }
        (content, metadata)
    }
}

#[async_trait]
impl VectorStore for QdrantStore {
    async fn upsert(&self, chunks: Vec<EmbeddedChunk>) -> Result<Vec<String>> {
        if chunks.is_empty() {
            return Ok(Vec::new());
        }
        self.ensure_collection(chunks[0].dense_embedding.len() as u64)
            .await?;

        let points: Vec<PointStruct> = chunks
            .into_iter()
            .map(Self::chunk_to_point)
            .collect::<Result<_>>()?;
        let ids: Vec<String> = points
            .iter()
            .map(|p| Self::point_id_string(p.id.as_ref()))
            .collect();

        self.client
            .upsert_points(
                qdrant_client::qdrant::UpsertPointsBuilder::new(&self.collection_name, points)
                    .wait(true),
            )
            .await
            .map_err(|e| Error::VectorStore(format!("Qdrant upsert failed: {}", e)))?;

        Ok(ids)
    }

    async fn search_dense(&self, vector: &[f32], limit: usize) -> Result<Vec<SearchResult>> {
        let response = self
            .client
            .search_points(
                SearchPointsBuilder::new(&self.collection_name, vector.to_vec(), limit as u64)
                    .vector_name(DENSE_VECTOR)
                    .with_payload(true),
            )
            .await
            .map_err(|e| Error::VectorStore(format!("Qdrant dense search failed: {}", e)))?;

        Ok(response
            .result
            .into_iter()
            .map(|point| {
                let id = Self::point_id_string(point.id.as_ref());
                let (content, metadata) = Self::payload_fields(point.payload);
                SearchResult {
                    id,
                    content,
                    score: point.score,
                    metadata,
                }
            })
            .collect())
    }

    async fn search_sparse(
        &self,
        vector: &SparseVector,
        limit: usize,
    ) -> Result<Vec<SearchResult>> {
        let response = self
            .client
            .search_points(
                SearchPointsBuilder::new(
                    &self.collection_name,
                    vector.values.clone(),
                    limit as u64,
                )
                .vector_name(SPARSE_VECTOR)
                .sparse_indices(vector.indices.clone())
                .with_payload(true),
            )
            .await
            .map_err(|e| Error::VectorStore(format!("Qdrant sparse search failed: {}", e)))?;

        Ok(response
            .result
            .into_iter()
            .map(|point| {
                let id = Self::point_id_string(point.id.as_ref());
                let (content, metadata) = Self::payload_fields(point.payload);
                SearchResult {
                    id,
                    content,
                    score: point.score,
                    metadata,
                }
            })
            .collect())
    }

    async fn scroll(&self, offset: Option<String>, limit: usize) -> Result<ScrollPage> {
        let mut builder = ScrollPointsBuilder::new(&self.collection_name)
            .limit(limit as u32)
            .with_payload(true);
        if let Some(cursor) = offset {
            builder = builder.offset(PointId::from(cursor));
        }

        let response = self
            .client
            .scroll(builder)
            .await
            .map_err(|e| Error::VectorStore(format!("Qdrant scroll failed: {}", e)))?;

        let chunks = response
            .result
            .into_iter()
            .map(|point| {
                let id = Self::point_id_string(point.id.as_ref());
                let (content, metadata) = Self::payload_fields(point.payload);
                StoredChunk {
                    id,
                    content,
                    metadata,
                }
            })
            .collect();

        let next_offset = response
            .next_page_offset
            .as_ref()
            .map(|id| Self::point_id_string(Some(id)));

        Ok(ScrollPage {
            chunks,
            next_offset,
        })
    }

    async fn delete(&self, id: &str) -> Result<bool> {
        self.client
            .delete_points(
                DeletePointsBuilder::new(&self.collection_name)
                    .points(PointsIdsList {
                        ids: vec![id.to_string().into()],
                    })
                    .wait(true),
            )
            .await
            .map_err(|e| Error::VectorStore(format!("Qdrant delete failed: {}", e)))?;
        Ok(true)
    }

    async fn stats(&self) -> Result<CollectionStats> {
        let info = self
            .client
            .collection_info(&self.collection_name)
            .await
            .map_err(|e| Error::VectorStore(format!("Qdrant collection info failed: {}", e)))?;

        let collection = info.result.unwrap_or_default();
        Ok(CollectionStats {
            points_count: collection.points_count.unwrap_or(0),
            vectors_count: collection.indexed_vectors_count.unwrap_or(0),
        })
    }
}
