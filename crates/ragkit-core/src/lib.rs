//! Core traits and types for the ragkit RAG pipeline
//!
//! This crate defines the capability interfaces the pipeline is built
//! against: dense/sparse embedding, vector storage, reranking and LLM
//! completion. Keeping the interfaces here makes every stage test-friendly
//! and every backend pluggable.

pub mod config;
pub mod embedding;
pub mod error;
pub mod llm;
pub mod rerank;
pub mod types;
pub mod vector_store;

pub use config::{
    AppConfig, LlmConfig, PipelineConfig, QdrantConfig, RerankConfig, RetrievalConfig,
    SessionConfig,
};
pub use embedding::{DenseEmbedder, SparseEmbedder};
pub use error::{Error, Result};
pub use llm::{
    AnswerStyle, Completion, GenerationOptions, GenerationResult, LlmProvider, ProviderHealth,
    SamplingConfig,
};
pub use rerank::{RerankEntry, Reranker};
pub use types::{
    EmbeddedChunk, ModelInfo, PipelineOutcome, SearchResult, Source, SparseVector,
    chunk_marker, content_preview, document_label, estimate_tokens, page_marker,
};
pub use vector_store::{CollectionStats, ScrollPage, StoredChunk, VectorStore};
