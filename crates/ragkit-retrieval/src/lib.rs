//! Hybrid retrieval for the ragkit pipeline
//!
//! Dense + sparse search over a vector store, weighted reciprocal rank
//! fusion, optional hosted reranking, and document management.

mod engine;
mod fusion;
mod memory_store;
mod qdrant_store;
mod rerank;

pub use engine::{
    DocumentEntry, DocumentInput, DocumentPage, RerankOptions, RetrievalEngine, RetrievalStats,
    SearchOptions,
};
pub use fusion::fuse;
pub use memory_store::MemoryVectorStore;
pub use qdrant_store::QdrantStore;
pub use rerank::{CohereReranker, JinaReranker, reranker_from_env};
