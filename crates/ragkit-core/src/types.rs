//! Common types shared across the RAG pipeline

use serde::{Deserialize, Serialize};

/// A sparse lexical embedding as index/value pairs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SparseVector {
    pub indices: Vec<u32>,
    pub values: Vec<f32>,
}

/// A ranked passage produced by retrieval or reranking.
///
/// The id is stable across retrieval and reranking. Score scale depends on
/// the producing strategy; scores from different result sets are not
/// comparable unless explicitly fused.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResult {
    pub id: String,
    pub content: String,
    pub score: f32,
    pub metadata: serde_json::Value,
}

/// An embedded document chunk ready for ingestion into the vector store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddedChunk {
    pub content: String,
    pub dense_embedding: Vec<f32>,
    pub sparse_embedding: Option<SparseVector>,
    pub metadata: serde_json::Value,
}

/// A provenance entry attached to a pipeline outcome.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Source {
    /// 1-based rank within the answer's source list.
    pub id: usize,
    pub document: String,
    pub page: Option<u64>,
    pub chunk: Option<u64>,
    pub relevance: f32,
    pub content_preview: String,
}

/// Provider/model details of the generation that produced an answer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelInfo {
    pub provider: String,
    pub model: String,
    pub generation_time: f64,
    pub sampling: serde_json::Value,
}

/// The structured result of one chat request.
///
/// On internal failure the coordinator returns a degraded outcome with
/// `error = true`, an apology answer, no sources and zero tokens. The caller
/// never observes a raw pipeline error.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineOutcome {
    pub answer: String,
    pub sources: Vec<Source>,
    pub session_id: String,
    pub processing_time: f64,
    pub tokens_used: u32,
    pub topic: String,
    pub search_results: usize,
    pub ranked_results: usize,
    pub model_info: Option<ModelInfo>,
    pub error: bool,
    pub error_message: Option<String>,
}

const PREVIEW_CHARS: usize = 150;

/// Probe chunk metadata for a document label.
///
/// Priority order: `source_file`, `source`, `filename`, `document_id`,
/// else the `"unknown"` sentinel.
pub fn document_label(metadata: &serde_json::Value) -> String {
    for key in ["source_file", "source", "filename", "document_id"] {
        if let Some(value) = metadata.get(key).and_then(|v| v.as_str()) {
            if !value.is_empty() {
                return value.to_string();
            }
        }
    }
    "unknown".to_string()
}

/// Probe chunk metadata for a page marker (`page_number`, then `page`).
pub fn page_marker(metadata: &serde_json::Value) -> Option<u64> {
    ["page_number", "page"]
        .iter()
        .find_map(|key| metadata.get(*key).and_then(|v| v.as_u64()))
}

/// Probe chunk metadata for a chunk marker (`chunk_index`, then `chunk`).
pub fn chunk_marker(metadata: &serde_json::Value) -> Option<u64> {
    ["chunk_index", "chunk"]
        .iter()
        .find_map(|key| metadata.get(*key).and_then(|v| v.as_u64()))
}

/// Truncate content to the preview budget, appending an ellipsis marker.
pub fn content_preview(content: &str) -> String {
    let mut preview: String = content.chars().take(PREVIEW_CHARS).collect();
    preview.push_str("...");
    preview
}

/// Rough token estimate for providers that do not report usage.
pub fn estimate_tokens(text: &str) -> u32 {
    (text.split_whitespace().count() as f32 * 1.3) as u32
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_document_label_priority() {
        let metadata = json!({
            "filename": "report.pdf",
            "source_file": "policy.pdf",
        });
        assert_eq!(document_label(&metadata), "policy.pdf");

        let metadata = json!({"document_id": "doc-42"});
        assert_eq!(document_label(&metadata), "doc-42");

        assert_eq!(document_label(&json!({})), "unknown");
    }

    #[test]
    fn test_page_and_chunk_markers() {
        let metadata = json!({"page_number": 3, "chunk": 7});
        assert_eq!(page_marker(&metadata), Some(3));
        assert_eq!(chunk_marker(&metadata), Some(7));
        assert_eq!(page_marker(&json!({})), None);
    }

    #[test]
    fn test_content_preview_truncates() {
        let long = "a".repeat(400);
        let preview = content_preview(&long);
        assert_eq!(preview.chars().count(), 153);
        assert!(preview.ends_with("..."));
    }

    #[test]
    fn test_estimate_tokens() {
        assert_eq!(estimate_tokens("one two three four"), 5);
        assert_eq!(estimate_tokens(""), 0);
    }
}
