//! Pipeline configuration
//!
//! Every section carries serde defaults mirroring the deployed backend's
//! configuration file, so a bare `AppConfig::default()` is runnable against
//! local infrastructure. Environment variables override the secrets.

use serde::{Deserialize, Serialize};
use std::env;
use std::time::Duration;

use crate::{Error, Result};

/// Session store configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Idle TTL in seconds before a session expires.
    pub ttl_seconds: u64,
    /// Live exchange window; older exchanges are folded into the summary.
    pub max_exchanges: usize,
    /// Interval of the background expiry sweep, in seconds.
    pub cleanup_interval_seconds: u64,
    /// How many recent exchanges are rendered into the context string.
    pub recent_exchanges: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            ttl_seconds: 3600,
            max_exchanges: 5,
            cleanup_interval_seconds: 300,
            recent_exchanges: 3,
        }
    }
}

impl SessionConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_seconds)
    }

    pub fn cleanup_interval(&self) -> Duration {
        Duration::from_secs(self.cleanup_interval_seconds)
    }
}

/// Reranking configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RerankConfig {
    pub enabled: bool,
    /// Preferred reranking provider ("cohere" or "jina").
    pub provider: String,
    pub top_k: usize,
    pub min_score: f32,
}

impl Default for RerankConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            provider: "cohere".to_string(),
            top_k: 5,
            min_score: 0.4,
        }
    }
}

/// Retrieval engine configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalConfig {
    /// Default candidate limit per search.
    pub limit: usize,
    /// Minimum score a result must reach after fusion/filtering.
    pub min_score: f32,
    /// RRF smoothing constant.
    pub rrf_k: u32,
    /// Per-source fusion weights. They must sum to a positive value but
    /// need not sum to 1; fused scores are normalized afterwards.
    pub dense_weight: f32,
    pub sparse_weight: f32,
    /// Whether to attempt sparse search alongside dense search.
    pub hybrid_enabled: bool,
    /// Upsert batch size for document ingestion.
    pub batch_size: usize,
    pub rerank: RerankConfig,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            limit: 20,
            min_score: 0.3,
            rrf_k: 60,
            dense_weight: 0.6,
            sparse_weight: 0.4,
            hybrid_enabled: true,
            batch_size: 100,
            rerank: RerankConfig::default(),
        }
    }
}

/// Generation orchestrator configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    pub default_provider: String,
    pub auto_fallback: bool,
    /// Ordered fallback chain walked after the failed provider.
    pub fallback_order: Vec<String>,
    pub max_tokens: u32,
    pub temperature: f32,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            default_provider: "google".to_string(),
            auto_fallback: true,
            fallback_order: vec![
                "google".to_string(),
                "openai".to_string(),
                "anthropic".to_string(),
            ],
            max_tokens: 2000,
            temperature: 0.7,
        }
    }
}

/// Qdrant connection configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QdrantConfig {
    pub url: String,
    pub api_key: Option<String>,
    pub collection_name: String,
}

impl Default for QdrantConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:6334".to_string(),
            api_key: None,
            collection_name: "documents".to_string(),
        }
    }
}

impl QdrantConfig {
    /// Read connection settings from the environment, falling back to the
    /// local-server defaults.
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let url = env::var("QDRANT_URL").unwrap_or_else(|_| "http://localhost:6334".to_string());
        let api_key = env::var("QDRANT_API_KEY").ok();
        let collection_name =
            env::var("QDRANT_COLLECTION").unwrap_or_else(|_| "documents".to_string());

        if url.is_empty() {
            return Err(Error::Configuration("QDRANT_URL is empty".to_string()));
        }

        Ok(Self {
            url,
            api_key,
            collection_name,
        })
    }
}

/// Pipeline coordinator configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Maximum provenance sources attached to an outcome.
    pub max_sources: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self { max_sources: 5 }
    }
}

/// Top-level application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub session: SessionConfig,
    pub retrieval: RetrievalConfig,
    pub llm: LlmConfig,
    pub qdrant: QdrantConfig,
    pub pipeline: PipelineConfig,
}

#[cfg(test)]
mod tests {
    use super::*;
    use insta::assert_yaml_snapshot;

    #[test]
    fn test_qdrant_config_snapshot() {
        let config = QdrantConfig::default();

        assert_yaml_snapshot!(config, @r###"
        ---
        url: "http://localhost:6334"
        api_key: ~
        collection_name: documents
        "###);
    }

    #[test]
    fn test_default_weights_sum_positive() {
        let config = RetrievalConfig::default();
        assert!(config.dense_weight + config.sparse_weight > 0.0);
        assert_eq!(config.rrf_k, 60);
    }

    #[test]
    fn test_fallback_order_defaults() {
        let config = LlmConfig::default();
        assert_eq!(config.default_provider, "google");
        assert_eq!(config.fallback_order, vec!["google", "openai", "anthropic"]);
        assert!(config.auto_fallback);
    }

    #[test]
    fn test_session_durations() {
        let config = SessionConfig::default();
        assert_eq!(config.ttl().as_secs(), 3600);
        assert_eq!(config.cleanup_interval().as_secs(), 300);
    }
}
