//! Hosted reranker clients
//!
//! Both services take a query plus candidate documents and return
//! `(index, relevance_score)` pairs ordered by relevance. Rerank failures
//! are surfaced as errors; the retrieval engine decides whether to fall
//! back to the fused ordering.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use ragkit_core::{Error, RerankEntry, Reranker, Result};

const COHERE_RERANK_URL: &str = "https://api.cohere.ai/v1/rerank";
const COHERE_MODEL: &str = "rerank-multilingual-v2.0";

const JINA_RERANK_URL: &str = "https://api.jina.ai/v1/rerank";
const JINA_MODEL: &str = "jina-reranker-v1-base-en";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Serialize)]
struct RerankRequest<'a> {
    model: &'a str,
    query: &'a str,
    documents: &'a [String],
    top_n: usize,
}

#[derive(Deserialize)]
struct RerankResponse {
    results: Vec<RerankResponseEntry>,
}

#[derive(Deserialize)]
struct RerankResponseEntry {
    index: usize,
    relevance_score: f32,
}

async fn post_rerank(
    client: &reqwest::Client,
    url: &str,
    api_key: &str,
    request: &RerankRequest<'_>,
    service: &str,
) -> Result<Vec<RerankEntry>> {
    let response = client
        .post(url)
        .bearer_auth(api_key)
        .json(request)
        .send()
        .await
        .map_err(|e| Error::Network(format!("{} rerank request failed: {}", service, e)))?;

    if !response.status().is_success() {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        return Err(Error::Rerank(format!(
            "{} returned {}: {}",
            service, status, body
        )));
    }

    let parsed: RerankResponse = response
        .json()
        .await
        .map_err(|e| Error::Rerank(format!("{} response parse error: {}", service, e)))?;

    Ok(parsed
        .results
        .into_iter()
        .map(|entry| RerankEntry {
            index: entry.index,
            relevance_score: entry.relevance_score,
        })
        .collect())
}

/// Cohere rerank API client.
pub struct CohereReranker {
    client: reqwest::Client,
    api_key: String,
    model: String,
}

impl CohereReranker {
    pub fn new(api_key: impl Into<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| Error::Configuration(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            api_key: api_key.into(),
            model: COHERE_MODEL.to_string(),
        })
    }

    /// Build from the `COHERE_API_KEY` environment variable.
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        let api_key = std::env::var("COHERE_API_KEY")
            .map_err(|_| Error::Configuration("COHERE_API_KEY not set".to_string()))?;
        Self::new(api_key)
    }
}

#[async_trait]
impl Reranker for CohereReranker {
    fn name(&self) -> &str {
        "cohere"
    }

    async fn rerank(
        &self,
        query: &str,
        documents: &[String],
        top_k: usize,
    ) -> Result<Vec<RerankEntry>> {
        let request = RerankRequest {
            model: &self.model,
            query,
            documents,
            top_n: top_k.min(documents.len()),
        };
        post_rerank(&self.client, COHERE_RERANK_URL, &self.api_key, &request, "Cohere").await
    }
}

/// Jina rerank API client.
pub struct JinaReranker {
    client: reqwest::Client,
    api_key: String,
    model: String,
}

impl JinaReranker {
    pub fn new(api_key: impl Into<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| Error::Configuration(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            api_key: api_key.into(),
            model: JINA_MODEL.to_string(),
        })
    }

    /// Build from the `JINA_API_KEY` environment variable.
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        let api_key = std::env::var("JINA_API_KEY")
            .map_err(|_| Error::Configuration("JINA_API_KEY not set".to_string()))?;
        Self::new(api_key)
    }
}

#[async_trait]
impl Reranker for JinaReranker {
    fn name(&self) -> &str {
        "jina"
    }

    async fn rerank(
        &self,
        query: &str,
        documents: &[String],
        top_k: usize,
    ) -> Result<Vec<RerankEntry>> {
        let request = RerankRequest {
            model: &self.model,
            query,
            documents,
            top_n: top_k.min(documents.len()),
        };
        post_rerank(&self.client, JINA_RERANK_URL, &self.api_key, &request, "Jina").await
    }
}

/// Build the configured reranker by provider name.
pub fn reranker_from_env(provider: &str) -> Result<Box<dyn Reranker>> {
    match provider {
        "cohere" => Ok(Box::new(CohereReranker::from_env()?)),
        "jina" => Ok(Box::new(JinaReranker::from_env()?)),
        other => Err(Error::Configuration(format!(
            "Unknown rerank provider: {}",
            other
        ))),
    }
}
