//! Chat pipeline coordinator
//!
//! Drives one chat request end to end: session context, hybrid search,
//! optional rerank, answer generation, source formatting and exchange
//! persistence. Internal failures become a degraded outcome with an apology
//! answer; the only synchronous rejection is an empty message.

use serde_json::json;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;
use tracing::{debug, error, info, warn};

use ragkit_core::{
    AnswerStyle, Error, GenerationOptions, ModelInfo, PipelineConfig, PipelineOutcome, Result,
    Source, content_preview, chunk_marker, document_label, page_marker,
};
use ragkit_generation::{GenerationOrchestrator, GenerationStats};
use ragkit_retrieval::{RerankOptions, RetrievalEngine, RetrievalStats, SearchOptions};
use ragkit_session::{ChatHistory, SessionStats, SessionStore};

use crate::topic::extract_topic;

const DEGRADED_ANSWER: &str = "죄송합니다. 현재 요청을 처리할 수 없습니다. 잠시 후 다시 시도해 주세요.";

/// Per-request knobs accepted alongside the chat message. Unset retrieval
/// fields fall back to the configured defaults.
#[derive(Debug, Clone, Default)]
pub struct ChatOptions {
    pub provider: Option<String>,
    pub response_style: AnswerStyle,
    pub max_tokens: Option<u32>,
    pub search_limit: Option<usize>,
    pub min_score: Option<f32>,
    pub rerank_top_k: Option<usize>,
}

/// Aggregated counters across the pipeline's components.
#[derive(Debug, Clone, serde::Serialize)]
pub struct PipelineStats {
    pub total_requests: u64,
    pub degraded_requests: u64,
    pub error_rate: f64,
    pub total_tokens: u64,
    pub average_latency: f64,
    pub sessions: SessionStats,
    pub retrieval: RetrievalStats,
    pub generation: GenerationStats,
}

pub struct PipelineCoordinator {
    sessions: Arc<SessionStore>,
    retrieval: Arc<RetrievalEngine>,
    generation: Arc<GenerationOrchestrator>,
    config: PipelineConfig,
    total_requests: AtomicU64,
    degraded_requests: AtomicU64,
    total_tokens: AtomicU64,
    /// Cumulative request latency in microseconds.
    total_latency_us: AtomicU64,
}

impl PipelineCoordinator {
    pub fn new(
        sessions: Arc<SessionStore>,
        retrieval: Arc<RetrievalEngine>,
        generation: Arc<GenerationOrchestrator>,
        config: PipelineConfig,
    ) -> Self {
        Self {
            sessions,
            retrieval,
            generation,
            config,
            total_requests: AtomicU64::new(0),
            degraded_requests: AtomicU64::new(0),
            total_tokens: AtomicU64::new(0),
            total_latency_us: AtomicU64::new(0),
        }
    }

    /// Handle one chat message.
    ///
    /// An empty message is rejected up front; any later failure yields a
    /// degraded outcome instead of an error.
    pub async fn handle_chat(
        &self,
        message: &str,
        session_id: Option<&str>,
        options: &ChatOptions,
    ) -> Result<PipelineOutcome> {
        if message.trim().is_empty() {
            return Err(Error::EmptyQuery);
        }
        self.total_requests.fetch_add(1, Ordering::Relaxed);

        let session_id = self.resolve_session(session_id);
        let started = Instant::now();

        match self.run(message, &session_id, options).await {
            Ok(mut outcome) => {
                outcome.session_id = session_id.clone();
                outcome.processing_time = started.elapsed().as_secs_f64();
                self.total_tokens
                    .fetch_add(outcome.tokens_used as u64, Ordering::Relaxed);
                self.total_latency_us
                    .fetch_add(started.elapsed().as_micros() as u64, Ordering::Relaxed);
                self.persist_exchange(&session_id, message, &outcome);
                Ok(outcome)
            }
            Err(e) => {
                error!(session_id = %session_id, "Pipeline failed, returning degraded outcome: {}", e);
                self.degraded_requests.fetch_add(1, Ordering::Relaxed);
                self.total_latency_us
                    .fetch_add(started.elapsed().as_micros() as u64, Ordering::Relaxed);
                Ok(PipelineOutcome {
                    answer: DEGRADED_ANSWER.to_string(),
                    sources: Vec::new(),
                    session_id,
                    processing_time: started.elapsed().as_secs_f64(),
                    tokens_used: 0,
                    topic: extract_topic(message).to_string(),
                    search_results: 0,
                    ranked_results: 0,
                    model_info: None,
                    error: true,
                    error_message: Some(e.to_string()),
                })
            }
        }
    }

    async fn run(
        &self,
        message: &str,
        session_id: &str,
        options: &ChatOptions,
    ) -> Result<PipelineOutcome> {
        let session_context = self.sessions.context_string(session_id);
        debug!(session_id = %session_id, has_context = !session_context.is_empty(), "Pipeline starting");

        let search_options = SearchOptions {
            limit: options.search_limit,
            min_score: options.min_score,
            context: (!session_context.is_empty()).then(|| session_context.clone()),
        };
        let search_results = self.retrieval.search(message, &search_options).await?;

        let rerank_options = RerankOptions {
            top_k: options.rerank_top_k,
            min_score: options.min_score,
        };
        let ranked_results = self
            .retrieval
            .rerank(message, search_results.clone(), &rerank_options)
            .await;

        let generation_options = GenerationOptions {
            provider: options.provider.clone(),
            style: options.response_style,
            max_tokens: options.max_tokens,
            session_context,
        };
        let generated = self
            .generation
            .generate_answer(message, &ranked_results, &generation_options)
            .await?;

        let sources = ranked_results
            .iter()
            .take(self.config.max_sources)
            .enumerate()
            .map(|(index, result)| Source {
                id: index + 1,
                document: document_label(&result.metadata),
                page: page_marker(&result.metadata),
                chunk: chunk_marker(&result.metadata),
                relevance: result.score,
                content_preview: content_preview(&result.content),
            })
            .collect();

        info!(
            session_id = %session_id,
            provider = %generated.provider,
            tokens = generated.tokens_used,
            "Answer generated"
        );

        Ok(PipelineOutcome {
            answer: generated.answer,
            sources,
            session_id: session_id.to_string(),
            processing_time: 0.0,
            tokens_used: generated.tokens_used,
            topic: extract_topic(message).to_string(),
            search_results: search_results.len(),
            ranked_results: ranked_results.len(),
            model_info: Some(ModelInfo {
                provider: generated.provider,
                model: generated.model_used,
                generation_time: generated.generation_time,
                sampling: serde_json::to_value(&generated.sampling)
                    .unwrap_or(serde_json::Value::Null),
            }),
            error: false,
            error_message: None,
        })
    }

    /// Reuse a live session id or create a fresh session.
    fn resolve_session(&self, session_id: Option<&str>) -> String {
        if let Some(id) = session_id {
            if self.sessions.get(id, None).is_ok() {
                return id.to_string();
            }
            warn!(session_id = %id, "Unknown or expired session, creating a new one");
        }
        self.sessions.create(json!({}))
    }

    /// Record the exchange; the answer is already committed, so persistence
    /// failures only log.
    fn persist_exchange(&self, session_id: &str, message: &str, outcome: &PipelineOutcome) {
        let metadata = json!({
            "topic": outcome.topic,
            "tokens_used": outcome.tokens_used,
            "provider": outcome.model_info.as_ref().map(|m| m.provider.clone()),
        });
        if let Err(e) =
            self.sessions
                .record_exchange(session_id, message, &outcome.answer, metadata)
        {
            warn!(session_id = %session_id, "Failed to record exchange: {}", e);
        }
    }

    pub fn create_session(&self, metadata: serde_json::Value) -> String {
        self.sessions.create(metadata)
    }

    /// Flattened chat history, optionally cut to the newest `limit` messages.
    pub fn get_history(&self, session_id: &str, limit: Option<usize>) -> ChatHistory {
        let mut history = self.sessions.history(session_id);
        if let Some(limit) = limit {
            let cut = history.messages.len().saturating_sub(limit);
            history.messages.drain(..cut);
            history.message_count = history.messages.len();
        }
        history
    }

    pub fn delete_session(&self, session_id: &str) -> bool {
        self.sessions.delete(session_id)
    }

    pub async fn stats(&self) -> Result<PipelineStats> {
        let total = self.total_requests.load(Ordering::Relaxed);
        let degraded = self.degraded_requests.load(Ordering::Relaxed);
        let latency_us = self.total_latency_us.load(Ordering::Relaxed);

        Ok(PipelineStats {
            total_requests: total,
            degraded_requests: degraded,
            error_rate: if total > 0 {
                degraded as f64 / total as f64
            } else {
                0.0
            },
            total_tokens: self.total_tokens.load(Ordering::Relaxed),
            average_latency: if total > 0 {
                latency_us as f64 / total as f64 / 1_000_000.0
            } else {
                0.0
            },
            sessions: self.sessions.stats(),
            retrieval: self.retrieval.stats().await?,
            generation: self.generation.stats(),
        })
    }

    pub fn sessions(&self) -> &Arc<SessionStore> {
        &self.sessions
    }

    pub fn retrieval(&self) -> &Arc<RetrievalEngine> {
        &self.retrieval
    }

    pub fn generation(&self) -> &Arc<GenerationOrchestrator> {
        &self.generation
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use ragkit_core::{
        CollectionStats, Completion, DenseEmbedder, EmbeddedChunk, LlmConfig, LlmProvider,
        RetrievalConfig, SamplingConfig, ScrollPage, SearchResult, SessionConfig, SparseVector,
        VectorStore,
    };
    use ragkit_retrieval::{DocumentInput, MemoryVectorStore};

    struct FixedDenseEmbedder;

    #[async_trait]
    impl DenseEmbedder for FixedDenseEmbedder {
        async fn embed_query(&self, _text: &str) -> Result<Vec<f32>> {
            Ok(vec![1.0, 0.0])
        }

        async fn embed_documents(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            Ok(texts.iter().map(|_| vec![1.0, 0.0]).collect())
        }
    }

    struct OkProvider;

    #[async_trait]
    impl LlmProvider for OkProvider {
        fn name(&self) -> &str {
            "google"
        }

        fn model_id(&self) -> &str {
            "test-model"
        }

        async fn complete(&self, _prompt: &str, _sampling: &SamplingConfig) -> Result<Completion> {
            Ok(Completion {
                text: "연차는 15일입니다.".to_string(),
                tokens_used: Some(30),
            })
        }
    }

    struct BrokenStore;

    #[async_trait]
    impl VectorStore for BrokenStore {
        async fn upsert(&self, _chunks: Vec<EmbeddedChunk>) -> Result<Vec<String>> {
            Err(Error::VectorStore("store offline".to_string()))
        }

        async fn search_dense(&self, _v: &[f32], _limit: usize) -> Result<Vec<SearchResult>> {
            Err(Error::VectorStore("store offline".to_string()))
        }

        async fn search_sparse(
            &self,
            _v: &SparseVector,
            _limit: usize,
        ) -> Result<Vec<SearchResult>> {
            Err(Error::VectorStore("store offline".to_string()))
        }

        async fn scroll(&self, _offset: Option<String>, _limit: usize) -> Result<ScrollPage> {
            Err(Error::VectorStore("store offline".to_string()))
        }

        async fn delete(&self, _id: &str) -> Result<bool> {
            Err(Error::VectorStore("store offline".to_string()))
        }

        async fn stats(&self) -> Result<CollectionStats> {
            Ok(CollectionStats {
                points_count: 0,
                vectors_count: 0,
            })
        }
    }

    fn coordinator_with(store: Arc<dyn VectorStore>) -> PipelineCoordinator {
        let retrieval = Arc::new(RetrievalEngine::new(
            Arc::new(FixedDenseEmbedder),
            None,
            store,
            None,
            RetrievalConfig {
                hybrid_enabled: false,
                ..RetrievalConfig::default()
            },
        ));

        let mut generation = GenerationOrchestrator::new(LlmConfig::default());
        generation.register(Arc::new(OkProvider));

        PipelineCoordinator::new(
            Arc::new(SessionStore::new(SessionConfig::default())),
            retrieval,
            Arc::new(generation),
            PipelineConfig::default(),
        )
    }

    async fn seeded_coordinator() -> PipelineCoordinator {
        let store = Arc::new(MemoryVectorStore::new());
        let coordinator = coordinator_with(store);
        coordinator
            .retrieval()
            .add_documents(vec![DocumentInput {
                content: "연차 휴가는 연 15일 부여됩니다.".to_string(),
                metadata: json!({"source_file": "policy.pdf", "page_number": 3}),
            }])
            .await
            .unwrap();
        coordinator
    }

    #[tokio::test]
    async fn test_chat_happy_path() {
        let coordinator = seeded_coordinator().await;

        let outcome = coordinator
            .handle_chat("휴가 정책 알려줘", None, &ChatOptions::default())
            .await
            .unwrap();

        assert!(!outcome.error);
        assert_eq!(outcome.answer, "연차는 15일입니다.");
        assert_eq!(outcome.tokens_used, 30);
        assert_eq!(outcome.sources.len(), 1);
        assert_eq!(outcome.sources[0].id, 1);
        assert_eq!(outcome.sources[0].document, "policy.pdf");
        assert_eq!(outcome.sources[0].page, Some(3));
        assert!(outcome.model_info.is_some());
    }

    #[tokio::test]
    async fn test_retrieval_overrides_reach_the_engine() {
        let coordinator = seeded_coordinator().await;

        // An unreachable per-request floor drops the document the
        // configured default would keep.
        let options = ChatOptions {
            min_score: Some(1.1),
            ..ChatOptions::default()
        };
        let outcome = coordinator
            .handle_chat("휴가 정책 알려줘", None, &options)
            .await
            .unwrap();
        assert!(!outcome.error);
        assert_eq!(outcome.search_results, 0);
        assert!(outcome.sources.is_empty());

        let outcome = coordinator
            .handle_chat("휴가 정책 알려줘", None, &ChatOptions::default())
            .await
            .unwrap();
        assert_eq!(outcome.search_results, 1);
    }

    #[tokio::test]
    async fn test_chat_persists_exchange() {
        let coordinator = seeded_coordinator().await;

        let outcome = coordinator
            .handle_chat("휴가 정책 알려줘", None, &ChatOptions::default())
            .await
            .unwrap();

        let history = coordinator.get_history(&outcome.session_id, None);
        assert_eq!(history.messages.len(), 2);
        assert_eq!(history.messages[0].content, "휴가 정책 알려줘");
        assert_eq!(history.messages[1].content, "연차는 15일입니다.");
    }

    #[tokio::test]
    async fn test_session_id_reused_across_turns() {
        let coordinator = seeded_coordinator().await;

        let first = coordinator
            .handle_chat("휴가 정책 알려줘", None, &ChatOptions::default())
            .await
            .unwrap();
        let second = coordinator
            .handle_chat(
                "더 자세히 설명해줘",
                Some(&first.session_id),
                &ChatOptions::default(),
            )
            .await
            .unwrap();

        assert_eq!(first.session_id, second.session_id);
        assert_eq!(
            coordinator.get_history(&first.session_id, None).messages.len(),
            4
        );
        // Pagination keeps only the newest messages.
        assert_eq!(
            coordinator.get_history(&first.session_id, Some(2)).messages.len(),
            2
        );
    }

    #[tokio::test]
    async fn test_store_failure_yields_degraded_outcome() {
        let coordinator = coordinator_with(Arc::new(BrokenStore));

        let outcome = coordinator
            .handle_chat("휴가 정책 검색", None, &ChatOptions::default())
            .await
            .unwrap();

        assert!(outcome.error);
        assert_eq!(outcome.answer, DEGRADED_ANSWER);
        assert!(outcome.sources.is_empty());
        assert_eq!(outcome.tokens_used, 0);
        assert_eq!(outcome.topic, "search");
        assert!(outcome.error_message.is_some());

        let stats = coordinator.stats().await.unwrap();
        assert_eq!(stats.total_requests, 1);
        assert_eq!(stats.degraded_requests, 1);
    }

    #[tokio::test]
    async fn test_empty_message_is_rejected() {
        let coordinator = seeded_coordinator().await;

        let err = coordinator
            .handle_chat("  ", None, &ChatOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::EmptyQuery));

        // Rejections do not count as requests.
        assert_eq!(coordinator.stats().await.unwrap().total_requests, 0);
    }

    #[tokio::test]
    async fn test_unknown_session_gets_replaced() {
        let coordinator = seeded_coordinator().await;

        let outcome = coordinator
            .handle_chat("휴가 정책 알려줘", Some("no-such-id"), &ChatOptions::default())
            .await
            .unwrap();

        assert_ne!(outcome.session_id, "no-such-id");
        assert!(!outcome.error);
    }
}
