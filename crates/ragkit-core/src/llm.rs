//! LLM provider trait and generation types

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::Result;

/// Effective sampling configuration for one completion call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SamplingConfig {
    pub max_tokens: u32,
    pub temperature: f32,
    pub top_p: f32,
    pub top_k: Option<u32>,
}

impl Default for SamplingConfig {
    fn default() -> Self {
        Self {
            max_tokens: 2000,
            temperature: 0.7,
            top_p: 0.95,
            top_k: Some(40),
        }
    }
}

/// Raw completion returned by a provider.
///
/// `tokens_used` is `None` when the provider does not report usage; the
/// orchestrator estimates it in that case.
#[derive(Debug, Clone)]
pub struct Completion {
    pub text: String,
    pub tokens_used: Option<u32>,
}

/// Result of one answer generation, including fallback resolution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationResult {
    pub answer: String,
    pub tokens_used: u32,
    pub model_used: String,
    pub provider: String,
    pub generation_time: f64,
    pub sampling: SamplingConfig,
}

/// Answer style requested by the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnswerStyle {
    #[default]
    Standard,
    Detailed,
    Concise,
}

/// Options for one `generate_answer` call.
#[derive(Debug, Clone, Default)]
pub struct GenerationOptions {
    /// Explicit provider override; the configured default otherwise.
    pub provider: Option<String>,
    pub style: AnswerStyle,
    pub max_tokens: Option<u32>,
    pub session_context: String,
}

/// Structured outcome of a provider health check. Never an error.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderHealth {
    pub provider: String,
    pub success: bool,
    pub model: Option<String>,
    pub response_length: Option<usize>,
    pub tokens_used: Option<u32>,
    pub error: Option<String>,
}

/// Trait for LLM completion providers (Gemini, OpenAI, Claude, ...)
///
/// Implementations are long-lived, shared clients. A call-level timeout is
/// the implementation's responsibility; a timeout surfaces as an ordinary
/// provider error and triggers the orchestrator's fallback chain.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Stable provider name used in the fallback order (e.g. "openai").
    fn name(&self) -> &str;

    /// The model id this provider currently targets.
    fn model_id(&self) -> &str;

    /// Run one completion for the assembled prompt.
    async fn complete(&self, prompt: &str, sampling: &SamplingConfig) -> Result<Completion>;
}
