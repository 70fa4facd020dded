//! Generation orchestrator
//!
//! Owns the provider registry and walks the fallback chain: the requested
//! (or default) provider first, then the entries of the fallback order
//! that come after it. Unregistered names in the order are skipped without
//! counting as failures.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Instant;
use tracing::{info, warn};

use ragkit_core::{
    Completion, Error, GenerationOptions, GenerationResult, LlmConfig, LlmProvider,
    ProviderHealth, Result, SamplingConfig, SearchResult, estimate_tokens,
};

use crate::prompt;

/// Snapshot of the orchestrator counters.
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct GenerationStats {
    pub total_generations: u64,
    pub generations_by_provider: HashMap<String, u64>,
    pub total_tokens: u64,
    pub fallback_count: u64,
    pub error_count: u64,
    pub average_generation_time: f64,
}

impl GenerationStats {
    fn record(&mut self, provider: &str, tokens: u32, generation_time: f64, fell_back: bool) {
        self.total_generations += 1;
        *self
            .generations_by_provider
            .entry(provider.to_string())
            .or_insert(0) += 1;
        self.total_tokens += tokens as u64;
        if fell_back {
            self.fallback_count += 1;
        }

        let n = self.total_generations as f64;
        self.average_generation_time =
            (self.average_generation_time * (n - 1.0) + generation_time) / n;
    }
}

pub struct GenerationOrchestrator {
    providers: HashMap<String, Arc<dyn LlmProvider>>,
    config: LlmConfig,
    stats: Mutex<GenerationStats>,
}

impl GenerationOrchestrator {
    pub fn new(config: LlmConfig) -> Self {
        Self {
            providers: HashMap::new(),
            config,
            stats: Mutex::new(GenerationStats::default()),
        }
    }

    /// Register a provider under its own name.
    pub fn register(&mut self, provider: Arc<dyn LlmProvider>) {
        self.providers.insert(provider.name().to_string(), provider);
    }

    pub fn available_providers(&self) -> Vec<String> {
        let mut names: Vec<String> = self.providers.keys().cloned().collect();
        names.sort();
        names
    }

    /// The providers to try, in order, for one generation.
    ///
    /// After the initial provider the chain continues with the entries of
    /// the fallback order that come after it; providers earlier in the
    /// order are never retried, and a provider outside the order gets no
    /// fallback at all.
    fn attempt_chain(&self, requested: Option<&str>) -> Vec<String> {
        let first = requested
            .unwrap_or(&self.config.default_provider)
            .to_string();

        let mut chain = vec![first.clone()];
        if self.config.auto_fallback {
            if let Some(position) = self
                .config
                .fallback_order
                .iter()
                .position(|name| *name == first)
            {
                for name in &self.config.fallback_order[position + 1..] {
                    if !chain.contains(name) {
                        chain.push(name.clone());
                    }
                }
            }
        }
        chain
    }

    /// Generate an answer from the query and its retrieved context.
    ///
    /// Walks the fallback chain until a provider succeeds; all registered
    /// providers failing yields `AllProvidersFailed` carrying the last error.
    pub async fn generate_answer(
        &self,
        query: &str,
        results: &[SearchResult],
        options: &GenerationOptions,
    ) -> Result<GenerationResult> {
        let context_text = prompt::build_context(results);
        let full_prompt = prompt::build_prompt(
            query,
            &context_text,
            &options.session_context,
            options.style,
        );

        let sampling = SamplingConfig {
            max_tokens: options.max_tokens.unwrap_or(self.config.max_tokens),
            temperature: self.config.temperature,
            ..SamplingConfig::default()
        };

        let chain = self.attempt_chain(options.provider.as_deref());
        let mut last_error: Option<Error> = None;
        let mut attempted = 0usize;

        for name in &chain {
            let Some(provider) = self.providers.get(name) else {
                continue;
            };
            attempted += 1;

            let started = Instant::now();
            match provider.complete(&full_prompt, &sampling).await {
                Ok(Completion { text, tokens_used }) => {
                    let generation_time = started.elapsed().as_secs_f64();
                    let tokens = tokens_used.unwrap_or_else(|| estimate_tokens(&text));
                    let fell_back = attempted > 1;

                    if fell_back {
                        info!(provider = %name, "Fallback provider succeeded");
                    }
                    if let Ok(mut stats) = self.stats.lock() {
                        stats.record(name, tokens, generation_time, fell_back);
                    }

                    return Ok(GenerationResult {
                        answer: text,
                        tokens_used: tokens,
                        model_used: provider.model_id().to_string(),
                        provider: name.clone(),
                        generation_time,
                        sampling,
                    });
                }
                Err(e) => {
                    warn!(provider = %name, "Generation attempt failed: {}", e);
                    if let Ok(mut stats) = self.stats.lock() {
                        stats.error_count += 1;
                    }
                    last_error = Some(e);
                }
            }
        }

        let last_error = last_error
            .map(|e| e.to_string())
            .unwrap_or_else(|| "No providers configured".to_string());
        Err(Error::AllProvidersFailed { last_error })
    }

    /// Probe one provider with a trivial prompt. Always returns a report,
    /// never an error.
    pub async fn test_provider(&self, name: &str) -> ProviderHealth {
        let Some(provider) = self.providers.get(name) else {
            return ProviderHealth {
                provider: name.to_string(),
                success: false,
                model: None,
                response_length: None,
                tokens_used: None,
                error: Some(format!("Provider not configured: {}", name)),
            };
        };

        let sampling = SamplingConfig {
            max_tokens: 50,
            ..SamplingConfig::default()
        };
        match provider.complete("안녕하세요", &sampling).await {
            Ok(completion) => ProviderHealth {
                provider: name.to_string(),
                success: true,
                model: Some(provider.model_id().to_string()),
                response_length: Some(completion.text.chars().count()),
                tokens_used: completion.tokens_used,
                error: None,
            },
            Err(e) => ProviderHealth {
                provider: name.to_string(),
                success: false,
                model: Some(provider.model_id().to_string()),
                response_length: None,
                tokens_used: None,
                error: Some(e.to_string()),
            },
        }
    }

    pub fn stats(&self) -> GenerationStats {
        self.stats
            .lock()
            .map(|s| s.clone())
            .unwrap_or_default()
    }

    pub fn config(&self) -> &LlmConfig {
        &self.config
    }
}
