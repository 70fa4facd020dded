//! Google Gemini generateContent client

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::env;
use std::time::Duration;

use ragkit_core::{Completion, Error, LlmProvider, Result, SamplingConfig};

const API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta/models";
const DEFAULT_MODEL: &str = "gemini-2.0-flash";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Serialize)]
struct GenerateRequest<'a> {
    contents: Vec<Content<'a>>,
    #[serde(rename = "generationConfig")]
    generation_config: GenerationConfig,
}

#[derive(Serialize)]
struct Content<'a> {
    parts: Vec<Part<'a>>,
}

#[derive(Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Serialize)]
struct GenerationConfig {
    #[serde(rename = "maxOutputTokens")]
    max_output_tokens: u32,
    temperature: f32,
    #[serde(rename = "topP")]
    top_p: f32,
    #[serde(rename = "topK", skip_serializing_if = "Option::is_none")]
    top_k: Option<u32>,
}

#[derive(Deserialize)]
struct Candidate {
    content: CandidateContent,
}

#[derive(Deserialize)]
struct CandidateContent {
    parts: Vec<CandidatePart>,
}

#[derive(Deserialize)]
struct CandidatePart {
    text: String,
}

#[derive(Deserialize)]
struct UsageMetadata {
    #[serde(rename = "totalTokenCount")]
    total_token_count: u32,
}

#[derive(Deserialize)]
struct GenerateResponse {
    candidates: Vec<Candidate>,
    #[serde(rename = "usageMetadata")]
    usage_metadata: Option<UsageMetadata>,
}

/// Gemini generateContent client.
pub struct GeminiProvider {
    client: Client,
    api_key: String,
    model: String,
}

impl GeminiProvider {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Result<Self> {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| Error::Network(e.to_string()))?;

        Ok(Self {
            client,
            api_key: api_key.into(),
            model: model.into(),
        })
    }

    /// Create a client from `GOOGLE_API_KEY` and optional `GOOGLE_MODEL`.
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        let api_key = env::var("GOOGLE_API_KEY")
            .map_err(|_| Error::Configuration("GOOGLE_API_KEY not set".to_string()))?;
        let model = env::var("GOOGLE_MODEL").unwrap_or_else(|_| DEFAULT_MODEL.to_string());
        Self::new(api_key, model)
    }
}

#[async_trait]
impl LlmProvider for GeminiProvider {
    fn name(&self) -> &str {
        "google"
    }

    fn model_id(&self) -> &str {
        &self.model
    }

    async fn complete(&self, prompt: &str, sampling: &SamplingConfig) -> Result<Completion> {
        let request = GenerateRequest {
            contents: vec![Content {
                parts: vec![Part { text: prompt }],
            }],
            generation_config: GenerationConfig {
                max_output_tokens: sampling.max_tokens,
                temperature: sampling.temperature,
                top_p: sampling.top_p,
                top_k: sampling.top_k,
            },
        };

        let url = format!(
            "{}/{}:generateContent?key={}",
            API_BASE, self.model, self.api_key
        );
        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| Error::Network(format!("Gemini request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Provider {
                provider: "google".to_string(),
                message: format!("HTTP {}: {}", status, body),
            });
        }

        let parsed: GenerateResponse = response.json().await.map_err(|e| Error::Provider {
            provider: "google".to_string(),
            message: format!("Response parse error: {}", e),
        })?;

        let text = parsed
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content.parts.into_iter().next())
            .map(|part| part.text)
            .ok_or_else(|| Error::Provider {
                provider: "google".to_string(),
                message: "Empty candidates in response".to_string(),
            })?;

        Ok(Completion {
            text,
            tokens_used: parsed.usage_metadata.map(|u| u.total_token_count),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_uses_camel_case_fields() {
        let request = GenerateRequest {
            contents: vec![Content {
                parts: vec![Part { text: "질문" }],
            }],
            generation_config: GenerationConfig {
                max_output_tokens: 500,
                temperature: 0.7,
                top_p: 0.95,
                top_k: Some(40),
            },
        };

        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["generationConfig"]["maxOutputTokens"], 500);
        assert_eq!(value["generationConfig"]["topK"], 40);
        assert_eq!(value["contents"][0]["parts"][0]["text"], "질문");
    }

    #[test]
    fn test_response_parsing() {
        let body = r#"{
            "candidates": [{"content": {"parts": [{"text": "답변"}], "role": "model"}}],
            "usageMetadata": {"promptTokenCount": 9, "candidatesTokenCount": 3, "totalTokenCount": 12}
        }"#;
        let parsed: GenerateResponse = serde_json::from_str(body).unwrap();
        assert_eq!(parsed.candidates[0].content.parts[0].text, "답변");
        assert_eq!(parsed.usage_metadata.unwrap().total_token_count, 12);
    }
}
