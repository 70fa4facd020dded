//! Hosted provider clients for the ragkit pipeline
//!
//! Each client implements the `LlmProvider` trait from ragkit-core; the
//! OpenAI module also supplies the dense embedder. Construction is from
//! explicit values or environment variables, and a missing key simply means
//! that provider stays unregistered.

mod anthropic;
mod gemini;
mod openai;

pub use anthropic::AnthropicProvider;
pub use gemini::GeminiProvider;
pub use openai::{OpenAiEmbedder, OpenAiProvider};
