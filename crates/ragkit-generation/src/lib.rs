//! Answer generation for the ragkit pipeline
//!
//! Assembles the Korean RAG prompt and drives the configured LLM providers
//! with automatic fallback.

mod orchestrator;
mod prompt;

pub use orchestrator::{GenerationOrchestrator, GenerationStats};
pub use prompt::{build_context, build_prompt};
