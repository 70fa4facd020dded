//! Error types for the ragkit pipeline

use thiserror::Error;

/// Result type alias using our custom Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Core error types for the RAG pipeline
#[derive(Error, Debug)]
pub enum Error {
    #[error("Query is empty")]
    EmptyQuery,

    #[error("Session not found: {0}")]
    SessionNotFound(String),

    #[error("Session expired: {0}")]
    SessionExpired(String),

    #[error("Invalid session: {0}")]
    InvalidSession(String),

    #[error("Embedding error: {0}")]
    Embedding(String),

    #[error("Vector store error: {0}")]
    VectorStore(String),

    #[error("Rerank error: {0}")]
    Rerank(String),

    #[error("Provider {provider} error: {message}")]
    Provider { provider: String, message: String },

    #[error("All providers failed. Last error: {last_error}")]
    AllProvidersFailed { last_error: String },

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Timeout error: {0}")]
    Timeout(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Other error: {0}")]
    Other(String),
}

impl Error {
    /// Whether the error invalidates a session lookup.
    pub fn is_session_invalid(&self) -> bool {
        matches!(
            self,
            Error::SessionNotFound(_) | Error::SessionExpired(_) | Error::InvalidSession(_)
        )
    }
}

impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Error::Other(err.to_string())
    }
}
