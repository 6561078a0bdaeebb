//! Error types for the generation clients

use thiserror::Error;

/// Generation error types
#[derive(Error, Debug)]
pub enum AiError {
    #[error("LLM error: {0}")]
    Llm(String),

    #[error("{provider} API error ({status}): {message}")]
    LlmHttp {
        provider: String,
        status: u16,
        message: String,
        retry_after_secs: Option<u64>,
    },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl AiError {
    /// Whether a fresh attempt at the same request may succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            AiError::LlmHttp { status, .. } => matches!(status, 408 | 429 | 500..=599),
            AiError::Http(err) => err.is_timeout() || err.is_connect(),
            AiError::Llm(message) => {
                let message = message.to_lowercase();
                ["rate limit", "timeout", "timed out", "overloaded", "connection reset"]
                    .iter()
                    .any(|needle| message.contains(needle))
            }
            AiError::Config(_) | AiError::Json(_) => false,
        }
    }

    /// Server-provided retry hint, if any.
    pub fn retry_after(&self) -> Option<u64> {
        match self {
            AiError::LlmHttp {
                retry_after_secs, ..
            } => *retry_after_secs,
            _ => None,
        }
    }
}

/// Result type alias for generation operations
pub type Result<T> = std::result::Result<T, AiError>;
