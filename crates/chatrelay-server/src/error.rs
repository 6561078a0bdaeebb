use chatrelay_ai::AiError;
use thiserror::Error;

/// Why a chat turn (and with it the connection) ended early
#[derive(Error, Debug)]
pub enum SessionError {
    #[error("generation failed: {0}")]
    Generation(#[from] AiError),

    #[error("transport error: {0}")]
    Transport(#[from] axum::Error),

    #[error("failed to encode envelope: {0}")]
    Encode(#[from] serde_json::Error),
}

impl SessionError {
    /// Generation failures are reported to the client with a close frame;
    /// transport failures leave nothing to report to.
    pub fn is_generation(&self) -> bool {
        matches!(self, SessionError::Generation(_))
    }
}
