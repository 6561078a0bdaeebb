//! Streaming text generation for ChatRelay.
//!
//! The relay only needs one capability from a model: given a prompt, produce
//! a lazy sequence of text fragments that either completes or fails. This
//! crate defines that capability ([`LlmClient`]) and ships an
//! OpenAI-compatible implementation plus a scripted mock.

pub mod config;
pub mod error;
mod http_client;
pub mod llm;

pub use config::{LlmConfig, LlmProvider};
pub use error::{AiError, Result};
pub use llm::{
    FragmentStream, LlmClient, LlmRetryConfig, MockLlmClient, MockReply, MockStep, MockStepKind,
    OpenAIClient, SharedLlmClient, create_client,
};
