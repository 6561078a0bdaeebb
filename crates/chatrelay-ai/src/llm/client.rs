//! LLM client trait and stream types

use std::pin::Pin;
use std::sync::Arc;

use futures::Stream;

use crate::error::Result;

/// Lazy, ordered sequence of generated text fragments.
///
/// The stream ends normally when generation is complete and yields an
/// `Err` item when generation fails. Nothing is requested from the provider
/// until the stream is first polled, and dropping the stream abandons the
/// in-flight generation.
pub type FragmentStream = Pin<Box<dyn Stream<Item = Result<String>> + Send>>;

/// Shared handle to a generation backend.
pub type SharedLlmClient = Arc<dyn LlmClient>;

/// Streaming text generation backend
pub trait LlmClient: Send + Sync {
    /// Get provider name
    fn provider(&self) -> &str;

    /// Get model name
    fn model(&self) -> &str;

    /// Generate a reply to a single user prompt, fragment by fragment.
    ///
    /// No constraint is placed on fragment granularity; characters, words and
    /// tokens are all valid.
    fn chat_stream(&self, prompt: String) -> FragmentStream;
}
