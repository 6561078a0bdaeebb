//! LLM module - streaming generation backends

mod client;
mod factory;
mod mock_client;
mod openai;
mod retry;
mod sse;

pub use client::{FragmentStream, LlmClient, SharedLlmClient};
pub use factory::create_client;
pub use mock_client::{MockLlmClient, MockReply, MockStep, MockStepKind};
pub use openai::OpenAIClient;
pub use retry::LlmRetryConfig;
