//! Build the configured generation backend.

use std::sync::Arc;

use crate::config::{LlmConfig, LlmProvider};
use crate::error::{AiError, Result};

use super::{MockLlmClient, OpenAIClient, SharedLlmClient};

/// Pause between echoed words when running against the mock provider.
const MOCK_ECHO_DELAY_MS: u64 = 40;

/// Create the LLM client described by `config`.
///
/// api.openai.com requires an API key; compatible local servers do not.
pub fn create_client(config: &LlmConfig) -> Result<SharedLlmClient> {
    match config.provider {
        LlmProvider::Mock => Ok(Arc::new(
            MockLlmClient::new(config.model.clone()).with_echo_delay(MOCK_ECHO_DELAY_MS),
        )),
        LlmProvider::OpenAI => {
            let api_key = config
                .api_key
                .as_deref()
                .map(str::trim)
                .filter(|key| !key.is_empty());

            let mut client = match api_key {
                Some(key) => OpenAIClient::new(key).with_base_url(config.base_url.clone()),
                None if config.targets_openai() => {
                    return Err(AiError::Config(
                        "an API key is required for api.openai.com (set OPENAI_API_KEY)"
                            .to_string(),
                    ));
                }
                None => OpenAIClient::without_key(config.base_url.clone()),
            }
            .with_model(config.model.clone());

            if let Some(prompt) = &config.system_prompt {
                client = client.with_system_prompt(prompt.clone());
            }
            if let Some(temperature) = config.temperature {
                client = client.with_temperature(temperature);
            }
            if let Some(max_tokens) = config.max_tokens {
                client = client.with_max_tokens(max_tokens);
            }

            Ok(Arc::new(client))
        }
    }
}
