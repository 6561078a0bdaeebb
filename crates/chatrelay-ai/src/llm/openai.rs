//! OpenAI-compatible streaming provider

use async_stream::try_stream;
use futures::StreamExt;
use reqwest::{Client, Response};
use serde::{Deserialize, Serialize};

use crate::config::DEFAULT_OPENAI_BASE_URL;
use crate::error::{AiError, Result};
use crate::http_client::build_http_client;
use crate::llm::client::{FragmentStream, LlmClient};
use crate::llm::retry::{LlmRetryConfig, response_to_error};
use crate::llm::sse::SseDecoder;

const PROVIDER: &str = "openai";

/// OpenAI chat completions client
///
/// Also talks to any server exposing the same `/chat/completions` streaming
/// API (Ollama, vLLM, LM Studio) through [`OpenAIClient::with_base_url`].
#[derive(Clone)]
pub struct OpenAIClient {
    client: Client,
    api_key: Option<String>,
    model: String,
    base_url: String,
    system_prompt: Option<String>,
    temperature: Option<f32>,
    max_tokens: Option<u32>,
    retry_config: LlmRetryConfig,
}

impl OpenAIClient {
    /// Create a new OpenAI client
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            client: build_http_client(),
            api_key: Some(api_key.into()),
            model: "gpt-4o-mini".to_string(),
            base_url: DEFAULT_OPENAI_BASE_URL.to_string(),
            system_prompt: None,
            temperature: None,
            max_tokens: None,
            retry_config: LlmRetryConfig::default(),
        }
    }

    /// Create a client for a local server that needs no API key
    pub fn without_key(base_url: impl Into<String>) -> Self {
        Self {
            api_key: None,
            ..Self::new(String::new()).with_base_url(base_url)
        }
    }

    /// Set the model to use
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Set custom base URL (for API-compatible services)
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(prompt.into());
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    pub fn with_retry_config(mut self, config: LlmRetryConfig) -> Self {
        self.retry_config = config;
        self
    }

    fn build_request(&self, prompt: String) -> OpenAIRequest {
        let mut messages = Vec::with_capacity(2);
        if let Some(system) = &self.system_prompt {
            messages.push(OpenAIMessage {
                role: "system",
                content: system.clone(),
            });
        }
        messages.push(OpenAIMessage {
            role: "user",
            content: prompt,
        });

        OpenAIRequest {
            model: self.model.clone(),
            messages,
            temperature: self.temperature,
            max_tokens: self.max_tokens,
            stream: true,
        }
    }

    /// Open the streaming response, retrying transient failures.
    ///
    /// Retries only happen here, before any fragment has been produced.
    async fn open_stream(&self, body: &OpenAIRequest) -> Result<Response> {
        let url = format!("{}/chat/completions", self.base_url);
        let mut attempt = 0;

        loop {
            let mut request = self
                .client
                .post(&url)
                .header("Content-Type", "application/json")
                .json(body);
            if let Some(api_key) = &self.api_key {
                request = request.bearer_auth(api_key);
            }

            let error = match request.send().await {
                Ok(response) if response.status().is_success() => return Ok(response),
                Ok(response) => response_to_error(response, "OpenAI").await,
                Err(err) => AiError::Http(err),
            };

            if !error.is_retryable() || attempt >= self.retry_config.max_retries {
                return Err(error);
            }

            attempt += 1;
            let delay = self.retry_config.delay_for(attempt, error.retry_after());
            tracing::warn!(
                attempt,
                delay_ms = delay.as_millis() as u64,
                error = %error,
                "Retrying OpenAI stream request"
            );
            tokio::time::sleep(delay).await;
        }
    }
}

#[derive(Serialize)]
struct OpenAIRequest {
    model: String,
    messages: Vec<OpenAIMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    stream: bool,
}

#[derive(Serialize)]
struct OpenAIMessage {
    role: &'static str,
    content: String,
}

// Streaming types

#[derive(Deserialize, Debug)]
struct OpenAIStreamResponse {
    #[serde(default)]
    choices: Vec<OpenAIStreamChoice>,
    error: Option<OpenAIStreamError>,
}

#[derive(Deserialize, Debug)]
struct OpenAIStreamChoice {
    #[serde(default)]
    delta: OpenAIStreamDelta,
}

#[derive(Deserialize, Debug, Default)]
struct OpenAIStreamDelta {
    content: Option<String>,
}

#[derive(Deserialize, Debug)]
struct OpenAIStreamError {
    message: String,
}

/// What a single SSE event contributes to the fragment stream
#[derive(Debug, PartialEq)]
enum StreamEvent {
    Fragments(Vec<String>),
    Done,
}

fn parse_event(data: &str) -> Result<StreamEvent> {
    let data = data.trim();
    if data == "[DONE]" {
        return Ok(StreamEvent::Done);
    }

    let parsed: OpenAIStreamResponse = match serde_json::from_str(data) {
        Ok(parsed) => parsed,
        Err(err) => {
            tracing::debug!(error = %err, "Skipping unparseable stream event");
            return Ok(StreamEvent::Fragments(Vec::new()));
        }
    };

    if let Some(error) = parsed.error {
        return Err(AiError::Llm(error.message));
    }

    let fragments = parsed
        .choices
        .into_iter()
        .filter_map(|choice| choice.delta.content)
        .filter(|content| !content.is_empty())
        .collect();
    Ok(StreamEvent::Fragments(fragments))
}

impl LlmClient for OpenAIClient {
    fn provider(&self) -> &str {
        PROVIDER
    }

    fn model(&self) -> &str {
        &self.model
    }

    fn chat_stream(&self, prompt: String) -> FragmentStream {
        let client = self.clone();
        let body = self.build_request(prompt);

        Box::pin(try_stream! {
            let response = client.open_stream(&body).await?;
            let mut byte_stream = response.bytes_stream();
            let mut decoder = SseDecoder::default();
            let mut finished = false;

            while let Some(chunk) = byte_stream.next().await {
                let chunk = chunk.map_err(|e| AiError::Llm(format!("Stream error: {}", e)))?;
                for data in decoder.push(&chunk) {
                    match parse_event(&data)? {
                        StreamEvent::Done => {
                            finished = true;
                            break;
                        }
                        StreamEvent::Fragments(fragments) => {
                            for fragment in fragments {
                                yield fragment;
                            }
                        }
                    }
                }
                if finished {
                    break;
                }
            }

            if !finished {
                for data in decoder.finish() {
                    if let StreamEvent::Fragments(fragments) = parse_event(&data)? {
                        for fragment in fragments {
                            yield fragment;
                        }
                    }
                }
            }
        })
    }
}
