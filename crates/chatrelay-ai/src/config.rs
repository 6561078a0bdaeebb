//! Generation backend settings

use serde::Deserialize;

pub const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com/v1";

/// Which backend serves generation requests
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LlmProvider {
    /// Any OpenAI-compatible chat completions endpoint
    #[default]
    OpenAI,
    /// Offline echo client
    Mock,
}

impl std::str::FromStr for LlmProvider {
    type Err = String;

    fn from_str(value: &str) -> std::result::Result<Self, Self::Err> {
        match value.trim().to_lowercase().as_str() {
            "openai" => Ok(Self::OpenAI),
            "mock" => Ok(Self::Mock),
            other => Err(format!("unknown LLM provider '{}'", other)),
        }
    }
}

/// LLM settings, read from the `[llm]` config section
#[derive(Debug, Clone, Deserialize)]
pub struct LlmConfig {
    #[serde(default)]
    pub provider: LlmProvider,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub system_prompt: Option<String>,
    #[serde(default)]
    pub temperature: Option<f32>,
    #[serde(default)]
    pub max_tokens: Option<u32>,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: LlmProvider::default(),
            model: default_model(),
            base_url: default_base_url(),
            api_key: None,
            system_prompt: None,
            temperature: None,
            max_tokens: None,
        }
    }
}

impl LlmConfig {
    /// Whether requests go to api.openai.com rather than a compatible server.
    pub fn targets_openai(&self) -> bool {
        self.base_url.trim_end_matches('/') == DEFAULT_OPENAI_BASE_URL
    }
}

fn default_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_base_url() -> String {
    DEFAULT_OPENAI_BASE_URL.to_string()
}
