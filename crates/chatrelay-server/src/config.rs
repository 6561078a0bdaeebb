use anyhow::Context;
use chatrelay_ai::{LlmConfig, LlmProvider};
use serde::Deserialize;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

pub const DEFAULT_GREETING: &str = "Hello, how can I help you today?";

const CONFIG_FILE_NAME: &str = "chatrelay.toml";

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// WebSocket endpoint path
    pub path: String,
    /// Plain text frame sent once when a connection opens
    pub greeting: String,
    pub cors_origins: Vec<String>,
    pub llm: LlmConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        let server = ServerSection::default();
        Self {
            host: server.host,
            port: server.port,
            path: server.path,
            greeting: server.greeting,
            cors_origins: server.cors_origins,
            llm: LlmConfig::default(),
        }
    }
}

#[derive(Debug, Deserialize, Default)]
struct FileConfig {
    #[serde(default)]
    server: ServerSection,
    #[serde(default)]
    llm: LlmConfig,
}

#[derive(Debug, Deserialize)]
struct ServerSection {
    #[serde(default = "default_host")]
    host: String,
    #[serde(default = "default_port")]
    port: u16,
    #[serde(default = "default_path")]
    path: String,
    #[serde(default = "default_greeting")]
    greeting: String,
    #[serde(default = "default_cors_origins")]
    cors_origins: Vec<String>,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            path: default_path(),
            greeting: default_greeting(),
            cors_origins: default_cors_origins(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_path() -> String {
    "/chat".to_string()
}

fn default_greeting() -> String {
    DEFAULT_GREETING.to_string()
}

fn default_cors_origins() -> Vec<String> {
    vec!["*".to_string()]
}

impl ServerConfig {
    /// Load from `CHATRELAY_CONFIG` or `./chatrelay.toml`, falling back to
    /// environment variables when neither exists.
    pub fn load() -> anyhow::Result<Self> {
        let config = match config_file_path() {
            Some(path) => Self::load_from_path(&path, |key| env::var(key).ok())?,
            None => Self::from_env_with(|key| env::var(key).ok()),
        };
        config.validate()?;
        Ok(config)
    }

    pub fn load_from_path<F>(path: &Path, lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        let parsed: FileConfig = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config {}", path.display()))?;

        let mut llm = parsed.llm;
        if llm.api_key.is_none() {
            llm.api_key = lookup("OPENAI_API_KEY");
        }

        Ok(Self {
            host: parsed.server.host,
            port: parsed.server.port,
            path: parsed.server.path,
            greeting: parsed.server.greeting,
            cors_origins: parsed.server.cors_origins,
            llm,
        })
    }

    pub fn from_env_with<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let non_empty = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        let provider = non_empty("CHATRELAY_LLM_PROVIDER")
            .and_then(|value| match value.parse::<LlmProvider>() {
                Ok(provider) => Some(provider),
                Err(err) => {
                    tracing::warn!("{}, using default provider", err);
                    None
                }
            })
            .unwrap_or(defaults.llm.provider);

        let llm = LlmConfig {
            provider,
            model: non_empty("CHATRELAY_LLM_MODEL").unwrap_or(defaults.llm.model),
            base_url: non_empty("CHATRELAY_LLM_BASE_URL").unwrap_or(defaults.llm.base_url),
            api_key: non_empty("OPENAI_API_KEY"),
            system_prompt: non_empty("CHATRELAY_LLM_SYSTEM_PROMPT"),
            temperature: non_empty("CHATRELAY_LLM_TEMPERATURE")
                .and_then(|value| value.parse::<f32>().ok()),
            max_tokens: non_empty("CHATRELAY_LLM_MAX_TOKENS")
                .and_then(|value| value.parse::<u32>().ok()),
        };

        Self {
            host: non_empty("CHATRELAY_HOST").unwrap_or(defaults.host),
            port: non_empty("CHATRELAY_PORT")
                .and_then(|value| value.parse::<u16>().ok())
                .unwrap_or(defaults.port),
            path: non_empty("CHATRELAY_PATH").unwrap_or(defaults.path),
            greeting: lookup("CHATRELAY_GREETING").unwrap_or(defaults.greeting),
            cors_origins: non_empty("CHATRELAY_CORS_ORIGINS")
                .map(|value| {
                    value
                        .split(',')
                        .map(|origin| origin.trim().to_string())
                        .filter(|origin| !origin.is_empty())
                        .collect()
                })
                .unwrap_or(defaults.cors_origins),
            llm,
        }
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if !self.path.starts_with('/') || self.path == "/health" {
            anyhow::bail!(
                "WebSocket path must start with '/' and not be /health, got '{}'",
                self.path
            );
        }
        Ok(())
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn config_file_path() -> Option<PathBuf> {
    if let Ok(path) = env::var("CHATRELAY_CONFIG") {
        return Some(PathBuf::from(path));
    }

    let local = Path::new(CONFIG_FILE_NAME);
    local.exists().then(|| local.to_path_buf())
}
