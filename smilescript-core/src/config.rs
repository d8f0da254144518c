use std::collections::HashMap;

use config::{Config, Environment, File};
use serde::Deserialize;

use crate::error::SmileError;

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct SmileConfig {
    pub http: HttpConfig,
    pub database: DatabaseConfig,
    pub summarizer: SummarizerConfig,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct HttpConfig {
    pub host: String,
    pub port: u16,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8000,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "sqlite://smile_script.db".to_string(),
            max_connections: 5,
        }
    }
}

/// Remote summarization settings (OpenAI chat completions).
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct SummarizerConfig {
    /// Administrative switch for the remote provider
    pub use_remote: bool,
    pub api_key: Option<String>,
    pub model: String,
    pub base_url: String,
    pub timeout_seconds: u64,
    pub max_tokens: u32,
    pub temperature: f32,
}

impl Default for SummarizerConfig {
    fn default() -> Self {
        Self {
            use_remote: false,
            api_key: None,
            model: "gpt-3.5-turbo".to_string(),
            base_url: "https://api.openai.com/v1".to_string(),
            timeout_seconds: 30,
            max_tokens: 150,
            temperature: 0.5,
        }
    }
}

impl SummarizerConfig {
    /// The configured key, ignoring blank values.
    pub fn api_key(&self) -> Option<&str> {
        self.api_key
            .as_deref()
            .map(str::trim)
            .filter(|k| !k.is_empty())
    }

    /// Remote summarization is only attempted when switched on AND a key is present.
    pub fn remote_enabled(&self) -> bool {
        self.use_remote && self.api_key().is_some()
    }
}

impl SmileConfig {
    /// Load from defaults, an optional TOML file, `SMILESCRIPT__*` variables and
    /// the conventional `USE_OPENAI_API` / `OPENAI_API_KEY` / `OPENAI_MODEL` /
    /// `DATABASE_URL` variables, in increasing order of precedence.
    pub fn load(path: &str) -> Result<Self, SmileError> {
        Self::load_with_env(path, std::env::vars().collect())
    }

    /// Same as [`SmileConfig::load`] but reads variables from `env` instead of
    /// the process environment.
    pub fn load_with_env(path: &str, env: HashMap<String, String>) -> Result<Self, SmileError> {
        let use_remote = env
            .get("USE_OPENAI_API")
            .map(|v| v.trim().eq_ignore_ascii_case("true"));
        let api_key = env.get("OPENAI_API_KEY").cloned();
        let model = env.get("OPENAI_MODEL").cloned();
        let database_url = env.get("DATABASE_URL").cloned();

        let s = Config::builder()
            .add_source(File::with_name(path).required(false))
            .add_source(
                Environment::with_prefix("SMILESCRIPT")
                    .separator("__")
                    .try_parsing(true)
                    .source(Some(env)),
            )
            .set_override_option("summarizer.use_remote", use_remote)?
            .set_override_option("summarizer.api_key", api_key)?
            .set_override_option("summarizer.model", model)?
            .set_override_option("database.url", database_url)?
            .build()?;

        let mut config: SmileConfig = s.try_deserialize()?;

        if config.summarizer.use_remote && config.summarizer.api_key().is_none() {
            tracing::warn!(
                "Remote summarization is enabled but no OpenAI API key is configured; \
                 falling back to local summaries"
            );
            config.summarizer.use_remote = false;
        }

        Ok(config)
    }
}
