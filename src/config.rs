use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::Path;

use crate::prompts::PromptTemplates;

/// Model family served by the completion endpoint.
#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum ModelKind {
    #[default]
    Lite,
    Full,
}

impl std::fmt::Display for ModelKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ModelKind::Lite => write!(f, "yandexgpt-lite/latest"),
            ModelKind::Full => write!(f, "yandexgpt/latest"),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct CompletionConfig {
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    #[serde(default)]
    pub api_key: String,
    #[serde(default)]
    pub folder_id: String,
    #[serde(default)]
    pub model: ModelKind,
    /// Full model URI; when set, `folder_id` and `model` are not used to build it.
    #[serde(default)]
    pub model_uri: Option<String>,
    #[serde(default)]
    pub temperature: f32,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    /// Request timeout. Unset means the request may block until the host kills the invocation.
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

impl Default for CompletionConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            api_key: String::new(),
            folder_id: String::new(),
            model: ModelKind::default(),
            model_uri: None,
            temperature: 0.0,
            max_tokens: default_max_tokens(),
            timeout_secs: None,
        }
    }
}

impl CompletionConfig {
    /// Returns the effective model URI: the explicit override if present,
    /// otherwise `gpt://<folder_id>/<model>`.
    pub fn effective_model_uri(&self) -> String {
        match &self.model_uri {
            Some(uri) if !uri.is_empty() => uri.clone(),
            _ => format!("gpt://{}/{}", self.folder_id, self.model),
        }
    }
}

/// Which pipeline runs over an incoming message.
#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum RelayMode {
    /// Reply with the message text itself.
    Echo,
    #[default]
    Extract,
    /// Classify first, extract only for calendar events.
    Classify,
}

#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum ReplyFormat {
    #[default]
    Html,
    CodeFence,
}

/// What to do with a non-200 answer from the completion endpoint.
#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum ErrorStatusPolicy {
    #[default]
    ReplyRaw,
    ParseAnyway,
}

#[derive(Debug, Deserialize, Clone)]
pub struct RelayConfig {
    #[serde(default)]
    pub mode: RelayMode,
    #[serde(default)]
    pub reply_format: ReplyFormat,
    #[serde(default)]
    pub on_error_status: ErrorStatusPolicy,
    #[serde(default = "default_utc_offset_hours")]
    pub utc_offset_hours: i32,
    #[serde(default = "default_timezone_label")]
    pub timezone_label: String,
    #[serde(default = "default_date_format")]
    pub date_format: String,
    #[serde(default)]
    pub prompts: PromptTemplates,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            mode: RelayMode::default(),
            reply_format: ReplyFormat::default(),
            on_error_status: ErrorStatusPolicy::default(),
            utc_offset_hours: default_utc_offset_hours(),
            timezone_label: default_timezone_label(),
            date_format: default_date_format(),
            prompts: PromptTemplates::default(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_listen")]
    pub listen: SocketAddr,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct TelegramConfig {
    #[serde(default)]
    pub bot_token: Option<String>,
    /// Public URL Telegram should deliver updates to.
    #[serde(default)]
    pub webhook_url: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    #[serde(default = "default_server_config")]
    pub server: ServerConfig,
    #[serde(default)]
    pub completion: CompletionConfig,
    #[serde(default)]
    pub relay: RelayConfig,
    #[serde(default)]
    pub telegram: TelegramConfig,
}

fn default_endpoint() -> String {
    "https://llm.api.cloud.yandex.net/foundationModels/v1/completion".to_string()
}

fn default_max_tokens() -> u32 {
    2000
}

fn default_utc_offset_hours() -> i32 {
    3
}

fn default_timezone_label() -> String {
    "MSK".to_string()
}

fn default_date_format() -> String {
    "YYYY-MM-DDTHH:MM:SS+03:00".to_string()
}

fn default_listen() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], 8080))
}

fn default_server_config() -> ServerConfig {
    ServerConfig {
        listen: default_listen(),
    }
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let mut config = Self::parse(&content)?;
        config.apply_env(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).context("Failed to parse config file")
    }

    /// Overlay secrets and deployment ids from the environment.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(key) = lookup("COMPLETION_API_KEY").filter(|v| !v.is_empty()) {
            self.completion.api_key = key;
        }
        if let Some(folder) = lookup("COMPLETION_FOLDER_ID").filter(|v| !v.is_empty()) {
            self.completion.folder_id = folder;
        }
        if let Some(token) = lookup("TELEGRAM_BOT_TOKEN").filter(|v| !v.is_empty()) {
            self.telegram.bot_token = Some(token);
        }
    }

    pub fn validate(&self) -> Result<()> {
        let offset = self.relay.utc_offset_hours.checked_mul(3600);
        if offset.and_then(chrono::FixedOffset::east_opt).is_none() {
            anyhow::bail!("relay.utc_offset_hours out of range: {}", self.relay.utc_offset_hours);
        }
        if self.relay.mode == RelayMode::Echo {
            return Ok(());
        }
        if self.completion.api_key.is_empty() {
            anyhow::bail!("completion.api_key is empty and COMPLETION_API_KEY is not set");
        }
        if self.completion.model_uri.is_none() && self.completion.folder_id.is_empty() {
            anyhow::bail!("completion.folder_id is required unless completion.model_uri is set");
        }
        Ok(())
    }

    /// Webhook registration settings, present only when both token and URL are configured.
    pub fn webhook_registration(&self) -> Option<(&str, &str)> {
        match (&self.telegram.bot_token, &self.telegram.webhook_url) {
            (Some(token), Some(url)) if !token.is_empty() && !url.is_empty() => {
                Some((token.as_str(), url.as_str()))
            }
            _ => None,
        }
    }
}
