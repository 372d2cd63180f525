use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::{CompletionConfig, ErrorStatusPolicy};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    #[allow(dead_code)]
    Assistant,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CompletionMessage {
    pub role: Role,
    pub text: String,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CompletionOptions {
    pub stream: bool,
    pub temperature: f32,
    pub max_tokens: u32,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CompletionRequest {
    pub model_uri: String,
    pub completion_options: CompletionOptions,
    pub messages: Vec<CompletionMessage>,
}

impl CompletionRequest {
    /// One system instruction followed by one user message.
    pub fn new(config: &CompletionConfig, system_prompt: &str, user_text: &str) -> Self {
        Self {
            model_uri: config.effective_model_uri(),
            completion_options: CompletionOptions {
                stream: false,
                temperature: config.temperature,
                max_tokens: config.max_tokens,
            },
            messages: vec![
                CompletionMessage {
                    role: Role::System,
                    text: system_prompt.to_string(),
                },
                CompletionMessage {
                    role: Role::User,
                    text: user_text.to_string(),
                },
            ],
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct CompletionResponse {
    pub result: CompletionResult,
}

#[derive(Debug, Deserialize)]
pub struct CompletionResult {
    pub alternatives: Vec<Alternative>,
}

#[derive(Debug, Deserialize)]
#[allow(dead_code)]
pub struct Alternative {
    pub message: AlternativeMessage,
    #[serde(default)]
    pub status: String,
}

#[derive(Debug, Deserialize)]
#[allow(dead_code)]
pub struct AlternativeMessage {
    #[serde(default)]
    pub role: String,
    pub text: String,
}

impl CompletionResponse {
    pub fn into_first_text(self) -> Option<String> {
        self.result
            .alternatives
            .into_iter()
            .next()
            .map(|alt| alt.message.text)
    }
}

/// Status and body of a completion call, before interpretation.
#[derive(Debug, Clone, PartialEq)]
pub struct RawCompletion {
    pub status: u16,
    pub body: String,
}

/// Text recovered from a completion call.
#[derive(Debug, Clone, PartialEq)]
pub enum Completion {
    /// First alternative of a well-formed response.
    Text(String),
    /// Response body passed through as-is (error status or unparsable body).
    Raw(String),
}

impl Completion {
    pub fn text(&self) -> &str {
        match self {
            Completion::Text(text) | Completion::Raw(text) => text,
        }
    }
}

impl RawCompletion {
    pub fn interpret(self, policy: ErrorStatusPolicy) -> Completion {
        if self.status != 200 && policy == ErrorStatusPolicy::ReplyRaw {
            warn!("Completion API returned status {}", self.status);
            return Completion::Raw(self.body);
        }

        match serde_json::from_str::<CompletionResponse>(&self.body) {
            Ok(response) => match response.into_first_text() {
                Some(text) => Completion::Text(text),
                None => {
                    warn!("Completion response has no alternatives");
                    Completion::Raw(self.body)
                }
            },
            Err(e) => {
                warn!(
                    "Failed to parse completion response (status {}): {}",
                    self.status, e
                );
                Completion::Raw(self.body)
            }
        }
    }
}

/// A text-completion backend.
#[async_trait]
pub trait CompletionApi: Send + Sync {
    async fn complete(&self, request: &CompletionRequest) -> Result<RawCompletion>;
}

pub struct CompletionClient {
    client: reqwest::Client,
    config: CompletionConfig,
}

impl CompletionClient {
    pub fn new(config: CompletionConfig) -> Result<Self> {
        let mut builder = reqwest::Client::builder();
        if let Some(secs) = config.timeout_secs {
            builder = builder.timeout(Duration::from_secs(secs));
        }
        let client = builder.build().context("Failed to build HTTP client")?;
        Ok(Self { client, config })
    }
}

#[async_trait]
impl CompletionApi for CompletionClient {
    async fn complete(&self, request: &CompletionRequest) -> Result<RawCompletion> {
        debug!(
            "Sending completion request to {} (model {})",
            self.config.endpoint, request.model_uri
        );

        let mut builder = self
            .client
            .post(&self.config.endpoint)
            .header("Authorization", format!("Api-Key {}", self.config.api_key))
            .json(request);
        if !self.config.folder_id.is_empty() {
            builder = builder.header("x-folder-id", &self.config.folder_id);
        }

        let response = builder
            .send()
            .await
            .context("Failed to send request to completion API")?;

        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .context("Failed to read completion API response")?;

        debug!("Completion API answered {} ({} bytes)", status, body.len());
        Ok(RawCompletion { status, body })
    }
}
