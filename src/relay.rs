use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{debug, error, info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::config::{CompletionConfig, RelayConfig, RelayMode};
use crate::llm::{Completion, CompletionApi, CompletionRequest};
use crate::platform::telegram::{OutboundPayload, Update};
use crate::platform::{HandlerResponse, InboundEvent};
use crate::prompts::{Category, PromptContext};
use crate::reply::Reply;

#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    /// The update body is not JSON or does not have the expected shape.
    #[error("invalid payload: {0}")]
    InvalidPayload(#[from] serde_json::Error),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

/// Turns one Telegram update into one `sendMessage` webhook answer.
/// Holds only immutable configuration and the completion backend.
pub struct Relay {
    completion: Arc<dyn CompletionApi>,
    completion_config: CompletionConfig,
    config: RelayConfig,
}

impl Relay {
    pub fn new(
        completion: Arc<dyn CompletionApi>,
        completion_config: CompletionConfig,
        config: RelayConfig,
    ) -> Self {
        Self {
            completion,
            completion_config,
            config,
        }
    }

    pub async fn handle(&self, event: &InboundEvent) -> Result<HandlerResponse, RelayError> {
        self.handle_body(&event.body).await
    }

    /// Process a raw update body.
    pub async fn handle_body(&self, body: &str) -> Result<HandlerResponse, RelayError> {
        let update = Update::parse(body)?;

        let Some(message) = update.message else {
            debug!("Update carries no message, nothing to do");
            return Ok(HandlerResponse::empty());
        };

        let span = info_span!(
            "message",
            request_id = %Uuid::new_v4(),
            chat_id = message.chat.id
        );

        async move {
            info!("Message received ({} chars)", message.text.chars().count());

            let reply = match self.reply_for(&message.text).await {
                Ok(reply) => reply,
                Err(e) => {
                    error!("Error processing message: {:#}", e);
                    Reply::plain(format!("Error: {}", e))
                }
            };

            let payload =
                OutboundPayload::send_message(message.chat.id, reply.text, reply.parse_mode);
            let body =
                serde_json::to_string(&payload).context("Failed to encode outbound payload")?;
            Ok::<_, RelayError>(HandlerResponse::json(body))
        }
        .instrument(span)
        .await
    }

    async fn reply_for(&self, text: &str) -> Result<Reply> {
        match self.config.mode {
            RelayMode::Echo => Ok(Reply::plain(text)),
            RelayMode::Extract => {
                let details = self.complete(&self.config.prompts.extraction, text).await?;
                Ok(Reply::formatted(details.text(), self.config.reply_format))
            }
            RelayMode::Classify => self.classify_then_extract(text).await,
        }
    }

    async fn classify_then_extract(&self, text: &str) -> Result<Reply> {
        let label = match self
            .complete(&self.config.prompts.classification, text)
            .await?
        {
            Completion::Text(label) => label,
            Completion::Raw(raw) => return Ok(Reply::formatted(&raw, self.config.reply_format)),
        };

        match Category::parse(&label) {
            Some(Category::CalendarEvent) => {
                info!("Message classified as {}, extracting details", Category::CalendarEvent);
                let details = self.complete(&self.config.prompts.extraction, text).await?;
                Ok(Reply::formatted(details.text(), self.config.reply_format))
            }
            Some(category) => {
                info!("Message classified as {}", category);
                Ok(Reply::plain(category.label()))
            }
            None => {
                warn!("Classifier answered with unknown category: {:?}", label);
                Ok(Reply::plain(format!("Unrecognized category: {}", label.trim())))
            }
        }
    }

    /// One completion call with `template` rendered as the system prompt.
    async fn complete(&self, template: &str, text: &str) -> Result<Completion> {
        let context = PromptContext::current(
            self.config.utc_offset_hours,
            &self.config.timezone_label,
            &self.config.date_format,
        )?;
        let request = CompletionRequest::new(&self.completion_config, &context.render(template), text);
        let raw = self.completion.complete(&request).await?;
        Ok(raw.interpret(self.config.on_error_status))
    }
}
