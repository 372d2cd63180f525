use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use teloxide::{requests::Requester, Bot};
use tracing::info;

/// The subset of a Telegram `Update` this service consumes.
/// Every other update kind (edited messages, callbacks, ...) decodes with `message == None`.
#[derive(Debug, Clone, Deserialize)]
pub struct Update {
    #[serde(default)]
    pub message: Option<Message>,
}

impl Update {
    pub fn parse(body: &str) -> serde_json::Result<Self> {
        serde_json::from_str(body)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Message {
    pub chat: Chat,
    pub text: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Chat {
    pub id: i64,
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ParseMode {
    Html,
}

/// A `sendMessage` call returned in the webhook response body.
#[derive(Debug, Clone, Serialize)]
pub struct OutboundPayload {
    pub method: &'static str,
    pub chat_id: i64,
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parse_mode: Option<ParseMode>,
}

impl OutboundPayload {
    pub fn send_message(chat_id: i64, text: String, parse_mode: Option<ParseMode>) -> Self {
        Self {
            method: "sendMessage",
            chat_id,
            text,
            parse_mode,
        }
    }
}

/// Point the bot's webhook at `url`.
pub async fn register_webhook(bot_token: &str, url: &str) -> Result<()> {
    let url = reqwest::Url::parse(url).with_context(|| format!("Invalid webhook URL: {}", url))?;
    let bot = Bot::new(bot_token);
    bot.set_webhook(url.clone())
        .await
        .context("Failed to register webhook with Telegram")?;
    info!("Telegram webhook registered: {}", url);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_update_with_message() {
        let update = Update::parse(
            r#"{"update_id": 1, "message": {"message_id": 5, "chat": {"id": 42, "type": "private"}, "text": "buy milk"}}"#,
        )
        .unwrap();
        let message = update.message.unwrap();
        assert_eq!(message.chat.id, 42);
        assert_eq!(message.text, "buy milk");
    }

    #[test]
    fn test_update_without_message() {
        let update = Update::parse(r#"{"update_id": 2, "edited_message": {}}"#).unwrap();
        assert!(update.message.is_none());
    }

    #[test]
    fn test_update_with_null_message() {
        let update = Update::parse(r#"{"message": null}"#).unwrap();
        assert!(update.message.is_none());
    }

    #[test]
    fn test_message_without_text_is_rejected() {
        assert!(Update::parse(r#"{"message": {"chat": {"id": 1}}}"#).is_err());
    }

    #[test]
    fn test_malformed_json_is_rejected() {
        assert!(Update::parse("{not json").is_err());
    }

    #[test]
    fn test_outbound_payload_with_parse_mode() {
        let payload =
            OutboundPayload::send_message(42, "<pre>x</pre>".to_string(), Some(ParseMode::Html));
        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "method": "sendMessage",
                "chat_id": 42,
                "text": "<pre>x</pre>",
                "parse_mode": "html"
            })
        );
    }

    #[test]
    fn test_outbound_payload_omits_parse_mode() {
        let payload = OutboundPayload::send_message(7, "hi".to_string(), None);
        let json = serde_json::to_value(&payload).unwrap();
        assert!(json.get("parse_mode").is_none());
    }

    #[test]
    fn test_control_characters_survive_encoding() {
        let text = "line1\nline2\t\u{0007}\"quoted\"";
        let payload = OutboundPayload::send_message(1, text.to_string(), None);
        let encoded = serde_json::to_string(&payload).unwrap();
        let decoded: serde_json::Value = serde_json::from_str(&encoded).unwrap();
        assert_eq!(decoded["text"], text);
    }
}
