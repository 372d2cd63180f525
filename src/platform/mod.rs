pub mod telegram;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Event handed over by the function host. `body` is the JSON-encoded Telegram update.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct InboundEvent {
    pub body: String,
}

/// HTTP-style answer returned to the host, which relays it to Telegram.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct HandlerResponse {
    pub status_code: u16,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub headers: Option<BTreeMap<String, String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
}

impl HandlerResponse {
    /// Bare 200 with nothing for Telegram to execute.
    pub fn empty() -> Self {
        Self {
            status_code: 200,
            headers: None,
            body: None,
        }
    }

    pub fn json(body: String) -> Self {
        let mut headers = BTreeMap::new();
        headers.insert("Content-Type".to_string(), "application/json".to_string());
        Self {
            status_code: 200,
            headers: Some(headers),
            body: Some(body),
        }
    }
}
