use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::{
    extract::State,
    http::{HeaderName, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use tracing::{error, info, warn};

use crate::platform::{HandlerResponse, InboundEvent};
use crate::relay::{Relay, RelayError};

impl IntoResponse for RelayError {
    fn into_response(self) -> Response {
        match self {
            RelayError::InvalidPayload(e) => {
                warn!("Rejected update: {}", e);
                (StatusCode::BAD_REQUEST, format!("invalid payload: {}", e)).into_response()
            }
            RelayError::Internal(e) => {
                error!("Failed to handle update: {:#}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "internal error").into_response()
            }
        }
    }
}

pub fn router(relay: Arc<Relay>) -> Router {
    Router::new()
        .route("/", post(handle_event))
        .route("/webhook", post(handle_webhook))
        .route("/health", get(health))
        .with_state(relay)
}

/// Function-host contract: `{ "body": "<update json>" }` in, `HandlerResponse` out.
async fn handle_event(
    State(relay): State<Arc<Relay>>,
    body: String,
) -> Result<Json<HandlerResponse>, RelayError> {
    let event: InboundEvent = serde_json::from_str(&body)?;
    Ok(Json(relay.handle(&event).await?))
}

/// Telegram posts the update directly; the answer body is the webhook reply.
async fn handle_webhook(
    State(relay): State<Arc<Relay>>,
    body: String,
) -> Result<Response, RelayError> {
    let response = relay.handle_body(&body).await?;
    Ok(into_http(response))
}

async fn health() -> &'static str {
    "ok"
}

fn into_http(response: HandlerResponse) -> Response {
    let status = StatusCode::from_u16(response.status_code).unwrap_or(StatusCode::OK);
    let mut http = (status, response.body.unwrap_or_default()).into_response();
    for (name, value) in response.headers.unwrap_or_default() {
        match (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(&value),
        ) {
            (Ok(name), Ok(value)) => {
                http.headers_mut().insert(name, value);
            }
            _ => warn!("Dropping invalid response header {}", name),
        }
    }
    http
}

/// Serve the relay until Ctrl-C.
pub async fn run(listen: SocketAddr, relay: Arc<Relay>) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(listen)
        .await
        .with_context(|| format!("Failed to bind {}", listen))?;

    info!("Listening on http://{}", listen);

    axum::serve(listener, router(relay))
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("Shutting down");
        })
        .await
        .context("Server error")?;

    Ok(())
}
