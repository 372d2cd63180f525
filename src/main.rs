mod config;
mod llm;
mod platform;
mod prompts;
mod relay;
mod reply;
mod server;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::Config;
use crate::llm::CompletionClient;
use crate::relay::Relay;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tg_relay=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config_path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("config.toml"));

    info!("Loading configuration from: {}", config_path.display());
    let config = Config::load(&config_path)
        .with_context(|| format!("Failed to load config from {}", config_path.display()))?;

    info!("Configuration loaded successfully");
    info!("  Mode: {:?}", config.relay.mode);
    info!("  Model: {}", config.completion.effective_model_uri());
    info!("  Endpoint: {}", config.completion.endpoint);
    info!("  Reply format: {:?}", config.relay.reply_format);

    if let Some((token, url)) = config.webhook_registration() {
        if let Err(e) = platform::telegram::register_webhook(token, url).await {
            warn!("Webhook registration failed: {:#}", e);
        }
    }

    let completion = CompletionClient::new(config.completion.clone())?;
    let relay = Arc::new(Relay::new(
        Arc::new(completion),
        config.completion.clone(),
        config.relay.clone(),
    ));

    server::run(config.server.listen, relay).await
}
