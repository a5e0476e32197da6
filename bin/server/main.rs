//! Chat Proxy Server
//!
//! Runs the `/chat` relay as a standalone HTTP server.

use anyhow::Result;
use chat_proxy::{run_server, ProxyConfig};
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    // Values already in the environment win over .env
    let dotenv_loaded = dotenv::dotenv().is_ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("chat_proxy=debug,info")),
        )
        .init();

    if dotenv_loaded {
        info!("Loaded environment from .env");
    }

    let config = ProxyConfig::from_env();

    info!("Starting Chat Proxy");
    info!("  Provider: {}", config.provider);
    info!("  Model: {}", config.model);
    info!("  Validation: {:?}", config.validation);

    run_server(config).await
}
