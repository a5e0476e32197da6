//! HTTP surface of the proxy
//!
//! ```text
//! GET  /        - liveness text
//! GET  /health  - JSON health report
//! POST /chat    - relay a conversation to the configured provider
//! ```

use crate::config::ProxyConfig;
use crate::error::ChatError;
use crate::service::ChatService;
use crate::types::{ChatResponse, HealthResponse};
use anyhow::Context;
use axum::{
    body::Bytes,
    extract::{rejection::BytesRejection, DefaultBodyLimit, State},
    http::{header::CONTENT_TYPE, HeaderMap},
    routing::{get, post},
    Json, Router,
};
use chrono::{SecondsFormat, Utc};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

pub const LIVENESS_TEXT: &str = "Chatbot server is running";
pub const INVALID_JSON: &str = "request body must be valid JSON";

// ============================================================================
// SERVER STATE
// ============================================================================

pub struct AppState {
    pub service: ChatService,
}

impl AppState {
    pub fn new(config: ProxyConfig) -> anyhow::Result<Self> {
        Ok(Self {
            service: ChatService::new(Arc::new(config))?,
        })
    }

    pub fn config(&self) -> &ProxyConfig {
        self.service.config()
    }
}

// ============================================================================
// HANDLERS
// ============================================================================

pub async fn root() -> &'static str {
    LIVENESS_TEXT
}

pub async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let config = state.config();
    Json(HealthResponse {
        status: "healthy".to_string(),
        timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
        api_key_configured: config.api_key_configured(),
        provider: config.provider.to_string(),
        model: config.model.clone(),
    })
}

/// POST /chat
///
/// Body: `{ "messages": [{ "role", "content" }, ...], "temperature"?, "max_tokens"? }`
/// Response: `{ "reply", "model", "usage" }`
pub async fn chat(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    payload: Result<Bytes, BytesRejection>,
) -> Result<Json<ChatResponse>, ChatError> {
    let bytes = payload.map_err(|rejection| {
        warn!("Rejected /chat body: {}", rejection.body_text());
        ChatError::from(rejection)
    })?;
    let body = parse_chat_body(&headers, &bytes)?;

    state.service.handle_chat(&body).await.map(Json)
}

/// Bodies not declared as JSON are read as `{}`, so they still reach the
/// credential check and `messages` validation.
fn parse_chat_body(headers: &HeaderMap, bytes: &[u8]) -> Result<serde_json::Value, ChatError> {
    if !is_json_content_type(headers) || bytes.iter().all(u8::is_ascii_whitespace) {
        return Ok(serde_json::Value::Object(Default::default()));
    }

    serde_json::from_slice(bytes).map_err(|e| {
        warn!("Invalid JSON in /chat body: {}", e);
        ChatError::BadRequest(INVALID_JSON.to_string())
    })
}

fn is_json_content_type(headers: &HeaderMap) -> bool {
    let Some(value) = headers.get(CONTENT_TYPE).and_then(|v| v.to_str().ok()) else {
        return false;
    };
    let essence = value
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();

    essence == "application/json" || (essence.starts_with("application/") && essence.ends_with("+json"))
}

// ============================================================================
// SERVER STARTUP
// ============================================================================

pub fn router(state: Arc<AppState>) -> Router {
    let max_body_bytes = state.config().max_body_bytes;

    Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .route("/chat", post(chat))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(
                    CorsLayer::new()
                        .allow_origin(Any)
                        .allow_methods(Any)
                        .allow_headers(Any),
                )
                .layer(DefaultBodyLimit::max(max_body_bytes)),
        )
        .with_state(state)
}

pub async fn run_server(config: ProxyConfig) -> anyhow::Result<()> {
    config.validate().context("Refusing to start")?;

    if !config.api_key_configured() {
        warn!(
            "{} is not set. The /chat endpoint will return 500 until you set it.",
            config.provider.env_key()
        );
    }

    let addr = config.bind_addr();
    let provider = config.provider;
    let model = config.model.clone();
    let state = Arc::new(AppState::new(config)?);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    info!("╔══════════════════════════════════════════════════════════════╗");
    info!("║                     Chat Proxy Server                        ║");
    info!("╠══════════════════════════════════════════════════════════════╣");
    info!("║  Provider:     {:46}║", provider.name());
    info!("║  Model:        {:46}║", model);
    info!("║  Listening on: {:46}║", addr);
    info!("╠══════════════════════════════════════════════════════════════╣");
    info!("║    GET  /        - Liveness                                  ║");
    info!("║    GET  /health  - Health report                             ║");
    info!("║    POST /chat    - Relay chat to provider                    ║");
    info!("╚══════════════════════════════════════════════════════════════╝");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Chat proxy stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                warn!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received");
}
