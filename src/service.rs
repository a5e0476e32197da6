//! The `/chat` request transform.
//!
//! One validated request in, exactly one upstream call, one response out.
//! No state survives between calls.

use crate::config::ProxyConfig;
use crate::error::{ChatError, Result};
use crate::provider::{self, Provider, UpstreamAuth, UpstreamOutcome, UpstreamRequest};
use crate::types::ChatResponse;
use crate::validation::validate_request;
use anyhow::Context;
use reqwest::Client;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

pub struct ChatService {
    config: Arc<ProxyConfig>,
    provider: Box<dyn Provider>,
    client: Client,
}

impl ChatService {
    pub fn new(config: Arc<ProxyConfig>) -> anyhow::Result<Self> {
        let provider = provider::from_config(&config);
        Self::with_provider(config, provider)
    }

    pub fn with_provider(
        config: Arc<ProxyConfig>,
        provider: Box<dyn Provider>,
    ) -> anyhow::Result<Self> {
        let mut builder = Client::builder();
        if let Some(timeout) = config.upstream_timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder.build().context("Failed to build HTTP client")?;

        Ok(Self {
            config,
            provider,
            client,
        })
    }

    pub fn config(&self) -> &ProxyConfig {
        &self.config
    }

    /// Handle one `/chat` body.
    ///
    /// The credential is checked before the body, so a misconfigured server
    /// never reaches validation or the upstream.
    pub async fn handle_chat(&self, body: &serde_json::Value) -> Result<ChatResponse> {
        let api_key = self
            .config
            .api_key
            .as_deref()
            .ok_or_else(|| ChatError::Misconfigured(self.provider.credential_env().to_string()))?;

        let request = validate_request(body, &self.config)?;

        info!(
            "Chat request: {} messages -> {} ({})",
            request.messages.len(),
            self.provider.kind(),
            self.provider.model()
        );

        let upstream = self.provider.translate_request(&request, api_key);
        let (status, body) = self.send(upstream).await?;

        match self.provider.translate_response(status, &body)? {
            UpstreamOutcome::Success {
                reply,
                model,
                usage,
            } => {
                debug!("Upstream reply: {} chars", reply.len());
                Ok(ChatResponse {
                    reply,
                    model,
                    usage,
                })
            }
            UpstreamOutcome::MalformedSuccess { model, usage } => {
                warn!(
                    "{} response had no usable candidate, using fallback reply",
                    self.provider.display_name()
                );
                Ok(ChatResponse {
                    reply: self.provider.fallback_reply().to_string(),
                    model,
                    usage,
                })
            }
            UpstreamOutcome::Failure { status, details } => {
                error!(
                    "{} API error: {} {}",
                    self.provider.display_name(),
                    status,
                    String::from_utf8_lossy(&body)
                );
                Err(ChatError::Upstream {
                    status,
                    message: format!("{} API returned an error", self.provider.display_name()),
                    details,
                })
            }
        }
    }

    /// Perform the single outbound POST; returns status and raw body
    async fn send(&self, upstream: UpstreamRequest) -> Result<(u16, Vec<u8>)> {
        let mut builder = self.client.post(&upstream.url).json(&upstream.body);
        builder = match &upstream.auth {
            UpstreamAuth::Bearer(key) => builder.bearer_auth(key),
            UpstreamAuth::QueryKey { name, value } => builder.query(&[(*name, value.as_str())]),
        };

        // Error text would otherwise carry the URL, and with it a query-string key
        let response = builder.send().await.map_err(|e| {
            let e = e.without_url();
            error!("{} request failed: {}", self.provider.display_name(), e);
            if e.is_timeout() {
                ChatError::internal("upstream request timed out")
            } else {
                ChatError::internal("upstream request failed")
            }
        })?;

        let status = response.status().as_u16();
        match response.bytes().await {
            Ok(bytes) => Ok((status, bytes.to_vec())),
            // An unreadable error body still reports the upstream status
            Err(e) if !(200..300).contains(&status) => {
                warn!("Failed to read upstream error body: {}", e.without_url());
                Ok((status, Vec::new()))
            }
            Err(e) => {
                error!("Failed to read upstream response: {}", e.without_url());
                Err(ChatError::internal("failed to read upstream response"))
            }
        }
    }
}
