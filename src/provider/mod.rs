//! Upstream LLM providers.
//!
//! A provider only translates: caller request to upstream request, upstream
//! response to [`UpstreamOutcome`]. The HTTP call itself is made once, by
//! `ChatService`, for every provider alike.

pub mod gemini;
pub mod openai;

pub use gemini::GeminiProvider;
pub use openai::OpenAiProvider;

use crate::config::{ProviderKind, ProxyConfig};
use crate::error::Result;
use crate::types::{ChatRequest, Usage};
use serde::de::DeserializeOwned;

/// How the credential travels to the upstream
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpstreamAuth {
    /// `Authorization: Bearer <key>`
    Bearer(String),
    /// `?<name>=<key>` on the URL
    QueryKey { name: &'static str, value: String },
}

/// A fully translated outbound call
#[derive(Debug, Clone)]
pub struct UpstreamRequest {
    pub url: String,
    pub auth: UpstreamAuth,
    pub body: serde_json::Value,
}

/// What the upstream answer amounted to
#[derive(Debug, Clone, PartialEq)]
pub enum UpstreamOutcome {
    /// First candidate carried text
    Success {
        reply: String,
        model: Option<String>,
        usage: Option<Usage>,
    },
    /// Success status, but no usable first candidate
    MalformedSuccess {
        model: Option<String>,
        usage: Option<Usage>,
    },
    /// Non-success status; `details` is whatever could be read from the body
    Failure {
        status: u16,
        details: Option<serde_json::Value>,
    },
}

/// Request/response translation for one upstream API
pub trait Provider: Send + Sync {
    fn kind(&self) -> ProviderKind;

    /// Human readable name used in error messages
    fn display_name(&self) -> &'static str;

    /// Model identifier sent upstream
    fn model(&self) -> &str;

    fn credential_env(&self) -> &'static str {
        self.kind().env_key()
    }

    fn translate_request(&self, request: &ChatRequest, api_key: &str) -> UpstreamRequest;

    /// Classify an upstream answer.
    ///
    /// Errors only when a success body cannot be decoded as JSON at all.
    fn translate_response(&self, status: u16, body: &[u8]) -> Result<UpstreamOutcome>;

    /// Reply used for [`UpstreamOutcome::MalformedSuccess`]
    fn fallback_reply(&self) -> &str;
}

/// Build the provider selected in `config`
pub fn from_config(config: &ProxyConfig) -> Box<dyn Provider> {
    match config.provider {
        ProviderKind::OpenAi => Box::new(OpenAiProvider::new(&config.base_url, &config.model)),
        ProviderKind::Gemini => Box::new(GeminiProvider::new(
            &config.base_url,
            &config.api_version,
            &config.model,
        )),
    }
}

pub(crate) fn is_success(status: u16) -> bool {
    (200..300).contains(&status)
}

/// String at a JSON pointer, `None` when missing or not a string
pub(crate) fn string_at(value: &serde_json::Value, pointer: &str) -> Option<String> {
    value
        .pointer(pointer)
        .and_then(serde_json::Value::as_str)
        .map(str::to_string)
}

/// Decode the sub-tree at a JSON pointer, `None` when missing or mistyped
pub(crate) fn decode_at<T: DeserializeOwned>(value: &serde_json::Value, pointer: &str) -> Option<T> {
    value
        .pointer(pointer)
        .filter(|v| !v.is_null())
        .and_then(|v| T::deserialize(v).ok())
}

/// Raw body as a JSON string, `None` when empty
pub(crate) fn text_details(body: &[u8]) -> Option<serde_json::Value> {
    let text = String::from_utf8_lossy(body);
    if text.trim().is_empty() {
        None
    } else {
        Some(serde_json::Value::String(text.into_owned()))
    }
}
