//! Inbound `/chat` body validation.
//!
//! The body is taken as raw JSON so that a missing, `null` or mistyped
//! `messages` field yields a 400 with a readable message instead of an
//! extractor rejection.

use crate::config::{ProxyConfig, ValidationMode};
use crate::error::{ChatError, Result};
use crate::types::{ChatMessage, ChatRequest};
use serde_json::Value;

pub const MESSAGES_REQUIRED: &str = "messages (array) is required in the request body";
pub const MESSAGE_FIELDS_REQUIRED: &str = "Each message must have role and content fields";

/// Validate a raw body and apply the configured defaults
pub fn validate_request(body: &Value, config: &ProxyConfig) -> Result<ChatRequest> {
    let raw_messages = match body.get("messages") {
        Some(Value::Array(items)) if !items.is_empty() => items,
        _ => return Err(ChatError::BadRequest(MESSAGES_REQUIRED.to_string())),
    };

    let messages = raw_messages
        .iter()
        .map(|m| parse_message(m, config.validation))
        .collect::<Result<Vec<_>>>()?;

    let temperature = match body.get("temperature") {
        None | Some(Value::Null) => config.default_temperature,
        Some(v) => v
            .as_f64()
            .ok_or_else(|| ChatError::BadRequest("temperature must be a number".to_string()))?,
    };

    let max_tokens = match body.get("max_tokens") {
        None | Some(Value::Null) => config.default_max_tokens,
        Some(v) => v
            .as_u64()
            .and_then(|n| u32::try_from(n).ok())
            .ok_or_else(|| {
                ChatError::BadRequest("max_tokens must be a non-negative integer".to_string())
            })?,
    };

    Ok(ChatRequest {
        messages,
        temperature,
        max_tokens,
    })
}

fn parse_message(value: &Value, mode: ValidationMode) -> Result<ChatMessage> {
    let obj = value
        .as_object()
        .ok_or_else(|| ChatError::BadRequest(MESSAGE_FIELDS_REQUIRED.to_string()))?;

    let role = obj.get("role").and_then(Value::as_str).filter(|s| !s.is_empty());
    let content = obj
        .get("content")
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty());

    match mode {
        ValidationMode::Strict => match (role, content) {
            (Some(role), Some(content)) => Ok(ChatMessage {
                role: role.to_string(),
                content: content.to_string(),
            }),
            _ => Err(ChatError::BadRequest(MESSAGE_FIELDS_REQUIRED.to_string())),
        },
        ValidationMode::Lenient => Ok(ChatMessage {
            role: role.unwrap_or("user").to_string(),
            content: content.unwrap_or_default().to_string(),
        }),
    }
}
