//! OpenAI Chat Completions v1

use super::{
    decode_at, is_success, string_at, text_details, Provider, UpstreamAuth, UpstreamOutcome,
    UpstreamRequest,
};
use crate::config::ProviderKind;
use crate::error::{ChatError, Result};
use crate::types::{ChatMessage, ChatRequest, Usage};
use serde::Serialize;

#[derive(Debug, Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    temperature: f64,
    max_tokens: u32,
}

/// Forwards the full conversation with sampling parameters
#[derive(Debug, Clone)]
pub struct OpenAiProvider {
    base_url: String,
    model: String,
}

impl OpenAiProvider {
    pub fn new(base_url: &str, model: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
        }
    }

    pub fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }
}

impl Provider for OpenAiProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::OpenAi
    }

    fn display_name(&self) -> &'static str {
        "OpenAI"
    }

    fn model(&self) -> &str {
        &self.model
    }

    fn translate_request(&self, request: &ChatRequest, api_key: &str) -> UpstreamRequest {
        let body = CompletionRequest {
            model: &self.model,
            messages: &request.messages,
            temperature: request.temperature,
            max_tokens: request.max_tokens,
        };

        UpstreamRequest {
            url: self.endpoint(),
            auth: UpstreamAuth::Bearer(api_key.to_string()),
            // Plain structs of strings and numbers always serialize
            body: serde_json::to_value(body).unwrap_or_default(),
        }
    }

    fn translate_response(&self, status: u16, body: &[u8]) -> Result<UpstreamOutcome> {
        if !is_success(status) {
            return Ok(UpstreamOutcome::Failure {
                status,
                details: text_details(body),
            });
        }

        let value: serde_json::Value = serde_json::from_slice(body)
            .map_err(|e| ChatError::internal(format!("invalid upstream response: {}", e)))?;
        // Each field is read on its own; a bad one never hides the others
        let reply = string_at(&value, "/choices/0/message/content");
        let model = string_at(&value, "/model").or_else(|| Some(self.model.clone()));
        let usage = decode_at::<Usage>(&value, "/usage");

        Ok(match reply {
            Some(reply) => UpstreamOutcome::Success {
                reply,
                model,
                usage,
            },
            None => UpstreamOutcome::MalformedSuccess { model, usage },
        })
    }

    fn fallback_reply(&self) -> &str {
        ""
    }
}
