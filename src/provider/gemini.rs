//! Gemini `generateContent` (v1 and v1beta)
//!
//! Only the text of the last message is sent; earlier turns and sampling
//! parameters are not forwarded.

use super::{
    decode_at, is_success, string_at, text_details, Provider, UpstreamAuth, UpstreamOutcome,
    UpstreamRequest,
};
use crate::config::ProviderKind;
use crate::error::{ChatError, Result};
use crate::types::{ChatRequest, Usage};
use serde::{Deserialize, Serialize};

pub const FALLBACK_REPLY: &str = "Sorry, I couldn't generate a response.";

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    contents: Vec<Content<'a>>,
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    parts: Vec<TextPart<'a>>,
}

#[derive(Debug, Serialize)]
struct TextPart<'a> {
    text: &'a str,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct UsageMetadata {
    prompt_token_count: u64,
    candidates_token_count: u64,
    total_token_count: u64,
}

impl From<UsageMetadata> for Usage {
    fn from(meta: UsageMetadata) -> Self {
        Usage {
            prompt_tokens: meta.prompt_token_count,
            completion_tokens: meta.candidates_token_count,
            total_tokens: meta.total_token_count,
        }
    }
}

#[derive(Debug, Clone)]
pub struct GeminiProvider {
    base_url: String,
    api_version: String,
    model: String,
}

impl GeminiProvider {
    pub fn new(base_url: &str, api_version: &str, model: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_version: api_version.trim_matches('/').to_string(),
            model: model.to_string(),
        }
    }

    pub fn endpoint(&self) -> String {
        format!(
            "{}/{}/models/{}:generateContent",
            self.base_url, self.api_version, self.model
        )
    }
}

impl Provider for GeminiProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Gemini
    }

    fn display_name(&self) -> &'static str {
        "Gemini"
    }

    fn model(&self) -> &str {
        &self.model
    }

    fn translate_request(&self, request: &ChatRequest, api_key: &str) -> UpstreamRequest {
        let body = GenerateRequest {
            contents: vec![Content {
                parts: vec![TextPart {
                    text: request.last_content(),
                }],
            }],
        };

        UpstreamRequest {
            url: self.endpoint(),
            auth: UpstreamAuth::QueryKey {
                name: "key",
                value: api_key.to_string(),
            },
            body: serde_json::to_value(body).unwrap_or_default(),
        }
    }

    fn translate_response(&self, status: u16, body: &[u8]) -> Result<UpstreamOutcome> {
        if !is_success(status) {
            // Gemini wraps failures as {"error": {...}}; relay that object when present
            let details = serde_json::from_slice::<serde_json::Value>(body)
                .ok()
                .and_then(|v| v.get("error").cloned())
                .or_else(|| text_details(body));
            return Ok(UpstreamOutcome::Failure { status, details });
        }

        let value: serde_json::Value = serde_json::from_slice(body)
            .map_err(|e| ChatError::internal(format!("invalid upstream response: {}", e)))?;
        let reply = string_at(&value, "/candidates/0/content/parts/0/text");
        let model = string_at(&value, "/modelVersion").or_else(|| Some(self.model.clone()));
        let usage = decode_at::<UsageMetadata>(&value, "/usageMetadata").map(Usage::from);

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
        FALLBACK_REPLY
    }
}
