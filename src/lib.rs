//! Chat Proxy
//!
//! A thin HTTP front for one LLM provider. Callers POST a conversation to
//! `/chat`; the proxy validates it, translates it for the configured
//! provider (OpenAI Chat Completions or Gemini `generateContent`), makes
//! exactly one upstream call and relays the first candidate's text.
//!
//! ## Module Structure
//!
//! - `config`: flags/environment, frozen into `ProxyConfig`
//! - `error`: `ChatError` and its JSON rendering
//! - `types`: caller-facing wire types
//! - `validation`: `/chat` body checks
//! - `provider`: per-upstream translation behind the `Provider` trait
//! - `service`: the request transform
//! - `server`: axum router and serve loop

pub mod config;
pub mod error;
pub mod provider;
pub mod server;
pub mod service;
pub mod types;
pub mod validation;

pub use config::{CredentialPolicy, ProviderKind, ProxyConfig, ServerArgs, ValidationMode};
pub use error::ChatError;
pub use provider::{Provider, UpstreamAuth, UpstreamOutcome, UpstreamRequest};
pub use server::{router, run_server, AppState};
pub use service::ChatService;
pub use types::{ChatMessage, ChatRequest, ChatResponse, HealthResponse, Usage};
