//! Proxy Configuration
//!
//! Everything is read once at startup (flags, then environment, then
//! defaults) and frozen into a [`ProxyConfig`] that handlers share by `Arc`.

use anyhow::bail;
use clap::{Parser, ValueEnum};
use std::fmt;
use std::time::Duration;

pub const DEFAULT_OPENAI_MODEL: &str = "gpt-3.5-turbo";
pub const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_GEMINI_MODEL: &str = "gemini-2.0-flash";
pub const DEFAULT_GEMINI_API_VERSION: &str = "v1beta";
pub const DEFAULT_GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com";
pub const DEFAULT_TEMPERATURE: f64 = 0.7;
pub const DEFAULT_MAX_TOKENS: u32 = 800;
/// 128 KB
pub const DEFAULT_MAX_BODY_BYTES: usize = 128 * 1024;

/// Which upstream API the proxy talks to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum ProviderKind {
    #[default]
    #[value(name = "openai")]
    OpenAi,
    Gemini,
}

impl ProviderKind {
    pub fn name(&self) -> &'static str {
        match self {
            ProviderKind::OpenAi => "openai",
            ProviderKind::Gemini => "gemini",
        }
    }

    /// Environment variable holding this provider's credential
    pub fn env_key(&self) -> &'static str {
        match self {
            ProviderKind::OpenAi => "OPENAI_API_KEY",
            ProviderKind::Gemini => "GEMINI_API_KEY",
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// How much shape checking `/chat` applies to each message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum ValidationMode {
    /// Every message needs a non-empty `role` and `content`
    #[default]
    Strict,
    /// Only the `messages` array itself is checked
    Lenient,
}

/// What to do when the provider credential is missing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CredentialPolicy {
    /// Start anyway; every `/chat` call answers 500
    #[default]
    Deferred,
    /// Refuse to start
    Required,
}

#[derive(Parser, Debug, Clone)]
#[command(name = "chat-proxy")]
#[command(about = "Chat proxy relaying a /chat endpoint to OpenAI or Gemini")]
pub struct ServerArgs {
    /// Upstream provider
    #[arg(long, value_enum, default_value = "openai", env = "LLM_PROVIDER")]
    pub provider: ProviderKind,

    /// Server host
    #[arg(long, default_value = "0.0.0.0", env = "HOST")]
    pub host: String,

    /// Server port
    #[arg(short, long, default_value_t = 8080, env = "PORT")]
    pub port: u16,

    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true)]
    pub openai_api_key: Option<String>,

    #[arg(long, default_value = DEFAULT_OPENAI_MODEL, env = "OPENAI_MODEL")]
    pub openai_model: String,

    #[arg(long, default_value = DEFAULT_OPENAI_BASE_URL, env = "OPENAI_BASE_URL")]
    pub openai_base_url: String,

    #[arg(long, env = "GEMINI_API_KEY", hide_env_values = true)]
    pub gemini_api_key: Option<String>,

    #[arg(long, default_value = DEFAULT_GEMINI_MODEL, env = "GEMINI_MODEL")]
    pub gemini_model: String,

    /// `v1` or `v1beta`
    #[arg(long, default_value = DEFAULT_GEMINI_API_VERSION, env = "GEMINI_API_VERSION")]
    pub gemini_api_version: String,

    #[arg(long, default_value = DEFAULT_GEMINI_BASE_URL, env = "GEMINI_BASE_URL")]
    pub gemini_base_url: String,

    /// Message validation strictness
    #[arg(long, value_enum, default_value = "strict", env = "CHAT_VALIDATION")]
    pub validation: ValidationMode,

    /// Refuse to start when the provider credential is missing
    #[arg(long, env = "REQUIRE_API_KEY")]
    pub require_api_key: bool,

    /// Maximum accepted request body size in bytes
    #[arg(long, default_value_t = DEFAULT_MAX_BODY_BYTES, env = "MAX_BODY_BYTES")]
    pub max_body_bytes: usize,

    #[arg(long, default_value_t = DEFAULT_TEMPERATURE, env = "DEFAULT_TEMPERATURE")]
    pub default_temperature: f64,

    #[arg(long, default_value_t = DEFAULT_MAX_TOKENS, env = "DEFAULT_MAX_TOKENS")]
    pub default_max_tokens: u32,

    /// Upstream request timeout; unset means wait indefinitely
    #[arg(long, env = "UPSTREAM_TIMEOUT_SECS")]
    pub upstream_timeout_secs: Option<u64>,
}

/// Immutable process-wide configuration
#[derive(Clone)]
pub struct ProxyConfig {
    pub provider: ProviderKind,
    pub host: String,
    pub port: u16,
    /// Credential of the selected provider; `None` when unset or empty
    pub api_key: Option<String>,
    pub model: String,
    /// Provider API root, without trailing slash
    pub base_url: String,
    /// Gemini only
    pub api_version: String,
    pub validation: ValidationMode,
    pub credential_policy: CredentialPolicy,
    pub max_body_bytes: usize,
    pub default_temperature: f64,
    pub default_max_tokens: u32,
    pub upstream_timeout: Option<Duration>,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            provider: ProviderKind::OpenAi,
            host: "0.0.0.0".to_string(),
            port: 8080,
            api_key: None,
            model: DEFAULT_OPENAI_MODEL.to_string(),
            base_url: DEFAULT_OPENAI_BASE_URL.to_string(),
            api_version: DEFAULT_GEMINI_API_VERSION.to_string(),
            validation: ValidationMode::Strict,
            credential_policy: CredentialPolicy::Deferred,
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
            default_temperature: DEFAULT_TEMPERATURE,
            default_max_tokens: DEFAULT_MAX_TOKENS,
            upstream_timeout: None,
        }
    }
}

impl ProxyConfig {
    /// OpenAI defaults with the given credential
    pub fn openai(api_key: Option<String>) -> Self {
        Self {
            api_key: normalize_key(api_key),
            ..Default::default()
        }
    }

    /// Gemini defaults with the given credential
    pub fn gemini(api_key: Option<String>) -> Self {
        Self {
            provider: ProviderKind::Gemini,
            api_key: normalize_key(api_key),
            model: DEFAULT_GEMINI_MODEL.to_string(),
            base_url: DEFAULT_GEMINI_BASE_URL.to_string(),
            ..Default::default()
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = trim_base_url(base_url.into());
        self
    }

    pub fn from_args(args: ServerArgs) -> Self {
        let (api_key, model, base_url) = match args.provider {
            ProviderKind::OpenAi => (args.openai_api_key, args.openai_model, args.openai_base_url),
            ProviderKind::Gemini => (args.gemini_api_key, args.gemini_model, args.gemini_base_url),
        };

        Self {
            provider: args.provider,
            host: args.host,
            port: args.port,
            api_key: normalize_key(api_key),
            model,
            base_url: trim_base_url(base_url),
            api_version: args.gemini_api_version,
            validation: args.validation,
            credential_policy: if args.require_api_key {
                CredentialPolicy::Required
            } else {
                CredentialPolicy::Deferred
            },
            max_body_bytes: args.max_body_bytes,
            default_temperature: args.default_temperature,
            default_max_tokens: args.default_max_tokens,
            upstream_timeout: args.upstream_timeout_secs.map(Duration::from_secs),
        }
    }

    /// Parse flags and environment of the current process
    pub fn from_env() -> Self {
        Self::from_args(ServerArgs::parse())
    }

    pub fn api_key_configured(&self) -> bool {
        self.api_key.is_some()
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Startup checks. Fails only under [`CredentialPolicy::Required`].
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.credential_policy == CredentialPolicy::Required && self.api_key.is_none() {
            bail!(
                "{} is not set and REQUIRE_API_KEY is enabled",
                self.provider.env_key()
            );
        }
        if self.max_body_bytes == 0 {
            bail!("max body size must be greater than zero");
        }
        Ok(())
    }
}

impl fmt::Debug for ProxyConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProxyConfig")
            .field("provider", &self.provider)
            .field("host", &self.host)
            .field("port", &self.port)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("model", &self.model)
            .field("base_url", &self.base_url)
            .field("api_version", &self.api_version)
            .field("validation", &self.validation)
            .field("credential_policy", &self.credential_policy)
            .field("max_body_bytes", &self.max_body_bytes)
            .field("default_temperature", &self.default_temperature)
            .field("default_max_tokens", &self.default_max_tokens)
            .field("upstream_timeout", &self.upstream_timeout)
            .finish()
    }
}

fn normalize_key(key: Option<String>) -> Option<String> {
    key.map(|k| k.trim().to_string()).filter(|k| !k.is_empty())
}

fn trim_base_url(url: String) -> String {
    url.trim_end_matches('/').to_string()
}
