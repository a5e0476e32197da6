//! Error taxonomy for the `/chat` handler and its HTTP rendering.

use axum::{
    extract::rejection::BytesRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, ChatError>;

/// Every way a `/chat` call can fail.
///
/// All variants are terminal for the request; nothing is retried.
#[derive(Debug, Error)]
pub enum ChatError {
    /// Caller-supplied data failed shape validation
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Body exceeded the configured size limit
    #[error("Request body too large")]
    PayloadTooLarge,

    /// Provider credential is not configured
    #[error("Server not configured: {0} missing")]
    Misconfigured(String),

    /// Provider answered with a non-success status
    #[error("{message} (status {status})")]
    Upstream {
        status: u16,
        message: String,
        details: Option<serde_json::Value>,
    },

    /// Anything else: transport failure, undecodable upstream body
    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl ChatError {
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ChatError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ChatError::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            ChatError::Misconfigured(_) | ChatError::Internal { .. } => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            ChatError::Upstream { status, .. } => {
                StatusCode::from_u16(*status).unwrap_or(StatusCode::BAD_GATEWAY)
            }
        }
    }

    fn body(&self) -> ErrorBody {
        match self {
            ChatError::BadRequest(msg) => ErrorBody::new(msg.clone()),
            ChatError::PayloadTooLarge => ErrorBody::new("request body too large"),
            ChatError::Misconfigured(env) => {
                ErrorBody::new(format!("Server not configured: {} missing", env))
            }
            ChatError::Upstream {
                message, details, ..
            } => ErrorBody {
                error: message.clone(),
                details: details.clone(),
                message: None,
            },
            ChatError::Internal { message } => ErrorBody {
                error: "Internal server error".to_string(),
                details: None,
                message: Some(message.clone()),
            },
        }
    }
}

/// JSON error envelope: `{ error, details?, message? }`
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl ErrorBody {
    fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            details: None,
            message: None,
        }
    }
}

impl IntoResponse for ChatError {
    fn into_response(self) -> Response {
        (self.status(), Json(self.body())).into_response()
    }
}

impl From<BytesRejection> for ChatError {
    fn from(rejection: BytesRejection) -> Self {
        if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
            ChatError::PayloadTooLarge
        } else {
            ChatError::BadRequest("failed to read request body".to_string())
        }
    }
}
