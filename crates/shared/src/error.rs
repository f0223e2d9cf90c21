use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    AuthenticationRequired,
    AuthorizationError,
    NotFound,
    ValidationError,
    RateLimitExceeded,
    InternalError,
    #[serde(other)]
    Unknown,
}

impl ErrorCode {
    pub fn is_auth(self) -> bool {
        matches!(self, Self::AuthenticationRequired | Self::AuthorizationError)
    }
}

/// Error body returned by the document API alongside a non-2xx status.
#[derive(Debug, Clone, Error, Serialize, Deserialize)]
#[error("{code:?}: {message}")]
pub struct ApiError {
    #[serde(rename = "error")]
    pub code: ErrorCode,
    #[serde(default)]
    pub message: String,
}

impl ApiError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}
