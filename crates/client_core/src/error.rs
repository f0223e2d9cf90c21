//! Error kinds surfaced by the document collaborators.

use shared::error::ApiError;
use thiserror::Error;

/// Failure of a shared-document fetch. The variant decides which fallback
/// view is shown, so callers match on it rather than on messages.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("offline: {0}")]
    Offline(String),
    #[error("not authorized: {0}")]
    Authorization(String),
    #[error("api error: {0}")]
    Api(#[from] ApiError),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl FetchError {
    pub fn kind(&self) -> FetchErrorKind {
        match self {
            Self::Offline(_) => FetchErrorKind::Offline,
            Self::Authorization(_) => FetchErrorKind::Authorization,
            Self::Api(err) if err.code.is_auth() => FetchErrorKind::Authorization,
            Self::Api(_) | Self::Other(_) => FetchErrorKind::Other,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchErrorKind {
    Offline,
    Authorization,
    Other,
}

#[derive(Debug, Error)]
pub enum LocationError {
    #[error("invalid location '{raw}': {source}")]
    Invalid {
        raw: String,
        source: url::ParseError,
    },
}
