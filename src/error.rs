//! Resolver error taxonomy
//!
//! Errors are surfaced to addon clients as `{ "error": "TuneIn - ..." }`
//! with a status code; there are no structured error codes.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;

use crate::services::tunein::SOURCE_NAME;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ResolverError {
    /// Token retry budget exhausted; stays this way until restart
    #[error("{} - Could not extract API token to handle request", SOURCE_NAME)]
    CredentialUnavailable,

    /// Upstream answered (or failed) without anything usable
    #[error("{} - {}", SOURCE_NAME, .0)]
    UpstreamEmpty(&'static str),

    /// Missing or malformed addon id
    #[error("{} - No ID Specified", SOURCE_NAME)]
    InvalidId,
}

impl ResolverError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ResolverError::CredentialUnavailable => StatusCode::SERVICE_UNAVAILABLE,
            ResolverError::UpstreamEmpty(_) => StatusCode::NOT_FOUND,
            ResolverError::InvalidId => StatusCode::BAD_REQUEST,
        }
    }
}

impl IntoResponse for ResolverError {
    fn into_response(self) -> Response {
        (
            self.status_code(),
            Json(serde_json::json!({ "error": self.to_string() })),
        )
            .into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages_are_source_prefixed() {
        assert_eq!(
            ResolverError::CredentialUnavailable.to_string(),
            "TuneIn - Could not extract API token to handle request"
        );
        assert_eq!(
            ResolverError::UpstreamEmpty("No Streams Found 1").to_string(),
            "TuneIn - No Streams Found 1"
        );
        assert_eq!(ResolverError::InvalidId.to_string(), "TuneIn - No ID Specified");
    }

    #[test]
    fn test_status_codes() {
        assert_eq!(
            ResolverError::CredentialUnavailable.into_response().status(),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            ResolverError::UpstreamEmpty("No Meta Found 1").into_response().status(),
            StatusCode::NOT_FOUND
        );
    }
}
