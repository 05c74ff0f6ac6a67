//! HTTP error mapping.
//!
//! Endpoint handlers return [`ApiError`] and the boundary maps it to the
//! wire table: stable category, status code, and a `{success: false, error}`
//! body. Nothing else leaks to the wire.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use drawbridge_core::{CoreError, CorrelateError};
use serde_json::json;
use thiserror::Error;

/// Result type for endpoint handlers.
pub type ApiResult<T> = Result<T, ApiError>;

/// Stable error categories surfaced on the wire.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Malformed body, bad enum value, missing required field.
    #[error("{0}")]
    InvalidArgument(String),

    /// Unknown element or snapshot.
    #[error("{0}")]
    NotFound(String),

    /// Correlated call with zero connected peers.
    #[error("{0}")]
    Unavailable(String),

    /// Correlator deadline elapsed.
    #[error("{0}")]
    Timeout(String),

    /// Peer-reported error during a correlated call.
    #[error("{0}")]
    Peer(String),

    /// Anything else caught at the endpoint boundary.
    #[error("{0}")]
    Internal(String),
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            Self::InvalidArgument(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::Timeout(_) | Self::Peer(_) | Self::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// The error a correlated endpoint raises when no editor peer is
    /// attached.
    #[must_use]
    pub fn no_peer() -> Self {
        Self::Unavailable("Frontend editor is not connected - open the diagram editor first".into())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = Json(json!({ "success": false, "error": self.to_string() }));
        (status, body).into_response()
    }
}

impl From<CoreError> for ApiError {
    fn from(error: CoreError) -> Self {
        match error {
            CoreError::NotFound(..) => Self::NotFound(error.to_string()),
            CoreError::InvalidArgument(_) | CoreError::Serialization(_) => {
                Self::InvalidArgument(error.to_string())
            }
        }
    }
}

impl From<CorrelateError> for ApiError {
    fn from(error: CorrelateError) -> Self {
        match error {
            CorrelateError::Timeout(_) => Self::Timeout(error.to_string()),
            CorrelateError::Peer(message) => Self::Peer(message),
            CorrelateError::Closed => Self::Internal(error.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_mapping_follows_the_wire_table() {
        assert_eq!(
            ApiError::InvalidArgument("x".into()).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::NotFound("x".into()).status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ApiError::no_peer().status(),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            ApiError::Timeout("x".into()).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            ApiError::Peer("x".into()).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn timeout_message_names_the_kind() {
        let error: ApiError = CorrelateError::Timeout("image export").into();
        assert!(error.to_string().contains("image export"));
    }
}
