//! API error type that maps [`RelayError`] variants to HTTP status codes.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use promptrelay_types::RelayError;
use serde_json::json;

/// Non-standard status for a request the client abandoned.
const CLIENT_CLOSED_REQUEST: u16 = 499;

/// Wrapper around [`RelayError`] that implements [`IntoResponse`].
pub struct ApiError(pub RelayError);

impl ApiError {
    /// Returns `(status, error_type, error_code)` for the wrapped error.
    fn classify(&self) -> (StatusCode, &'static str, &'static str) {
        match &self.0 {
            RelayError::MissingCredential(_) => (
                StatusCode::BAD_REQUEST,
                "invalid_request_error",
                "missing_credential",
            ),
            RelayError::MissingField(_) => (
                StatusCode::BAD_REQUEST,
                "invalid_request_error",
                "missing_field",
            ),
            RelayError::UnknownProvider(_) => (
                StatusCode::BAD_REQUEST,
                "invalid_request_error",
                "unknown_provider",
            ),
            RelayError::Upstream { status, .. } => classify_upstream(*status),
            RelayError::Http(_) => (StatusCode::BAD_GATEWAY, "server_error", "upstream_error"),
            RelayError::MalformedResponse(_) => (
                StatusCode::BAD_GATEWAY,
                "server_error",
                "malformed_response",
            ),
            RelayError::Cancelled => (
                StatusCode::from_u16(CLIENT_CLOSED_REQUEST).unwrap_or(StatusCode::BAD_REQUEST),
                "client_error",
                "client_closed_request",
            ),
            RelayError::Conversion(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "server_error",
                "conversion_error",
            ),
            RelayError::Serialization(_) | RelayError::Config(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "server_error",
                "internal_error",
            ),
        }
    }
}

fn classify_upstream(status: u16) -> (StatusCode, &'static str, &'static str) {
    match status {
        429 => (
            StatusCode::TOO_MANY_REQUESTS,
            "rate_limit_error",
            "rate_limit_exceeded",
        ),
        // The caller's stored key is wrong, not ours.
        401 => (
            StatusCode::BAD_REQUEST,
            "authentication_error",
            "invalid_api_key",
        ),
        403 => (
            StatusCode::FORBIDDEN,
            "permission_error",
            "insufficient_quota",
        ),
        _ => (StatusCode::BAD_GATEWAY, "server_error", "upstream_error"),
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_type, error_code) = self.classify();
        match &self.0 {
            RelayError::Cancelled => tracing::info!("client went away before the upstream replied"),
            e if status.is_server_error() => tracing::error!(error = %e, code = error_code, "request failed"),
            e => tracing::warn!(error = %e, code = error_code, "request rejected"),
        }
        let msg = self.0.to_string();
        (
            status,
            Json(json!({
                "error": {
                    "message": msg,
                    "type": error_type,
                    "code": error_code,
                }
            })),
        )
            .into_response()
    }
}

impl From<RelayError> for ApiError {
    fn from(e: RelayError) -> Self {
        Self(e)
    }
}
