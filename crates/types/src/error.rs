//! Unified error type for the promptrelay workspace.

use thiserror::Error;

/// Enumerates all error kinds that can occur across promptrelay crates.
#[derive(Debug, Error)]
pub enum RelayError {
    /// No credential is stored under the provider's credential key.
    #[error("no credential configured for provider: {0}")]
    MissingCredential(crate::ProviderId),

    /// A field the selected provider requires is absent from the request body.
    #[error("missing required field: {0}")]
    MissingField(String),

    /// The request named a provider that is not in the dispatch table.
    #[error("unknown provider: {0}")]
    UnknownProvider(String),

    /// The request body has a fundamentally wrong shape for conversion.
    #[error("conversion error: {0}")]
    Conversion(String),

    /// HTTP transport error.
    #[error("http error: {0}")]
    Http(String),

    /// JSON serialization or deserialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Configuration loading or validation error.
    #[error("configuration error: {0}")]
    Config(String),

    /// The upstream provider returned a non-success status.
    #[error("upstream error: status={status}, body={body}")]
    Upstream { status: u16, body: String },

    /// The upstream replied with a body that lacks the expected reply field.
    #[error("malformed upstream response: {0}")]
    MalformedResponse(String),

    /// The caller went away before the upstream call finished.
    #[error("request cancelled by client")]
    Cancelled,
}

#[cfg(feature = "reqwest")]
impl From<reqwest::Error> for RelayError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            Self::MalformedResponse(e.to_string())
        } else {
            Self::Http(e.to_string())
        }
    }
}

impl RelayError {
    /// Returns `true` if the upstream rate-limited the request.
    ///
    /// Only HTTP 429 is retried; every other failure surfaces immediately.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Upstream { status: 429, .. })
    }
}

/// Convenience alias used throughout the workspace.
pub type Result<T> = std::result::Result<T, RelayError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_missing_credential() {
        let err = RelayError::MissingCredential(crate::ProviderId::Claude);
        assert_eq!(
            err.to_string(),
            "no credential configured for provider: claude"
        );
    }

    #[test]
    fn test_error_display_upstream() {
        let err = RelayError::Upstream {
            status: 429,
            body: "rate limited".to_string(),
        };
        let s = err.to_string();
        assert!(s.contains("429"));
        assert!(s.contains("rate limited"));
    }

    #[test]
    fn test_serialization_error_conversion() {
        let json_err = serde_json::from_str::<serde_json::Value>("invalid {{{").unwrap_err();
        let err: RelayError = json_err.into();
        assert!(matches!(err, RelayError::Serialization(_)));
    }

    #[test]
    fn test_only_rate_limit_is_retryable() {
        assert!(
            RelayError::Upstream {
                status: 429,
                body: String::new()
            }
            .is_retryable()
        );
        for status in [400, 401, 403, 404, 500, 502, 503] {
            assert!(
                !RelayError::Upstream {
                    status,
                    body: String::new()
                }
                .is_retryable(),
                "status {status} must not be retried"
            );
        }
    }

    #[test]
    fn test_other_errors_not_retryable() {
        assert!(!RelayError::Http("connection refused".into()).is_retryable());
        assert!(!RelayError::Cancelled.is_retryable());
        assert!(!RelayError::MissingField("model".into()).is_retryable());
        assert!(!RelayError::MalformedResponse("no text".into()).is_retryable());
    }
}
