//! Client error types.

use reqwest::StatusCode;
use thiserror::Error;

use crate::models::FieldErrors;

/// Result type used across the client.
pub type Result<T> = std::result::Result<T, ClientError>;

/// Errors surfaced by API calls.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Transport-level failure (connection refused, timeout, TLS...).
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Failure reported by a non-reqwest [`crate::Transport`].
    #[error("Transport error: {0}")]
    Transport(String),

    /// The server answered with a non-success status.
    #[error("request to {path} failed with HTTP {status}{}", detail_suffix(.detail))]
    Http {
        status: StatusCode,
        path: String,
        detail: Option<String>,
    },

    /// Registration rejected with field-level validation detail.
    #[error("Validation failed: {0}")]
    Validation(FieldErrors),

    /// A 401 could not be recovered by refreshing the access token.
    #[error("session expired while requesting {path}: {cause}")]
    SessionExpired { path: String, cause: RefreshError },

    /// A local file could not be read.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A file was refused before upload.
    #[error("Invalid upload: {0}")]
    InvalidUpload(String),

    /// JSON encode/decode error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Invalid client configuration.
    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl ClientError {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    /// HTTP status carried by this error, if any.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            Self::Http { status, .. } => Some(*status),
            Self::SessionExpired { .. } => Some(StatusCode::UNAUTHORIZED),
            Self::Validation(_) => Some(StatusCode::BAD_REQUEST),
            Self::Network(e) => e.status(),
            _ => None,
        }
    }

    /// Whether the request ended in an authorization failure.
    #[inline]
    pub fn is_unauthorized(&self) -> bool {
        self.status() == Some(StatusCode::UNAUTHORIZED)
    }

    /// Server-provided human readable message, when there is one.
    pub fn detail(&self) -> Option<&str> {
        match self {
            Self::Http { detail, .. } => detail.as_deref(),
            Self::Validation(errors) => errors.detail.as_deref(),
            _ => None,
        }
    }
}

fn detail_suffix(detail: &Option<String>) -> String {
    detail
        .as_ref()
        .map(|d| format!(": {}", d))
        .unwrap_or_default()
}

/// Outcome of a failed token refresh.
///
/// Cloned to every caller waiting on the same refresh.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RefreshError {
    /// No refresh token stored - re-login required.
    #[error("Missing refresh token - re-login required")]
    MissingRefreshToken,

    /// The refresh endpoint rejected the refresh token.
    #[error("refresh rejected with HTTP {status}{}", detail_suffix(.detail))]
    Rejected {
        status: StatusCode,
        detail: Option<String>,
    },

    /// The refresh call never produced a response.
    #[error("Network error during refresh: {0}")]
    Transport(String),

    /// The refresh response could not be decoded.
    #[error("Invalid refresh response: {0}")]
    Decode(String),

    /// The task driving the refresh was dropped before it settled.
    #[error("refresh abandoned before completion")]
    Abandoned,

    /// The session was logged out or replaced while the refresh was in flight.
    #[error("session ended during refresh")]
    SessionEnded,
}

impl RefreshError {
    /// Check if this error requires manual re-login.
    pub fn requires_relogin(&self) -> bool {
        match self {
            Self::MissingRefreshToken | Self::SessionEnded => true,
            Self::Rejected { status, .. } => status.is_client_error(),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_http_error_message() {
        let err = ClientError::Http {
            status: StatusCode::NOT_FOUND,
            path: "posts/9/".to_string(),
            detail: Some("Not found.".to_string()),
        };
        assert_eq!(
            err.to_string(),
            "request to posts/9/ failed with HTTP 404 Not Found: Not found."
        );
        assert_eq!(err.detail(), Some("Not found."));
        assert!(!err.is_unauthorized());
    }

    #[test]
    fn test_session_expired_is_unauthorized() {
        let err = ClientError::SessionExpired {
            path: "posts/".to_string(),
            cause: RefreshError::MissingRefreshToken,
        };
        assert!(err.is_unauthorized());
        assert!(err.to_string().contains("re-login required"));
    }

    #[test]
    fn test_requires_relogin() {
        assert!(RefreshError::MissingRefreshToken.requires_relogin());
        assert!(
            RefreshError::Rejected {
                status: StatusCode::UNAUTHORIZED,
                detail: None
            }
            .requires_relogin()
        );
        assert!(
            !RefreshError::Rejected {
                status: StatusCode::BAD_GATEWAY,
                detail: None
            }
            .requires_relogin()
        );
        assert!(!RefreshError::Transport("reset".into()).requires_relogin());
        assert!(RefreshError::SessionEnded.requires_relogin());
    }
}
