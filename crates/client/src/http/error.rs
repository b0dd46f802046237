//! Errors surfaced by the backend HTTP client.

use std::fmt;
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

/// Error codes the backend uses for an access credential it no longer
/// accepts. Other `*_EXPIRED` codes (promotions, OTPs) are domain errors.
const CREDENTIAL_EXPIRED_CODES: [&str; 4] = [
    "TOKEN_EXPIRED",
    "ACCESS_TOKEN_EXPIRED",
    "JWT_EXPIRED",
    "SESSION_EXPIRED",
];

/// Errors that can occur when talking to the backend API.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The request never produced a response (DNS, connect, TLS, reset).
    #[error("network error: {0}")]
    Network(#[source] reqwest::Error),

    /// No complete response arrived within the request timeout.
    #[error("request timed out after {}s", .0.as_secs())]
    Timeout(Duration),

    /// A successful response whose body is not JSON.
    #[error("expected a JSON response (HTTP {status}), got: {snippet}")]
    NonJson { status: u16, snippet: String },

    /// A JSON response that does not match the expected shape.
    #[error("malformed response body (HTTP {status}): {source}")]
    MalformedResponse {
        status: u16,
        #[source]
        source: serde_json::Error,
    },

    /// The backend answered with an error status.
    #[error("{0}")]
    Status(ErrorBody),

    /// Credentials expired and could not be renewed; sign in again.
    #[error("session expired, please sign in again")]
    SessionExpired,

    /// The request body could not be encoded.
    #[error("failed to encode request body: {0}")]
    Encode(#[source] serde_json::Error),

    /// The HTTP client could not be constructed.
    #[error("failed to build HTTP client: {0}")]
    Builder(#[source] reqwest::Error),
}

impl ApiError {
    /// Whether this error means the access token is no longer accepted.
    ///
    /// True for HTTP 401 and for error payloads carrying a credential
    /// expiry code such as `TOKEN_EXPIRED`, whatever their status.
    #[must_use]
    pub fn is_auth_expired(&self) -> bool {
        match self {
            Self::Status(body) => {
                body.status == 401
                    || CREDENTIAL_EXPIRED_CODES
                        .iter()
                        .any(|code| body.code.eq_ignore_ascii_case(code))
            }
            _ => false,
        }
    }

    /// HTTP status of the response, when there was one.
    #[must_use]
    pub const fn status(&self) -> Option<u16> {
        match self {
            Self::Status(body) => Some(body.status),
            Self::NonJson { status, .. } | Self::MalformedResponse { status, .. } => {
                Some(*status)
            }
            _ => None,
        }
    }

    /// Whether the failure happened before any response was received.
    #[must_use]
    pub const fn is_transport(&self) -> bool {
        matches!(self, Self::Network(_) | Self::Timeout(_))
    }
}

/// Structured error returned by the backend.
#[derive(Debug, Clone, PartialEq)]
pub struct ErrorBody {
    /// HTTP status code.
    pub status: u16,
    /// Machine-readable code, `HTTP_<status>` when the backend sent none.
    pub code: String,
    /// Human-readable message, the status reason when the backend sent none.
    pub message: String,
    /// Extra detail object, passed through untouched.
    pub details: Option<serde_json::Value>,
}

impl fmt::Display for ErrorBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (HTTP {}): {}", self.code, self.status, self.message)
    }
}

impl ErrorBody {
    /// Build from a status and whatever the backend put in the body.
    pub(crate) fn from_response(status: reqwest::StatusCode, body: &[u8]) -> Self {
        let envelope = serde_json::from_slice::<ErrorEnvelope>(body).unwrap_or_default();
        let (code, message) = envelope
            .error
            .map(|detail| (detail.code, detail.message))
            .unwrap_or_default();

        Self {
            status: status.as_u16(),
            code: code
                .filter(|code| !code.is_empty())
                .unwrap_or_else(|| format!("HTTP_{}", status.as_u16())),
            message: message
                .filter(|message| !message.is_empty())
                .unwrap_or_else(|| status.canonical_reason().unwrap_or("Unknown error").to_string()),
            details: envelope.details,
        }
    }
}

/// `{ "error": { "code", "message" }, "details" }`
#[derive(Debug, Default, Deserialize)]
struct ErrorEnvelope {
    #[serde(default)]
    error: Option<ErrorDetail>,
    #[serde(default)]
    details: Option<serde_json::Value>,
}

#[derive(Debug, Default, Deserialize)]
struct ErrorDetail {
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    message: Option<String>,
}
