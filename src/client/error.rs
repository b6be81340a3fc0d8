use std::error::Error;
use std::time::Duration;

use serde::Deserialize;
use serde::Serialize;

/// Transport-level failure channel.
///
/// A `ClientApiError` means the store could not be reached or its reply could
/// not be understood. Refusals decided by the store (key not found, compare
/// failed, ...) are never reported here; they arrive as a
/// [`crate::Response`] with a non-zero error code.
#[derive(Debug, Clone, Serialize, Deserialize, thiserror::Error)]
pub enum ClientApiError {
    /// Network layer error (retryable)
    #[serde(rename = "network")]
    #[error("Network error ({kind:?}): {message}")]
    Network {
        kind: NetworkErrorKind,
        message: String,
        retry_after_ms: Option<u64>,
    },

    /// The store answered with something that is not a valid reply
    #[serde(rename = "protocol")]
    #[error("Protocol error (status {status:?}): {message}")]
    Protocol { status: Option<u16>, message: String },

    /// Caller supplied input the client refuses to send
    #[serde(rename = "invalid_argument")]
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NetworkErrorKind {
    /// Connection could not be established
    ConnectionRefused,
    /// Request or long-poll exceeded its deadline
    Timeout,
    /// Endpoint URI is malformed
    InvalidAddress,
    /// Connection dropped mid-request
    ConnectionLost,
}

impl ClientApiError {
    pub fn timeout(
        operation: &str,
        after: Duration,
    ) -> Self {
        Self::Network {
            kind: NetworkErrorKind::Timeout,
            message: format!("{operation} timed out after {after:?}"),
            retry_after_ms: Some(0),
        }
    }

    pub fn invalid_response(
        status: Option<u16>,
        message: impl Into<String>,
    ) -> Self {
        Self::Protocol {
            status,
            message: message.into(),
        }
    }

    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument(message.into())
    }

    pub fn message(&self) -> &str {
        match self {
            Self::Network { message, .. } => message,
            Self::Protocol { message, .. } => message,
            Self::InvalidArgument(message) => message,
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(
            self,
            Self::Network {
                kind: NetworkErrorKind::Timeout,
                ..
            }
        )
    }

    /// Whether reissuing the same request may succeed
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Network { retry_after_ms: Some(_), .. })
    }
}

impl From<reqwest::Error> for ClientApiError {
    /// Converts a reqwest transport error into a ClientApiError
    ///
    /// - Deadline exceeded maps to a retryable timeout
    /// - Connect failures map to a retryable refusal
    /// - Builder/URL problems are not retryable
    /// - Body decoding problems are protocol errors
    fn from(err: reqwest::Error) -> Self {
        let status = err.status().map(|s| s.as_u16());

        if err.is_timeout() {
            return Self::Network {
                kind: NetworkErrorKind::Timeout,
                message: format!("Request timeout: {err}"),
                retry_after_ms: Some(0),
            };
        }

        if err.is_connect() {
            return Self::Network {
                kind: NetworkErrorKind::ConnectionRefused,
                message: format!("Connection failed: {err}"),
                retry_after_ms: Some(1000),
            };
        }

        if err.is_builder() {
            return Self::Network {
                kind: NetworkErrorKind::InvalidAddress,
                message: format!("Invalid address: {err}"),
                retry_after_ms: None,
            };
        }

        if err.is_decode() || err.is_body() {
            return Self::Protocol {
                status,
                message: format!("Unreadable reply body: {err}"),
            };
        }

        if let Some(io_err) = err.source().and_then(|e| e.downcast_ref::<std::io::Error>()) {
            if io_err.kind() == std::io::ErrorKind::TimedOut {
                return Self::Network {
                    kind: NetworkErrorKind::Timeout,
                    message: format!("Connection timeout: {err}"),
                    retry_after_ms: Some(3000),
                };
            }
        }

        Self::Network {
            kind: NetworkErrorKind::ConnectionLost,
            message: format!("Connection unexpectedly closed: {err}"),
            retry_after_ms: Some(1000),
        }
    }
}

impl From<serde_json::Error> for ClientApiError {
    fn from(err: serde_json::Error) -> Self {
        Self::Protocol {
            status: None,
            message: format!("Malformed reply: {err}"),
        }
    }
}
