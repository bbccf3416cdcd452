//! Error types for the courier HTTP client.
//!
//! Every failure in the crate is returned as a value. Encoding and build
//! errors are produced before any network I/O; transport errors are what the
//! retry engine sees; status, decode and application errors are recorded on
//! the final [`Response`](crate::Response) envelope.

use bytes::Bytes;
use http::StatusCode;
use std::fmt;
use thiserror::Error;

/// Boxed error used for caller-provided serializers and embedded errors.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Result type for courier operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors produced while encoding, sending or consuming a request.
#[derive(Debug, Error)]
pub enum Error {
    /// The request payload could not be serialized.
    #[error("failed to encode request payload: {0}")]
    Encode(#[source] BoxError),

    /// The target URL could not be parsed.
    #[error("invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// The request could not be assembled (bad header, bad proxy, ...).
    #[error("failed to build request: {0}")]
    Build(String),

    /// Network, DNS, TLS or timeout failure reported by the transport.
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// The caller's context was cancelled.
    #[error("context canceled")]
    Cancelled,

    /// The caller's context deadline elapsed.
    #[error("context deadline exceeded")]
    DeadlineExceeded,

    /// The response status was not one of the accepted codes.
    #[error(transparent)]
    UnexpectedStatus(#[from] UnexpectedStatusError),

    /// The response body was not valid JSON for the requested type.
    #[error("unmarshal response err: {0}")]
    Decode(#[source] serde_json::Error),

    /// The decoded body reported an application-level error.
    #[error("application error: {0}")]
    Application(#[source] BoxError),

    /// Neither a response nor an error was available.
    #[error("response is nil")]
    NoResponse,

    /// The error handler gave up after the retry budget was spent.
    #[error("giving up after {attempts} attempt(s)")]
    RetriesExhausted {
        /// Number of physical attempts made.
        attempts: u32,
    },
}

impl Error {
    /// Check if the error describes a condition worth retrying.
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::Transport(e) => e.is_timeout() || e.is_connect() || e.is_request(),
            Error::UnexpectedStatus(e) => crate::client::is_retryable_status(e.code),
            _ => false,
        }
    }

    /// True when the error came from the caller's context.
    pub fn is_context(&self) -> bool {
        matches!(self, Error::Cancelled | Error::DeadlineExceeded)
    }

    /// HTTP status carried by the error, if any.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            Error::UnexpectedStatus(e) => StatusCode::from_u16(e.code).ok(),
            Error::Transport(e) => e.status(),
            _ => None,
        }
    }
}

/// A response arrived with a status the caller did not accept.
///
/// `body` holds at most the first 4096 bytes of the response body; the rest
/// was drained so the connection could go back to the pool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnexpectedStatusError {
    /// Numeric status code.
    pub code: u16,
    /// Canonical status text, e.g. `Internal Server Error`.
    pub status: String,
    /// Captured body prefix.
    pub body: Bytes,
}

impl fmt::Display for UnexpectedStatusError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "unexpected HTTP status: {} {} body:{}",
            self.code,
            self.status,
            String::from_utf8_lossy(&self.body)
        )
    }
}

impl std::error::Error for UnexpectedStatusError {}

#[cfg(test)]
mod tests {
    use super::*;

    fn status_error(code: u16) -> Error {
        Error::UnexpectedStatus(UnexpectedStatusError {
            code,
            status: StatusCode::from_u16(code)
                .ok()
                .and_then(|s| s.canonical_reason())
                .unwrap_or_default()
                .to_string(),
            body: Bytes::from_static(b"oops"),
        })
    }

    #[test]
    fn test_unexpected_status_display() {
        let err = status_error(500);
        assert_eq!(
            err.to_string(),
            "unexpected HTTP status: 500 Internal Server Error body:oops"
        );
        assert_eq!(err.status(), Some(StatusCode::INTERNAL_SERVER_ERROR));
    }

    #[test]
    fn test_retryable_classification() {
        assert!(status_error(503).is_retryable());
        assert!(status_error(429).is_retryable());
        assert!(!status_error(501).is_retryable());
        assert!(!status_error(404).is_retryable());
        assert!(!Error::NoResponse.is_retryable());
        assert!(!Error::Cancelled.is_retryable());
    }

    #[test]
    fn test_context_errors() {
        assert!(Error::Cancelled.is_context());
        assert!(Error::DeadlineExceeded.is_context());
        assert!(!Error::NoResponse.is_context());
        assert_eq!(Error::DeadlineExceeded.to_string(), "context deadline exceeded");
    }
}
