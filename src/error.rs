use serde::{Deserialize, Serialize};
use std::fmt;
use std::io;
use std::time::Duration;
use thiserror::Error;

/// Custom result type alias for the application
pub type Result<T> = std::result::Result<T, DocGenError>;

/// Errors that can stop a documentation run before or around the per-file work
#[derive(Debug, Error)]
pub enum DocGenError {
    /// I/O errors
    #[error("IO error: {0}")]
    IO(#[from] io::Error),

    /// HTTP client construction or transport errors
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON parsing/serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// ZIP archive errors
    #[error("Zip error: {0}")]
    Zip(#[from] zip::result::ZipError),

    /// Directory traversal errors
    #[error("Walkdir error: {0}")]
    Walkdir(#[from] walkdir::Error),

    /// Archive content rejected by the extraction limits
    #[error("Archive error: {0}")]
    Archive(String),

    /// Archive format recognised but not supported
    #[error("Unsupported archive format: {0}")]
    UnsupportedArchive(String),

    /// Generation endpoint errors surfaced outside a per-file result
    #[error("Endpoint error: {0}")]
    Endpoint(#[from] EndpointError),

    /// Input validation errors
    #[error("Validation error: {0}")]
    Validation(String),

    /// Configuration errors
    #[error("Config error: {0}")]
    Config(String),

    /// A usage quota or restriction refused the request
    #[error("Limit reached: {0}")]
    LimitExceeded(String),

    /// General message errors
    #[error("{0}")]
    Message(String),
}

impl DocGenError {
    /// Creates a new error with the specified message
    pub fn new(message: &str) -> Self {
        Self::Message(message.to_string())
    }

    /// Checks if this error is transient and retryable
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Http(_) | Self::IO(_) => true,
            Self::Endpoint(e) => e.reason.is_transient(),
            _ => false,
        }
    }

    /// Checks if this error is fatal and should terminate processing
    pub fn is_fatal(&self) -> bool {
        !self.is_transient()
    }
}

/// Why a single documentation call failed
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureReason {
    /// Connection could not be established or was dropped
    NetworkError,
    /// The call exceeded its timeout
    Timeout,
    /// The endpoint refused the call because of its rate limit
    RateLimited,
    /// The API key was rejected; every later call would fail the same way
    AuthenticationError,
    /// Any other non-success status or a body that could not be parsed
    InvalidResponse,
}

impl FailureReason {
    /// Stable snake_case tag used in exports and logs
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NetworkError => "network_error",
            Self::Timeout => "timeout",
            Self::RateLimited => "rate_limited",
            Self::AuthenticationError => "authentication_error",
            Self::InvalidResponse => "invalid_response",
        }
    }

    /// Network failures and timeouts share one bounded retry budget
    pub fn is_network(&self) -> bool {
        matches!(self, Self::NetworkError | Self::Timeout)
    }

    /// Checks if another attempt could succeed
    pub fn is_transient(&self) -> bool {
        self.is_network() || *self == Self::RateLimited
    }

    /// Checks if the whole run must stop
    pub fn aborts_run(&self) -> bool {
        *self == Self::AuthenticationError
    }
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Typed failure returned by a generation endpoint
#[derive(Debug, Clone, Error, PartialEq)]
#[error("{reason}: {message}")]
pub struct EndpointError {
    /// Failure class driving the retry policy
    pub reason: FailureReason,
    /// Human readable detail from the transport or the API
    pub message: String,
    /// Server supplied wait hint, only set for rate limits
    pub retry_after: Option<Duration>,
}

impl EndpointError {
    /// Creates an endpoint error without a retry hint
    pub fn new(reason: FailureReason, message: impl Into<String>) -> Self {
        Self {
            reason,
            message: message.into(),
            retry_after: None,
        }
    }

    /// Creates a rate limit error carrying the server's wait hint
    pub fn rate_limited(message: impl Into<String>, retry_after: Option<Duration>) -> Self {
        Self {
            reason: FailureReason::RateLimited,
            message: message.into(),
            retry_after,
        }
    }
}

impl From<reqwest::Error> for EndpointError {
    fn from(e: reqwest::Error) -> Self {
        let reason = if e.is_timeout() {
            FailureReason::Timeout
        } else if e.is_decode() || e.is_body() {
            FailureReason::InvalidResponse
        } else {
            FailureReason::NetworkError
        };
        Self::new(reason, e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_creation() {
        let error = DocGenError::new("test error");
        assert!(matches!(error, DocGenError::Message(_)));

        if let DocGenError::Message(msg) = error {
            assert_eq!(msg, "test error");
        }
    }

    #[test]
    fn test_is_transient() {
        let transient = DocGenError::Endpoint(EndpointError::new(
            FailureReason::Timeout,
            "deadline elapsed",
        ));
        let fatal = DocGenError::Validation("invalid input".into());

        assert!(transient.is_transient());
        assert!(!fatal.is_transient());
        assert!(fatal.is_fatal());
    }

    #[test]
    fn test_failure_reason_classes() {
        assert!(FailureReason::RateLimited.is_transient());
        assert!(!FailureReason::RateLimited.is_network());
        assert!(FailureReason::Timeout.is_network());
        assert!(FailureReason::AuthenticationError.aborts_run());
        assert!(!FailureReason::InvalidResponse.is_transient());
    }

    #[test]
    fn test_failure_reason_serializes_snake_case() {
        let json = serde_json::to_string(&FailureReason::AuthenticationError).unwrap();
        assert_eq!(json, "\"authentication_error\"");
        assert_eq!(FailureReason::RateLimited.to_string(), "rate_limited");
    }
}
