//! Error types for `sonarr-mcp-upstream`.

use serde_json::Value;
use std::time::Duration;
use thiserror::Error;

/// Failure of a single upstream call.
#[derive(Error, Debug)]
pub enum UpstreamError {
    /// Client configuration errors (invalid base URL, empty API key).
    #[error("Configuration error: {0}")]
    Config(String),

    /// The request did not complete within the configured timeout.
    #[error("Upstream request timed out after {}ms", .0.as_millis())]
    Timeout(Duration),

    /// Connection refused, DNS failure, TLS failure, connection reset.
    #[error("Upstream unreachable: {0}")]
    Unreachable(String),

    /// Upstream answered with a non-success status.
    #[error("Upstream returned HTTP {status}: {body}")]
    Status { status: u16, body: Value },

    /// A success response whose body is not what the caller expected.
    #[error("Failed to decode upstream response: {0}")]
    Decode(String),

    /// The response body exceeded the configured size limit.
    #[error("Upstream response too large: {0}")]
    ResponseTooLarge(String),
}

impl UpstreamError {
    /// HTTP status for [`UpstreamError::Status`], `None` otherwise.
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Result type alias for upstream operations.
pub type Result<T> = std::result::Result<T, UpstreamError>;
