//! Error types for the MCP adapter.

use rmcp::ErrorData as McpError;
use rmcp::model::{CallToolResult, Content};
use serde_json::{Value, json};
use sonarr_mcp_upstream::UpstreamError;
use std::time::Duration;
use thiserror::Error;

/// Process-level failures (configuration, startup).
#[derive(Error, Debug)]
pub enum AdapterError {
    /// Configuration errors (missing URL/API key, invalid values)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Startup errors (server failed to start)
    #[error("Startup error: {0}")]
    Startup(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for adapter operations.
pub type Result<T> = std::result::Result<T, AdapterError>;

/// Failure of a single tool call or resource read.
#[derive(Error, Debug)]
pub enum ToolError {
    #[error("Invalid arguments: {0}")]
    InvalidArguments(String),

    #[error("Unknown tool: {0}")]
    UnknownTool(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Sonarr did not answer within {}s", .0.as_secs_f64())]
    UpstreamTimeout(Duration),

    #[error("Sonarr is unreachable: {0}")]
    UpstreamUnreachable(String),

    #[error("Sonarr returned an error{}: {}", status_suffix(.status), body_summary(.body))]
    UpstreamError { status: Option<u16>, body: Value },
}

fn status_suffix(status: &Option<u16>) -> String {
    status.map(|s| format!(" (HTTP {s})")).unwrap_or_default()
}

fn body_summary(body: &Value) -> String {
    upstream_message(body).unwrap_or_else(|| body.to_string())
}

/// Pull a human-readable message out of a Sonarr error body.
///
/// Sonarr answers with either `{"message": ...}` or a list of validation failures carrying
/// `errorMessage`.
pub(crate) fn upstream_message(body: &Value) -> Option<String> {
    match body {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Object(map) => map
            .get("message")
            .and_then(Value::as_str)
            .map(str::to_string),
        Value::Array(items) => {
            let messages: Vec<&str> = items
                .iter()
                .filter_map(|item| item.get("errorMessage").and_then(Value::as_str))
                .collect();
            (!messages.is_empty()).then(|| messages.join("; "))
        }
        _ => None,
    }
}

impl ToolError {
    /// Stable machine-readable category.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InvalidArguments(_) => "invalid_arguments",
            Self::UnknownTool(_) => "unknown_tool",
            Self::NotFound(_) => "not_found",
            Self::Conflict(_) => "conflict",
            Self::UpstreamTimeout(_) => "upstream_timeout",
            Self::UpstreamUnreachable(_) => "upstream_unreachable",
            Self::UpstreamError { .. } => "upstream_error",
        }
    }

    /// Whether the caller may reasonably retry the same call.
    #[must_use]
    pub fn retryable(&self) -> bool {
        match self {
            Self::UpstreamTimeout(_) | Self::UpstreamUnreachable(_) => true,
            Self::UpstreamError { status, .. } => status.is_none_or(|s| s >= 500),
            _ => false,
        }
    }

    /// Structured payload carried by an error tool result.
    #[must_use]
    pub fn to_payload(&self) -> Value {
        let mut error = json!({
            "kind": self.kind(),
            "message": self.to_string(),
            "retryable": self.retryable(),
        });
        if let Self::UpstreamError { status, body } = self {
            if let Some(status) = status {
                error["status"] = json!(status);
            }
            error["body"] = body.clone();
        }
        json!({ "error": error })
    }

    /// Whether this failure is reported as a protocol error rather than a tool result.
    ///
    /// Callers that name a tool that does not exist, or pass arguments that do not fit its
    /// schema, get a JSON-RPC `invalid_params` error; everything past validation is reported
    /// in-band with `isError: true`.
    #[must_use]
    pub fn is_protocol_error(&self) -> bool {
        matches!(self, Self::UnknownTool(_) | Self::InvalidArguments(_))
    }

    /// Convert into an MCP protocol error.
    #[must_use]
    pub fn into_mcp_error(self) -> McpError {
        let data = Some(json!({ "kind": self.kind(), "retryable": self.retryable() }));
        match self {
            Self::UnknownTool(_) | Self::InvalidArguments(_) => {
                McpError::invalid_params(self.to_string(), data)
            }
            Self::NotFound(_) => McpError::resource_not_found(self.to_string(), data),
            _ => McpError::internal_error(self.to_string(), data),
        }
    }

    /// Convert into an `isError` tool result.
    #[must_use]
    pub fn into_call_result(self) -> CallToolResult {
        let payload = self.to_payload();
        CallToolResult {
            content: vec![Content::text(self.to_string())],
            structured_content: Some(payload),
            is_error: Some(true),
            meta: None,
        }
    }
}

impl From<UpstreamError> for ToolError {
    fn from(e: UpstreamError) -> Self {
        match e {
            UpstreamError::Timeout(d) => Self::UpstreamTimeout(d),
            UpstreamError::Unreachable(msg) => Self::UpstreamUnreachable(msg),
            UpstreamError::Status { status: 404, body } => Self::NotFound(
                upstream_message(&body).unwrap_or_else(|| "resource not found in Sonarr".into()),
            ),
            UpstreamError::Status { status: 409, body } => Self::Conflict(
                upstream_message(&body).unwrap_or_else(|| "conflicting Sonarr state".into()),
            ),
            UpstreamError::Status { status, body } => Self::UpstreamError {
                status: Some(status),
                body,
            },
            UpstreamError::Decode(msg)
            | UpstreamError::ResponseTooLarge(msg)
            | UpstreamError::Config(msg) => Self::UpstreamError {
                status: None,
                body: Value::String(msg),
            },
        }
    }
}
