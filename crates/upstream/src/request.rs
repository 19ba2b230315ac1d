//! Request/response model for upstream calls.

use crate::error::{Result, UpstreamError};
use reqwest::Method;
use serde_json::Value;

/// One HTTP request against the Sonarr API, relative to `/api/v3`.
///
/// Built once per tool invocation from validated arguments. Never retried.
#[derive(Debug, Clone, PartialEq)]
pub struct UpstreamRequest {
    method: Method,
    path: String,
    query: Vec<(String, String)>,
    body: Option<Value>,
}

impl UpstreamRequest {
    #[must_use]
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            body: None,
        }
    }

    #[must_use]
    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    #[must_use]
    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST, path)
    }

    /// Append a query pair. Pairs are sent in insertion order.
    #[must_use]
    pub fn query(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.query.push((key.into(), value.to_string()));
        self
    }

    /// Append a query pair only when `value` is present.
    #[must_use]
    pub fn query_opt(self, key: impl Into<String>, value: Option<impl ToString>) -> Self {
        match value {
            Some(v) => self.query(key, v),
            None => self,
        }
    }

    /// Attach a JSON body.
    #[must_use]
    pub fn json(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    #[must_use]
    pub fn method(&self) -> &Method {
        &self.method
    }

    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    #[must_use]
    pub fn query_pairs(&self) -> &[(String, String)] {
        &self.query
    }

    #[must_use]
    pub fn body(&self) -> Option<&Value> {
        self.body.as_ref()
    }
}

/// Body of a successful upstream response.
#[derive(Debug, Clone, PartialEq)]
pub enum UpstreamBody {
    Json(Value),
    Binary { bytes: Vec<u8>, mime_type: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct UpstreamResponse {
    pub status: u16,
    pub body: UpstreamBody,
}

impl UpstreamResponse {
    /// Unwrap a JSON body.
    ///
    /// # Errors
    ///
    /// Returns [`UpstreamError::Decode`] if upstream sent binary content.
    pub fn into_json(self) -> Result<Value> {
        match self.body {
            UpstreamBody::Json(v) => Ok(v),
            UpstreamBody::Binary { mime_type, .. } => Err(UpstreamError::Decode(format!(
                "expected JSON, got binary content of type '{mime_type}'"
            ))),
        }
    }

    /// Unwrap a binary body as `(bytes, mime_type)`.
    ///
    /// # Errors
    ///
    /// Returns [`UpstreamError::Decode`] if upstream sent JSON instead of binary content.
    pub fn into_binary(self) -> Result<(Vec<u8>, String)> {
        match self.body {
            UpstreamBody::Binary { bytes, mime_type } => Ok((bytes, mime_type)),
            UpstreamBody::Json(_) => Err(UpstreamError::Decode(
                "expected binary content, got JSON".to_string(),
            )),
        }
    }
}
