//! Client for the Sonarr v3 REST API.
//!
//! One [`SonarrClient::call`] issues exactly one HTTP request. The client attaches the shared
//! secret (`X-Api-Key`) to every request, enforces a per-request timeout, and maps failures to
//! [`UpstreamError`]. It does not retry.

use crate::error::{Result, UpstreamError};
use crate::request::{UpstreamBody, UpstreamRequest, UpstreamResponse};
use crate::safety::{check_base_url, check_same_origin, redact_url, sanitize_reqwest_error};
use mime::Mime;
use reqwest::{Client, Method, header};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;
use url::Url;

/// Header carrying the Sonarr API key.
pub const API_KEY_HEADER: &str = "X-Api-Key";

/// Versioned API prefix, relative to the configured base URL.
const API_PREFIX: &str = "api/v3/";

#[derive(Debug, Clone)]
pub struct SonarrClientConfig {
    /// Sonarr root URL, e.g. `http://localhost:8989` (trailing slashes are ignored).
    pub base_url: String,
    pub api_key: String,
    pub timeout: Duration,
    /// Maximum response body size (bytes). `None` = unlimited.
    pub max_response_bytes: Option<usize>,
}

#[derive(Clone)]
pub struct SonarrClient {
    inner: Arc<SonarrClientInner>,
}

struct SonarrClientInner {
    root: Url,
    api_base: Url,
    api_key: String,
    client: Client,
    timeout: Duration,
    max_response_bytes: Option<usize>,
}

impl SonarrClient {
    /// Build a client from a static config.
    ///
    /// The resulting instance is immutable and safe to share across tasks.
    ///
    /// # Errors
    ///
    /// Returns an error if the base URL is invalid, the API key is empty, or the HTTP client
    /// cannot be built.
    pub fn new(config: SonarrClientConfig) -> Result<Self> {
        let trimmed = config.base_url.trim().trim_end_matches('/');
        let root = Url::parse(&format!("{trimmed}/")).map_err(|e| {
            UpstreamError::Config(format!("Invalid Sonarr URL '{}': {e}", config.base_url))
        })?;
        check_base_url(&root)?;
        let api_base = root
            .join(API_PREFIX)
            .map_err(|e| UpstreamError::Config(format!("Invalid Sonarr API base: {e}")))?;

        if config.api_key.trim().is_empty() {
            return Err(UpstreamError::Config(
                "Sonarr API key must not be empty".to_string(),
            ));
        }

        let client = Client::builder()
            .user_agent(concat!("sonarr-mcp/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| UpstreamError::Config(sanitize_reqwest_error(&e)))?;

        Ok(Self {
            inner: Arc::new(SonarrClientInner {
                root,
                api_base,
                api_key: config.api_key,
                client,
                timeout: config.timeout,
                max_response_bytes: config.max_response_bytes,
            }),
        })
    }

    /// Configured root URL (always ends with `/`).
    #[must_use]
    pub fn base_url(&self) -> &Url {
        &self.inner.root
    }

    #[must_use]
    pub fn timeout(&self) -> Duration {
        self.inner.timeout
    }

    /// Issue one API request.
    ///
    /// # Errors
    ///
    /// Returns [`UpstreamError::Timeout`] when the timeout elapses,
    /// [`UpstreamError::Unreachable`] on transport failure, and [`UpstreamError::Status`] for
    /// non-2xx responses.
    pub async fn call(&self, request: &UpstreamRequest) -> Result<UpstreamResponse> {
        let url = self.api_url(request)?;
        self.execute(
            request.method().clone(),
            url,
            request.body(),
            "application/json",
        )
        .await
    }

    /// Issue one API request and unwrap the JSON body.
    ///
    /// # Errors
    ///
    /// Same as [`SonarrClient::call`], plus [`UpstreamError::Decode`] for binary bodies.
    pub async fn call_json(&self, request: &UpstreamRequest) -> Result<Value> {
        self.call(request).await?.into_json()
    }

    /// Fetch a media file (e.g. a poster) by the path upstream reports for it.
    ///
    /// Absolute paths (`/MediaCover/1/poster.jpg?lastWrite=...`) resolve against the upstream
    /// origin; relative paths resolve against the configured base URL.
    ///
    /// # Errors
    ///
    /// Returns an error if the path resolves outside the upstream origin, or for the same
    /// transport/status failures as [`SonarrClient::call`].
    pub async fn fetch_media(&self, path: &str) -> Result<UpstreamResponse> {
        let url = self
            .inner
            .root
            .join(path)
            .map_err(|e| UpstreamError::Decode(format!("Invalid media path '{path}': {e}")))?;
        check_same_origin(&self.inner.root, &url)?;
        self.execute(Method::GET, url, None, "image/*, */*;q=0.5")
            .await
    }

    fn api_url(&self, request: &UpstreamRequest) -> Result<Url> {
        let path = request.path().trim_start_matches('/');
        let mut url = self
            .inner
            .api_base
            .join(path)
            .map_err(|e| UpstreamError::Config(format!("Invalid API path '{path}': {e}")))?;

        if !request.query_pairs().is_empty() {
            let mut pairs = url.query_pairs_mut();
            for (k, v) in request.query_pairs() {
                pairs.append_pair(k, v);
            }
        }

        Ok(url)
    }

    async fn execute(
        &self,
        method: Method,
        url: Url,
        body: Option<&Value>,
        accept: &str,
    ) -> Result<UpstreamResponse> {
        debug!(method = %method, url = %redact_url(&url), "upstream request");

        let mut request = self
            .inner
            .client
            .request(method, url)
            .header(API_KEY_HEADER, &self.inner.api_key)
            .header(header::ACCEPT, accept)
            .timeout(self.inner.timeout);
        if let Some(payload) = body {
            request = request.json(payload);
        }

        let response = request
            .send()
            .await
            .map_err(|e| transport_error(&e, self.inner.timeout))?;
        let status = response.status();
        let content_type = response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let bytes = read_response_body_limited_bytes(
            response,
            self.inner.max_response_bytes,
            self.inner.timeout,
        )
        .await?;

        debug!(status = status.as_u16(), bytes = bytes.len(), "upstream response");

        if !status.is_success() {
            return Err(UpstreamError::Status {
                status: status.as_u16(),
                body: error_body(&bytes),
            });
        }

        if is_image_content_type(content_type.as_deref()) {
            let mime_type = content_type.unwrap_or_else(|| "image/*".to_string());
            return Ok(UpstreamResponse {
                status: status.as_u16(),
                body: UpstreamBody::Binary { bytes, mime_type },
            });
        }

        let json = if bytes.iter().all(u8::is_ascii_whitespace) {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).map_err(|e| UpstreamError::Decode(e.to_string()))?
        };

        Ok(UpstreamResponse {
            status: status.as_u16(),
            body: UpstreamBody::Json(json),
        })
    }
}

fn transport_error(e: &reqwest::Error, timeout: Duration) -> UpstreamError {
    if e.is_timeout() {
        UpstreamError::Timeout(timeout)
    } else {
        UpstreamError::Unreachable(sanitize_reqwest_error(e))
    }
}

async fn read_response_body_limited_bytes(
    mut response: reqwest::Response,
    max_bytes: Option<usize>,
    timeout: Duration,
) -> Result<Vec<u8>> {
    let Some(max) = max_bytes else {
        let bytes = response
            .bytes()
            .await
            .map_err(|e| transport_error(&e, timeout))?;
        return Ok(bytes.to_vec());
    };

    if let Some(len) = response.content_length()
        && len > max as u64
    {
        return Err(UpstreamError::ResponseTooLarge(format!(
            "{len} bytes (limit {max})"
        )));
    }

    let mut out: Vec<u8> = Vec::new();
    while let Some(chunk) = response
        .chunk()
        .await
        .map_err(|e| transport_error(&e, timeout))?
    {
        if out.len().saturating_add(chunk.len()) > max {
            return Err(UpstreamError::ResponseTooLarge(format!(
                "exceeded {max} bytes"
            )));
        }
        out.extend_from_slice(&chunk);
    }

    Ok(out)
}

fn is_image_content_type(content_type: Option<&str>) -> bool {
    let Some(ct) = content_type else {
        return false;
    };
    let Ok(m) = ct.parse::<Mime>() else {
        return false;
    };
    m.type_() == mime::IMAGE
}

fn error_body(bytes: &[u8]) -> Value {
    serde_json::from_slice(bytes)
        .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(bytes).into_owned()))
}

#[cfg(test)]
mod tests {
    use super::{API_KEY_HEADER, SonarrClient, SonarrClientConfig};
    use crate::error::UpstreamError;
    use crate::request::{UpstreamBody, UpstreamRequest};
    use axum::Router;
    use axum::body::Bytes;
    use axum::http::{HeaderMap, Method, StatusCode, Uri};
    use axum::routing::{any, get};
    use serde_json::{Value, json};
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use tokio::net::TcpListener;

    struct TestServer {
        base_url: String,
        shutdown: Option<tokio::sync::oneshot::Sender<()>>,
    }

    impl Drop for TestServer {
        fn drop(&mut self) {
            if let Some(tx) = self.shutdown.take() {
                let _ = tx.send(());
            }
        }
    }

    async fn serve(app: Router) -> TestServer {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let addr = listener.local_addr().expect("local_addr");
        let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();
        let server = axum::serve(listener, app).with_graceful_shutdown(async move {
            let _ = shutdown_rx.await;
        });
        tokio::spawn(async move { server.await });
        TestServer {
            base_url: format!("http://{addr}"),
            shutdown: Some(shutdown_tx),
        }
    }

    fn client(base_url: &str, timeout: Duration) -> SonarrClient {
        SonarrClient::new(SonarrClientConfig {
            base_url: format!("{base_url}/"),
            api_key: "secret-key".to_string(),
            timeout,
            max_response_bytes: None,
        })
        .expect("valid config")
    }

    #[tokio::test]
    async fn call_builds_versioned_path_query_body_and_api_key() {
        async fn echo_handler(
            method: Method,
            uri: Uri,
            headers: HeaderMap,
            body: Bytes,
        ) -> axum::Json<Value> {
            axum::Json(json!({
                "method": method.as_str(),
                "path": uri.path(),
                "query": uri.query().unwrap_or(""),
                "api_key": headers.get("x-api-key").and_then(|v| v.to_str().ok()),
                "body": String::from_utf8_lossy(&body),
            }))
        }

        let server = serve(Router::new().route("/{*path}", any(echo_handler))).await;
        let client = client(&server.base_url, Duration::from_secs(5));

        let echoed = client
            .call_json(
                &UpstreamRequest::post("command")
                    .query("term", "breaking bad")
                    .json(json!({"name": "SeriesSearch", "seriesId": 7})),
            )
            .await
            .expect("call");

        assert_eq!(echoed["method"], "POST");
        assert_eq!(echoed["path"], "/api/v3/command");
        assert_eq!(echoed["query"], "term=breaking+bad");
        assert_eq!(echoed["api_key"], "secret-key");
        let body: Value =
            serde_json::from_str(echoed["body"].as_str().unwrap_or_default()).expect("json body");
        assert_eq!(body["seriesId"], 7);
    }

    #[tokio::test]
    async fn non_success_status_carries_status_and_body() {
        async fn missing() -> (StatusCode, axum::Json<Value>) {
            (
                StatusCode::NOT_FOUND,
                axum::Json(json!({"message": "NotFound"})),
            )
        }

        let server = serve(Router::new().route("/api/v3/series/{id}", get(missing))).await;
        let client = client(&server.base_url, Duration::from_secs(5));

        let err = client
            .call(&UpstreamRequest::get("series/999"))
            .await
            .unwrap_err();
        match err {
            UpstreamError::Status { status, body } => {
                assert_eq!(status, 404);
                assert_eq!(body["message"], "NotFound");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn slow_upstream_times_out_after_one_attempt() {
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&hits);
        let app = Router::new().route(
            "/api/v3/command",
            any(move || {
                let counter = Arc::clone(&counter);
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_secs(2)).await;
                    axum::Json(json!({"id": 1}))
                }
            }),
        );
        let server = serve(app).await;
        let client = client(&server.base_url, Duration::from_millis(200));

        let err = client
            .call(&UpstreamRequest::post("command").json(json!({"name": "SeriesSearch"})))
            .await
            .unwrap_err();
        assert!(matches!(err, UpstreamError::Timeout(_)), "got {err:?}");
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn connection_refused_is_unreachable() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("bind");
        let addr = listener.local_addr().expect("addr");
        drop(listener);

        let client = client(&format!("http://{addr}"), Duration::from_secs(2));
        let err = client
            .call(&UpstreamRequest::get("system/status"))
            .await
            .unwrap_err();
        assert!(matches!(err, UpstreamError::Unreachable(_)), "got {err:?}");
    }

    #[tokio::test]
    async fn fetch_media_returns_binary_and_rejects_foreign_hosts() {
        async fn poster() -> ([(axum::http::HeaderName, &'static str); 1], &'static [u8]) {
            (
                [(axum::http::header::CONTENT_TYPE, "image/jpeg")],
                &[0xFF, 0xD8, 0xFF],
            )
        }

        let server = serve(Router::new().route("/MediaCover/1/poster.jpg", get(poster))).await;
        let client = client(&server.base_url, Duration::from_secs(5));

        let resp = client
            .fetch_media("/MediaCover/1/poster.jpg?lastWrite=1")
            .await
            .expect("media");
        assert_eq!(
            resp.body,
            UpstreamBody::Binary {
                bytes: vec![0xFF, 0xD8, 0xFF],
                mime_type: "image/jpeg".to_string(),
            }
        );

        let err = client
            .fetch_media("http://example.invalid/poster.jpg")
            .await
            .unwrap_err();
        assert!(matches!(err, UpstreamError::Decode(_)), "got {err:?}");
    }

    fn limited_client(base_url: &str, max_response_bytes: usize) -> SonarrClient {
        SonarrClient::new(SonarrClientConfig {
            base_url: base_url.to_string(),
            api_key: "secret-key".to_string(),
            timeout: Duration::from_secs(5),
            max_response_bytes: Some(max_response_bytes),
        })
        .expect("valid config")
    }

    #[tokio::test]
    async fn declared_length_over_limit_is_rejected() {
        async fn big() -> axum::Json<Value> {
            axum::Json(json!({ "blob": "x".repeat(10_000) }))
        }

        let server = serve(Router::new().route("/api/v3/series", get(big))).await;

        let err = limited_client(&server.base_url, 100)
            .call(&UpstreamRequest::get("series"))
            .await
            .unwrap_err();
        assert!(matches!(err, UpstreamError::ResponseTooLarge(_)), "got {err:?}");

        let ok = limited_client(&server.base_url, 20_000)
            .call_json(&UpstreamRequest::get("series"))
            .await
            .expect("within limit");
        assert_eq!(ok["blob"].as_str().map(str::len), Some(10_000));
    }

    #[tokio::test]
    async fn streamed_body_crossing_limit_is_rejected() {
        async fn chunked() -> axum::body::Body {
            let chunks = (0..4).map(|_| Ok::<_, std::io::Error>(Bytes::from(vec![b' '; 64])));
            axum::body::Body::from_stream(futures::stream::iter(chunks))
        }

        let server = serve(Router::new().route("/api/v3/queue", get(chunked))).await;

        let err = limited_client(&server.base_url, 100)
            .call(&UpstreamRequest::get("queue"))
            .await
            .unwrap_err();
        match err {
            UpstreamError::ResponseTooLarge(msg) => assert!(msg.contains("100"), "{msg}"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn empty_api_key_is_rejected() {
        let err = SonarrClient::new(SonarrClientConfig {
            base_url: "http://localhost:8989".to_string(),
            api_key: "  ".to_string(),
            timeout: Duration::from_secs(1),
            max_response_bytes: None,
        })
        .err()
        .expect("config error");
        assert!(matches!(err, UpstreamError::Config(_)));
    }

    #[test]
    fn api_key_header_name_matches_sonarr() {
        assert_eq!(API_KEY_HEADER, "X-Api-Key");
    }
}
