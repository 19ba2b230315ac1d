//! Session manager wrapper for rmcp's streamable HTTP transport.
//!
//! We delegate session handling to rmcp's `LocalSessionManager`, adding open/close logging and
//! a live session counter for `/health`.

use futures::Stream;
use rmcp::model::{ClientJsonRpcMessage, ServerJsonRpcMessage};
use rmcp::transport::common::server_side_http::ServerSseMessage;
use rmcp::transport::streamable_http_server::session::SessionId;
use rmcp::transport::streamable_http_server::session::SessionManager;
use rmcp::transport::streamable_http_server::session::local::LocalSessionManager;
use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::info;

#[derive(Default)]
pub struct TrackedSessionManager {
    inner: LocalSessionManager,
    active: AtomicUsize,
}

impl TrackedSessionManager {
    /// Sessions opened and not yet closed.
    #[must_use]
    pub fn active_sessions(&self) -> usize {
        self.active.load(Ordering::Relaxed)
    }

    async fn create_session_impl(
        &self,
    ) -> Result<
        (SessionId, <LocalSessionManager as SessionManager>::Transport),
        <LocalSessionManager as SessionManager>::Error,
    > {
        let created = self.inner.create_session().await?;
        let active = self.active.fetch_add(1, Ordering::Relaxed) + 1;
        info!(session_id = %created.0, active, "MCP session opened");
        Ok(created)
    }

    async fn close_session_impl(
        &self,
        id: &SessionId,
    ) -> Result<(), <LocalSessionManager as SessionManager>::Error> {
        let known = self.inner.has_session(id).await.unwrap_or(false);
        let result = self.inner.close_session(id).await;
        if known {
            let previous = self
                .active
                .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |n| n.checked_sub(1))
                .unwrap_or(0);
            info!(session_id = %id, active = previous.saturating_sub(1), "MCP session closed");
        }
        result
    }
}

impl SessionManager for TrackedSessionManager {
    type Error = <LocalSessionManager as SessionManager>::Error;
    type Transport = <LocalSessionManager as SessionManager>::Transport;

    fn create_session(
        &self,
    ) -> impl Future<Output = Result<(SessionId, Self::Transport), Self::Error>> + Send {
        self.create_session_impl()
    }

    fn initialize_session(
        &self,
        id: &SessionId,
        message: ClientJsonRpcMessage,
    ) -> impl Future<Output = Result<ServerJsonRpcMessage, Self::Error>> + Send {
        self.inner.initialize_session(id, message)
    }

    fn has_session(
        &self,
        id: &SessionId,
    ) -> impl Future<Output = Result<bool, Self::Error>> + Send {
        self.inner.has_session(id)
    }

    fn close_session(
        &self,
        id: &SessionId,
    ) -> impl Future<Output = Result<(), Self::Error>> + Send {
        self.close_session_impl(id)
    }

    fn create_stream(
        &self,
        id: &SessionId,
        message: ClientJsonRpcMessage,
    ) -> impl Future<
        Output = Result<impl Stream<Item = ServerSseMessage> + Send + Sync + 'static, Self::Error>,
    > + Send {
        self.inner.create_stream(id, message)
    }

    fn accept_message(
        &self,
        id: &SessionId,
        message: ClientJsonRpcMessage,
    ) -> impl Future<Output = Result<(), Self::Error>> + Send {
        self.inner.accept_message(id, message)
    }

    fn create_standalone_stream(
        &self,
        id: &SessionId,
    ) -> impl Future<
        Output = Result<impl Stream<Item = ServerSseMessage> + Send + Sync + 'static, Self::Error>,
    > + Send {
        self.inner.create_standalone_stream(id)
    }

    fn resume(
        &self,
        id: &SessionId,
        last_event_id: String,
    ) -> impl Future<
        Output = Result<impl Stream<Item = ServerSseMessage> + Send + Sync + 'static, Self::Error>,
    > + Send {
        self.inner.resume(id, last_event_id)
    }
}
