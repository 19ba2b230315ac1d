//! Sonarr MCP adapter binary.
//!
//! Serves the Sonarr tool set and resources over MCP streamable HTTP at `/mcp`, with a liveness
//! probe at `/health`.

mod config;
mod error;
mod registry;
mod resources;
mod server;
mod session_manager;
mod shaping;
mod tools;

use anyhow::Context as _;
use axum::Router;
use axum::extract::State;
use axum::routing::get;
use clap::Parser as _;
use config::{AdapterConfig, Cli, LogFormat};
use error::AdapterError;
use registry::ToolRegistry;
use resources::ResourceProvider;
use rmcp::transport::streamable_http_server::{StreamableHttpServerConfig, StreamableHttpService};
use serde_json::{Value, json};
use server::SonarrMcpServer;
use session_manager::TrackedSessionManager;
use sonarr_mcp_upstream::safety::redact_url;
use sonarr_mcp_upstream::{SonarrClient, UpstreamRequest};
use std::sync::Arc;
use tools::ToolContext;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(&cli.log_level, cli.log_format);

    let config = cli.into_config().context("invalid configuration")?;
    run(config).await
}

fn init_tracing(level: &str, format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    match format {
        LogFormat::Json => builder.json().init(),
        LogFormat::Text => builder.init(),
    }
}

async fn run(config: AdapterConfig) -> anyhow::Result<()> {
    let client = SonarrClient::new(config.client.clone())
        .map_err(|e| AdapterError::Config(e.to_string()))?;
    info!(
        sonarr_url = %redact_url(client.base_url()),
        api_key = "****",
        timeout_secs = client.timeout().as_secs(),
        "configuration loaded"
    );

    probe_upstream(&client).await;

    let registry = Arc::new(ToolRegistry::new(tools::sonarr_tools())?);
    let resources = ResourceProvider::new(client.clone())?;
    let context = ToolContext::new(client, config.series_defaults.clone());
    let server = SonarrMcpServer::new(Arc::clone(&registry), context, resources);

    let sessions = Arc::new(TrackedSessionManager::default());
    let mcp = StreamableHttpService::new(
        move || Ok(server.clone()),
        Arc::clone(&sessions),
        StreamableHttpServerConfig::default(),
    );

    let app = Router::new()
        .route("/health", get(health))
        .with_state(sessions)
        .nest_service("/mcp", mcp);

    let bind = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&bind)
        .await
        .map_err(|e| AdapterError::Startup(format!("bind {bind}: {e}")))?;
    let addr = listener.local_addr().map_err(AdapterError::Io)?;
    info!(
        %addr,
        tools = registry.len(),
        "listening on /mcp"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("serve")?;
    info!("shut down");
    Ok(())
}

/// One best-effort `system/status` call so misconfiguration shows up in the logs early.
async fn probe_upstream(client: &SonarrClient) {
    match client
        .call_json(&UpstreamRequest::get("system/status"))
        .await
    {
        Ok(status) => {
            let version = status.get("version").and_then(Value::as_str).unwrap_or("unknown");
            info!(version, "connected to Sonarr");
        }
        Err(e) => warn!(error = %e, "Sonarr is not reachable yet; serving anyway"),
    }
}

async fn health(State(sessions): State<Arc<TrackedSessionManager>>) -> axum::Json<Value> {
    axum::Json(json!({
        "status": "ok",
        "activeSessions": sessions.active_sessions(),
    }))
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "failed to listen for ctrl-c");
        std::future::pending::<()>().await;
    }
    info!("ctrl-c received, shutting down");
}
