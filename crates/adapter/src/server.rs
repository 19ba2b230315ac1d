//! MCP server surface: wires the tool registry and resource provider into rmcp.

use crate::error::ToolError;
use crate::registry::ToolRegistry;
use crate::resources::ResourceProvider;
use crate::tools::ToolContext;
use rmcp::ErrorData as McpError;
use rmcp::ServerHandler;
use rmcp::model::{
    CallToolRequestParams, CallToolResult, Content, Implementation, ListResourceTemplatesResult,
    ListResourcesResult, ListToolsResult, PaginatedRequestParams, ReadResourceRequestParams,
    ReadResourceResult, ServerCapabilities, ServerInfo,
};
use rmcp::service::{RequestContext, RoleServer};
use serde_json::Value;
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};

const INSTRUCTIONS: &str = "TV series management server for Sonarr. Provides tools for managing \
    TV shows, monitoring downloads, and organizing your television collection. Series posters \
    and episode details are available as sonarr:// resources.";

#[derive(Clone)]
pub struct SonarrMcpServer {
    registry: Arc<ToolRegistry>,
    context: ToolContext,
    resources: ResourceProvider,
}

impl SonarrMcpServer {
    #[must_use]
    pub fn new(
        registry: Arc<ToolRegistry>,
        context: ToolContext,
        resources: ResourceProvider,
    ) -> Self {
        Self {
            registry,
            context,
            resources,
        }
    }

    /// Run one tool call and turn its outcome into an MCP response.
    ///
    /// # Errors
    ///
    /// Returns `invalid_params` for unknown tools and rejected arguments. Every other failure
    /// is reported in-band as an `isError` result.
    pub async fn dispatch(
        &self,
        name: &str,
        arguments: Option<&rmcp::model::JsonObject>,
    ) -> Result<CallToolResult, McpError> {
        let started = Instant::now();
        let outcome = self.registry.invoke(&self.context, name, arguments).await;
        let elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);

        match outcome {
            Ok(payload) => {
                info!(tool = name, elapsed_ms, "tool call succeeded");
                Ok(success_result(payload))
            }
            Err(e) => {
                warn!(tool = name, elapsed_ms, kind = e.kind(), error = %e, "tool call failed");
                if e.is_protocol_error() {
                    Err(e.into_mcp_error())
                } else {
                    Ok(e.into_call_result())
                }
            }
        }
    }
}

/// Text content plus `structured_content` carrying the same payload.
///
/// Some MCP clients only render `content` and ignore `structured_content`.
fn success_result(payload: Value) -> CallToolResult {
    let text = serde_json::to_string(&payload).unwrap_or_else(|_| payload.to_string());
    CallToolResult {
        content: vec![Content::text(text)],
        structured_content: Some(payload),
        is_error: Some(false),
        meta: None,
    }
}

fn resource_error(uri: &str, e: ToolError) -> McpError {
    match e {
        ToolError::NotFound(msg) => McpError::resource_not_found(
            msg,
            Some(serde_json::json!({ "uri": uri, "kind": "not_found" })),
        ),
        other => other.into_mcp_error(),
    }
}

impl ServerHandler for SonarrMcpServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            capabilities: ServerCapabilities::builder()
                .enable_tools()
                .enable_resources()
                .build(),
            server_info: Implementation {
                name: "sonarr-mcp".to_string(),
                title: Some("Sonarr MCP Server".to_string()),
                version: env!("CARGO_PKG_VERSION").to_string(),
                ..Default::default()
            },
            instructions: Some(INSTRUCTIONS.to_string()),
            ..Default::default()
        }
    }

    async fn list_tools(
        &self,
        _request: Option<PaginatedRequestParams>,
        _context: RequestContext<RoleServer>,
    ) -> Result<ListToolsResult, McpError> {
        Ok(ListToolsResult {
            tools: self.registry.list_tools(),
            ..Default::default()
        })
    }

    async fn call_tool(
        &self,
        request: CallToolRequestParams,
        _context: RequestContext<RoleServer>,
    ) -> Result<CallToolResult, McpError> {
        self.dispatch(request.name.as_ref(), request.arguments.as_ref())
            .await
    }

    async fn list_resources(
        &self,
        _request: Option<PaginatedRequestParams>,
        _context: RequestContext<RoleServer>,
    ) -> Result<ListResourcesResult, McpError> {
        Ok(ListResourcesResult::default())
    }

    async fn list_resource_templates(
        &self,
        _request: Option<PaginatedRequestParams>,
        _context: RequestContext<RoleServer>,
    ) -> Result<ListResourceTemplatesResult, McpError> {
        Ok(ListResourceTemplatesResult {
            resource_templates: self.resources.templates(),
            ..Default::default()
        })
    }

    async fn read_resource(
        &self,
        request: ReadResourceRequestParams,
        _context: RequestContext<RoleServer>,
    ) -> Result<ReadResourceResult, McpError> {
        let started = Instant::now();
        let result = self.resources.read(&request.uri).await;
        let elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
        match result {
            Ok(read) => {
                info!(uri = %request.uri, elapsed_ms, "resource read");
                Ok(read)
            }
            Err(e) => {
                warn!(
                    uri = %request.uri,
                    elapsed_ms,
                    kind = e.kind(),
                    error = %e,
                    "resource read failed"
                );
                Err(resource_error(&request.uri, e))
            }
        }
    }
}
