//! MCP Server implementation
//!
//! Exposes the unified manager and the connector registry as MCP tools over
//! stdio.
//!
//! Tools exposed:
//! - `list_models` - Models of every available backend
//! - `complete` - Chat completion with backend fallback
//! - `health` - Discovery and cache snapshot
//! - `reconnect` - Drop cached state and rediscover backends
//! - `list_connectors` - Registered connectors and their capabilities
//! - `invoke_connector` - Run one connector operation

use std::sync::Arc;
use std::time::Duration;

use mcp_common::{error_result, json_success, text_success, ConnectorRegistry, McpError};
use rmcp::{
    handler::server::{router::tool::ToolRouter, wrapper::Parameters},
    model::{CallToolResult, ServerCapabilities, ServerInfo},
    tool, tool_handler, tool_router,
};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::connector::CompletionParams;
use crate::error::HubError;
use crate::manager::UnifiedManager;

/// Default deadline for `invoke_connector`
const DEFAULT_CONNECTOR_TIMEOUT_SECS: u64 = 60;

/// The hub MCP server
pub struct HubMcpServer {
    tool_router: ToolRouter<Self>,
    manager: Arc<UnifiedManager>,
    connectors: Arc<ConnectorRegistry>,
}

// ============================================================================
// Parameter Types
// ============================================================================

#[derive(Debug, Default, Serialize, Deserialize, JsonSchema)]
pub struct ListModelsParams {
    #[schemars(description = "Re-run backend discovery before listing")]
    pub refresh: Option<bool>,
}

#[derive(Debug, Default, Serialize, Deserialize, JsonSchema)]
pub struct EmptyParams {}

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct InvokeConnectorParams {
    #[schemars(description = "Registered connector name (see list_connectors)")]
    pub connector: String,
    #[schemars(description = "Operation to run, one of the connector's capabilities")]
    pub operation: String,
    #[schemars(description = "Operation parameters as a JSON object")]
    pub params: Option<serde_json::Value>,
    #[schemars(description = "Deadline in seconds (default: 60)")]
    pub timeout_secs: Option<u64>,
}

/// Tool failures become error results, not protocol errors
fn hub_error(error: HubError) -> CallToolResult {
    if error.is_control_flow() {
        tracing::debug!(error = %error, "Tool call hit control-flow signal");
    } else {
        tracing::warn!(error = %error, "Tool call failed");
    }
    error_result(error.user_message())
}

#[tool_router]
impl HubMcpServer {
    pub fn new(manager: Arc<UnifiedManager>, connectors: Arc<ConnectorRegistry>) -> Self {
        Self {
            tool_router: Self::tool_router(),
            manager,
            connectors,
        }
    }

    // ========================================================================
    // Inference Tools
    // ========================================================================

    #[tool(
        description = "List models from every available inference backend. Names can be passed to 'complete' as-is or qualified as 'backend:model'."
    )]
    async fn list_models(
        &self,
        Parameters(params): Parameters<ListModelsParams>,
    ) -> Result<CallToolResult, McpError> {
        match self.manager.list_models(params.refresh.unwrap_or(false)).await {
            Ok(models) => json_success(&models),
            Err(e) => Ok(hub_error(e)),
        }
    }

    #[tool(
        description = "Send a prompt to a local LLM. Routes to the best available backend and falls back once if it is unreachable or times out."
    )]
    async fn complete(
        &self,
        Parameters(params): Parameters<CompletionParams>,
    ) -> Result<CallToolResult, McpError> {
        if params.prompt.trim().is_empty() {
            return Err(mcp_common::invalid_params("prompt must not be empty"));
        }
        let request = params.into_request().map_err(mcp_common::invalid_params)?;

        match self.manager.complete(request).await {
            Ok(response) => {
                tracing::info!(backend = %response.backend, model = %response.model, "Completion served");
                json_success(&response)
            }
            Err(e) => Ok(hub_error(e)),
        }
    }

    // ========================================================================
    // Health Tools
    // ========================================================================

    #[tool(description = "Show backend availability, latency and model cache state.")]
    async fn health(
        &self,
        Parameters(_params): Parameters<EmptyParams>,
    ) -> Result<CallToolResult, McpError> {
        if let Err(e) = self.manager.initialize().await {
            return Ok(hub_error(e));
        }
        match self.manager.get_health_snapshot() {
            Ok(snapshot) => json_success(&snapshot),
            Err(e) => Ok(hub_error(e)),
        }
    }

    #[tool(description = "Drop all cached model lists and rediscover backends.")]
    async fn reconnect(
        &self,
        Parameters(_params): Parameters<EmptyParams>,
    ) -> Result<CallToolResult, McpError> {
        match self.manager.reconnect().await {
            Ok(snapshot) => json_success(&snapshot),
            Err(e) => Ok(hub_error(e)),
        }
    }

    // ========================================================================
    // Connector Tools
    // ========================================================================

    #[tool(description = "List registered connectors and their capabilities.")]
    async fn list_connectors(
        &self,
        Parameters(_params): Parameters<EmptyParams>,
    ) -> Result<CallToolResult, McpError> {
        let descriptors = self.connectors.descriptors();
        if descriptors.is_empty() {
            return Ok(text_success("No connectors registered"));
        }
        json_success(&descriptors)
    }

    #[tool(description = "Invoke an operation on a registered connector.")]
    async fn invoke_connector(
        &self,
        Parameters(params): Parameters<InvokeConnectorParams>,
    ) -> Result<CallToolResult, McpError> {
        let timeout = Duration::from_secs(
            params
                .timeout_secs
                .unwrap_or(DEFAULT_CONNECTOR_TIMEOUT_SECS)
                .max(1),
        );
        let payload = params.params.unwrap_or(serde_json::Value::Null);

        match self
            .connectors
            .invoke(&params.connector, &params.operation, payload, timeout)
            .await
        {
            Ok(value) => json_success(&value),
            Err(e) => {
                tracing::warn!(connector = %params.connector, error = %e, "Connector call failed");
                Ok(error_result(e.to_string()))
            }
        }
    }
}

// ============================================================================
// Server Handler Implementation
// ============================================================================

#[tool_handler]
impl rmcp::ServerHandler for HubMcpServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            instructions: Some(
                "MCP Hub - routes chat completions to local inference backends (Ollama, LM Studio). \
                 Use 'list_models' to see what is loaded, 'complete' to run a prompt and 'health' \
                 when nothing answers."
                    .into(),
            ),
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            ..Default::default()
        }
    }
}

/// Start the MCP server on stdio
///
/// Returns when the client disconnects. The caller owns shutdown of the
/// manager and the registry.
pub async fn serve(manager: Arc<UnifiedManager>, connectors: Arc<ConnectorRegistry>) -> anyhow::Result<()> {
    use rmcp::{transport::stdio, ServiceExt};

    tracing::info!("Starting MCP Hub server");
    tracing::info!("Backends: {:?}", manager.backends());

    // Discovery runs on the first tool call so startup never waits on a slow backend
    let server = HubMcpServer::new(manager, connectors);
    let service = server.serve(stdio()).await?;

    tracing::info!("Server running on stdio, waiting for requests...");
    service.waiting().await?;

    tracing::info!("Server shutting down");
    Ok(())
}
