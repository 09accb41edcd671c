//! Serve command handler

use std::sync::Arc;

use anyhow::Result;
use mcp_common::ConnectorRegistry;

use super::CommandContext;
use crate::connector::LlmConnector;

/// Handle the `serve` command - run as an MCP server on stdio
pub async fn run_serve(ctx: &CommandContext) -> Result<()> {
    let registry = Arc::new(ConnectorRegistry::new());
    registry.register(Arc::new(LlmConnector::new(ctx.manager().clone())))?;

    let result = crate::server::serve(ctx.manager().clone(), registry.clone()).await;

    if let Err(e) = registry.close_all().await {
        tracing::warn!("Connector shutdown incomplete: {}", e);
    }
    result
}
