//! Error handling utilities for MCP tool handlers
//!
//! Converts connector and host errors into MCP-compatible errors so tool
//! implementations can use `?`.

use rmcp::ErrorData as McpError;

use crate::connector::ConnectorError;

/// Type alias for MCP tool results
pub type McpResult<T> = Result<T, McpError>;

/// Trait for converting errors into MCP-compatible errors
///
/// # Example
///
/// ```rust,ignore
/// use mcp_common::IntoMcpError;
///
/// impl IntoMcpError for MyError {
///     fn into_mcp_error(self) -> McpError {
///         McpError::internal_error(self.to_string(), None)
///     }
/// }
/// ```
pub trait IntoMcpError {
    /// Convert this error into an MCP error
    fn into_mcp_error(self) -> McpError;
}

impl IntoMcpError for ConnectorError {
    fn into_mcp_error(self) -> McpError {
        match self {
            ConnectorError::NotFound(_)
            | ConnectorError::InvalidParams(_)
            | ConnectorError::UnsupportedOperation { .. }
            | ConnectorError::Serde(_) => McpError::invalid_params(self.to_string(), None),
            _ => McpError::internal_error(self.to_string(), None),
        }
    }
}

impl IntoMcpError for serde_json::Error {
    fn into_mcp_error(self) -> McpError {
        McpError::invalid_params(format!("JSON error: {}", self), None)
    }
}

impl IntoMcpError for anyhow::Error {
    fn into_mcp_error(self) -> McpError {
        McpError::internal_error(self.to_string(), None)
    }
}

impl IntoMcpError for String {
    fn into_mcp_error(self) -> McpError {
        McpError::internal_error(self, None)
    }
}

/// Extension trait for Result types to convert to MCP errors
///
/// ```rust,ignore
/// use mcp_common::ResultExt;
///
/// let payload = registry.invoke(name, op, params, timeout).await.to_mcp_err()?;
/// ```
pub trait ResultExt<T> {
    /// Convert the error to an MCP error
    fn to_mcp_err(self) -> Result<T, McpError>;
}

impl<T, E: IntoMcpError> ResultExt<T> for Result<T, E> {
    fn to_mcp_err(self) -> Result<T, McpError> {
        self.map_err(|e| e.into_mcp_error())
    }
}

/// Create an internal error with a message
pub fn internal_error(message: impl Into<String>) -> McpError {
    McpError::internal_error(message.into(), None)
}

/// Create an invalid params error with a message
pub fn invalid_params(message: impl Into<String>) -> McpError {
    McpError::invalid_params(message.into(), None)
}
