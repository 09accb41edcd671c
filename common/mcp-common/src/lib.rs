//! MCP Common - Shared plumbing for the MCP hub
//!
//! This crate provides functionality shared by every MCP surface of the hub:
//!
//! - **Connectors**: the [`Connector`] plugin contract that filesystem, GitHub
//!   and database adapters implement, plus [`scoped`] and [`CloseOnce`] for
//!   guaranteed single release of connector resources
//! - **Registry**: [`ConnectorRegistry`] for generic dispatch by name
//! - **Initialization**: [`init_tracing`] for stderr logging
//! - **Results/Errors**: helpers for building `CallToolResult` responses
//!
//! # Example
//!
//! ```rust,ignore
//! use std::time::Duration;
//! use mcp_common::{ConnectorRegistry, Connector};
//!
//! let registry = ConnectorRegistry::new();
//! registry.register(Arc::new(MyConnector::new()))?;
//!
//! let payload = registry
//!     .invoke("filesystem", "read_file", serde_json::json!({"path": "README.md"}), Duration::from_secs(30))
//!     .await?;
//!
//! registry.close_all().await?;
//! ```

pub mod connector;
pub mod error;
pub mod init;
pub mod registry;
pub mod result;

// Re-export commonly used items at crate root
pub use connector::{
    scoped, CloseOnce, Connector, ConnectorDescriptor, ConnectorError, ConnectorResult,
};
pub use error::{internal_error, invalid_params, IntoMcpError, McpResult, ResultExt};
pub use init::init_tracing;
pub use registry::ConnectorRegistry;
pub use result::{error_result, json_success, text_success};

// Re-export rmcp types that are commonly needed
pub use rmcp::{
    model::{CallToolResult, Content},
    ErrorData as McpError,
};

// Re-export async_trait for implementing Connector
pub use async_trait::async_trait;
