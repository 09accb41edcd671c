//! Unified manager for local LLM inference backends
//!
//! Discovers which of Ollama and LM Studio are reachable, caches their model
//! inventories with a TTL, and routes chat completions to the best backend
//! with a single fallback hop.
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use mcp_hub::{config::HubConfig, llm::CompletionRequest, manager::UnifiedManager};
//!
//! let config = HubConfig::resolve(None)?;
//! let manager = Arc::new(UnifiedManager::with_endpoints(
//!     config.manager_settings(),
//!     &config.active_endpoints(),
//! ));
//!
//! let response = manager
//!     .complete(CompletionRequest::from_prompt("Why is the sky blue?"))
//!     .await?;
//! println!("[{}] {}", response.backend, response.content);
//!
//! manager.close().await;
//! ```

pub mod cache;
pub mod config;
pub mod connector;
pub mod discovery;
pub mod error;
pub mod handlers;
pub mod llm;
pub mod manager;
pub mod models;

#[cfg(feature = "mcp")]
pub mod server;

pub mod cli;

#[cfg(test)]
pub(crate) mod testing;

pub use error::{BackendError, HubError, HubResult};
pub use manager::{ManagerSettings, UnifiedManager};
