//! Command handlers module
//!
//! One handler per CLI command. [`CommandContext`] carries the resolved
//! configuration and the manager shared by every handler.

use std::sync::Arc;

use crate::config::HubConfig;
use crate::llm::{BackendKind, OllamaClient};
use crate::manager::UnifiedManager;

pub mod complete;
pub mod health;
pub mod models;
pub mod pull;

#[cfg(feature = "mcp")]
pub mod serve;

pub use complete::run_complete;
pub use health::run_health;
pub use models::run_models;
pub use pull::run_pull;

#[cfg(feature = "mcp")]
pub use serve::run_serve;

/// Shared context for command handlers
pub struct CommandContext {
    pub config: HubConfig,
    pub verbose: u8,
    /// Backend named on the command line, if any
    pub backend: Option<BackendKind>,
    manager: Arc<UnifiedManager>,
}

impl CommandContext {
    /// Build the manager from `config`; no network traffic happens here
    pub fn new(config: HubConfig, backend: Option<BackendKind>, verbose: u8) -> Self {
        let manager = Arc::new(UnifiedManager::with_endpoints(
            config.manager_settings(),
            &config.active_endpoints(),
        ));
        Self {
            config,
            verbose,
            backend,
            manager,
        }
    }

    pub fn manager(&self) -> &Arc<UnifiedManager> {
        &self.manager
    }

    /// Ollama client for Ollama-only operations, when Ollama is configured
    pub fn ollama(&self) -> Option<OllamaClient> {
        self.config
            .active_endpoints()
            .get(&BackendKind::Ollama)
            .map(|url| OllamaClient::new(url))
    }

    /// Check if verbose mode is enabled (any -v flag)
    pub fn is_verbose(&self) -> bool {
        self.verbose >= 1
    }
}
