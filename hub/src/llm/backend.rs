//! The backend client contract

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;

use super::{BackendKind, CompletionRequest, CompletionResponse, LmStudioClient, ModelInfo, OllamaClient};
use crate::error::BackendError;

/// Outcome of a health probe
///
/// A backend being down is an expected steady state, so it is reported as
/// a value instead of an error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum HealthStatus {
    Available,
    Unavailable { reason: String },
}

impl HealthStatus {
    pub fn is_available(&self) -> bool {
        matches!(self, HealthStatus::Available)
    }
}

/// One inference backend reachable over HTTP
///
/// Clients are constructed once at startup and shared read-only; their
/// connection pools are internally thread-safe. No method may block past the
/// `timeout` it is given.
#[async_trait]
pub trait BackendClient: Send + Sync {
    /// Which backend this client talks to
    fn kind(&self) -> BackendKind;

    /// Base URL of the backend
    fn endpoint(&self) -> &str;

    /// Lightweight liveness probe
    ///
    /// Network failures and timeouts yield `Ok(HealthStatus::Unavailable)`;
    /// `Err` is reserved for conditions the probe itself cannot classify.
    async fn health_check(&self, timeout: Duration) -> Result<HealthStatus, BackendError>;

    /// Current model inventory
    ///
    /// Fails with `Unreachable` when the backend cannot be reached in time and
    /// `Protocol` when the listing does not match the backend's API schema.
    async fn list_models(&self, timeout: Duration) -> Result<Vec<ModelInfo>, BackendError>;

    /// Run one chat completion
    ///
    /// `request.model` must be a bare model id for this backend. Fails with
    /// `InferenceTimeout`, `Inference` or `Unreachable`.
    async fn complete(
        &self,
        request: &CompletionRequest,
        timeout: Duration,
    ) -> Result<CompletionResponse, BackendError>;

    /// Release pooled connections; later calls fail with `Unreachable`
    async fn close(&self) {}
}

/// Build the client for a backend tag
///
/// Returns `None` for [`BackendKind::Auto`], which names no backend.
pub fn build_client(kind: BackendKind, endpoint: &str) -> Option<Arc<dyn BackendClient>> {
    match kind {
        BackendKind::Ollama => Some(Arc::new(OllamaClient::new(endpoint))),
        BackendKind::LmStudio => Some(Arc::new(LmStudioClient::new(endpoint))),
        BackendKind::Auto => None,
    }
}
