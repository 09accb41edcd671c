//! The manager exposed through the connector contract
//!
//! Lets a generic router reach inference the same way it reaches any data
//! connector: `registry.invoke("llm", "complete", params, timeout)`.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use mcp_common::{Connector, ConnectorError, ConnectorResult};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::error::HubError;
use crate::llm::{BackendKind, CompletionRequest};
use crate::manager::UnifiedManager;

pub const CONNECTOR_NAME: &str = "llm";

/// Parameters of a completion, shared by the connector and the MCP tools
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "mcp", derive(schemars::JsonSchema))]
pub struct CompletionParams {
    #[cfg_attr(feature = "mcp", schemars(description = "The prompt to send"))]
    pub prompt: String,
    #[cfg_attr(
        feature = "mcp",
        schemars(description = "Model id, bare or qualified (e.g. 'ollama:llama3.1:8b'). Defaults to the recommended model.")
    )]
    #[serde(default)]
    pub model: Option<String>,
    #[cfg_attr(feature = "mcp", schemars(description = "Optional system prompt"))]
    #[serde(default)]
    pub system_prompt: Option<String>,
    #[cfg_attr(
        feature = "mcp",
        schemars(description = "Backend to try first: auto, ollama or lmstudio")
    )]
    #[serde(default)]
    pub backend: Option<String>,
}

impl CompletionParams {
    pub fn into_request(self) -> Result<CompletionRequest, String> {
        let mut request = CompletionRequest::from_prompt(self.prompt);
        if let Some(system) = self.system_prompt.filter(|s| !s.is_empty()) {
            request = request.with_system(system);
        }
        request.model = self.model.filter(|m| !m.is_empty());
        if let Some(backend) = self.backend {
            let backend: BackendKind = backend.parse()?;
            request.backend = Some(backend).filter(|b| b.is_concrete());
        }
        Ok(request)
    }
}

#[derive(Debug, Default, Deserialize)]
struct ListModelsParams {
    #[serde(default)]
    refresh: bool,
}

/// Connector over a shared [`UnifiedManager`]
///
/// Closing the connector closes the manager.
pub struct LlmConnector {
    manager: Arc<UnifiedManager>,
}

impl LlmConnector {
    pub fn new(manager: Arc<UnifiedManager>) -> Self {
        Self { manager }
    }

    fn map_error(&self, error: HubError) -> ConnectorError {
        match error {
            HubError::ManagerClosed => ConnectorError::Closed(CONNECTOR_NAME.to_string()),
            other => {
                tracing::warn!(error = %other, "LLM connector operation failed");
                ConnectorError::Execution(other.user_message().to_string())
            }
        }
    }
}

fn parse<T: for<'de> Deserialize<'de> + Default>(params: Value) -> ConnectorResult<T> {
    if params.is_null() {
        return Ok(T::default());
    }
    serde_json::from_value(params).map_err(|e| ConnectorError::InvalidParams(e.to_string()))
}

#[async_trait]
impl Connector for LlmConnector {
    fn name(&self) -> &str {
        CONNECTOR_NAME
    }

    fn capabilities(&self) -> BTreeSet<String> {
        ["complete", "list_models", "health", "recommended_model"]
            .into_iter()
            .map(str::to_string)
            .collect()
    }

    fn description(&self) -> Option<&str> {
        Some("Chat completion routed across local inference backends")
    }

    async fn invoke(&self, operation: &str, params: Value, timeout: Duration) -> ConnectorResult<Value> {
        match operation {
            "complete" => {
                let params: CompletionParams = parse(params)?;
                if params.prompt.is_empty() {
                    return Err(ConnectorError::InvalidParams("prompt is required".to_string()));
                }
                let request = params.into_request().map_err(ConnectorError::InvalidParams)?;
                let response = tokio::time::timeout(timeout, self.manager.complete(request))
                    .await
                    .map_err(|_| ConnectorError::Timeout {
                        connector: CONNECTOR_NAME.to_string(),
                        timeout,
                    })?
                    .map_err(|e| self.map_error(e))?;
                Ok(serde_json::to_value(response)?)
            }
            "list_models" => {
                let params: ListModelsParams = parse(params)?;
                let models = self
                    .manager
                    .list_models(params.refresh)
                    .await
                    .map_err(|e| self.map_error(e))?;
                Ok(serde_json::to_value(models)?)
            }
            "health" => {
                let snapshot = self
                    .manager
                    .get_health_snapshot()
                    .map_err(|e| self.map_error(e))?;
                Ok(serde_json::to_value(snapshot)?)
            }
            "recommended_model" => {
                let model = self
                    .manager
                    .recommended_model()
                    .await
                    .map_err(|e| self.map_error(e))?;
                Ok(json!({ "model": model }))
            }
            other => Err(ConnectorError::UnsupportedOperation {
                connector: CONNECTOR_NAME.to_string(),
                operation: other.to_string(),
            }),
        }
    }

    async fn close(&self) -> ConnectorResult<()> {
        self.manager.close().await;
        Ok(())
    }

    async fn health_check(&self) -> bool {
        self.manager
            .get_health_snapshot()
            .map(|s| s.any_available())
            .unwrap_or(false)
    }
}
