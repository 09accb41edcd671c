//! Ollama backend client
//!
//! Speaks Ollama's native API: `GET /api/tags` for the inventory,
//! `POST /api/chat` for inference and `POST /api/pull` to fetch models.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::backend::{BackendClient, HealthStatus};
use super::http::{HttpTransport, TransportError};
use super::{BackendKind, ChatMessage, CompletionRequest, CompletionResponse, ModelInfo};
use crate::error::BackendError;

// =============================================================================
// Wire types
// =============================================================================

#[derive(Debug, Deserialize)]
struct TagsResponse {
    models: Vec<TagEntry>,
}

#[derive(Debug, Deserialize)]
struct TagEntry {
    name: String,
    #[serde(default)]
    size: Option<u64>,
    #[serde(default)]
    modified_at: Option<String>,
    #[serde(default)]
    details: Option<TagDetails>,
}

#[derive(Debug, Default, Deserialize)]
struct TagDetails {
    #[serde(default)]
    family: Option<String>,
    #[serde(default)]
    families: Option<Vec<String>>,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    options: Option<ChatOptions>,
}

/// Ollama names the token limit `num_predict`
#[derive(Debug, Default, Serialize)]
struct ChatOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    num_predict: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_p: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    frequency_penalty: Option<f32>,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    model: String,
    #[serde(default)]
    created_at: Option<String>,
    message: ChatResponseMessage,
    #[serde(default)]
    done: bool,
    /// Nanoseconds
    #[serde(default)]
    total_duration: Option<u64>,
    #[serde(default)]
    prompt_eval_count: Option<u64>,
    #[serde(default)]
    eval_count: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct ChatResponseMessage {
    #[serde(default)]
    content: String,
}

#[derive(Debug, Serialize)]
struct PullRequest<'a> {
    name: &'a str,
    stream: bool,
}

#[derive(Debug, Deserialize)]
struct PullResponse {
    status: String,
}

// =============================================================================
// Client
// =============================================================================

/// Client for a local Ollama server
pub struct OllamaClient {
    transport: HttpTransport,
}

impl OllamaClient {
    pub fn new(endpoint: &str) -> Self {
        Self {
            transport: HttpTransport::new(endpoint),
        }
    }

    /// Download a model into the local Ollama store
    ///
    /// Blocks until the pull finishes; large models need a generous timeout.
    pub async fn pull_model(&self, name: &str, timeout: Duration) -> Result<(), BackendError> {
        let request = PullRequest {
            name,
            stream: false,
        };
        let response: PullResponse = self
            .transport
            .post_json("/api/pull", &request, timeout)
            .await
            .map_err(|e| e.into_inference_error(BackendKind::Ollama, timeout))?;

        if response.status == "success" {
            tracing::info!(model = name, "Pulled Ollama model");
            Ok(())
        } else {
            Err(BackendError::inference(
                BackendKind::Ollama,
                format!("pull of '{}' ended with status '{}'", name, response.status),
            ))
        }
    }

    fn to_model_info(entry: TagEntry) -> ModelInfo {
        let mut info = ModelInfo::new(entry.name, BackendKind::Ollama);
        info.size_bytes = entry.size;
        info.modified_at = entry.modified_at;

        // BERT-family weights are embedding-only regardless of the tag name
        let details = entry.details.unwrap_or_default();
        let is_bert = details
            .family
            .iter()
            .chain(details.families.iter().flatten())
            .any(|f| f.contains("bert"));
        if is_bert {
            info.capabilities = [crate::models::EMBEDDING.to_string()].into_iter().collect();
        }
        info
    }
}

#[async_trait]
impl BackendClient for OllamaClient {
    fn kind(&self) -> BackendKind {
        BackendKind::Ollama
    }

    fn endpoint(&self) -> &str {
        self.transport.base_url()
    }

    async fn health_check(&self, timeout: Duration) -> Result<HealthStatus, BackendError> {
        match self
            .transport
            .get_json::<serde_json::Value>("/api/tags", timeout)
            .await
        {
            Ok(_) => Ok(HealthStatus::Available),
            Err(TransportError::Timeout) => Ok(HealthStatus::Unavailable {
                reason: format!("no response within {}s", timeout.as_secs_f32()),
            }),
            Err(e) => Ok(HealthStatus::Unavailable {
                reason: e.to_string(),
            }),
        }
    }

    async fn list_models(&self, timeout: Duration) -> Result<Vec<ModelInfo>, BackendError> {
        let response: TagsResponse = self
            .transport
            .get_json("/api/tags", timeout)
            .await
            .map_err(|e| e.into_listing_error(BackendKind::Ollama, timeout))?;

        let models: Vec<ModelInfo> = response
            .models
            .into_iter()
            .map(Self::to_model_info)
            .collect();
        tracing::debug!(count = models.len(), "Listed Ollama models");
        Ok(models)
    }

    async fn complete(
        &self,
        request: &CompletionRequest,
        timeout: Duration,
    ) -> Result<CompletionResponse, BackendError> {
        let model = request.model.as_deref().ok_or_else(|| {
            BackendError::inference(BackendKind::Ollama, "no model given for completion")
        })?;

        let options = request.options.as_ref().map(|o| ChatOptions {
            temperature: o.temperature,
            num_predict: o.max_tokens,
            top_p: o.top_p,
            frequency_penalty: o.frequency_penalty,
        });
        let body = ChatRequest {
            model,
            messages: &request.messages,
            stream: false,
            options,
        };

        let response: ChatResponse = self
            .transport
            .post_json("/api/chat", &body, timeout)
            .await
            .map_err(|e| e.into_inference_error(BackendKind::Ollama, timeout))?;

        Ok(CompletionResponse {
            content: response.message.content,
            model: response.model,
            backend: BackendKind::Ollama,
            created_at: response.created_at,
            done: response.done,
            prompt_tokens: response.prompt_eval_count,
            completion_tokens: response.eval_count,
            total_duration: response.total_duration.map(Duration::from_nanos),
        })
    }

    async fn close(&self) {
        self.transport.close();
    }
}
