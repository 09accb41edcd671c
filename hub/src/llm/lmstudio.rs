//! LM Studio backend client (OpenAI-compatible API)

use std::time::Duration;

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use serde::{Deserialize, Serialize};

use super::backend::{BackendClient, HealthStatus};
use super::http::{HttpTransport, TransportError};
use super::{BackendKind, ChatMessage, CompletionRequest, CompletionResponse, ModelInfo};
use crate::error::BackendError;

/// Sampling temperature sent when the caller does not set one
const DEFAULT_TEMPERATURE: f32 = 0.7;
/// `-1` lets LM Studio generate until the model stops
const DEFAULT_MAX_TOKENS: i64 = -1;

#[derive(Debug, Deserialize)]
struct ModelsResponse {
    data: Vec<ModelEntry>,
}

#[derive(Debug, Deserialize)]
struct ModelEntry {
    id: String,
    /// `llm`, `vlm` or `embeddings`; only some LM Studio versions send it
    #[serde(default, rename = "type")]
    model_type: Option<String>,
    #[serde(default)]
    max_context_length: Option<u64>,
    #[serde(default)]
    created: Option<i64>,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    stream: bool,
    temperature: f32,
    max_tokens: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_p: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    frequency_penalty: Option<f32>,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    model: String,
    #[serde(default)]
    created: Option<i64>,
    choices: Vec<Choice>,
    #[serde(default)]
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Usage {
    #[serde(default)]
    prompt_tokens: Option<u64>,
    #[serde(default)]
    completion_tokens: Option<u64>,
}

fn unix_to_rfc3339(seconds: i64) -> Option<String> {
    Utc.timestamp_opt(seconds, 0).single().map(|t| t.to_rfc3339())
}

/// Client for an LM Studio local server
///
/// LM Studio loads models on first use, so `complete` may legitimately take
/// much longer than a health probe.
pub struct LmStudioClient {
    transport: HttpTransport,
}

impl LmStudioClient {
    pub fn new(endpoint: &str) -> Self {
        Self {
            transport: HttpTransport::new(endpoint),
        }
    }

    fn to_model_info(entry: ModelEntry) -> ModelInfo {
        let mut info = ModelInfo::new(entry.id, BackendKind::LmStudio);
        info.capabilities =
            crate::models::capabilities_for_type(&info.id, entry.model_type.as_deref());
        info.context_length = entry.max_context_length;
        info.modified_at = entry.created.and_then(unix_to_rfc3339);
        info
    }
}

#[async_trait]
impl BackendClient for LmStudioClient {
    fn kind(&self) -> BackendKind {
        BackendKind::LmStudio
    }

    fn endpoint(&self) -> &str {
        self.transport.base_url()
    }

    async fn health_check(&self, timeout: Duration) -> Result<HealthStatus, BackendError> {
        match self
            .transport
            .get_json::<serde_json::Value>("/v1/models", timeout)
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
        let response: ModelsResponse = self
            .transport
            .get_json("/v1/models", timeout)
            .await
            .map_err(|e| e.into_listing_error(BackendKind::LmStudio, timeout))?;

        let models: Vec<ModelInfo> = response
            .data
            .into_iter()
            .map(Self::to_model_info)
            .collect();
        tracing::debug!(count = models.len(), "Listed LM Studio models");
        Ok(models)
    }

    async fn complete(
        &self,
        request: &CompletionRequest,
        timeout: Duration,
    ) -> Result<CompletionResponse, BackendError> {
        let model = request.model.as_deref().ok_or_else(|| {
            BackendError::inference(BackendKind::LmStudio, "no model given for completion")
        })?;

        let options = request.options.clone().unwrap_or_default();
        let body = ChatRequest {
            model,
            messages: &request.messages,
            stream: false,
            temperature: options.temperature.unwrap_or(DEFAULT_TEMPERATURE),
            max_tokens: options.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS),
            top_p: options.top_p,
            frequency_penalty: options.frequency_penalty,
        };

        let response: ChatResponse = self
            .transport
            .post_json("/v1/chat/completions", &body, timeout)
            .await
            .map_err(|e| e.into_inference_error(BackendKind::LmStudio, timeout))?;

        let choice = response.choices.into_iter().next().ok_or_else(|| {
            BackendError::protocol(BackendKind::LmStudio, "completion returned no choices")
        })?;
        let usage = response.usage;

        Ok(CompletionResponse {
            content: choice.message.content.unwrap_or_default(),
            model: response.model,
            backend: BackendKind::LmStudio,
            created_at: response.created.and_then(unix_to_rfc3339),
            done: choice.finish_reason.is_some(),
            prompt_tokens: usage.as_ref().and_then(|u| u.prompt_tokens),
            completion_tokens: usage.as_ref().and_then(|u| u.completion_tokens),
            total_duration: None,
        })
    }

    async fn close(&self) {
        self.transport.close();
    }
}
