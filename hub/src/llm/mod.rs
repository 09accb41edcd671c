//! LLM backend abstraction layer
//!
//! Common request/response types plus one client per inference backend.
//! Every client implements [`BackendClient`]; the concrete client is picked
//! from a [`BackendKind`] tag by [`build_client`].

mod backend;
mod http;
mod lmstudio;
mod ollama;

pub use backend::{build_client, BackendClient, HealthStatus};
pub use lmstudio::LmStudioClient;
pub use ollama::OllamaClient;

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

// =============================================================================
// Backend identity
// =============================================================================

/// Inference backend tag, used as map key everywhere
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    Ollama,
    #[serde(rename = "lmstudio", alias = "lm-studio", alias = "lm_studio")]
    LmStudio,
    /// No preference; only meaningful as a preferred backend
    Auto,
}

impl BackendKind {
    /// Every concrete backend, in default priority order
    pub const CONCRETE: [BackendKind; 2] = [BackendKind::LmStudio, BackendKind::Ollama];

    pub fn as_str(self) -> &'static str {
        match self {
            BackendKind::Ollama => "ollama",
            BackendKind::LmStudio => "lmstudio",
            BackendKind::Auto => "auto",
        }
    }

    pub fn is_concrete(self) -> bool {
        self != BackendKind::Auto
    }

    /// Split a `backend:model` name into its backend and bare model id
    ///
    /// Returns `None` when the name carries no known backend prefix.
    pub fn split_qualified(name: &str) -> Option<(BackendKind, &str)> {
        let (prefix, rest) = name.split_once(':')?;
        match prefix.parse::<BackendKind>() {
            Ok(kind) if kind.is_concrete() && !rest.is_empty() => Some((kind, rest)),
            _ => None,
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BackendKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "ollama" => Ok(BackendKind::Ollama),
            "lmstudio" | "lm-studio" | "lm_studio" => Ok(BackendKind::LmStudio),
            "auto" => Ok(BackendKind::Auto),
            other => Err(format!(
                "unknown backend '{}' (expected auto, ollama or lmstudio)",
                other
            )),
        }
    }
}

// =============================================================================
// Models
// =============================================================================

/// A model advertised by one backend
///
/// Never mutated after creation; a refreshed listing replaces the whole set
/// for its backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelInfo {
    pub id: String,
    pub backend: BackendKind,
    pub display_name: String,
    pub capabilities: BTreeSet<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context_length: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size_bytes: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub modified_at: Option<String>,
}

impl ModelInfo {
    pub fn new(id: impl Into<String>, backend: BackendKind) -> Self {
        let id = id.into();
        Self {
            display_name: id.clone(),
            capabilities: crate::models::detect_capabilities(&id),
            id,
            backend,
            context_length: None,
            size_bytes: None,
            modified_at: None,
        }
    }

    /// `backend:id`, e.g. `lmstudio:deepseek-r1-distill-qwen-7b`
    pub fn qualified_name(&self) -> String {
        format!("{}:{}", self.backend, self.id)
    }

    pub fn has_capability(&self, capability: &str) -> bool {
        self.capabilities.contains(capability)
    }

    /// True if `name` refers to this model, bare or qualified
    pub fn matches(&self, name: &str) -> bool {
        match BackendKind::split_qualified(name) {
            Some((kind, id)) => kind == self.backend && id == self.id,
            None => name == self.id,
        }
    }
}

// =============================================================================
// Requests and responses
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

/// Message in a conversation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// Sampling options understood by both backends
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GenerationOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub frequency_penalty: Option<f32>,
}

/// A chat completion request
///
/// `model` may be bare (`llama3.1:8b`) or qualified (`ollama:llama3.1:8b`).
/// When `None`, the manager picks its recommended model.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CompletionRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    pub messages: Vec<ChatMessage>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<GenerationOptions>,
    /// Backend to try first; `None` or `Auto` defers to configuration
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backend: Option<BackendKind>,
}

impl CompletionRequest {
    /// Single user prompt
    pub fn from_prompt(prompt: impl Into<String>) -> Self {
        Self {
            messages: vec![ChatMessage::user(prompt)],
            ..Default::default()
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.messages.insert(0, ChatMessage::system(system));
        self
    }

    pub fn with_backend(mut self, backend: BackendKind) -> Self {
        self.backend = Some(backend);
        self
    }

    pub fn with_options(mut self, options: GenerationOptions) -> Self {
        self.options = Some(options);
        self
    }

    /// Copy of this request addressed to a bare model id
    pub(crate) fn for_model(&self, model: &str) -> Self {
        Self {
            model: Some(model.to_string()),
            ..self.clone()
        }
    }
}

/// A completed inference call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletionResponse {
    pub content: String,
    pub model: String,
    pub backend: BackendKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    pub done: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prompt_tokens: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completion_tokens: Option<u64>,
    /// Server-reported total generation time, when available
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_duration: Option<Duration>,
}
