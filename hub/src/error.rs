//! Error taxonomy
//!
//! [`BackendError`] is what a single backend client returns. [`HubError`] is
//! what the manager surfaces to its host. "Backend is down" is an expected
//! state, so both are plain values; nothing here is meant to be escalated to a
//! panic.

use std::fmt;
use std::time::Duration;

use serde::Serialize;

use crate::llm::BackendKind;

/// Failure of one backend client call
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BackendError {
    /// Connection refused, DNS failure, request timeout outside inference, or
    /// a closed client
    #[error("{backend} unreachable: {reason}")]
    Unreachable { backend: BackendKind, reason: String },

    /// The backend answered but the payload did not match its API schema
    #[error("{backend} protocol error: {reason}")]
    Protocol { backend: BackendKind, reason: String },

    /// Inference did not finish within its deadline
    #[error("{backend} inference timed out after {}s", timeout.as_secs())]
    InferenceTimeout {
        backend: BackendKind,
        timeout: Duration,
    },

    /// The backend reported an inference failure (unknown model, OOM, ...)
    #[error("{backend} inference failed: {message}")]
    Inference {
        backend: BackendKind,
        message: String,
    },
}

impl BackendError {
    pub fn unreachable(backend: BackendKind, reason: impl Into<String>) -> Self {
        BackendError::Unreachable {
            backend,
            reason: reason.into(),
        }
    }

    pub fn protocol(backend: BackendKind, reason: impl Into<String>) -> Self {
        BackendError::Protocol {
            backend,
            reason: reason.into(),
        }
    }

    pub fn inference(backend: BackendKind, message: impl Into<String>) -> Self {
        BackendError::Inference {
            backend,
            message: message.into(),
        }
    }

    pub fn backend(&self) -> BackendKind {
        match self {
            BackendError::Unreachable { backend, .. }
            | BackendError::Protocol { backend, .. }
            | BackendError::InferenceTimeout { backend, .. }
            | BackendError::Inference { backend, .. } => *backend,
        }
    }

    /// Whether the manager may retry the request on another backend
    pub fn allows_fallback(&self) -> bool {
        matches!(
            self,
            BackendError::Unreachable { .. } | BackendError::InferenceTimeout { .. }
        )
    }

    /// Stable short name of the error kind, for logs and snapshots
    pub fn kind(&self) -> &'static str {
        match self {
            BackendError::Unreachable { .. } => "backend_unreachable",
            BackendError::Protocol { .. } => "backend_protocol_error",
            BackendError::InferenceTimeout { .. } => "inference_timeout",
            BackendError::Inference { .. } => "inference_error",
        }
    }
}

/// One backend's reason for not serving a request
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BackendFailure {
    pub backend: BackendKind,
    pub kind: &'static str,
    pub reason: String,
    #[serde(skip)]
    pub error: BackendError,
}

impl From<BackendError> for BackendFailure {
    fn from(error: BackendError) -> Self {
        Self {
            backend: error.backend(),
            kind: error.kind(),
            reason: error.to_string(),
            error,
        }
    }
}

impl fmt::Display for BackendFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.backend, self.reason)
    }
}

/// Errors surfaced by the unified manager
#[derive(Debug, Clone, thiserror::Error)]
pub enum HubError {
    /// A single backend failed in a way that does not warrant fallback
    #[error(transparent)]
    Backend(#[from] BackendError),

    /// Every candidate backend failed; one entry per backend
    #[error("all backends unavailable: {}", describe_failures(.0))]
    AllBackendsUnavailable(Vec<BackendFailure>),

    /// The manager was closed; the host should stop using it
    #[error("manager is closed")]
    ManagerClosed,

    /// Another caller is initializing; await `initialize()` instead
    #[error("manager initialization already in progress")]
    AlreadyInitializing,

    /// Requested backend is not configured
    #[error("backend {0} is not configured")]
    NotConfigured(BackendKind),

    /// No available backend advertises any model to serve the request
    #[error("no model available for request")]
    NoModelAvailable,
}

fn describe_failures(failures: &[BackendFailure]) -> String {
    failures
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

impl HubError {
    /// Control-flow signals the host should handle quietly
    pub fn is_control_flow(&self) -> bool {
        matches!(self, HubError::ManagerClosed | HubError::AlreadyInitializing)
    }

    /// Message safe to show an end user; backend details stay in `Display`
    pub fn user_message(&self) -> &'static str {
        match self {
            HubError::ManagerClosed => "manager is closed",
            HubError::AlreadyInitializing => "manager is starting, try again shortly",
            _ => "no inference backend currently available",
        }
    }

    /// Per-backend failures, for diagnostics
    pub fn failures(&self) -> &[BackendFailure] {
        match self {
            HubError::AllBackendsUnavailable(failures) => failures,
            _ => &[],
        }
    }
}

pub type HubResult<T> = Result<T, HubError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allows_fallback() {
        assert!(BackendError::unreachable(BackendKind::Ollama, "refused").allows_fallback());
        assert!(BackendError::InferenceTimeout {
            backend: BackendKind::Ollama,
            timeout: Duration::from_secs(300),
        }
        .allows_fallback());
        assert!(!BackendError::inference(BackendKind::LmStudio, "no such model").allows_fallback());
        assert!(!BackendError::protocol(BackendKind::LmStudio, "bad json").allows_fallback());
    }

    #[test]
    fn test_all_backends_unavailable_display() {
        let err = HubError::AllBackendsUnavailable(vec![
            BackendError::unreachable(BackendKind::Ollama, "connection refused").into(),
            BackendError::unreachable(BackendKind::LmStudio, "connection refused").into(),
        ]);
        let text = err.to_string();
        assert!(text.contains("ollama unreachable: connection refused"));
        assert!(text.contains("lmstudio unreachable: connection refused"));
        assert_eq!(err.failures().len(), 2);
        assert_eq!(err.failures()[0].kind, "backend_unreachable");
    }

    #[test]
    fn test_user_message_hides_details() {
        let err = HubError::Backend(BackendError::protocol(
            BackendKind::Ollama,
            "missing field `models`",
        ));
        assert_eq!(err.user_message(), "no inference backend currently available");
        assert!(!err.is_control_flow());
        assert!(HubError::ManagerClosed.is_control_flow());
        assert!(HubError::AlreadyInitializing.is_control_flow());
    }
}
