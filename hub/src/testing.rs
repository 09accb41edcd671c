//! Scriptable in-memory backend for unit tests

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::BackendError;
use crate::llm::{BackendClient, BackendKind, CompletionRequest, CompletionResponse, HealthStatus, ModelInfo};

/// What `complete` does
#[derive(Debug, Clone)]
pub enum Reply {
    /// Answer with this text
    Text(String),
    /// Fail with this error
    Fail(BackendError),
    /// Never answer
    Hang,
}

pub struct MockBackend {
    kind: BackendKind,
    endpoint: String,
    healthy: AtomicBool,
    health_delay: Duration,
    list_delay: Duration,
    complete_delay: Duration,
    models: Mutex<Vec<String>>,
    list_error: Mutex<Option<BackendError>>,
    reply: Mutex<Reply>,
    requested_models: Mutex<Vec<String>>,
    health_calls: AtomicUsize,
    list_calls: AtomicUsize,
    complete_calls: AtomicUsize,
    closed: AtomicBool,
}

impl MockBackend {
    pub fn new(kind: BackendKind) -> Self {
        Self {
            kind,
            endpoint: format!("mock://{}", kind),
            healthy: AtomicBool::new(true),
            health_delay: Duration::ZERO,
            list_delay: Duration::ZERO,
            complete_delay: Duration::ZERO,
            models: Mutex::new(Vec::new()),
            list_error: Mutex::new(None),
            reply: Mutex::new(Reply::Text(format!("reply from {}", kind))),
            requested_models: Mutex::new(Vec::new()),
            health_calls: AtomicUsize::new(0),
            list_calls: AtomicUsize::new(0),
            complete_calls: AtomicUsize::new(0),
            closed: AtomicBool::new(false),
        }
    }

    pub fn with_models(self, ids: &[&str]) -> Self {
        self.set_models(ids);
        self
    }

    pub fn unhealthy(self) -> Self {
        self.set_healthy(false);
        self
    }

    pub fn with_health_delay(mut self, delay: Duration) -> Self {
        self.health_delay = delay;
        self
    }

    pub fn with_list_delay(mut self, delay: Duration) -> Self {
        self.list_delay = delay;
        self
    }

    pub fn with_complete_delay(mut self, delay: Duration) -> Self {
        self.complete_delay = delay;
        self
    }

    pub fn with_reply(self, reply: Reply) -> Self {
        self.set_reply(reply);
        self
    }

    pub fn set_healthy(&self, healthy: bool) {
        self.healthy.store(healthy, Ordering::SeqCst);
    }

    pub fn set_models(&self, ids: &[&str]) {
        *self.models.lock().unwrap() = ids.iter().map(|s| s.to_string()).collect();
    }

    pub fn set_list_error(&self, error: Option<BackendError>) {
        *self.list_error.lock().unwrap() = error;
    }

    pub fn set_reply(&self, reply: Reply) {
        *self.reply.lock().unwrap() = reply;
    }

    pub fn health_calls(&self) -> usize {
        self.health_calls.load(Ordering::SeqCst)
    }

    pub fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }

    pub fn complete_calls(&self) -> usize {
        self.complete_calls.load(Ordering::SeqCst)
    }

    /// Bare model ids this backend was asked to complete with
    pub fn requested_models(&self) -> Vec<String> {
        self.requested_models.lock().unwrap().clone()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl BackendClient for MockBackend {
    fn kind(&self) -> BackendKind {
        self.kind
    }

    fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn health_check(&self, _timeout: Duration) -> Result<HealthStatus, BackendError> {
        self.health_calls.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(self.health_delay).await;
        if self.healthy.load(Ordering::SeqCst) && !self.is_closed() {
            Ok(HealthStatus::Available)
        } else {
            Ok(HealthStatus::Unavailable {
                reason: "connection refused".to_string(),
            })
        }
    }

    async fn list_models(&self, _timeout: Duration) -> Result<Vec<ModelInfo>, BackendError> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        // A request already on the wire completes even if the client closes
        if self.is_closed() {
            return Err(BackendError::unreachable(self.kind, "client closed"));
        }
        tokio::time::sleep(self.list_delay).await;
        if let Some(error) = self.list_error.lock().unwrap().clone() {
            return Err(error);
        }
        let ids = self.models.lock().unwrap().clone();
        Ok(ids.into_iter().map(|id| ModelInfo::new(id, self.kind)).collect())
    }

    async fn complete(
        &self,
        request: &CompletionRequest,
        _timeout: Duration,
    ) -> Result<CompletionResponse, BackendError> {
        self.complete_calls.fetch_add(1, Ordering::SeqCst);
        let model = request.model.clone().unwrap_or_default();
        self.requested_models.lock().unwrap().push(model.clone());
        tokio::time::sleep(self.complete_delay).await;

        if self.is_closed() {
            return Err(BackendError::unreachable(self.kind, "client closed"));
        }
        let reply = self.reply.lock().unwrap().clone();
        match reply {
            Reply::Text(content) => Ok(CompletionResponse {
                content,
                model,
                backend: self.kind,
                created_at: None,
                done: true,
                prompt_tokens: None,
                completion_tokens: None,
                total_duration: None,
            }),
            Reply::Fail(error) => Err(error),
            Reply::Hang => std::future::pending().await,
        }
    }

    async fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}
