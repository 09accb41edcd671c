//! Unified backend manager
//!
//! Owns one [`ServiceDiscovery`] and one [`ModelCache`] and routes inference
//! to the best available backend with at most one fallback hop. The manager
//! is an ordinary value owned by the host; share it behind an `Arc`.
//!
//! Lifecycle: `Uninitialized -> Initializing -> Ready -> ShuttingDown ->
//! Closed`. Discovery and cache refreshes happen inside `Ready` without a
//! state change. Every public operation initializes on demand and fails with
//! [`HubError::ManagerClosed`] once [`UnifiedManager::close`] has started.

mod selection;
mod state;

pub use selection::{Candidates, Selection, SelectionReason};
pub use state::ManagerState;

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, RwLock};
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures_util::future::join_all;
use serde::Serialize;

use crate::cache::{CacheEntryStatus, CacheLookup, ModelCache};
use crate::discovery::{BackendHealth, ServiceDiscovery};
use crate::error::{BackendError, BackendFailure, HubError, HubResult};
use crate::llm::{
    build_client, BackendClient, BackendKind, CompletionRequest, CompletionResponse, ModelInfo,
};
use state::{Claim, Lifecycle};

/// Runtime settings, usually built from [`crate::config::HubConfig`]
#[derive(Debug, Clone, PartialEq)]
pub struct ManagerSettings {
    /// `Auto` means no preference
    pub preferred_backend: BackendKind,
    /// Fixed order used for every tie-break
    pub priority: Vec<BackendKind>,
    pub cache_ttl: Duration,
    pub health_check_timeout: Duration,
    pub inference_timeout: Duration,
    pub default_model: Option<String>,
}

impl Default for ManagerSettings {
    fn default() -> Self {
        Self {
            preferred_backend: BackendKind::Auto,
            priority: BackendKind::CONCRETE.to_vec(),
            cache_ttl: Duration::from_secs(300),
            health_check_timeout: Duration::from_secs(5),
            inference_timeout: Duration::from_secs(300),
            default_model: None,
        }
    }
}

/// Point-in-time view for health endpoints and diagnostics
#[derive(Debug, Clone, Serialize)]
pub struct HealthSnapshot {
    pub state: ManagerState,
    /// Configured backends in priority order
    pub backends: Vec<BackendHealth>,
    pub available: Vec<BackendKind>,
    pub discovery_passes: u64,
    pub cache: Vec<CacheEntryStatus>,
}

impl HealthSnapshot {
    pub fn any_available(&self) -> bool {
        !self.available.is_empty()
    }
}

pub struct UnifiedManager {
    settings: ManagerSettings,
    lifecycle: Lifecycle,
    discovery: ServiceDiscovery,
    cache: ModelCache,
    usage: RwLock<HashMap<String, DateTime<Utc>>>,
}

impl UnifiedManager {
    /// Build a manager over explicit clients
    ///
    /// Clients are ordered by `settings.priority`; clients for backends not
    /// listed keep their relative order after the listed ones.
    pub fn new(settings: ManagerSettings, mut clients: Vec<Arc<dyn BackendClient>>) -> Self {
        let rank = |kind: BackendKind| {
            settings
                .priority
                .iter()
                .position(|p| *p == kind)
                .unwrap_or(usize::MAX)
        };
        clients.sort_by_key(|c| rank(c.kind()));

        Self {
            cache: ModelCache::new(settings.cache_ttl),
            discovery: ServiceDiscovery::new(clients),
            lifecycle: Lifecycle::new(),
            usage: RwLock::new(HashMap::new()),
            settings,
        }
    }

    /// Build HTTP clients for every endpoint in `endpoints`
    pub fn with_endpoints(
        settings: ManagerSettings,
        endpoints: &BTreeMap<BackendKind, String>,
    ) -> Self {
        let clients = endpoints
            .iter()
            .filter_map(|(kind, url)| build_client(*kind, url))
            .collect();
        Self::new(settings, clients)
    }

    pub fn settings(&self) -> &ManagerSettings {
        &self.settings
    }

    pub fn state(&self) -> ManagerState {
        self.lifecycle.current()
    }

    /// Configured backends in priority order
    pub fn backends(&self) -> Vec<BackendKind> {
        self.discovery.backends()
    }

    pub fn discovery(&self) -> &ServiceDiscovery {
        &self.discovery
    }

    pub fn cache(&self) -> &ModelCache {
        &self.cache
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Run discovery and load models, once
    ///
    /// Concurrent callers wait for the in-flight run and share its result.
    /// Returns immediately when already `Ready`.
    pub async fn initialize(&self) -> HubResult<()> {
        loop {
            match self.lifecycle.try_claim() {
                Claim::Owner(guard) => {
                    self.populate().await;
                    guard.complete()?;
                    tracing::info!(
                        available = ?self.discovery.available_backends(),
                        "Manager ready"
                    );
                    return Ok(());
                }
                Claim::Ready => return Ok(()),
                Claim::Closed => return Err(HubError::ManagerClosed),
                Claim::InProgress => match self.lifecycle.wait_settled().await? {
                    ManagerState::Ready => return Ok(()),
                    ManagerState::ShuttingDown | ManagerState::Closed => {
                        return Err(HubError::ManagerClosed)
                    }
                    // The owner was cancelled; try to claim again
                    _ => continue,
                },
            }
        }
    }

    /// Like [`initialize`](Self::initialize) but never waits on another caller
    pub async fn try_initialize(&self) -> HubResult<()> {
        match self.lifecycle.try_claim() {
            Claim::Owner(guard) => {
                self.populate().await;
                guard.complete()
            }
            Claim::Ready => Ok(()),
            Claim::Closed => Err(HubError::ManagerClosed),
            Claim::InProgress => Err(HubError::AlreadyInitializing),
        }
    }

    async fn ensure_ready(&self) -> HubResult<()> {
        match self.lifecycle.current() {
            ManagerState::Ready => Ok(()),
            ManagerState::ShuttingDown | ManagerState::Closed => Err(HubError::ManagerClosed),
            _ => self.initialize().await,
        }
    }

    /// One discovery pass followed by a model load for every available backend
    async fn populate(&self) {
        self.discovery
            .discover_all(self.settings.health_check_timeout)
            .await;
        self.candidates(false).await;
    }

    /// Stop the manager and release client connections
    ///
    /// Idempotent; later calls to other operations fail with `ManagerClosed`.
    pub async fn close(&self) {
        if !self.lifecycle.begin_shutdown() {
            return;
        }
        tracing::info!("Manager shutting down");

        join_all(self.discovery.clients().iter().map(|c| c.close())).await;
        self.cache.invalidate(None);
        self.lifecycle.finish_shutdown();
        tracing::debug!("Manager closed");
    }

    // =========================================================================
    // Models
    // =========================================================================

    /// Fresh models for one available backend, fetching when stale
    ///
    /// A failed fetch leaves the entry absent and yields `None`.
    async fn models_for(&self, backend: BackendKind, force: bool) -> Option<Vec<ModelInfo>> {
        let reason = match self.cache.get_models(backend, force) {
            CacheLookup::Hit(models) => return Some(models),
            CacheLookup::Refresh(reason) => reason,
        };
        let client = self.discovery.client(backend)?;

        tracing::debug!(backend = %backend, ?reason, "Refreshing model list");
        match client.list_models(self.settings.health_check_timeout).await {
            Ok(models) => {
                // close() may have cleared the cache while the listing was in flight
                if self.lifecycle.check_open().is_err() {
                    return None;
                }
                tracing::info!(backend = %backend, count = models.len(), "Loaded models");
                self.cache.set_models(backend, models.clone());
                Some(models)
            }
            Err(e) => {
                tracing::warn!(backend = %backend, error = %e, "Failed to load models");
                self.cache.invalidate(Some(backend));
                None
            }
        }
    }

    /// Available backends with their fresh models, fetched concurrently
    async fn candidates(&self, force: bool) -> Candidates {
        let available = self.discovery.available_backends();
        let lists = join_all(available.iter().map(|b| self.models_for(*b, force))).await;

        Candidates::new(
            available
                .into_iter()
                .zip(lists)
                .map(|(backend, models)| (backend, models.unwrap_or_default()))
                .collect(),
        )
    }

    /// All models of every available backend, in priority order
    ///
    /// Stale entries are always refreshed before returning. With `refresh`,
    /// discovery is re-run first.
    pub async fn list_models(&self, refresh: bool) -> HubResult<Vec<ModelInfo>> {
        self.ensure_ready().await?;
        if refresh {
            self.discovery
                .discover_all(self.settings.health_check_timeout)
                .await;
        }
        let candidates = self.candidates(false).await;
        self.lifecycle.check_open()?;
        Ok(candidates.models().cloned().collect())
    }

    /// Look up a model by bare or qualified name
    pub async fn model_info(&self, name: &str) -> HubResult<Option<ModelInfo>> {
        self.ensure_ready().await?;
        let candidates = self.candidates(false).await;
        Ok(candidates.find(name).cloned())
    }

    /// The configured default model when advertised, else the first chat
    /// model of the highest-priority available backend
    pub async fn recommended_model(&self) -> HubResult<Option<ModelInfo>> {
        self.ensure_ready().await?;
        let candidates = self.candidates(false).await;
        Ok(candidates
            .recommended(self.settings.default_model.as_deref())
            .cloned())
    }

    /// Drop every cached listing, re-run discovery and reload models
    pub async fn reconnect(&self) -> HubResult<HealthSnapshot> {
        self.lifecycle.check_open()?;
        if self.lifecycle.current() != ManagerState::Ready {
            self.initialize().await?;
        } else {
            tracing::info!("Reconnecting to backends");
            self.cache.invalidate(None);
            self.populate().await;
        }
        self.get_health_snapshot()
    }

    // =========================================================================
    // Routing
    // =========================================================================

    /// Deterministic backend choice
    ///
    /// `preferred` wins when available; a qualified `model_hint` counts as a
    /// preference. Then the configured backend (if it can serve the model),
    /// then a backend advertising the model, then priority order.
    pub async fn select_backend(
        &self,
        preferred: Option<BackendKind>,
        model_hint: Option<&str>,
    ) -> HubResult<BackendKind> {
        self.ensure_ready().await?;
        let (qualified, model) = self.split_model(model_hint)?;
        let candidates = self.candidates_or_rediscover().await?;
        self.route(&candidates, qualified.or(preferred), model)
            .map(|s| s.backend)
            .ok_or_else(|| self.all_unavailable(Vec::new()))
    }

    fn route(
        &self,
        candidates: &Candidates,
        requested: Option<BackendKind>,
        model: Option<&str>,
    ) -> Option<Selection> {
        let requested = requested.filter(|b| b.is_concrete());
        let configured = Some(self.settings.preferred_backend).filter(|b| b.is_concrete());
        let selection = candidates.select(requested, configured, model)?;
        tracing::debug!(
            backend = %selection.backend,
            reason = ?selection.reason,
            model = model.unwrap_or("-"),
            "Selected backend"
        );
        Some(selection)
    }

    /// Split a possibly qualified name; prefixes must name a configured backend
    fn split_model<'a>(
        &self,
        name: Option<&'a str>,
    ) -> HubResult<(Option<BackendKind>, Option<&'a str>)> {
        let Some(name) = name else {
            return Ok((None, None));
        };
        match BackendKind::split_qualified(name) {
            Some((backend, _)) if self.discovery.client(backend).is_none() => {
                Err(HubError::NotConfigured(backend))
            }
            Some((backend, bare)) => Ok((Some(backend), Some(bare))),
            None => Ok((None, Some(name))),
        }
    }

    /// Current candidates; when none are available, one more discovery pass
    async fn candidates_or_rediscover(&self) -> HubResult<Candidates> {
        let candidates = self.candidates(false).await;
        if !candidates.is_empty() {
            return Ok(candidates);
        }

        tracing::info!("No backend available, re-running discovery");
        self.discovery
            .discover_all(self.settings.health_check_timeout)
            .await;
        self.lifecycle.check_open()?;

        let candidates = self.candidates(false).await;
        if candidates.is_empty() {
            Err(self.all_unavailable(Vec::new()))
        } else {
            Ok(candidates)
        }
    }

    /// Aggregate `attempted` failures with one entry for every other
    /// configured backend
    fn all_unavailable(&self, mut failures: Vec<BackendFailure>) -> HubError {
        for backend in self.discovery.backends() {
            if failures.iter().any(|f| f.backend == backend) {
                continue;
            }
            let error = match self.discovery.health(backend) {
                Some(health) if health.available => {
                    BackendError::inference(backend, "available but not attempted")
                }
                Some(health) => BackendError::unreachable(
                    backend,
                    health.error.unwrap_or_else(|| "unavailable".to_string()),
                ),
                None => BackendError::unreachable(backend, "not probed"),
            };
            failures.push(error.into());
        }
        HubError::AllBackendsUnavailable(failures)
    }

    // =========================================================================
    // Inference
    // =========================================================================

    /// Run one completion with at most one fallback hop
    ///
    /// Only `Unreachable` and `InferenceTimeout` trigger the fallback, so the
    /// worst case is about twice the inference timeout.
    pub async fn complete(&self, request: CompletionRequest) -> HubResult<CompletionResponse> {
        self.ensure_ready().await?;

        let (qualified, requested_model) = self.split_model(request.model.as_deref())?;
        let candidates = self.candidates_or_rediscover().await?;

        // A configured default model only steers routing when someone serves it
        let default_model = self.settings.default_model.as_deref();
        let model_hint = requested_model.or_else(|| {
            default_model.filter(|m| candidates.backends().any(|b| candidates.advertises(b, m)))
        });
        let explicit = qualified.or(request.backend);

        let selection = self
            .route(&candidates, explicit, model_hint)
            .ok_or_else(|| self.all_unavailable(Vec::new()))?;
        let primary = selection.backend;
        let model = candidates
            .model_for(primary, model_hint, requested_model.is_some(), default_model)
            .ok_or(HubError::NoModelAvailable)?;

        let first_error = match self.dispatch(primary, &request, &model).await {
            Ok(response) => return Ok(response),
            Err(e) if !e.allows_fallback() => return Err(e.into()),
            Err(e) => e,
        };
        tracing::warn!(backend = %primary, error = %first_error, "Primary backend failed");
        let mut failures = vec![BackendFailure::from(first_error)];

        let Some(backend) = candidates.fallback_after(primary, model_hint) else {
            return Err(self.all_unavailable(failures));
        };
        let Some(model) = candidates.model_for(backend, model_hint, false, default_model) else {
            failures.push(BackendError::inference(backend, "no model available").into());
            return Err(self.all_unavailable(failures));
        };

        tracing::info!(from = %primary, to = %backend, model = %model, "Falling back");
        match self.dispatch(backend, &request, &model).await {
            Ok(response) => Ok(response),
            Err(e) if e.allows_fallback() => {
                tracing::warn!(backend = %backend, error = %e, "Fallback backend failed");
                failures.push(e.into());
                Err(self.all_unavailable(failures))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Single call to one backend under the inference deadline
    async fn dispatch(
        &self,
        backend: BackendKind,
        request: &CompletionRequest,
        model: &str,
    ) -> Result<CompletionResponse, BackendError> {
        self.lifecycle
            .check_open()
            .map_err(|_| BackendError::unreachable(backend, "manager closed"))?;
        let client = self
            .discovery
            .client(backend)
            .ok_or_else(|| BackendError::unreachable(backend, "not configured"))?;

        let timeout = self.settings.inference_timeout;
        let bare = request.for_model(model);
        let response = tokio::time::timeout(timeout, client.complete(&bare, timeout))
            .await
            .map_err(|_| BackendError::InferenceTimeout { backend, timeout })??;

        self.record_usage(backend, model);
        Ok(response)
    }

    /// Single-prompt convenience over [`complete`](Self::complete)
    pub async fn generate(&self, model: Option<&str>, prompt: &str) -> HubResult<String> {
        let mut request = CompletionRequest::from_prompt(prompt);
        request.model = model.map(str::to_string);
        Ok(self.complete(request).await?.content)
    }

    fn record_usage(&self, backend: BackendKind, model: &str) {
        self.usage
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(format!("{}:{}", backend, model), Utc::now());
    }

    /// Last successful use per qualified model name
    pub fn usage_stats(&self) -> BTreeMap<String, DateTime<Utc>> {
        self.usage
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .map(|(k, v)| (k.clone(), *v))
            .collect()
    }

    // =========================================================================
    // Health
    // =========================================================================

    /// Read-only view of the last discovery pass and the cache
    pub fn get_health_snapshot(&self) -> HubResult<HealthSnapshot> {
        self.lifecycle.check_open()?;
        let snapshot = self.discovery.snapshot();
        let backends = self
            .discovery
            .backends()
            .into_iter()
            .filter_map(|b| snapshot.get(&b).cloned())
            .collect();

        Ok(HealthSnapshot {
            state: self.state(),
            backends,
            available: self.discovery.available_backends(),
            discovery_passes: self.discovery.passes(),
            cache: self.cache.status(),
        })
    }
}
