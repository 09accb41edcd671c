//! Concurrent backend discovery
//!
//! A discovery pass probes every registered client at once and swaps the
//! finished health map into shared state in one step, so readers always see
//! one complete pass. Discovery keeps no timer; the manager decides when to
//! run a pass.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures_util::future::join_all;
use serde::{Serialize, Serializer};

use crate::llm::{BackendClient, BackendKind, HealthStatus};

fn as_millis<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_u64(duration.as_millis() as u64)
}

/// Result of probing one backend
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BackendHealth {
    pub backend: BackendKind,
    pub endpoint: String,
    pub available: bool,
    pub last_checked: DateTime<Utc>,
    #[serde(rename = "latency_ms", serialize_with = "as_millis")]
    pub latency: Duration,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Health map of one completed pass
pub type HealthMap = HashMap<BackendKind, BackendHealth>;

pub struct ServiceDiscovery {
    /// Registered clients in priority order
    clients: Vec<Arc<dyn BackendClient>>,
    snapshot: RwLock<Arc<HealthMap>>,
    passes: AtomicU64,
}

impl ServiceDiscovery {
    /// `clients` must be in priority order and hold at most one client per
    /// backend; later duplicates are ignored
    pub fn new(clients: Vec<Arc<dyn BackendClient>>) -> Self {
        let mut unique: Vec<Arc<dyn BackendClient>> = Vec::with_capacity(clients.len());
        for client in clients {
            if unique.iter().any(|c| c.kind() == client.kind()) {
                tracing::warn!(backend = %client.kind(), "Ignoring duplicate backend client");
                continue;
            }
            unique.push(client);
        }

        Self {
            clients: unique,
            snapshot: RwLock::new(Arc::new(HashMap::new())),
            passes: AtomicU64::new(0),
        }
    }

    /// Registered backends in priority order
    pub fn backends(&self) -> Vec<BackendKind> {
        self.clients.iter().map(|c| c.kind()).collect()
    }

    pub fn clients(&self) -> &[Arc<dyn BackendClient>] {
        &self.clients
    }

    pub fn client(&self, backend: BackendKind) -> Option<&Arc<dyn BackendClient>> {
        self.clients.iter().find(|c| c.kind() == backend)
    }

    /// Probe every backend concurrently and publish the result
    ///
    /// Each probe is bounded by `timeout_per_backend`, so a pass takes about
    /// one timeout however many backends are down.
    pub async fn discover_all(&self, timeout_per_backend: Duration) -> HealthMap {
        let probes = self
            .clients
            .iter()
            .map(|client| probe(Arc::clone(client), timeout_per_backend));
        let results = join_all(probes).await;

        let map: HealthMap = results.into_iter().map(|h| (h.backend, h)).collect();
        let available = map.values().filter(|h| h.available).count();

        *self.snapshot.write().unwrap_or_else(|e| e.into_inner()) = Arc::new(map.clone());
        let pass = self.passes.fetch_add(1, Ordering::SeqCst) + 1;

        tracing::info!(
            pass,
            available,
            total = self.clients.len(),
            "Discovery pass complete"
        );
        map
    }

    /// Last completed pass; empty before the first one
    pub fn snapshot(&self) -> Arc<HealthMap> {
        Arc::clone(&self.snapshot.read().unwrap_or_else(|e| e.into_inner()))
    }

    pub fn health(&self, backend: BackendKind) -> Option<BackendHealth> {
        self.snapshot().get(&backend).cloned()
    }

    pub fn is_available(&self, backend: BackendKind) -> bool {
        self.snapshot()
            .get(&backend)
            .map(|h| h.available)
            .unwrap_or(false)
    }

    /// Available backends from the last pass, in priority order
    pub fn available_backends(&self) -> Vec<BackendKind> {
        let snapshot = self.snapshot();
        self.clients
            .iter()
            .map(|c| c.kind())
            .filter(|kind| snapshot.get(kind).map(|h| h.available).unwrap_or(false))
            .collect()
    }

    /// Number of completed passes
    pub fn passes(&self) -> u64 {
        self.passes.load(Ordering::SeqCst)
    }
}

async fn probe(client: Arc<dyn BackendClient>, timeout: Duration) -> BackendHealth {
    let backend = client.kind();
    let started = tokio::time::Instant::now();

    let outcome = tokio::time::timeout(timeout, client.health_check(timeout)).await;
    let latency = started.elapsed();

    let error = match outcome {
        Ok(Ok(HealthStatus::Available)) => None,
        Ok(Ok(HealthStatus::Unavailable { reason })) => Some(reason),
        Ok(Err(e)) => Some(e.to_string()),
        Err(_) => Some(format!("no response within {}s", timeout.as_secs_f32())),
    };

    match &error {
        None => tracing::debug!(backend = %backend, ?latency, "Backend available"),
        Some(reason) => tracing::warn!(backend = %backend, %reason, "Backend unavailable"),
    }

    BackendHealth {
        backend,
        endpoint: client.endpoint().to_string(),
        available: error.is_none(),
        last_checked: Utc::now(),
        latency,
        error,
    }
}
