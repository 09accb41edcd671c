//! TTL-bounded model inventory cache
//!
//! Stores one model list per backend. The cache never fetches anything
//! itself: a lookup either hits or tells the caller why a refresh is needed,
//! and the manager does the fetching through the backend client.

use std::collections::HashMap;
use std::sync::RwLock;
use std::time::Duration;

use serde::Serialize;
use tokio::time::Instant;

use crate::llm::{BackendKind, ModelInfo};

/// One backend's model listing and when it was fetched
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub backend: BackendKind,
    pub models: Vec<ModelInfo>,
    pub fetched_at: Instant,
}

impl CacheEntry {
    /// Fresh iff strictly younger than `ttl` at `now`
    pub fn is_fresh_at(&self, now: Instant, ttl: Duration) -> bool {
        now.saturating_duration_since(self.fetched_at) < ttl
    }

    pub fn age(&self) -> Duration {
        self.fetched_at.elapsed()
    }
}

/// Why a lookup did not produce models
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RefreshReason {
    /// Nothing was ever stored for this backend, or it was invalidated
    Missing,
    /// The entry is older than the TTL
    Expired,
    /// The caller asked for a refresh
    Forced,
}

/// Result of [`ModelCache::get_models`]
#[derive(Debug, Clone, PartialEq)]
pub enum CacheLookup {
    Hit(Vec<ModelInfo>),
    Refresh(RefreshReason),
}

impl CacheLookup {
    pub fn into_hit(self) -> Option<Vec<ModelInfo>> {
        match self {
            CacheLookup::Hit(models) => Some(models),
            CacheLookup::Refresh(_) => None,
        }
    }
}

/// Age of one cached entry, for health snapshots
#[derive(Debug, Clone, Serialize)]
pub struct CacheEntryStatus {
    pub backend: BackendKind,
    pub models: usize,
    pub age_seconds: u64,
    pub fresh: bool,
}

/// Model inventory per backend with a shared TTL
///
/// The lock is held only for map reads and swaps, never across I/O.
pub struct ModelCache {
    ttl: Duration,
    entries: RwLock<HashMap<BackendKind, CacheEntry>>,
}

impl ModelCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: RwLock::new(HashMap::new()),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Cached models for `backend`, or the reason a refresh is needed
    pub fn get_models(&self, backend: BackendKind, force_refresh: bool) -> CacheLookup {
        if force_refresh {
            return CacheLookup::Refresh(RefreshReason::Forced);
        }

        let entries = self.entries.read().unwrap_or_else(|e| e.into_inner());
        match entries.get(&backend) {
            None => CacheLookup::Refresh(RefreshReason::Missing),
            Some(entry) if entry.is_fresh_at(Instant::now(), self.ttl) => {
                CacheLookup::Hit(entry.models.clone())
            }
            Some(_) => CacheLookup::Refresh(RefreshReason::Expired),
        }
    }

    /// Whether `backend` has an entry that is still fresh
    pub fn is_fresh(&self, backend: BackendKind) -> bool {
        matches!(self.get_models(backend, false), CacheLookup::Hit(_))
    }

    /// Replace the whole entry for `backend`, stamped with the current time
    pub fn set_models(&self, backend: BackendKind, models: Vec<ModelInfo>) {
        let entry = CacheEntry {
            backend,
            models,
            fetched_at: Instant::now(),
        };
        self.insert_entry(entry);
    }

    pub(crate) fn insert_entry(&self, entry: CacheEntry) {
        self.entries
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(entry.backend, entry);
    }

    /// Drop one entry, or every entry when `backend` is `None`
    pub fn invalidate(&self, backend: Option<BackendKind>) {
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        match backend {
            Some(backend) => {
                entries.remove(&backend);
            }
            None => entries.clear(),
        }
    }

    /// Backends that currently have an entry, fresh or not
    pub fn backends(&self) -> Vec<BackendKind> {
        let mut backends: Vec<BackendKind> = self
            .entries
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .keys()
            .copied()
            .collect();
        backends.sort();
        backends
    }

    pub fn status(&self) -> Vec<CacheEntryStatus> {
        let now = Instant::now();
        let entries = self.entries.read().unwrap_or_else(|e| e.into_inner());
        let mut status: Vec<CacheEntryStatus> = entries
            .values()
            .map(|entry| CacheEntryStatus {
                backend: entry.backend,
                models: entry.models.len(),
                age_seconds: now.saturating_duration_since(entry.fetched_at).as_secs(),
                fresh: entry.is_fresh_at(now, self.ttl),
            })
            .collect();
        status.sort_by_key(|s| s.backend);
        status
    }
}
