//! Backend selection over one view of available backends and their models
//!
//! Pure functions over a [`Candidates`] snapshot so routing decisions are
//! reproducible and testable without I/O.

use crate::llm::{BackendKind, ModelInfo};
use crate::models;

/// Why a backend was picked, for routing logs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionReason {
    /// Named by the caller (qualified model or request backend)
    Requested,
    /// The configured preferred backend
    Configured,
    /// First backend in priority order advertising the model
    AdvertisesModel,
    /// First available backend in priority order
    Priority,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Selection {
    pub backend: BackendKind,
    pub reason: SelectionReason,
}

/// Available backends in priority order with their fresh model lists
///
/// A backend whose listing failed is present with no models.
#[derive(Debug, Clone, Default)]
pub struct Candidates {
    entries: Vec<(BackendKind, Vec<ModelInfo>)>,
}

impl Candidates {
    pub fn new(entries: Vec<(BackendKind, Vec<ModelInfo>)>) -> Self {
        Self { entries }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn backends(&self) -> impl Iterator<Item = BackendKind> + '_ {
        self.entries.iter().map(|(backend, _)| *backend)
    }

    pub fn contains(&self, backend: BackendKind) -> bool {
        self.backends().any(|b| b == backend)
    }

    pub fn models(&self) -> impl Iterator<Item = &ModelInfo> {
        self.entries.iter().flat_map(|(_, models)| models.iter())
    }

    pub fn models_on(&self, backend: BackendKind) -> &[ModelInfo] {
        self.entries
            .iter()
            .find(|(b, _)| *b == backend)
            .map(|(_, models)| models.as_slice())
            .unwrap_or(&[])
    }

    pub fn advertises(&self, backend: BackendKind, model: &str) -> bool {
        self.models_on(backend).iter().any(|m| m.id == model)
    }

    /// Whether `backend` lists any model at all
    pub fn has_models(&self, backend: BackendKind) -> bool {
        !self.models_on(backend).is_empty()
    }

    /// First model matching `name`, bare or qualified, in priority order
    pub fn find(&self, name: &str) -> Option<&ModelInfo> {
        self.models().find(|m| m.matches(name))
    }

    /// Pick the backend for a request
    ///
    /// Order: the caller's backend, the configured backend (when it can
    /// serve `model`), a backend advertising `model`, then the first
    /// available backend that lists any model. Backends with an empty or
    /// failed listing are only picked when nothing else is available.
    pub fn select(
        &self,
        requested: Option<BackendKind>,
        configured: Option<BackendKind>,
        model: Option<&str>,
    ) -> Option<Selection> {
        let pick = |backend, reason| Some(Selection { backend, reason });

        if let Some(backend) = requested.filter(|b| self.contains(*b)) {
            return pick(backend, SelectionReason::Requested);
        }

        if let Some(backend) = configured.filter(|b| self.contains(*b)) {
            if model.map_or(self.has_models(backend), |m| self.advertises(backend, m)) {
                return pick(backend, SelectionReason::Configured);
            }
        }

        if let Some(model) = model {
            if let Some(backend) = self.backends().find(|b| self.advertises(*b, model)) {
                return pick(backend, SelectionReason::AdvertisesModel);
            }
        }

        self.backends()
            .find(|b| self.has_models(*b))
            .or_else(|| self.backends().next())
            .and_then(|backend| pick(backend, SelectionReason::Priority))
    }

    /// The single fallback hop after `failed`: prefer a backend advertising
    /// `model`, else the next one in priority order that lists any model,
    /// else the next one at all
    pub fn fallback_after(&self, failed: BackendKind, model: Option<&str>) -> Option<BackendKind> {
        let others: Vec<BackendKind> = self.backends().filter(|b| *b != failed).collect();
        if let Some(model) = model {
            if let Some(backend) = others.iter().find(|b| self.advertises(**b, model)) {
                return Some(*backend);
            }
        }
        others
            .iter()
            .find(|b| self.has_models(**b))
            .or_else(|| others.first())
            .copied()
    }

    /// Model to use on `backend` when the caller named none: the default
    /// model if advertised there, else its first chat model
    pub fn recommended_on(&self, backend: BackendKind, default_model: Option<&str>) -> Option<&ModelInfo> {
        let models = self.models_on(backend);
        if let Some(default) = default_model {
            if let Some(model) = models.iter().find(|m| m.matches(default)) {
                return Some(model);
            }
        }
        models
            .iter()
            .find(|m| m.has_capability(models::CHAT))
            .or_else(|| models.first())
    }

    /// Recommended model across all backends
    pub fn recommended(&self, default_model: Option<&str>) -> Option<&ModelInfo> {
        if let Some(default) = default_model {
            if let Some(model) = self.find(default) {
                return Some(model);
            }
        }
        self.backends()
            .find_map(|backend| self.recommended_on(backend, None))
    }

    /// Model id to send to `backend`
    ///
    /// The caller's model is kept when `backend` advertises it or when it is
    /// the caller's own choice of backend; otherwise the backend's
    /// recommendation is used.
    pub fn model_for(
        &self,
        backend: BackendKind,
        model: Option<&str>,
        insist: bool,
        default_model: Option<&str>,
    ) -> Option<String> {
        match model {
            Some(model) if insist || self.advertises(backend, model) => Some(model.to_string()),
            _ => self
                .recommended_on(backend, default_model)
                .map(|m| m.id.clone()),
        }
    }
}
