//! Configuration loading
//!
//! `.hub.toml` is searched by walking up from the working directory, then in
//! the global config directory. Environment variables are applied on top and
//! the result is validated before any client is built.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::llm::BackendKind;
use crate::manager::ManagerSettings;

pub const CONFIG_FILE: &str = ".hub.toml";

/// Find a config file by walking up the directory tree, then checking global config.
///
/// Search order:
/// 1. Current directory and parent directories (walking up to root)
/// 2. Global config at ~/.config/mcp-hub/
fn find_config_file(filename: &str) -> Option<PathBuf> {
    let mut current = std::env::current_dir().ok()?;

    loop {
        let candidate = current.join(filename);
        if candidate.exists() {
            return Some(candidate);
        }

        match current.parent() {
            Some(parent) => current = parent.to_path_buf(),
            None => break,
        }
    }

    if let Some(config_dir) = dirs::config_dir() {
        let global_path = config_dir.join("mcp-hub").join(filename);
        if global_path.exists() {
            return Some(global_path);
        }
    }

    None
}

/// Invalid configuration; fatal at startup
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("{var}={value:?} is invalid: {reason}")]
    InvalidEnv {
        var: &'static str,
        value: String,
        reason: String,
    },

    #[error("{0} must be greater than zero")]
    ZeroDuration(&'static str),

    #[error("endpoint for {backend} is not a valid http(s) URL: {url:?} ({reason})")]
    InvalidEndpoint {
        backend: BackendKind,
        url: String,
        reason: String,
    },

    #[error("'auto' cannot appear in backends.priority or backends.endpoints")]
    AutoNotConcrete,

    #[error("backend {0} is listed twice in backends.priority")]
    DuplicatePriority(BackendKind),

    #[error("backends.priority is empty")]
    EmptyPriority,

    #[error("backend {0} has no endpoint")]
    MissingEndpoint(BackendKind),

    #[error("preferred backend {0} is not in backends.priority")]
    PreferredNotEnabled(BackendKind),
}

// ============================================================================
// Hub Configuration (.hub.toml)
// ============================================================================

/// Top-level configuration
#[derive(Debug, Clone, Default, Deserialize)]
pub struct HubConfig {
    #[serde(default)]
    pub backends: BackendsConfig,
}

/// `[backends]` section
#[derive(Debug, Clone, Deserialize)]
pub struct BackendsConfig {
    #[serde(default = "default_preferred")]
    pub preferred: BackendKind,
    /// Enabled backends, highest priority first
    #[serde(default = "default_priority")]
    pub priority: Vec<BackendKind>,
    #[serde(default = "default_cache_ttl")]
    pub cache_ttl_seconds: u64,
    #[serde(default = "default_health_check_timeout")]
    pub health_check_timeout_seconds: u64,
    #[serde(default = "default_inference_timeout")]
    pub inference_timeout_seconds: u64,
    #[serde(default)]
    pub default_model: Option<String>,
    /// Missing entries are filled with the defaults
    #[serde(default)]
    pub endpoints: BTreeMap<BackendKind, String>,
}

fn default_preferred() -> BackendKind {
    BackendKind::Auto
}

fn default_priority() -> Vec<BackendKind> {
    BackendKind::CONCRETE.to_vec()
}

fn default_cache_ttl() -> u64 {
    300
}

fn default_health_check_timeout() -> u64 {
    5
}

fn default_inference_timeout() -> u64 {
    300
}

/// Backends usually run on the container host
pub fn default_endpoint(backend: BackendKind) -> Option<&'static str> {
    match backend {
        BackendKind::Ollama => Some("http://host.docker.internal:11434"),
        BackendKind::LmStudio => Some("http://host.docker.internal:1234"),
        BackendKind::Auto => None,
    }
}

fn default_endpoints() -> BTreeMap<BackendKind, String> {
    BackendKind::CONCRETE
        .iter()
        .filter_map(|b| default_endpoint(*b).map(|url| (*b, url.to_string())))
        .collect()
}

impl Default for BackendsConfig {
    fn default() -> Self {
        Self {
            preferred: default_preferred(),
            priority: default_priority(),
            cache_ttl_seconds: default_cache_ttl(),
            health_check_timeout_seconds: default_health_check_timeout(),
            inference_timeout_seconds: default_inference_timeout(),
            default_model: None,
            endpoints: default_endpoints(),
        }
    }
}

impl HubConfig {
    /// Load, apply environment overrides and validate
    ///
    /// An explicit path must exist; otherwise `.hub.toml` is searched and
    /// defaults are used when none is found.
    pub fn resolve(explicit: Option<&Path>) -> Result<Self> {
        let mut config = match explicit {
            Some(path) => Self::load_from_path(path)?,
            None => Self::load()?,
        };
        config.apply_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    /// Load config from .hub.toml
    ///
    /// Search order:
    /// 1. Walk up directory tree from cwd looking for .hub.toml
    /// 2. Check ~/.config/mcp-hub/.hub.toml (global fallback)
    /// 3. Fall back to defaults
    pub fn load() -> Result<Self> {
        if let Some(config_path) = find_config_file(CONFIG_FILE) {
            tracing::debug!("Loading config from: {}", config_path.display());
            return Self::load_from_path(&config_path);
        }

        tracing::debug!("No {} found, using defaults", CONFIG_FILE);
        Ok(Self::default())
    }

    /// Load from a specific path
    pub fn load_from_path(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        Self::from_toml(&content).with_context(|| format!("Failed to parse {}", path.display()))
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        let mut config: HubConfig = toml::from_str(content)?;
        for (backend, url) in default_endpoints() {
            config.backends.endpoints.entry(backend).or_insert(url);
        }
        Ok(config)
    }

    /// Apply `MCP_*` variables from the process environment
    pub fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        self.apply_overrides(|var| std::env::var(var).ok())
    }

    /// Apply overrides from any variable source
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let backends = &mut self.backends;

        if let Some(value) = lookup("MCP_PREFERRED_BACKEND") {
            backends.preferred = value.parse().map_err(|reason| ConfigError::InvalidEnv {
                var: "MCP_PREFERRED_BACKEND",
                value: value.clone(),
                reason,
            })?;
        }
        if let Some(value) = lookup("MCP_CACHE_TTL") {
            backends.cache_ttl_seconds = parse_seconds("MCP_CACHE_TTL", value)?;
        }
        if let Some(value) = lookup("MCP_HEALTH_CHECK_TIMEOUT") {
            backends.health_check_timeout_seconds =
                parse_seconds("MCP_HEALTH_CHECK_TIMEOUT", value)?;
        }
        if let Some(value) = lookup("MCP_INFERENCE_TIMEOUT") {
            backends.inference_timeout_seconds = parse_seconds("MCP_INFERENCE_TIMEOUT", value)?;
        }
        if let Some(value) = lookup("MCP_DEFAULT_MODEL") {
            let value = value.trim().to_string();
            backends.default_model = (!value.is_empty()).then_some(value);
        }
        if let Some(value) = lookup("MCP_OLLAMA_URL") {
            backends.endpoints.insert(BackendKind::Ollama, value);
        }
        if let Some(value) = lookup("MCP_LMSTUDIO_URL") {
            backends.endpoints.insert(BackendKind::LmStudio, value);
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let backends = &self.backends;

        if backends.cache_ttl_seconds == 0 {
            return Err(ConfigError::ZeroDuration("cache_ttl_seconds"));
        }
        if backends.health_check_timeout_seconds == 0 {
            return Err(ConfigError::ZeroDuration("health_check_timeout_seconds"));
        }
        if backends.inference_timeout_seconds == 0 {
            return Err(ConfigError::ZeroDuration("inference_timeout_seconds"));
        }

        if backends.priority.is_empty() {
            return Err(ConfigError::EmptyPriority);
        }
        let mut seen = Vec::with_capacity(backends.priority.len());
        for backend in &backends.priority {
            if !backend.is_concrete() {
                return Err(ConfigError::AutoNotConcrete);
            }
            if seen.contains(backend) {
                return Err(ConfigError::DuplicatePriority(*backend));
            }
            seen.push(*backend);
            if !backends.endpoints.contains_key(backend) {
                return Err(ConfigError::MissingEndpoint(*backend));
            }
        }

        if backends.preferred.is_concrete() && !seen.contains(&backends.preferred) {
            return Err(ConfigError::PreferredNotEnabled(backends.preferred));
        }

        for (backend, url) in &backends.endpoints {
            if !backend.is_concrete() {
                return Err(ConfigError::AutoNotConcrete);
            }
            validate_endpoint(*backend, url)?;
        }
        Ok(())
    }

    /// Endpoints of the enabled backends, keyed by backend
    pub fn active_endpoints(&self) -> BTreeMap<BackendKind, String> {
        self.backends
            .priority
            .iter()
            .filter_map(|b| self.backends.endpoints.get(b).map(|url| (*b, url.clone())))
            .collect()
    }

    pub fn manager_settings(&self) -> ManagerSettings {
        let backends = &self.backends;
        ManagerSettings {
            preferred_backend: backends.preferred,
            priority: backends.priority.clone(),
            cache_ttl: Duration::from_secs(backends.cache_ttl_seconds),
            health_check_timeout: Duration::from_secs(backends.health_check_timeout_seconds),
            inference_timeout: Duration::from_secs(backends.inference_timeout_seconds),
            default_model: backends.default_model.clone(),
        }
    }
}

fn parse_seconds(var: &'static str, value: String) -> Result<u64, ConfigError> {
    value
        .trim()
        .parse::<u64>()
        .map_err(|e| ConfigError::InvalidEnv {
            var,
            value,
            reason: e.to_string(),
        })
}

fn validate_endpoint(backend: BackendKind, raw: &str) -> Result<(), ConfigError> {
    let invalid = |reason: String| ConfigError::InvalidEndpoint {
        backend,
        url: raw.to_string(),
        reason,
    };
    let url = url::Url::parse(raw).map_err(|e| invalid(e.to_string()))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(invalid(format!("unsupported scheme '{}'", url.scheme())));
    }
    if url.host_str().is_none() {
        return Err(invalid("missing host".to_string()));
    }
    Ok(())
}
