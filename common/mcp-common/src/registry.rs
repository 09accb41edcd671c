//! Connector registry
//!
//! Holds the active connectors by name and dispatches `invoke` calls to them.
//! The registry owns the connectors it holds: removing a connector or calling
//! [`ConnectorRegistry::close_all`] closes it exactly once.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, RwLock};
use std::time::Duration;

use futures_util::future::join_all;
use serde_json::Value;

use crate::connector::{Connector, ConnectorDescriptor, ConnectorError, ConnectorResult};

/// Registry of active connectors keyed by name
#[derive(Default)]
pub struct ConnectorRegistry {
    connectors: RwLock<BTreeMap<String, Arc<dyn Connector>>>,
}

impl ConnectorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, BTreeMap<String, Arc<dyn Connector>>> {
        self.connectors.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, BTreeMap<String, Arc<dyn Connector>>> {
        self.connectors.write().unwrap_or_else(|e| e.into_inner())
    }

    /// Register a connector under its own name
    pub fn register(&self, connector: Arc<dyn Connector>) -> ConnectorResult<()> {
        let name = connector.name().to_string();
        let mut connectors = self.write();
        if connectors.contains_key(&name) {
            return Err(ConnectorError::AlreadyRegistered(name));
        }
        tracing::info!("Registered connector: {}", name);
        connectors.insert(name, connector);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Connector>> {
        self.read().get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.read().contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    /// Descriptors of all registered connectors, sorted by name
    pub fn descriptors(&self) -> Vec<ConnectorDescriptor> {
        self.read().values().map(|c| c.descriptor()).collect()
    }

    /// Connectors advertising the given capability
    pub fn with_capability(&self, capability: &str) -> Vec<Arc<dyn Connector>> {
        self.read()
            .values()
            .filter(|c| c.capabilities().contains(capability))
            .cloned()
            .collect()
    }

    /// Union of every registered connector's capabilities
    pub fn capabilities(&self) -> BTreeSet<String> {
        self.read()
            .values()
            .flat_map(|c| c.capabilities())
            .collect()
    }

    /// Invoke an operation on a named connector
    ///
    /// The deadline is enforced here as well as handed to the connector, so a
    /// connector that ignores its `timeout` argument still cannot block the
    /// caller past it.
    pub async fn invoke(
        &self,
        name: &str,
        operation: &str,
        params: Value,
        timeout: Duration,
    ) -> ConnectorResult<Value> {
        let connector = self
            .get(name)
            .ok_or_else(|| ConnectorError::NotFound(name.to_string()))?;

        tracing::debug!("Invoking {}.{}", name, operation);
        match tokio::time::timeout(timeout, connector.invoke(operation, params, timeout)).await {
            Ok(result) => result,
            Err(_) => Err(ConnectorError::Timeout {
                connector: name.to_string(),
                timeout,
            }),
        }
    }

    /// Probe every connector concurrently
    ///
    /// A connector that does not answer within `timeout` is reported as
    /// unhealthy without delaying the others.
    pub async fn health_check_all(&self, timeout: Duration) -> BTreeMap<String, bool> {
        let connectors: Vec<_> = self
            .read()
            .iter()
            .map(|(name, c)| (name.clone(), Arc::clone(c)))
            .collect();

        let probes = connectors.into_iter().map(|(name, connector)| async move {
            let healthy = tokio::time::timeout(timeout, connector.health_check())
                .await
                .unwrap_or(false);
            if !healthy {
                tracing::warn!("Connector '{}' failed health check", name);
            }
            (name, healthy)
        });

        join_all(probes).await.into_iter().collect()
    }

    /// Remove a connector and close it
    pub async fn remove(&self, name: &str) -> ConnectorResult<()> {
        let connector = self
            .write()
            .remove(name)
            .ok_or_else(|| ConnectorError::NotFound(name.to_string()))?;
        tracing::info!("Removed connector: {}", name);
        connector.close().await
    }

    /// Close every connector and empty the registry
    ///
    /// Each connector is closed exactly once even if some fail; failures are
    /// collected into [`ConnectorError::CloseFailed`].
    pub async fn close_all(&self) -> ConnectorResult<()> {
        let drained: Vec<_> = std::mem::take(&mut *self.write()).into_iter().collect();

        let closes = drained.into_iter().map(|(name, connector)| async move {
            let result = connector.close().await;
            (name, result)
        });

        let mut failures = Vec::new();
        for (name, result) in join_all(closes).await {
            match result {
                Ok(()) => tracing::info!("Closed connector: {}", name),
                Err(e) => {
                    tracing::error!("Failed to close connector {}: {}", name, e);
                    failures.push((name, e.to_string()));
                }
            }
        }

        if failures.is_empty() {
            Ok(())
        } else {
            Err(ConnectorError::CloseFailed(failures))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connector::tests::CountingConnector;
    use std::sync::atomic::Ordering;

    #[test]
    fn test_register_rejects_duplicates() {
        let registry = ConnectorRegistry::new();
        registry
            .register(Arc::new(CountingConnector::new("fs")))
            .unwrap();
        let result = registry.register(Arc::new(CountingConnector::new("fs")));
        assert!(matches!(result, Err(ConnectorError::AlreadyRegistered(_))));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_descriptors_and_capabilities() {
        let registry = ConnectorRegistry::new();
        registry
            .register(Arc::new(CountingConnector::new("github")))
            .unwrap();
        registry
            .register(Arc::new(CountingConnector::new("database")))
            .unwrap();

        let names: Vec<_> = registry.descriptors().into_iter().map(|d| d.name).collect();
        assert_eq!(names, vec!["database", "github"]);
        assert_eq!(registry.with_capability("echo").len(), 2);
        assert!(registry.with_capability("write").is_empty());
        assert!(registry.capabilities().contains("echo"));
    }

    #[tokio::test]
    async fn test_invoke_dispatches_by_name() {
        let registry = ConnectorRegistry::new();
        registry
            .register(Arc::new(CountingConnector::new("fs")))
            .unwrap();

        let value = registry
            .invoke("fs", "echo", serde_json::json!("hi"), Duration::from_secs(1))
            .await
            .unwrap();
        assert_eq!(value, serde_json::json!("hi"));

        let missing = registry
            .invoke("nope", "echo", Value::Null, Duration::from_secs(1))
            .await;
        assert!(matches!(missing, Err(ConnectorError::NotFound(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_invoke_enforces_timeout() {
        let registry = ConnectorRegistry::new();
        let mut slow = CountingConnector::new("slow");
        slow.delay = Some(Duration::from_secs(60));
        registry.register(Arc::new(slow)).unwrap();

        let result = registry
            .invoke("slow", "echo", Value::Null, Duration::from_secs(2))
            .await;
        assert!(matches!(result, Err(ConnectorError::Timeout { .. })));
    }

    #[tokio::test]
    async fn test_close_all_closes_each_once() {
        let registry = ConnectorRegistry::new();
        let a = CountingConnector::new("a");
        let b = CountingConnector::new("b");
        let a_closes = Arc::clone(&a.closes);
        let b_closes = Arc::clone(&b.closes);
        registry.register(Arc::new(a)).unwrap();
        registry.register(Arc::new(b)).unwrap();

        registry.close_all().await.unwrap();
        registry.close_all().await.unwrap();

        assert!(registry.is_empty());
        assert_eq!(a_closes.load(Ordering::SeqCst), 1);
        assert_eq!(b_closes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_close_all_collects_failures() {
        let registry = ConnectorRegistry::new();
        let mut bad = CountingConnector::new("bad");
        bad.fail_close = true;
        let good = CountingConnector::new("good");
        let good_closes = Arc::clone(&good.closes);
        registry.register(Arc::new(bad)).unwrap();
        registry.register(Arc::new(good)).unwrap();

        let result = registry.close_all().await;
        match result {
            Err(ConnectorError::CloseFailed(failures)) => {
                assert_eq!(failures.len(), 1);
                assert_eq!(failures[0].0, "bad");
            }
            other => panic!("expected CloseFailed, got {:?}", other),
        }
        assert_eq!(good_closes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_remove_closes_connector() {
        let registry = ConnectorRegistry::new();
        let fs = CountingConnector::new("fs");
        let closes = Arc::clone(&fs.closes);
        registry.register(Arc::new(fs)).unwrap();

        registry.remove("fs").await.unwrap();
        assert!(!registry.contains("fs"));
        assert_eq!(closes.load(Ordering::SeqCst), 1);
        assert!(matches!(
            registry.remove("fs").await,
            Err(ConnectorError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_health_check_all() {
        let registry = ConnectorRegistry::new();
        registry
            .register(Arc::new(CountingConnector::new("fs")))
            .unwrap();
        let health = registry.health_check_all(Duration::from_secs(1)).await;
        assert_eq!(health.get("fs"), Some(&true));
    }
}
