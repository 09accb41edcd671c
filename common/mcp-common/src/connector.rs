//! Connector plugin contract
//!
//! A connector adapts one data source (filesystem, GitHub, database, ...) to a
//! uniform `invoke(operation, params, timeout)` call so the hub can dispatch to
//! it generically. Each connector owns its own resources and releases them in
//! [`Connector::close`].
//!
//! # Example
//!
//! ```rust,ignore
//! use mcp_common::{scoped, Connector};
//!
//! let connector = Arc::new(DatabaseConnector::connect(&url).await?);
//!
//! // `close()` runs exactly once, whether the closure succeeds, fails or panics
//! let rows = scoped(connector, |db| async move {
//!     db.invoke("query", json!({"sql": "select 1"}), Duration::from_secs(5)).await
//! })
//! .await?;
//! ```

use std::collections::BTreeSet;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::FutureExt;
use serde::Serialize;
use serde_json::Value;

/// Error type for connector operations
#[derive(Debug, thiserror::Error)]
pub enum ConnectorError {
    /// No connector registered under this name
    #[error("connector not found: {0}")]
    NotFound(String),

    /// A connector with the same name is already registered
    #[error("connector already registered: {0}")]
    AlreadyRegistered(String),

    /// The connector does not implement the requested operation
    #[error("operation '{operation}' not supported by connector '{connector}'")]
    UnsupportedOperation { connector: String, operation: String },

    /// Invalid parameters passed to the operation
    #[error("invalid parameters: {0}")]
    InvalidParams(String),

    /// The operation did not finish within its deadline
    #[error("connector '{connector}' timed out after {timeout:?}")]
    Timeout { connector: String, timeout: Duration },

    /// Operation execution failed
    #[error("connector operation failed: {0}")]
    Execution(String),

    /// The connector was already closed
    #[error("connector '{0}' is closed")]
    Closed(String),

    /// Serialization/deserialization error
    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    /// One or more connectors failed to release their resources
    #[error("failed to close connectors: {}", describe_close_failures(.0))]
    CloseFailed(Vec<(String, String)>),
}

fn describe_close_failures(failures: &[(String, String)]) -> String {
    failures
        .iter()
        .map(|(name, reason)| format!("{name} ({reason})"))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Result type for connector operations
pub type ConnectorResult<T> = Result<T, ConnectorError>;

/// Static description of a connector, used for listing and discovery
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConnectorDescriptor {
    pub name: String,
    pub capabilities: BTreeSet<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Uniform contract every data connector satisfies
///
/// # Thread Safety
///
/// Implementations must be `Send + Sync`; the registry shares one instance
/// between concurrent callers.
///
/// # Resource ownership
///
/// Connectors own their resources (file handles, pools, API clients). Callers
/// that acquire a connector must arrange for [`Connector::close`] to run
/// exactly once, normally through [`scoped`] or
/// [`ConnectorRegistry::close_all`](crate::ConnectorRegistry::close_all).
#[async_trait]
pub trait Connector: Send + Sync {
    /// Unique connector name, e.g. `"filesystem"`
    fn name(&self) -> &str;

    /// Operations or data kinds this connector offers, e.g. `{"read", "search"}`
    fn capabilities(&self) -> BTreeSet<String>;

    /// Run one operation within `timeout`
    async fn invoke(&self, operation: &str, params: Value, timeout: Duration)
        -> ConnectorResult<Value>;

    /// Release all resources held by this connector
    async fn close(&self) -> ConnectorResult<()>;

    /// Lightweight liveness probe
    async fn health_check(&self) -> bool {
        true
    }

    /// Optional human-readable description
    fn description(&self) -> Option<&str> {
        None
    }

    fn descriptor(&self) -> ConnectorDescriptor {
        ConnectorDescriptor {
            name: self.name().to_string(),
            capabilities: self.capabilities(),
            description: self.description().map(str::to_string),
        }
    }
}

/// Wrapper that makes `close()` idempotent and rejects calls after close
///
/// The inner connector's `close()` runs at most once no matter how many
/// times the wrapper is closed.
pub struct CloseOnce<C> {
    inner: C,
    closed: AtomicBool,
}

impl<C: Connector> CloseOnce<C> {
    pub fn new(inner: C) -> Self {
        Self {
            inner,
            closed: AtomicBool::new(false),
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    pub fn inner(&self) -> &C {
        &self.inner
    }
}

#[async_trait]
impl<C: Connector> Connector for CloseOnce<C> {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn capabilities(&self) -> BTreeSet<String> {
        self.inner.capabilities()
    }

    async fn invoke(
        &self,
        operation: &str,
        params: Value,
        timeout: Duration,
    ) -> ConnectorResult<Value> {
        if self.is_closed() {
            return Err(ConnectorError::Closed(self.inner.name().to_string()));
        }
        self.inner.invoke(operation, params, timeout).await
    }

    async fn close(&self) -> ConnectorResult<()> {
        if self.closed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        self.inner.close().await
    }

    async fn health_check(&self) -> bool {
        !self.is_closed() && self.inner.health_check().await
    }

    fn description(&self) -> Option<&str> {
        self.inner.description()
    }
}

/// Run `f` with the connector, then close the connector exactly once
///
/// The close hook runs after `f` completes successfully, returns an error, or
/// panics (the panic is resumed after closing). When both `f` and `close`
/// fail, the error from `f` is returned and the close failure is logged.
pub async fn scoped<C, F, Fut, T>(connector: Arc<C>, f: F) -> ConnectorResult<T>
where
    C: Connector + ?Sized,
    F: FnOnce(Arc<C>) -> Fut,
    Fut: Future<Output = ConnectorResult<T>>,
{
    let outcome = AssertUnwindSafe(f(Arc::clone(&connector)))
        .catch_unwind()
        .await;
    let closed = connector.close().await;

    match outcome {
        Ok(Ok(value)) => closed.map(|_| value),
        Ok(Err(e)) => {
            if let Err(close_err) = closed {
                tracing::warn!(
                    "Connector '{}' failed to close after error: {}",
                    connector.name(),
                    close_err
                );
            }
            Err(e)
        }
        Err(panic) => {
            if let Err(close_err) = closed {
                tracing::warn!(
                    "Connector '{}' failed to close after panic: {}",
                    connector.name(),
                    close_err
                );
            }
            std::panic::resume_unwind(panic)
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    /// Connector that records how many times it was closed
    pub(crate) struct CountingConnector {
        pub name: String,
        pub closes: Arc<AtomicUsize>,
        pub fail_close: bool,
        pub delay: Option<Duration>,
    }

    impl CountingConnector {
        pub fn new(name: &str) -> Self {
            Self {
                name: name.to_string(),
                closes: Arc::new(AtomicUsize::new(0)),
                fail_close: false,
                delay: None,
            }
        }
    }

    #[async_trait]
    impl Connector for CountingConnector {
        fn name(&self) -> &str {
            &self.name
        }

        fn capabilities(&self) -> BTreeSet<String> {
            ["echo".to_string()].into_iter().collect()
        }

        async fn invoke(
            &self,
            operation: &str,
            params: Value,
            _timeout: Duration,
        ) -> ConnectorResult<Value> {
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            match operation {
                "echo" => Ok(params),
                "fail" => Err(ConnectorError::Execution("boom".to_string())),
                _ => Err(ConnectorError::UnsupportedOperation {
                    connector: self.name.clone(),
                    operation: operation.to_string(),
                }),
            }
        }

        async fn close(&self) -> ConnectorResult<()> {
            self.closes.fetch_add(1, Ordering::SeqCst);
            if self.fail_close {
                Err(ConnectorError::Execution("close failed".to_string()))
            } else {
                Ok(())
            }
        }
    }

    #[tokio::test]
    async fn test_scoped_closes_on_success() {
        let connector = Arc::new(CountingConnector::new("fs"));
        let closes = Arc::clone(&connector.closes);

        let value = scoped(connector, |c| async move {
            c.invoke("echo", serde_json::json!({"a": 1}), Duration::from_secs(1))
                .await
        })
        .await
        .unwrap();

        assert_eq!(value, serde_json::json!({"a": 1}));
        assert_eq!(closes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_scoped_closes_on_error() {
        let connector = Arc::new(CountingConnector::new("fs"));
        let closes = Arc::clone(&connector.closes);

        let result = scoped(connector, |c| async move {
            c.invoke("fail", Value::Null, Duration::from_secs(1)).await
        })
        .await;

        assert!(matches!(result, Err(ConnectorError::Execution(_))));
        assert_eq!(closes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_scoped_closes_on_panic() {
        let connector = Arc::new(CountingConnector::new("fs"));
        let closes = Arc::clone(&connector.closes);

        let handle = tokio::spawn(async move {
            scoped(connector, |_c| async move {
                if should_panic() {
                    panic!("connector user panicked");
                }
                Ok::<_, ConnectorError>(())
            })
            .await
        });

        assert!(handle.await.is_err());
        assert_eq!(closes.load(Ordering::SeqCst), 1);
    }

    fn should_panic() -> bool {
        true
    }

    #[tokio::test]
    async fn test_scoped_reports_close_failure() {
        let mut inner = CountingConnector::new("db");
        inner.fail_close = true;
        let result = scoped(Arc::new(inner), |_c| async move { Ok(42) }).await;
        assert!(matches!(result, Err(ConnectorError::Execution(_))));
    }

    #[tokio::test]
    async fn test_close_once_is_idempotent() {
        let inner = CountingConnector::new("github");
        let closes = Arc::clone(&inner.closes);
        let wrapped = CloseOnce::new(inner);

        wrapped.close().await.unwrap();
        wrapped.close().await.unwrap();

        assert_eq!(closes.load(Ordering::SeqCst), 1);
        assert!(wrapped.is_closed());
        assert!(!wrapped.health_check().await);

        let result = wrapped
            .invoke("echo", Value::Null, Duration::from_secs(1))
            .await;
        assert!(matches!(result, Err(ConnectorError::Closed(_))));
    }

    #[test]
    fn test_descriptor() {
        let connector = CountingConnector::new("filesystem");
        let descriptor = connector.descriptor();
        assert_eq!(descriptor.name, "filesystem");
        assert!(descriptor.capabilities.contains("echo"));
        assert!(descriptor.description.is_none());
    }

    #[test]
    fn test_close_failed_display() {
        let err = ConnectorError::CloseFailed(vec![
            ("fs".to_string(), "busy".to_string()),
            ("db".to_string(), "timeout".to_string()),
        ]);
        assert_eq!(
            err.to_string(),
            "failed to close connectors: fs (busy), db (timeout)"
        );
    }
}
