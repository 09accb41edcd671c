//! Pooled JSON-over-HTTP transport shared by the backend clients
//!
//! Every call takes an explicit deadline which is set on the request itself,
//! so the network-level timeout and the caller's timeout are the same
//! deadline. Dropping the returned future aborts the request.

use std::sync::RwLock;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Serialize;

use super::BackendKind;
use crate::error::BackendError;

/// Low-level transport failure, mapped to a [`BackendError`] by each client
/// depending on the operation that failed
///
/// [`BackendError`]: crate::error::BackendError
#[derive(Debug)]
pub(crate) enum TransportError {
    /// The request did not finish before its deadline
    Timeout,
    /// Connection refused, DNS failure, TLS failure, reset
    Connect(String),
    /// Non-success HTTP status
    Status { code: u16, body: String },
    /// Body could not be decoded into the expected type
    Decode(String),
    /// `close()` was called on the owning client
    Closed,
}

impl std::fmt::Display for TransportError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransportError::Timeout => write!(f, "request timed out"),
            TransportError::Connect(reason) => write!(f, "{}", reason),
            TransportError::Status { code, body } if body.is_empty() => {
                write!(f, "HTTP {}", code)
            }
            TransportError::Status { code, body } => write!(f, "HTTP {}: {}", code, body),
            TransportError::Decode(reason) => write!(f, "invalid response: {}", reason),
            TransportError::Closed => write!(f, "client closed"),
        }
    }
}

impl TransportError {
    /// Mapping for model listing: anything that is not a schema problem means
    /// the backend is not usable right now
    pub fn into_listing_error(self, backend: BackendKind, timeout: Duration) -> BackendError {
        match self {
            TransportError::Timeout => BackendError::unreachable(
                backend,
                format!("no response within {}s", timeout.as_secs_f32()),
            ),
            TransportError::Decode(reason) => BackendError::protocol(backend, reason),
            TransportError::Status { code, .. } if (400..500).contains(&code) => {
                BackendError::protocol(backend, self.to_string())
            }
            other => BackendError::unreachable(backend, other.to_string()),
        }
    }

    /// Mapping for inference calls
    pub fn into_inference_error(self, backend: BackendKind, timeout: Duration) -> BackendError {
        match self {
            TransportError::Timeout => BackendError::InferenceTimeout { backend, timeout },
            TransportError::Connect(_) | TransportError::Closed => {
                BackendError::unreachable(backend, self.to_string())
            }
            TransportError::Status { code, body } => match extract_error_message(&body) {
                Some(message) => BackendError::inference(backend, message),
                // A 5xx without the backend's own error body came from a
                // proxy or a server that went away after discovery
                None if code >= 500 => BackendError::unreachable(
                    backend,
                    TransportError::Status { code, body }.to_string(),
                ),
                None if body.is_empty() => BackendError::inference(backend, format!("HTTP {}", code)),
                None => BackendError::inference(backend, body),
            },
            TransportError::Decode(reason) => BackendError::protocol(backend, reason),
        }
    }
}

/// Pull the message out of `{"error": "..."}` or `{"error": {"message": "..."}}`
pub(crate) fn extract_error_message(body: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;
    match value.get("error")? {
        serde_json::Value::String(message) => Some(message.clone()),
        serde_json::Value::Object(obj) => obj
            .get("message")
            .and_then(|m| m.as_str())
            .map(str::to_string),
        _ => None,
    }
}

impl From<reqwest::Error> for TransportError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            TransportError::Timeout
        } else if e.is_decode() {
            TransportError::Decode(e.to_string())
        } else {
            TransportError::Connect(e.to_string())
        }
    }
}

/// Base URL plus a closable pooled `reqwest::Client`
pub(crate) struct HttpTransport {
    base_url: String,
    client: RwLock<Option<reqwest::Client>>,
}

impl HttpTransport {
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client: RwLock::new(Some(reqwest::Client::new())),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    /// Clone of the pooled client; clones share one connection pool
    fn client(&self) -> Result<reqwest::Client, TransportError> {
        self.client
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
            .ok_or(TransportError::Closed)
    }

    /// Drop the pooled client, releasing idle connections
    pub fn close(&self) {
        self.client.write().unwrap_or_else(|e| e.into_inner()).take();
    }

    pub fn is_closed(&self) -> bool {
        self.client.read().unwrap_or_else(|e| e.into_inner()).is_none()
    }

    pub async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        timeout: Duration,
    ) -> Result<T, TransportError> {
        let request = self.client()?.get(self.url(path)).timeout(timeout);
        Self::decode(request.send().await?).await
    }

    pub async fn post_json<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
        timeout: Duration,
    ) -> Result<T, TransportError> {
        let request = self
            .client()?
            .post(self.url(path))
            .json(body)
            .timeout(timeout);
        Self::decode(request.send().await?).await
    }

    async fn decode<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, TransportError> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(TransportError::Status {
                code: status.as_u16(),
                body: body.trim().to_string(),
            });
        }

        let bytes = response.bytes().await?;
        serde_json::from_slice(&bytes).map_err(|e| TransportError::Decode(e.to_string()))
    }
}
