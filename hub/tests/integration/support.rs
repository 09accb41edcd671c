//! Shared fixtures: mock backends and manager construction

use std::collections::BTreeMap;
use std::time::Duration;

use mcp_hub::llm::BackendKind;
use mcp_hub::{ManagerSettings, UnifiedManager};
use serde_json::json;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Nothing listens on the discard port locally
pub const UNREACHABLE: &str = "http://127.0.0.1:9";

pub const LMSTUDIO_MODEL: &str = "deepseek-r1-distill-qwen-7b";
pub const OLLAMA_MODEL: &str = "llama3.1:8b";

pub fn settings() -> ManagerSettings {
    ManagerSettings {
        health_check_timeout: Duration::from_secs(2),
        inference_timeout: Duration::from_secs(5),
        ..Default::default()
    }
}

pub fn manager(
    settings: ManagerSettings,
    ollama: &str,
    lmstudio: &str,
) -> UnifiedManager {
    let endpoints = BTreeMap::from([
        (BackendKind::Ollama, ollama.to_string()),
        (BackendKind::LmStudio, lmstudio.to_string()),
    ]);
    UnifiedManager::with_endpoints(settings, &endpoints)
}

/// LM Studio serving one model on `/v1/models`
pub async fn lmstudio_server() -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/models"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "object": "list",
            "data": [{"id": LMSTUDIO_MODEL, "object": "model", "owned_by": "organization_owner"}]
        })))
        .mount(&server)
        .await;
    server
}

/// Ollama serving one model on `/api/tags`
pub async fn ollama_server() -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/tags"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "models": [{
                "name": OLLAMA_MODEL,
                "size": 4920753328u64,
                "details": {"family": "llama"}
            }]
        })))
        .mount(&server)
        .await;
    server
}

pub fn lmstudio_reply(content: &str) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({
        "id": "chatcmpl-1",
        "object": "chat.completion",
        "created": 1735689600,
        "model": LMSTUDIO_MODEL,
        "choices": [{
            "index": 0,
            "message": {"role": "assistant", "content": content},
            "finish_reason": "stop"
        }],
        "usage": {"prompt_tokens": 5, "completion_tokens": 3, "total_tokens": 8}
    }))
}

pub fn ollama_reply(content: &str) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({
        "model": OLLAMA_MODEL,
        "created_at": "2025-05-01T10:00:00Z",
        "message": {"role": "assistant", "content": content},
        "done": true,
        "prompt_eval_count": 12,
        "eval_count": 4
    }))
}

/// Requests `server` received on `route`
pub async fn hits(server: &MockServer, route: &str) -> usize {
    server
        .received_requests()
        .await
        .unwrap_or_default()
        .iter()
        .filter(|r| r.url.path() == route)
        .count()
}
