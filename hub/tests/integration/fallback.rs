//! Fallback between two live mock backends

use std::time::Duration;

use mcp_hub::llm::{BackendKind, CompletionRequest};
use mcp_hub::{BackendError, HubError, ManagerSettings};
use serde_json::json;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, ResponseTemplate};

use super::support::{
    hits, lmstudio_reply, lmstudio_server, manager, ollama_reply, ollama_server, settings,
    OLLAMA_MODEL,
};

fn short_inference() -> ManagerSettings {
    ManagerSettings {
        inference_timeout: Duration::from_secs(1),
        ..settings()
    }
}

#[tokio::test]
async fn test_timeout_falls_back_to_next_backend() {
    let lmstudio = lmstudio_server().await;
    let ollama = ollama_server().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(lmstudio_reply("too late").set_delay(Duration::from_secs(3)))
        .mount(&lmstudio)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .and(body_partial_json(json!({"model": OLLAMA_MODEL})))
        .respond_with(ollama_reply("from ollama"))
        .expect(1)
        .mount(&ollama)
        .await;

    let manager = manager(short_inference(), &ollama.uri(), &lmstudio.uri());
    let response = manager
        .complete(CompletionRequest::from_prompt("hello"))
        .await
        .unwrap();

    assert_eq!(response.backend, BackendKind::Ollama);
    assert_eq!(response.content, "from ollama");
    assert!(manager.usage_stats().contains_key("ollama:llama3.1:8b"));
    assert!(!manager
        .usage_stats()
        .contains_key("lmstudio:deepseek-r1-distill-qwen-7b"));
}

#[tokio::test]
async fn test_inference_error_does_not_fall_back() {
    let lmstudio = lmstudio_server().await;
    let ollama = ollama_server().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(
            ResponseTemplate::new(400)
                .set_body_json(json!({"error": {"message": "context length exceeded"}})),
        )
        .mount(&lmstudio)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .respond_with(ollama_reply("unused"))
        .expect(0)
        .mount(&ollama)
        .await;

    let manager = manager(settings(), &ollama.uri(), &lmstudio.uri());
    let err = manager
        .complete(CompletionRequest::from_prompt("hello"))
        .await
        .unwrap_err();

    match err {
        HubError::Backend(BackendError::Inference { backend, message }) => {
            assert_eq!(backend, BackendKind::LmStudio);
            assert_eq!(message, "context length exceeded");
        }
        other => panic!("expected an inference error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_both_time_out() {
    let lmstudio = lmstudio_server().await;
    let ollama = ollama_server().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(lmstudio_reply("late").set_delay(Duration::from_secs(3)))
        .mount(&lmstudio)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .respond_with(ollama_reply("late").set_delay(Duration::from_secs(3)))
        .mount(&ollama)
        .await;

    let manager = manager(short_inference(), &ollama.uri(), &lmstudio.uri());
    let err = manager
        .complete(CompletionRequest::from_prompt("hello"))
        .await
        .unwrap_err();

    let failures = err.failures();
    assert_eq!(failures.len(), 2);
    assert_eq!(failures[0].backend, BackendKind::LmStudio);
    assert_eq!(failures[1].backend, BackendKind::Ollama);
    assert!(failures.iter().all(|f| f.kind == "inference_timeout"));
}

#[tokio::test]
async fn test_qualified_model_overrides_priority() {
    let lmstudio = lmstudio_server().await;
    let ollama = ollama_server().await;
    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .and(body_partial_json(json!({"model": "llama3.1:8b"})))
        .respond_with(ollama_reply("direct"))
        .expect(1)
        .mount(&ollama)
        .await;

    let manager = manager(settings(), &ollama.uri(), &lmstudio.uri());
    let response = manager
        .complete(CompletionRequest::from_prompt("hello").with_model("ollama:llama3.1:8b"))
        .await
        .unwrap();

    assert_eq!(response.backend, BackendKind::Ollama);
    assert_eq!(hits(&lmstudio, "/v1/chat/completions").await, 0);
}
