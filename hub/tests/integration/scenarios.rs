//! Discovery, caching and lifecycle against live HTTP mocks

use std::time::Duration;

use mcp_hub::llm::{BackendKind, CompletionRequest};
use mcp_hub::manager::ManagerState;
use mcp_hub::{HubError, ManagerSettings};
use serde_json::json;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::Mock;

use super::support::{
    hits, lmstudio_reply, lmstudio_server, manager, settings, LMSTUDIO_MODEL, UNREACHABLE,
};

#[tokio::test]
async fn test_routes_to_lmstudio_when_ollama_is_down() {
    let lmstudio = lmstudio_server().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(body_partial_json(json!({"model": LMSTUDIO_MODEL})))
        .respond_with(lmstudio_reply("Paris"))
        .expect(1)
        .mount(&lmstudio)
        .await;

    let manager = manager(settings(), UNREACHABLE, &lmstudio.uri());
    manager.initialize().await.unwrap();

    assert_eq!(manager.state(), ManagerState::Ready);
    assert_eq!(manager.discovery().available_backends(), vec![BackendKind::LmStudio]);

    let models = manager.list_models(false).await.unwrap();
    assert_eq!(models.len(), 1);
    assert_eq!(models[0].qualified_name(), "lmstudio:deepseek-r1-distill-qwen-7b");

    let response = manager
        .complete(CompletionRequest::from_prompt("Capital of France?").with_model(LMSTUDIO_MODEL))
        .await
        .unwrap();
    assert_eq!(response.backend, BackendKind::LmStudio);
    assert_eq!(response.content, "Paris");

    manager.close().await;
}

#[tokio::test]
async fn test_both_backends_down() {
    let manager = manager(settings(), UNREACHABLE, UNREACHABLE);
    manager.initialize().await.unwrap();

    let snapshot = manager.get_health_snapshot().unwrap();
    assert!(!snapshot.any_available());
    assert_eq!(snapshot.backends.len(), 2);
    assert!(snapshot.backends.iter().all(|h| h.error.is_some()));

    let err = manager
        .complete(CompletionRequest::from_prompt("hello"))
        .await
        .unwrap_err();
    let HubError::AllBackendsUnavailable(failures) = &err else {
        panic!("expected AllBackendsUnavailable, got {err:?}");
    };
    assert_eq!(failures.len(), 2);
    assert!(failures.iter().all(|f| f.kind == "backend_unreachable"));
    assert_eq!(err.user_message(), "no inference backend currently available");

    // Discovery was re-run once before giving up
    assert_eq!(manager.get_health_snapshot().unwrap().discovery_passes, 2);
    assert!(manager.list_models(false).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_stale_listing_is_refetched() {
    let lmstudio = lmstudio_server().await;
    let settings = ManagerSettings {
        cache_ttl: Duration::from_secs(1),
        ..settings()
    };
    let manager = manager(settings, UNREACHABLE, &lmstudio.uri());

    // Health probe and model listing share the endpoint
    manager.initialize().await.unwrap();
    assert_eq!(hits(&lmstudio, "/v1/models").await, 2);

    manager.list_models(false).await.unwrap();
    assert_eq!(hits(&lmstudio, "/v1/models").await, 2);

    tokio::time::sleep(Duration::from_millis(1100)).await;
    let models = manager.list_models(false).await.unwrap();
    assert_eq!(models.len(), 1);
    assert_eq!(hits(&lmstudio, "/v1/models").await, 3);
}

#[tokio::test]
async fn test_reconnect_reloads_listings() {
    let lmstudio = lmstudio_server().await;
    let manager = manager(settings(), UNREACHABLE, &lmstudio.uri());
    manager.initialize().await.unwrap();

    let snapshot = manager.reconnect().await.unwrap();
    assert_eq!(snapshot.available, vec![BackendKind::LmStudio]);
    assert_eq!(snapshot.discovery_passes, 2);
    assert_eq!(snapshot.cache.len(), 1);
    assert!(snapshot.cache[0].fresh);
}

#[tokio::test]
async fn test_closed_manager_fails_fast() {
    let lmstudio = lmstudio_server().await;
    let manager = manager(settings(), UNREACHABLE, &lmstudio.uri());
    manager.initialize().await.unwrap();

    manager.close().await;
    manager.close().await;

    assert_eq!(manager.state(), ManagerState::Closed);
    assert!(matches!(
        manager.list_models(false).await,
        Err(HubError::ManagerClosed)
    ));
    assert!(matches!(
        manager.complete(CompletionRequest::from_prompt("hi")).await,
        Err(HubError::ManagerClosed)
    ));
    assert!(matches!(manager.initialize().await, Err(HubError::ManagerClosed)));
}
