//! Config file loading wired into a running manager

use std::io::Write;

use mcp_hub::config::HubConfig;
use mcp_hub::llm::BackendKind;
use mcp_hub::UnifiedManager;
use wiremock::matchers::{method, path};
use wiremock::Mock;

use super::support::{ollama_reply, ollama_server};

#[tokio::test]
async fn test_manager_from_config_file() {
    let ollama = ollama_server().await;
    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .respond_with(ollama_reply("configured"))
        .mount(&ollama)
        .await;

    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(
        file,
        r#"
[backends]
preferred = "ollama"
priority = ["ollama"]
cache_ttl_seconds = 60
health_check_timeout_seconds = 2
inference_timeout_seconds = 10
default_model = "llama3.1:8b"

[backends.endpoints]
ollama = "{}"
"#,
        ollama.uri()
    )
    .unwrap();

    let config = HubConfig::load_from_path(file.path()).unwrap();
    config.validate().unwrap();
    assert_eq!(config.active_endpoints().len(), 1);

    let settings = config.manager_settings();
    assert_eq!(settings.preferred_backend, BackendKind::Ollama);
    assert_eq!(settings.cache_ttl.as_secs(), 60);

    let manager = UnifiedManager::with_endpoints(settings, &config.active_endpoints());
    assert_eq!(manager.backends(), vec![BackendKind::Ollama]);

    let reply = manager.generate(None, "hello").await.unwrap();
    assert_eq!(reply, "configured");

    let recommended = manager.recommended_model().await.unwrap().unwrap();
    assert_eq!(recommended.qualified_name(), "ollama:llama3.1:8b");
    manager.close().await;
}

#[test]
fn test_env_overrides_file_values() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "[backends]\npreferred = \"lmstudio\"\ncache_ttl_seconds = 60").unwrap();

    let mut config = HubConfig::load_from_path(file.path()).unwrap();
    config
        .apply_overrides(|var| match var {
            "MCP_PREFERRED_BACKEND" => Some("ollama".to_string()),
            "MCP_CACHE_TTL" => Some("120".to_string()),
            _ => None,
        })
        .unwrap();
    config.validate().unwrap();

    assert_eq!(config.backends.preferred, BackendKind::Ollama);
    assert_eq!(config.backends.cache_ttl_seconds, 120);
    // Unlisted endpoints fall back to the container-host defaults
    assert_eq!(
        config.backends.endpoints.get(&BackendKind::LmStudio).map(String::as_str),
        Some("http://host.docker.internal:1234")
    );
}
