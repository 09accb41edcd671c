//! Model family detection and capability tags
//!
//! Neither backend reports capabilities reliably through its listing
//! endpoint, so capabilities are derived from the model id with
//! case-insensitive pattern matching.
//!
//! Tags produced: `chat`, `embedding`, `thinking`, `tools`, `vision`.

use std::collections::BTreeSet;

pub const CHAT: &str = "chat";
pub const EMBEDDING: &str = "embedding";
pub const THINKING: &str = "thinking";
pub const TOOLS: &str = "tools";
pub const VISION: &str = "vision";

/// A model family: name pattern plus the capability tags it implies
#[derive(Debug, Clone, Copy)]
pub struct ModelFamily {
    /// Pattern matched against the lowercase model id
    pub pattern: &'static str,
    pub tools: bool,
    pub vision: bool,
}

/// Built-in families. Order matters - more specific patterns come first.
const BUILTIN_FAMILIES: &[ModelFamily] = &[
    ModelFamily { pattern: "qwen2.5-vl", tools: true, vision: true },
    ModelFamily { pattern: "qwen", tools: true, vision: false },
    ModelFamily { pattern: "llama3.2-vision", tools: false, vision: true },
    ModelFamily { pattern: "llama3", tools: true, vision: false },
    ModelFamily { pattern: "llama-3", tools: true, vision: false },
    ModelFamily { pattern: "mistral", tools: true, vision: false },
    ModelFamily { pattern: "mixtral", tools: true, vision: false },
    ModelFamily { pattern: "phi", tools: true, vision: false },
    ModelFamily { pattern: "gemma3", tools: true, vision: true },
    ModelFamily { pattern: "gemma", tools: true, vision: false },
    ModelFamily { pattern: "command-r", tools: true, vision: false },
    ModelFamily { pattern: "hermes", tools: true, vision: false },
    ModelFamily { pattern: "bakllava", tools: false, vision: true },
    ModelFamily { pattern: "llava", tools: false, vision: true },
];

/// Reasoning models emit chain-of-thought and rarely support tool calls
pub fn is_reasoning_model(model: &str) -> bool {
    let model = model.to_lowercase();
    model.contains("deepseek-r1")
        || model.contains("qwq")
        || model.contains("-r1")
        || model.contains("reasoning")
        || model.contains("thinking")
}

pub fn is_embedding_model(model: &str) -> bool {
    let model = model.to_lowercase();
    model.contains("embed") || model.starts_with("bge-") || model.contains("minilm")
}

/// Detect the capability tags for a model id
///
/// ```
/// use mcp_hub::models::detect_capabilities;
///
/// let caps = detect_capabilities("deepseek-r1-distill-qwen-7b");
/// assert!(caps.contains("chat"));
/// assert!(caps.contains("thinking"));
/// assert!(!caps.contains("tools"));
/// ```
pub fn detect_capabilities(model: &str) -> BTreeSet<String> {
    let mut caps = BTreeSet::new();

    if is_embedding_model(model) {
        caps.insert(EMBEDDING.to_string());
        return caps;
    }

    caps.insert(CHAT.to_string());

    let lower = model.to_lowercase();
    if lower.contains("-vl") || lower.contains("vision") {
        caps.insert(VISION.to_string());
    }

    if is_reasoning_model(&lower) {
        caps.insert(THINKING.to_string());
        return caps;
    }

    if let Some(family) = BUILTIN_FAMILIES.iter().find(|f| lower.contains(f.pattern)) {
        if family.tools {
            caps.insert(TOOLS.to_string());
        }
        if family.vision {
            caps.insert(VISION.to_string());
        }
    }

    caps
}

/// Capabilities for an entry of an OpenAI-compatible listing, honoring the
/// optional `type` field LM Studio reports (`llm`, `vlm`, `embeddings`)
pub fn capabilities_for_type(model: &str, model_type: Option<&str>) -> BTreeSet<String> {
    match model_type {
        Some("embeddings") | Some("embedding") => [EMBEDDING.to_string()].into_iter().collect(),
        Some("vlm") => {
            let mut caps = detect_capabilities(model);
            caps.remove(EMBEDDING);
            caps.insert(CHAT.to_string());
            caps.insert(VISION.to_string());
            caps
        }
        _ => detect_capabilities(model),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn has(caps: &BTreeSet<String>, tag: &str) -> bool {
        caps.contains(tag)
    }

    #[test]
    fn test_qwen_detection() {
        let caps = detect_capabilities("qwen3-coder:30b");
        assert!(has(&caps, CHAT));
        assert!(has(&caps, TOOLS));
        assert!(!has(&caps, THINKING));
    }

    #[test]
    fn test_deepseek_r1_detection() {
        let caps = detect_capabilities("deepseek-r1-distill-qwen-7b");
        assert!(has(&caps, THINKING));
        assert!(!has(&caps, TOOLS));
    }

    #[test]
    fn test_reasoning_model_detection() {
        assert!(is_reasoning_model("deepseek-r1:14b"));
        assert!(is_reasoning_model("qwq:32b"));
        assert!(is_reasoning_model("some-model-r1"));
        assert!(!is_reasoning_model("qwen3-coder:30b"));
        assert!(!is_reasoning_model("llama3.1:70b"));
    }

    #[test]
    fn test_embedding_detection() {
        let caps = detect_capabilities("nomic-embed-text:latest");
        assert_eq!(caps.len(), 1);
        assert!(has(&caps, EMBEDDING));
        assert!(!has(&caps, CHAT));
    }

    #[test]
    fn test_vision_detection() {
        assert!(has(&detect_capabilities("llava:13b"), VISION));
        assert!(!has(&detect_capabilities("llava:13b"), TOOLS));
        assert!(has(&detect_capabilities("qwen2.5-vl-7b-instruct"), VISION));
    }

    #[test]
    fn test_unknown_model_is_chat_only() {
        let caps = detect_capabilities("unknown-model:7b");
        assert_eq!(caps.into_iter().collect::<Vec<_>>(), vec![CHAT.to_string()]);
    }

    #[test]
    fn test_capabilities_for_type() {
        let caps = capabilities_for_type("text-embedding-nomic-embed-text-v1.5", Some("embeddings"));
        assert!(has(&caps, EMBEDDING));
        let caps = capabilities_for_type("some-vlm", Some("vlm"));
        assert!(has(&caps, VISION));
        assert!(has(&caps, CHAT));
        let caps = capabilities_for_type("mistral-7b", None);
        assert!(has(&caps, TOOLS));
    }
}
