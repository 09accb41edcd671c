//! Complete command handler

use anyhow::Result;

use super::CommandContext;
use crate::llm::CompletionRequest;

/// Handle the `complete` command - one prompt, routed with fallback
pub async fn run_complete(
    ctx: &CommandContext,
    prompt: &str,
    model: Option<String>,
    system: Option<String>,
) -> Result<()> {
    let mut request = CompletionRequest::from_prompt(prompt);
    if let Some(system) = system {
        request = request.with_system(system);
    }
    request.model = model;
    request.backend = ctx.backend.filter(|b| b.is_concrete());

    let response = match ctx.manager().complete(request).await {
        Ok(response) => response,
        Err(e) => {
            for failure in e.failures() {
                eprintln!("  - {}", failure);
            }
            let message = e.user_message();
            return Err(anyhow::Error::new(e).context(message));
        }
    };

    println!("{}", response.content.trim());
    if ctx.is_verbose() {
        eprintln!(
            "\n[{}:{}{}]",
            response.backend,
            response.model,
            response
                .completion_tokens
                .map(|t| format!(", {} tokens", t))
                .unwrap_or_default()
        );
    }
    Ok(())
}
