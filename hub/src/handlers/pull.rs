//! Pull command handler

use std::time::Duration;

use anyhow::{Context, Result};

use super::CommandContext;
use crate::llm::BackendKind;

/// Handle the `pull` command - download a model into Ollama
pub async fn run_pull(ctx: &CommandContext, model: &str, timeout_secs: u64) -> Result<()> {
    let client = ctx
        .ollama()
        .context("Ollama is not enabled in backends.priority")?;

    println!("Pulling {} (this can take a while)...", model);
    client
        .pull_model(model, Duration::from_secs(timeout_secs))
        .await
        .with_context(|| format!("Failed to pull {}", model))?;

    // The Ollama inventory changed; the next listing must refetch it
    ctx.manager().cache().invalidate(Some(BackendKind::Ollama));
    println!("Pulled {}", model);
    Ok(())
}
