//! Models command handler

use anyhow::Result;

use super::CommandContext;
use crate::llm::ModelInfo;

/// Handle the `models` command - list models across available backends
pub async fn run_models(ctx: &CommandContext, refresh: bool, json: bool) -> Result<()> {
    let manager = ctx.manager();
    let models = manager.list_models(refresh).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&models)?);
        return Ok(());
    }

    if models.is_empty() {
        println!("No models available.");
        if manager.discovery().available_backends().is_empty() {
            println!("No backend answered; run `hub health` for details.");
        }
        return Ok(());
    }

    let recommended = manager.recommended_model().await?;
    println!("Available models:");
    for model in &models {
        let marker = if recommended.as_ref() == Some(model) {
            " (recommended)"
        } else {
            ""
        };
        println!("  {}{}", describe(model), marker);
    }
    Ok(())
}

fn describe(model: &ModelInfo) -> String {
    let caps: Vec<&str> = model.capabilities.iter().map(String::as_str).collect();
    let mut line = format!("{} [{}]", model.qualified_name(), caps.join(", "));
    if let Some(bytes) = model.size_bytes {
        line.push_str(&format!(" {:.1} GB", bytes as f64 / 1_000_000_000.0));
    }
    if let Some(context) = model.context_length {
        line.push_str(&format!(" ctx={}", context));
    }
    line
}
