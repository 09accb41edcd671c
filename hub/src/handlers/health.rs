//! Health check command handler
//!
//! Runs one discovery pass and prints what answered.

use anyhow::Result;

use super::CommandContext;
use crate::discovery::BackendHealth;

fn status(passed: bool) -> &'static str {
    if passed {
        "✓"
    } else {
        "✗"
    }
}

/// Handle the `health` command
///
/// Returns whether at least one backend is available.
pub async fn run_health(ctx: &CommandContext) -> Result<bool> {
    println!("=== Backend Health ===\n");

    let manager = ctx.manager();
    manager.initialize().await?;
    let snapshot = manager.get_health_snapshot()?;

    for health in &snapshot.backends {
        print_backend(health);
        if ctx.is_verbose() {
            if let Some(entry) = snapshot.cache.iter().find(|c| c.backend == health.backend) {
                println!(
                    "  - cache: {} models, {}s old{}",
                    entry.models,
                    entry.age_seconds,
                    if entry.fresh { "" } else { " (stale)" }
                );
            }
        }
    }

    println!("\n=== Summary ===");
    println!(
        "Backends: {}/{} available",
        snapshot.available.len(),
        snapshot.backends.len()
    );

    if let Some(model) = manager.recommended_model().await? {
        println!("Recommended model: {}", model.qualified_name());
    }

    if snapshot.any_available() {
        println!("\nAt least one backend is ready.");
    } else {
        println!("\nNo inference backend currently available.");
    }
    Ok(snapshot.any_available())
}

fn print_backend(health: &BackendHealth) {
    if health.available {
        println!(
            "{}: {} {} ({} ms)",
            health.backend,
            status(true),
            health.endpoint,
            health.latency.as_millis()
        );
    } else {
        println!(
            "{}: {} {} - {}",
            health.backend,
            status(false),
            health.endpoint,
            health.error.as_deref().unwrap_or("unavailable")
        );
    }
}
