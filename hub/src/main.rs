use anyhow::Result;
use clap::Parser;

use mcp_hub::cli::{Cli, Commands};
use mcp_hub::config::HubConfig;
use mcp_hub::handlers::{self, CommandContext};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Logs go to stderr so stdout stays clean for the MCP transport
    mcp_common::init_tracing("mcp_hub", cli.verbose)?;

    let mut config = HubConfig::resolve(cli.config.as_deref())?;
    if let Some(backend) = cli.backend {
        config.backends.preferred = backend;
        config.validate()?;
    }

    let ctx = CommandContext::new(config, cli.backend, cli.verbose);

    let outcome = match cli.command {
        Commands::Health => handlers::run_health(&ctx).await,
        Commands::Models { refresh, json } => handlers::run_models(&ctx, refresh, json)
            .await
            .map(|()| true),
        Commands::Complete {
            prompt,
            model,
            system,
        } => handlers::run_complete(&ctx, &prompt, model, system)
            .await
            .map(|()| true),
        Commands::Pull { model, timeout } => handlers::run_pull(&ctx, &model, timeout)
            .await
            .map(|()| true),
        #[cfg(feature = "mcp")]
        Commands::Serve => handlers::run_serve(&ctx).await.map(|()| true),
    };

    ctx.manager().close().await;

    if !outcome? {
        std::process::exit(1);
    }
    Ok(())
}
