//! Tracing initialization
//!
//! Logs always go to stderr: stdout is reserved for the MCP stdio transport
//! and for command output.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Map a `-v` count to a log level
pub fn level_for_verbosity(verbosity: u8) -> &'static str {
    match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    }
}

/// Initialize tracing/logging
///
/// Sets up logging to stderr with:
/// - Environment-based filtering via RUST_LOG
/// - A default level for `crate_name` and `mcp_common` picked from `verbosity`
///   (0 = warn, 1 = info, 2 = debug, 3+ = trace)
///
/// Set `LOG_FORMAT=json` for structured JSON output (useful for production/log aggregation).
/// Default is human-readable text output.
///
/// Returns an error if a global subscriber is already installed.
///
/// # Example
///
/// ```rust,ignore
/// mcp_common::init_tracing("mcp_hub", cli.verbose)?;
/// ```
pub fn init_tracing(crate_name: &str, verbosity: u8) -> anyhow::Result<()> {
    let level = level_for_verbosity(verbosity);
    let filter = EnvFilter::from_default_env()
        .add_directive(format!("{}={}", crate_name, level).parse()?)
        .add_directive(format!("mcp_common={}", level).parse()?);

    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    let registry = tracing_subscriber::registry().with(filter);

    if use_json {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(std::io::stderr),
            )
            .try_init()?;
    } else {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_ansi(false),
            )
            .try_init()?;
    }

    Ok(())
}
