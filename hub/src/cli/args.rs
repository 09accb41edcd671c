//! CLI argument definitions
//!
//! Contains the main CLI struct and Commands enum for clap parsing.

use std::path::PathBuf;

use clap::{ArgAction, Parser, Subcommand};

use crate::llm::BackendKind;

#[derive(Parser)]
#[command(name = "hub")]
#[command(about = "Unified manager for local LLM backends (Ollama, LM Studio)")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Config file (default: nearest .hub.toml, then ~/.config/mcp-hub/.hub.toml)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Preferred backend: auto, ollama or lmstudio
    #[arg(long, env = "MCP_PREFERRED_BACKEND", global = true)]
    pub backend: Option<BackendKind>,

    /// Increase verbosity (-v info, -vv debug, -vvv trace). Default is warn.
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Probe every backend and show availability
    Health,
    /// List models from every available backend
    Models {
        /// Re-run discovery before listing
        #[arg(long)]
        refresh: bool,
        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },
    /// Send a prompt to the best available backend
    Complete {
        /// Prompt to send
        prompt: String,
        /// Model id, bare or qualified (e.g. ollama:llama3.1:8b)
        #[arg(short = 'm', long)]
        model: Option<String>,
        /// System prompt
        #[arg(long, short)]
        system: Option<String>,
    },
    /// Pull a model into Ollama
    Pull {
        /// Model name, e.g. qwen3:8b
        model: String,
        /// Seconds to wait for the download
        #[arg(long, default_value_t = 3600)]
        timeout: u64,
    },
    /// Run as an MCP server on stdio
    #[cfg(feature = "mcp")]
    Serve,
}
