//! CLI entry point for the Cineverse client layer.

pub mod commands;

use clap::{Parser, Subcommand};

/// Cineverse backend probe
#[derive(Parser, Debug)]
#[command(name = "cineverse", version, about = "Cineverse backend probe and warm-up tool")]
pub struct Cli {
    /// Backend base URL (overrides CINEVERSE_API_URL and the config file)
    #[arg(long, global = true)]
    pub base_url: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run one health check
    Health,
    /// Poll the health endpoint until the backend is ready
    Wait(WaitArgs),
    /// Send one keep-alive ping
    Ping,
    /// GET a path through the retrying executor
    Get(GetArgs),
}

/// Arguments for `cineverse wait`.
#[derive(Parser, Debug)]
pub struct WaitArgs {
    /// Give up after this many seconds
    #[arg(long, default_value_t = 90)]
    pub max_wait_secs: u64,
}

/// Arguments for `cineverse get`.
#[derive(Parser, Debug)]
pub struct GetArgs {
    /// Endpoint path, e.g. /movies/
    pub path: String,

    /// Query parameters as key=value (repeatable)
    #[arg(short, long = "query", value_name = "KEY=VALUE")]
    pub query: Vec<String>,

    /// Override the retry budget
    #[arg(long)]
    pub retries: Option<u32>,
}
