//! Cineverse CLI binary entry point.

use clap::Parser;
use cineverse_client::cli::{commands, Cli, Commands};
use cineverse_client::client::CineClient;
use cineverse_client::config::CineConfig;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> cineverse_client::error::Result<()> {
    let mut config = CineConfig::load()?;
    if let Some(url) = cli.base_url {
        config.base_url = url;
    }
    let client = CineClient::new(config)?;

    match cli.command {
        Commands::Health => commands::handle_health(&client).await,
        Commands::Wait(args) => commands::handle_wait(&client, args.max_wait_secs).await,
        Commands::Ping => commands::handle_ping(&client).await,
        Commands::Get(args) => {
            commands::handle_get(&client, &args.path, &args.query, args.retries).await
        }
    }
}
