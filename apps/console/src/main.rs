//! Dispatchlink console entry point.

mod alerts;
mod app;
mod config;

use std::path::PathBuf;

use clap::Parser;
use dispatchlink_protocol::Role;
use tracing_subscriber::EnvFilter;

/// Follows the dispatch server's order feed in the terminal.
#[derive(Parser, Debug)]
#[command(name = "dispatchlink-console", version, about)]
struct Cli {
    /// Feed to follow: admin, courier (or deliverer).
    #[arg(long)]
    role: Option<Role>,

    /// Admin or courier id to join with.
    #[arg(long)]
    identity: Option<String>,

    /// Base URL of the dispatch server.
    #[arg(long)]
    server_url: Option<String>,

    /// Configuration file (defaults to ~/.config/dispatchlink/console.toml).
    #[arg(long)]
    config: Option<PathBuf>,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        "starting dispatchlink console"
    );

    let config = config::Config::load(cli.config.as_deref())?.resolve(
        |key| std::env::var(key).ok(),
        config::Overrides {
            role: cli.role,
            identity: cli.identity,
            server_url: cli.server_url,
        },
    );
    tracing::info!(role = %config.role, server = %config.server_url, "configuration loaded");

    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(app::run(config))?;

    tracing::info!("console shut down cleanly");
    Ok(())
}
