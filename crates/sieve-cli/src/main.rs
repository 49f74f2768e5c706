//! Sieve CLI - Maintain a mention/candidate lifecycle store.

use clap::Parser;
use sieve_cli::commands;
use sieve_cli::{Cli, Command, Formatter, SieveConfig};
use sieve_store::ConnectionPool;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    // Log to stderr so table and JSON output stay clean
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .init();

    if let Err(e) = run().await {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

async fn run() -> sieve_cli::Result<()> {
    let cli = Cli::parse();

    let path = SieveConfig::path(cli.config.as_deref())?;
    let mut config = SieveConfig::load(&path)?;
    if let Some(url) = &cli.db {
        config.override_url(url)?;
    }

    let format = cli.format.map(Into::into).unwrap_or(config.settings.format);
    let color_enabled = !cli.no_color && config.settings.color;
    let formatter = Formatter::new(format, color_enabled);

    if let Command::Config(args) = cli.command {
        return commands::execute_config(args, &config, &path, &formatter);
    }

    let pool = ConnectionPool::open(config.store.clone())?;
    match cli.command {
        Command::Init => commands::execute_init(&pool, &formatter).await?,
        Command::Stats => commands::execute_stats(&pool, &formatter).await?,
        Command::Types => commands::execute_types(&pool, &formatter).await?,
        Command::ClearMentions(args) => {
            commands::execute_clear_mentions(args, &pool, &formatter).await?
        }
        Command::ClearCandidates(args) => {
            commands::execute_clear_candidates(args, &pool, &formatter).await?
        }
        Command::Check => commands::execute_check(&pool, &formatter).await?,
        Command::Config(_) => unreachable!(),
    }

    Ok(())
}
