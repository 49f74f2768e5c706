//! CLI command definitions and argument parsing.

use clap::{Parser, Subcommand};

/// Sieve CLI - Inspect and maintain a mention/candidate store.
#[derive(Debug, Parser)]
#[command(name = "sieve")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Output format
    #[arg(short, long, value_enum, global = true)]
    pub format: Option<CliFormat>,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    /// Configuration file path
    #[arg(short, long, global = true, env = "SIEVE_CONFIG")]
    pub config: Option<String>,

    /// Store connection string (overrides the configuration file)
    #[arg(long, global = true, env = "SIEVE_DB")]
    pub db: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

/// Output format options.
#[derive(Debug, Clone, Copy, clap::ValueEnum)]
pub enum CliFormat {
    /// Table format (default)
    Table,
    /// JSON format
    Json,
}

/// CLI commands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Create the store schema
    Init,

    /// Show document, mention and candidate counts
    Stats,

    /// List declared mention and candidate types
    Types,

    /// Delete mentions and every candidate that references them
    ClearMentions(ClearMentionsArgs),

    /// Delete candidates, leaving mentions in place
    ClearCandidates(ClearCandidatesArgs),

    /// Verify the lifecycle invariants
    Check,

    /// Print the effective configuration
    Config(ConfigArgs),
}

/// Arguments for the clear-mentions command.
#[derive(Debug, Parser)]
pub struct ClearMentionsArgs {
    /// Mention types to clear (default: all)
    #[arg(short = 't', long = "type")]
    pub types: Vec<String>,

    /// Only clear mentions of this document
    #[arg(short, long)]
    pub document: Option<String>,
}

/// Arguments for the clear-candidates command.
#[derive(Debug, Parser)]
pub struct ClearCandidatesArgs {
    /// Candidate types to clear (default: all)
    #[arg(short = 't', long = "type")]
    pub types: Vec<String>,

    /// Only clear candidates in this split
    #[arg(short, long)]
    pub split: Option<i64>,
}

/// Arguments for the config command.
#[derive(Debug, Parser)]
pub struct ConfigArgs {
    /// Write the effective configuration to the configuration file
    #[arg(long)]
    pub save: bool,
}

impl From<CliFormat> for crate::config::OutputFormat {
    fn from(format: CliFormat) -> Self {
        match format {
            CliFormat::Table => crate::config::OutputFormat::Table,
            CliFormat::Json => crate::config::OutputFormat::Json,
        }
    }
}
