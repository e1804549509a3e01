//! CLI command definitions and dispatch.
//!
//! Each subcommand is implemented in its own submodule:
//! - `serve`: Run the HTTP API
//! - `migrate`: Apply and revert schema migrations

mod migrate;
mod serve;

use clap::{Parser, Subcommand};
use tokio::runtime::Runtime;

use crate::config::ConfigArgs;

pub use migrate::{cmd_migrate, cmd_rollback};
pub use serve::cmd_serve;

/// Songs API server
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(flatten)]
    pub config: ConfigArgs,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available subcommands
#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Commands {
    /// Start the HTTP server (default)
    Serve,
    /// Apply pending migrations and exit
    Migrate,
    /// Revert the most recently applied migration
    Rollback,
}

/// Run the command selected on the command line.
pub fn run_command(cli: &Cli) -> anyhow::Result<()> {
    let rt = Runtime::new()?;

    match cli.command.unwrap_or(Commands::Serve) {
        Commands::Serve => cmd_serve(&rt, &cli.config),
        Commands::Migrate => cmd_migrate(&rt, &cli.config),
        Commands::Rollback => cmd_rollback(&rt, &cli.config),
    }
}
