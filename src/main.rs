//! Songs API - an HTTP service for a song catalogue.
//!
//! Songs belong to a performing group and carry lyrics stored line by line.
//! New songs are enriched with release date, lyrics and link from
//! an external metadata service before they are stored.

pub mod api;
pub mod cli;
pub mod config;
pub mod db;
pub mod enrichment;
pub mod error;
pub mod model;
#[cfg(test)]
pub mod test_utils;

use clap::Parser;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

fn main() -> anyhow::Result<()> {
    let args = cli::Cli::parse();

    // Initialize logging
    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true))
        .with(EnvFilter::from_default_env().add_directive("songs_api=info".parse()?))
        .init();

    cli::run_command(&args)
}
