//! Command-line interface for songs-api.
//!
//! Running without a subcommand starts the HTTP server; `migrate` and
//! `rollback` manage the schema without serving.

mod commands;

pub use commands::{Cli, Commands, run_command};
