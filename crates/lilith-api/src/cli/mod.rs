//! CLI command definitions for the `lilith` binary.
//!
//! Uses clap derive macros for argument parsing. Store and credential
//! locations can come from flags, their environment variables, or
//! `config.toml` in the data directory, in that order.

pub mod check;
pub mod status;
pub mod sync;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use clap_complete::Shell;

/// Ingest chat history from a linked device into a local store.
#[derive(Parser)]
#[command(name = "lilith", version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Output machine-readable JSON instead of styled text.
    #[arg(long, global = true)]
    pub json: bool,

    /// Suppress all output except errors.
    #[arg(long, global = true)]
    pub quiet: bool,

    /// Detailed output (-v for verbose, -vv for debug/trace).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Export tracing spans through OpenTelemetry (stdout exporter).
    #[arg(long, global = true)]
    pub otel: bool,

    /// Data directory holding config.toml, the default store and credentials.
    #[arg(long, global = true, env = "LILITH_DATA_DIR")]
    pub data_dir: Option<PathBuf>,

    /// Store connection target, e.g. sqlite:///var/lib/lilith/lilith.db
    #[arg(long, global = true, env = "DATABASE_URL")]
    pub database_url: Option<String>,

    /// Directory the bridge persists device credentials in.
    #[arg(long, global = true, env = "LILITH_AUTH_DIR")]
    pub auth_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Import history until the stream goes idle, then exit.
    Backfill,

    /// Stay connected and ingest new messages until interrupted.
    #[command(alias = "live")]
    Listen,

    /// Run read-only consistency checks over the store.
    Check,

    /// Show store counts and resolved locations.
    Status,

    /// Generate shell completions.
    Completions {
        /// Shell to generate completions for.
        shell: Shell,
    },
}
