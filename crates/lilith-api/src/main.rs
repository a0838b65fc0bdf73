//! Lilith command-line entry point.
//!
//! Binary name: `lilith`
//!
//! Parses CLI arguments, initializes logging and the store, then dispatches
//! to the ingestion session or one of the read-only reports.

mod cli;
mod state;

use clap::Parser;
use clap_complete::generate;

use cli::{Cli, Commands};
use lilith_observe::tracing_setup::{filter_for_verbosity, init_tracing, shutdown_tracing};
use lilith_types::session::SyncMode;
use state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    init_tracing(filter_for_verbosity(cli.verbose, cli.quiet), cli.otel)
        .map_err(|e| anyhow::anyhow!(e))?;

    // Shell completions don't need app state
    if let Commands::Completions { shell } = &cli.command {
        let mut cmd = <Cli as clap::CommandFactory>::command();
        generate(*shell, &mut cmd, "lilith", &mut std::io::stdout());
        return Ok(());
    }

    let state = AppState::init(
        cli.data_dir.clone(),
        cli.database_url.as_deref(),
        cli.auth_dir.as_deref(),
    )
    .await?;

    let exit_code = match cli.command {
        Commands::Backfill => cli::sync::run_sync(&state, SyncMode::Backfill, cli.json).await?,
        Commands::Listen => cli::sync::run_sync(&state, SyncMode::Live, cli.json).await?,
        Commands::Check => cli::check::check(&state, cli.json).await?,
        Commands::Status => {
            cli::status::status(&state, cli.json).await?;
            0
        }
        Commands::Completions { .. } => unreachable!("handled above"),
    };

    state.close().await;
    shutdown_tracing();

    if exit_code != 0 {
        std::process::exit(exit_code);
    }
    Ok(())
}

/// Wait for Ctrl+C or SIGTERM for graceful shutdown.
///
/// A handler that cannot be installed never fires; the other one still does.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!(error = %e, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::warn!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
