//! `lilith backfill` and `lilith listen`: run one ingestion session.

use anyhow::Result;
use console::style;
use tokio_util::sync::CancellationToken;

use lilith_core::session::{SessionController, SessionSettings};
use lilith_infra::bridge::BridgeTransport;
use lilith_infra::credentials::FileCredentialSink;
use lilith_types::session::{SessionOutcome, SessionStats, SyncMode};

use crate::state::AppState;

/// Run a session in `mode` and return the process exit code.
///
/// Ctrl+C or SIGTERM cancels the session between batches.
pub async fn run_sync(state: &AppState, mode: SyncMode, json: bool) -> Result<i32> {
    let transport = BridgeTransport::from_config(&state.config, &state.auth_dir);
    let credentials = FileCredentialSink::new(&state.auth_dir);
    let settings = SessionSettings::from_config(mode, &state.config);
    let mut session =
        SessionController::new(state.store.clone(), transport, credentials, settings);

    let shutdown = CancellationToken::new();
    let signal_task = tokio::spawn({
        let shutdown = shutdown.clone();
        async move {
            crate::shutdown_signal().await;
            tracing::info!("shutdown requested");
            shutdown.cancel();
        }
    });

    if !json {
        println!();
        println!(
            "  {} Lilith {} via {}",
            style("⚡").bold(),
            style(mode).cyan(),
            style(&state.config.bridge.program).dim()
        );
        println!("  {}", style("Press Ctrl+C to stop").dim());
    }

    let outcome = session.run(shutdown).await;
    signal_task.abort();
    let stats = session.stats().clone();
    // Dropping the session kills the bridge process.
    drop(session);

    if json {
        let report = serde_json::json!({
            "mode": mode,
            "outcome": outcome_label(&outcome),
            "exit_code": outcome.exit_code(),
            "stats": stats,
        });
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_summary(&outcome, &stats);
    }

    Ok(outcome.exit_code())
}

fn outcome_label(outcome: &SessionOutcome) -> String {
    match outcome {
        SessionOutcome::IdleComplete => "idle_complete".to_string(),
        SessionOutcome::LoggedOut => "logged_out".to_string(),
        SessionOutcome::Disconnected(reason) => format!("disconnected: {reason}"),
        SessionOutcome::StoreUnavailable => "store_unavailable".to_string(),
        SessionOutcome::Shutdown => "shutdown".to_string(),
    }
}

fn print_summary(outcome: &SessionOutcome, stats: &SessionStats) {
    let label = outcome_label(outcome);
    let label = if outcome.exit_code() == 0 {
        style(label).green()
    } else {
        style(label).red()
    };

    println!();
    println!("  {}", style("── Session ──").dim());
    println!("  Outcome:    {label}");
    println!("  Chats:      {}", style(stats.chats).bold());
    println!("  Contacts:   {}", style(stats.contacts).bold());
    println!("  Messages:   {}", style(stats.messages).bold());
    if stats.skipped_messages > 0 {
        println!("  Skipped:    {}", style(stats.skipped_messages).yellow());
    }
    if stats.identity_mappings > 0 {
        println!("  Mappings:   {}", stats.identity_mappings);
    }
    if stats.lookups > 0 {
        println!("  Lookups:    {}", stats.lookups);
    }
    if stats.failed_batches > 0 {
        println!("  Failed:     {}", style(stats.failed_batches).red());
    }
    if stats.reconnects > 0 {
        println!("  Reconnects: {}", stats.reconnects);
    }
    if matches!(outcome, SessionOutcome::LoggedOut) {
        println!();
        println!(
            "  {} Device was logged out. Remove the auth directory and pair again.",
            style("✗").red()
        );
    }
    if matches!(outcome, SessionOutcome::StoreUnavailable) {
        println!();
        println!(
            "  {} Store became unreachable. Batches after the failure were not saved.",
            style("✗").red()
        );
    }
    println!();
}
