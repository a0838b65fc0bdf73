//! Store status command.

use anyhow::Result;
use console::style;

use crate::state::AppState;

/// Display row counts, the newest message time and resolved locations.
pub async fn status(state: &AppState, json: bool) -> Result<()> {
    let summary = state.store.summary().await?;

    if json {
        let status = serde_json::json!({
            "version": env!("CARGO_PKG_VERSION"),
            "data_dir": state.data_dir.display().to_string(),
            "database_url": state.database_url,
            "auth_dir": state.auth_dir.display().to_string(),
            "store": summary,
        });
        println!("{}", serde_json::to_string_pretty(&status)?);
        return Ok(());
    }

    println!();
    println!(
        "  {} Lilith v{}",
        style("⚡").bold(),
        env!("CARGO_PKG_VERSION")
    );
    println!();

    println!("  {}", style("── Store ──").dim());
    println!("  Chats:    {}", style(summary.chats).bold());
    println!("  Contacts: {}", style(summary.contacts).bold());
    println!("  Messages: {}", style(summary.messages).bold());
    match summary.latest_message_at {
        Some(at) => println!("  Latest:   {}", at.format("%Y-%m-%d %H:%M:%S UTC")),
        None => println!("  Latest:   {}", style("no messages yet").dim()),
    }
    println!();

    println!("  {}", style("── System ──").dim());
    println!("  Data dir: {}", style(state.data_dir.display()).dim());
    println!("  Database: {}", style(&state.database_url).dim());
    println!("  Auth dir: {}", style(state.auth_dir.display()).dim());
    println!();

    Ok(())
}
