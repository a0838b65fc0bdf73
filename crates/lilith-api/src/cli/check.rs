//! `lilith check`: read-only consistency report.

use anyhow::Result;
use console::style;

use lilith_core::consistency::run_consistency_checks;
use lilith_types::consistency::CheckResult;

use crate::state::AppState;

/// Run the checks and print the report. Returns exit code 1 when any check
/// found errors.
pub async fn check(state: &AppState, json: bool) -> Result<i32> {
    let results = run_consistency_checks(&state.store).await?;
    let errors: usize = results.iter().map(|r| r.error_count).sum();
    let warnings: usize = results.iter().map(|r| r.warning_count).sum();

    if json {
        let report = serde_json::json!({
            "checks": results,
            "errors": errors,
            "warnings": warnings,
            "consistent": errors == 0,
        });
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        for result in &results {
            let tag = if result.is_clean() {
                style("[PASS]").green()
            } else {
                style("[FAIL]").red()
            };
            println!("{tag} {}", heading(result));
            for line in &result.details {
                println!("{line}");
            }
            if !result.details.is_empty() {
                println!();
            }
        }
        println!("{}", total_line(errors, warnings));
    }

    Ok(if errors > 0 { 1 } else { 0 })
}

fn heading(result: &CheckResult) -> String {
    if result.warning_count > 0 {
        format!("{} ({} warnings)", result.name, result.warning_count)
    } else {
        result.name.clone()
    }
}

fn total_line(errors: usize, warnings: usize) -> String {
    if errors > 0 {
        format!("Total: {errors} error(s), {warnings} warning(s). Data is inconsistent.")
    } else if warnings > 0 {
        format!(
            "Total: 0 errors, {warnings} warning(s). Data is consistent but some peers have duplicate chats."
        )
    } else {
        "Total: 0 errors, 0 warnings. Data is consistent.".to_string()
    }
}
