//! `secretsync sync` and `secretsync rollback`.

use crate::cli::output;
use crate::cli::{confirm, open_engine, print_json, Cli};
use crate::errors::Result;
use crate::sync::{LastStatus, ServiceStatus, SyncState};

/// Execute the `sync` command.
pub fn execute(cli: &Cli) -> Result<()> {
    let engine = open_engine(cli)?;
    let state = engine.sync_env_files()?;

    if cli.json {
        return print_json(&state);
    }

    output::print_sync_state(&state);
    report_sync(&state);
    Ok(())
}

/// Execute the `rollback` command.
pub fn execute_rollback(cli: &Cli, force: bool) -> Result<()> {
    let engine = open_engine(cli)?;

    if !confirm("Restore every env file from its latest backup?", force)? {
        output::info("Cancelled.");
        return Ok(());
    }

    let state = engine.rollback_env_files()?;

    if cli.json {
        return print_json(&state);
    }

    output::print_sync_state(&state);
    let restored = state.services_with(ServiceStatus::Ok);
    let skipped = state.services_with(ServiceStatus::Skipped);
    let failed = state.services_with(ServiceStatus::Failed);

    if !restored.is_empty() {
        output::success(&format!("Restored: {}", restored.join(", ")));
    }
    if !skipped.is_empty() {
        output::info(&format!("No backup for: {}", skipped.join(", ")));
    }
    if !failed.is_empty() {
        output::warning(&format!("Rollback failed for: {}", failed.join(", ")));
    }
    Ok(())
}

/// Summary line shared by `sync` and `bootstrap`.
pub fn report_sync(state: &SyncState) {
    let failed = state.services_with(ServiceStatus::Failed);
    if !failed.is_empty() {
        output::warning(&format!("Could not write: {}", failed.join(", ")));
    }

    match state.last_status {
        LastStatus::Ok => output::success("All services are in sync."),
        _ if state.required_missing > 0 => {
            output::warning(&format!(
                "{} required secret(s) still have no value.",
                state.required_missing
            ));
            output::tip("Run `secretsync required --missing` to see them.");
        }
        _ => {}
    }
}
