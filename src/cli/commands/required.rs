//! `secretsync required`: which secrets each
//! service needs, why, and whether the vault has them.

use crate::cli::output;
use crate::cli::{open_engine, print_json, Cli};
use crate::errors::{Result, SecretSyncError};
use crate::resolver::RequiredSecretItem;

/// Execute the `required` command.
pub fn execute(cli: &Cli, app: Option<&str>, missing: bool) -> Result<()> {
    let engine = open_engine(cli)?;

    if let Some(app) = app {
        if engine.settings().service(app).is_none() {
            return Err(SecretSyncError::Config(format!(
                "unknown service '{app}' (configured: {})",
                engine.settings().app_names().join(", ")
            )));
        }
    }

    let ledger = engine.required_secrets()?;
    let selected: Vec<&RequiredSecretItem> = ledger
        .items
        .iter()
        .filter(|i| app.map_or(true, |a| i.app == a))
        .filter(|i| !missing || i.is_missing())
        .collect();

    if cli.json {
        return print_json(&selected);
    }

    output::print_ledger(selected.iter().copied());

    let missing_count = ledger.missing_count();
    if missing_count > 0 {
        output::warning(&format!("{missing_count} required secret(s) have no value."));
        output::tip("Run `secretsync bootstrap` to seed placeholders, then `secretsync update`.");
    }
    if !ledger.pending.is_empty() {
        output::info(&format!(
            "{} change(s) waiting for `secretsync sync`.",
            ledger.pending.len()
        ));
    }
    Ok(())
}
