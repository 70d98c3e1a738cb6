//! `secretsync remove`: delete a secret from the vault.

use crate::cli::output;
use crate::cli::{confirm, open_engine, print_json, Cli};
use crate::errors::Result;

/// Execute the `remove` command.
pub fn execute(cli: &Cli, key: &str, force: bool) -> Result<()> {
    let engine = open_engine(cli)?;

    if !confirm(&format!("Remove secret '{key}'?"), force)? {
        output::info("Cancelled.");
        return Ok(());
    }

    let summary = engine.remove(key)?;

    if cli.json {
        return print_json(&summary);
    }

    output::success(&format!("Removed secret '{}'", summary.key));
    output::tip("Env files keep their current line until you edit them; sync never deletes keys.");
    Ok(())
}
