//! `secretsync bootstrap`: discover, seed placeholders, sync.

use crate::cli::commands::sync::report_sync;
use crate::cli::output;
use crate::cli::{open_engine, print_json, Cli};
use crate::errors::Result;

/// Execute the `bootstrap` command.
pub fn execute(cli: &Cli) -> Result<()> {
    let engine = open_engine(cli)?;
    let report = engine.bootstrap()?;

    if cli.json {
        return print_json(&report);
    }

    if report.seeded.is_empty() {
        output::info("Every required key already has a vault record.");
    } else {
        let keys: Vec<&str> = report.seeded.iter().map(|s| s.key.as_str()).collect();
        output::success(&format!(
            "Seeded {} placeholder(s): {}",
            keys.len(),
            keys.join(", ")
        ));
        output::tip("Fill them in with `secretsync update <KEY> --prompt`.");
    }

    output::print_sync_state(&report.sync);
    report_sync(&report.sync);
    Ok(())
}
