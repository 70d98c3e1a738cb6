//! `secretsync status`: vault health and the outcome of the last sync.

use crate::cli::output;
use crate::cli::{open_engine, print_json, Cli};
use crate::errors::Result;

/// Execute the `status` command.
pub fn execute(cli: &Cli) -> Result<()> {
    let engine = open_engine(cli)?;
    let telemetry = engine.telemetry()?;

    if cli.json {
        return print_json(&telemetry);
    }

    output::print_telemetry(&telemetry, &engine.vault().key_fingerprint());
    Ok(())
}
