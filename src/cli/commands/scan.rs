//! `secretsync scan` and `secretsync usages`: source-tree discovery.
//! Neither command reads secret values.

use crate::cli::output;
use crate::cli::{open_engine, print_json, Cli};
use crate::errors::Result;

/// Execute the `scan` command.
pub fn execute(cli: &Cli) -> Result<()> {
    let engine = open_engine(cli)?;
    let index = engine.usage_index();

    if cli.json {
        return print_json(&index);
    }

    output::print_usage_index(&index);
    Ok(())
}

/// Execute the `usages` command.
pub fn execute_usages(cli: &Cli, key: &str) -> Result<()> {
    let engine = open_engine(cli)?;
    let usages = engine.find_key_usages(key)?;

    if cli.json {
        return print_json(&usages);
    }

    output::print_key_usages(&usages);
    Ok(())
}
