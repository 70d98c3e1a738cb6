//! `secretsync list`: display secrets in a table, one page at a time.

use crate::cli::output;
use crate::cli::{open_engine, print_json, Cli};
use crate::errors::Result;

/// Execute the `list` command.
pub fn execute(cli: &Cli, page: usize, page_size: usize, search: Option<&str>) -> Result<()> {
    let engine = open_engine(cli)?;
    let page = engine.list(page, page_size, search)?;

    if cli.json {
        return print_json(&page);
    }

    output::print_secrets_table(&page);
    Ok(())
}
