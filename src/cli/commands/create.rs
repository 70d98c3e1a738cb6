//! `secretsync create`: add a new secret to the vault.

use std::str::FromStr;

use crate::cli::output;
use crate::cli::{open_engine, print_json, read_value, Cli};
use crate::errors::Result;
use crate::vault::{NewSecret, SecretSource, Visibility};

/// Execute the `create` command.
pub fn execute(
    cli: &Cli,
    key: &str,
    value: Option<&str>,
    empty: bool,
    visible: bool,
    source: &str,
    required: bool,
) -> Result<()> {
    // Parse flags before prompting so typos fail fast.
    let source = SecretSource::from_str(source)?;
    let visibility = if visible {
        Visibility::Visible
    } else {
        Visibility::Hidden
    };

    let engine = open_engine(cli)?;

    let mut input = NewSecret::new(key)
        .visibility(visibility)
        .source(source)
        .required(required);
    if !empty {
        let value = read_value(key, value)?;
        input = input.value(value.as_str());
    }

    let summary = engine.create(input)?;

    if cli.json {
        return print_json(&summary);
    }

    let state = if summary.has_value { "with a value" } else { "as a placeholder" };
    output::success(&format!("Secret '{}' created {state}", summary.key));
    output::tip("Run `secretsync sync` to write it into the service env files.");
    Ok(())
}
