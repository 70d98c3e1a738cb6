//! `secretsync update`: change the value or metadata of a secret.

use std::str::FromStr;

use crate::cli::output;
use crate::cli::{open_engine, print_json, read_value, Cli};
use crate::errors::Result;
use crate::vault::{SecretPatch, SecretSource, Visibility};

/// Execute the `update` command.
pub fn execute(
    cli: &Cli,
    key: &str,
    value: Option<&str>,
    prompt: bool,
    visibility: Option<&str>,
    source: Option<&str>,
    required: Option<bool>,
) -> Result<()> {
    let visibility = visibility.map(Visibility::from_str).transpose()?;
    let source = source.map(SecretSource::from_str).transpose()?;

    let engine = open_engine(cli)?;

    let value = if prompt || value.is_some() {
        Some(read_value(key, value)?.to_string())
    } else {
        None
    };

    let patch = SecretPatch {
        value,
        visibility,
        source,
        required,
    };
    let summary = engine.update(key, patch)?;

    if cli.json {
        return print_json(&summary);
    }

    output::success(&format!("Secret '{}' updated", summary.key));
    output::tip("Run `secretsync sync` to write the change into the service env files.");
    Ok(())
}
