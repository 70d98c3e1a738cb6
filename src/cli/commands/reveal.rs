//! `secretsync reveal`: print the plaintext of a visible secret.

use crate::cli::output;
use crate::cli::{open_engine, Cli};
use crate::errors::Result;

/// Execute the `reveal` command.
pub fn execute(cli: &Cli, key: &str) -> Result<()> {
    let engine = open_engine(cli)?;
    let revealed = engine.reveal(key)?;

    match &revealed.value {
        Some(value) => println!("{}", value.as_str()),
        None => output::warning(&format!("Secret '{key}' has no value yet.")),
    }
    Ok(())
}
