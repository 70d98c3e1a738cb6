//! `secretsync keygen`: print a fresh random master key.

use crate::cli::output;
use crate::cli::Cli;
use crate::config::Settings;
use crate::crypto::generate_master_key;
use crate::errors::Result;

/// Execute the `keygen` command.
///
/// The key goes to stdout alone so it can be piped; hints go to stderr.
pub fn execute(cli: &Cli) -> Result<()> {
    let key = generate_master_key();
    println!("{}", key.as_str());

    let var = Settings::load(&cli.project_dir)
        .unwrap_or_default()
        .master_key_env;
    output::warning(&format!(
        "Store this key somewhere safe and export it as {var}. Losing it means losing the vault."
    ));
    Ok(())
}
