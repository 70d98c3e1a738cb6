//! CLI module: Clap argument parser, output helpers, and command implementations.

pub mod commands;
pub mod output;

use std::io::{self, IsTerminal, Read};
use std::path::PathBuf;

use clap::Parser;
use serde::Serialize;
use zeroize::Zeroizing;

use crate::engine::SecretsEngine;
use crate::errors::{Result, SecretSyncError};

/// secretsync: encrypted secrets vault that keeps service .env files in sync.
#[derive(Parser)]
#[command(
    name = "secretsync",
    about = "Encrypted secrets vault that discovers, reconciles and syncs service .env files",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Project directory (default: current directory)
    #[arg(short = 'C', long, default_value = ".", global = true)]
    pub project_dir: PathBuf,

    /// Print machine-readable JSON instead of tables
    #[arg(long, global = true)]
    pub json: bool,

    /// Enable debug logging (overridden by SECRETSYNC_LOG)
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

/// All available subcommands.
#[derive(clap::Subcommand)]
pub enum Commands {
    /// Add a new secret
    Create {
        /// Secret name (e.g. DATABASE_URL)
        key: String,
        /// Secret value (omit for stdin or interactive prompt)
        value: Option<String>,
        /// Store a placeholder with no value
        #[arg(long, conflicts_with = "value")]
        empty: bool,
        /// Allow `reveal` to print the plaintext
        #[arg(long)]
        visible: bool,
        /// Where the secret comes from: app, account or scanned
        #[arg(long, default_value = "app")]
        source: String,
        /// Mark the secret as required
        #[arg(long)]
        required: bool,
    },

    /// Change an existing secret
    Update {
        /// Secret name
        key: String,
        /// New value (use --prompt to type it instead)
        #[arg(long)]
        value: Option<String>,
        /// Read the new value from stdin or an interactive prompt
        #[arg(long, conflicts_with = "value")]
        prompt: bool,
        /// New visibility: hidden or visible
        #[arg(long)]
        visibility: Option<String>,
        /// New source: app, account or scanned
        #[arg(long)]
        source: Option<String>,
        /// Set or clear the required flag
        #[arg(long)]
        required: Option<bool>,
    },

    /// Remove a secret
    Remove {
        /// Secret name
        key: String,
        /// Skip confirmation prompt
        #[arg(short, long)]
        force: bool,
    },

    /// Print a visible secret's value
    Reveal {
        /// Secret name
        key: String,
    },

    /// List secrets (names and metadata only)
    List {
        /// Page number, starting at 1
        #[arg(long, default_value = "1")]
        page: usize,
        /// Secrets per page (max 100)
        #[arg(long, default_value = "25")]
        page_size: usize,
        /// Only keys containing this text
        #[arg(short, long)]
        search: Option<String>,
    },

    /// Show which secrets each service requires, and why
    Required {
        /// Only this service
        #[arg(long)]
        app: Option<String>,
        /// Only keys without a value
        #[arg(long)]
        missing: bool,
    },

    /// Scan the source tree for referenced keys
    Scan,

    /// Find every line that mentions a key
    Usages {
        /// Secret name
        key: String,
    },

    /// Write vault values into every service's env file
    Sync,

    /// Restore every service's env file from its latest backup
    Rollback {
        /// Skip confirmation prompt
        #[arg(short, long)]
        force: bool,
    },

    /// Show vault health and the last sync
    Status,

    /// Discover required keys, seed placeholders, then sync
    Bootstrap,

    /// Generate a new random master key
    Keygen,

    /// View the audit log of vault operations
    Audit {
        /// Number of entries to show (default: 50)
        #[arg(long, default_value = "50")]
        last: usize,
        /// Show entries since a duration ago (e.g. 7d, 24h, 30m)
        #[arg(long)]
        since: Option<String>,
    },
}

// ---------------------------------------------------------------------------
// Shared helpers used by multiple commands
// ---------------------------------------------------------------------------

/// Open the engine for the selected project, resolving the master key
/// from the configured environment variable.
pub fn open_engine(cli: &Cli) -> Result<SecretsEngine> {
    SecretsEngine::open_from_env(&cli.project_dir)
}

/// Read a secret value: inline argument, piped stdin, or a hidden prompt.
///
/// Returns `Zeroizing<String>` so the value is wiped from memory on drop.
pub fn read_value(key: &str, inline: Option<&str>) -> Result<Zeroizing<String>> {
    if let Some(v) = inline {
        output::warning("Value provided on command line; it may appear in shell history.");
        return Ok(Zeroizing::new(v.to_string()));
    }

    if !io::stdin().is_terminal() {
        let mut buf = Zeroizing::new(String::new());
        io::stdin().read_to_string(&mut buf)?;
        let trimmed = buf.trim_end_matches(['\r', '\n']).len();
        buf.truncate(trimmed);
        return Ok(buf);
    }

    let value = dialoguer::Password::new()
        .with_prompt(format!("Enter value for {key}"))
        .allow_empty_password(true)
        .interact()
        .map_err(|e| SecretSyncError::CommandFailed(format!("input prompt: {e}")))?;
    Ok(Zeroizing::new(value))
}

/// Ask before a destructive action unless `force` is set.
pub fn confirm(prompt: &str, force: bool) -> Result<bool> {
    if force {
        return Ok(true);
    }
    dialoguer::Confirm::new()
        .with_prompt(prompt)
        .default(false)
        .interact()
        .map_err(|e| SecretSyncError::CommandFailed(format!("confirm prompt: {e}")))
}

/// Pretty-print any serializable result as JSON on stdout.
pub fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    let text = serde_json::to_string_pretty(value)
        .map_err(|e| SecretSyncError::Serialization(format!("JSON output: {e}")))?;
    println!("{text}");
    Ok(())
}

/// A one-line hint for errors the user can fix.
pub fn hint_for(err: &SecretSyncError) -> Option<&'static str> {
    match err {
        SecretSyncError::Config(msg) if msg.contains("master key") => {
            Some("run: secretsync keygen, then export the key in the configured variable")
        }
        SecretSyncError::Duplicate(_) => Some("run: secretsync update <KEY> --value ..."),
        SecretSyncError::Forbidden(_) => {
            Some("run: secretsync update <KEY> --visibility visible")
        }
        _ => None,
    }
}
