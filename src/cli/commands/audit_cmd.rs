//! `secretsync audit`: display the audit log.
//!
//! Usage:
//!   secretsync audit               # show last 50 entries
//!   secretsync audit --last 20     # show last 20
//!   secretsync audit --since 7d    # entries from last 7 days
//!
//! Reads only the audit database, so no master key is needed.

use chrono::Utc;

use crate::audit::{db_path, AuditEntry, AuditTrail};
use crate::cli::output;
use crate::cli::Cli;
use crate::config::Settings;
use crate::errors::{Result, SecretSyncError};

/// Execute the `audit` command.
pub fn execute(cli: &Cli, last: usize, since: Option<&str>) -> Result<()> {
    let settings = Settings::load(&cli.project_dir)?;
    let state_dir = settings.state_dir_path(&cli.project_dir);

    let since_dt = match since {
        Some(s) => Some(parse_duration(s)?),
        None => None,
    };

    if !db_path(&state_dir).exists() {
        output::info("No audit entries found.");
        return Ok(());
    }

    let trail = AuditTrail::new(state_dir, settings.actor);
    let entries = trail.recent(last, since_dt)?;

    if entries.is_empty() {
        output::info("No audit entries found.");
        return Ok(());
    }

    print_audit_table(&entries);

    Ok(())
}

/// Parse a human-friendly duration string like "7d", "24h", "30m".
fn parse_duration(input: &str) -> Result<chrono::DateTime<Utc>> {
    let input = input.trim();

    let (num_str, unit): (&str, fn(i64) -> chrono::Duration) =
        if let Some(s) = input.strip_suffix('d') {
            (s, chrono::Duration::days)
        } else if let Some(s) = input.strip_suffix('h') {
            (s, chrono::Duration::hours)
        } else if let Some(s) = input.strip_suffix('m') {
            (s, chrono::Duration::minutes)
        } else {
            return Err(SecretSyncError::CommandFailed(format!(
                "invalid duration '{input}': use a format like 7d, 24h, or 30m"
            )));
        };

    let num: i64 = num_str.parse().map_err(|_| {
        SecretSyncError::CommandFailed(format!(
            "invalid duration '{input}': number part is not valid"
        ))
    })?;

    Ok(Utc::now() - unit(num))
}

/// Print audit entries in a formatted table.
pub fn print_audit_table(entries: &[AuditEntry]) {
    use comfy_table::{ContentArrangement, Table};
    use console::style;

    let mut table = Table::new();
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec!["Time", "Operation", "Actor", "Key", "Details"]);

    for entry in entries {
        let time = entry.timestamp.format("%Y-%m-%d %H:%M:%S").to_string();
        let op = colorize_operation(&entry.operation);
        let key = entry.key_name.as_deref().unwrap_or("-");
        let details = entry.details.as_deref().unwrap_or("-");

        table.add_row(vec![
            time,
            op,
            entry.actor.clone(),
            key.to_string(),
            details.to_string(),
        ]);
    }

    println!(
        "{}",
        style(format!("{} audit entries:", entries.len())).bold()
    );
    println!("{table}");
}

/// Colorize operation names for display.
fn colorize_operation(op: &str) -> String {
    use console::style;

    match op {
        "create" => style(op).green().to_string(),
        "update" => style(op).blue().to_string(),
        "remove" | "reveal-denied" => style(op).red().to_string(),
        "reveal" => style(op).yellow().to_string(),
        "sync" => style(op).cyan().to_string(),
        "rollback" => style(op).magenta().to_string(),
        _ => op.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_duration_days() {
        let dt = parse_duration("7d").unwrap();
        let diff = Utc::now() - dt;
        assert!((diff.num_days() - 7).abs() <= 1);
    }

    #[test]
    fn parse_duration_hours_and_minutes() {
        let diff = Utc::now() - parse_duration("24h").unwrap();
        assert!((diff.num_hours() - 24).abs() <= 1);
        let diff = Utc::now() - parse_duration("30m").unwrap();
        assert!((diff.num_minutes() - 30).abs() <= 1);
    }

    #[test]
    fn parse_duration_invalid() {
        assert!(parse_duration("abc").is_err());
        assert!(parse_duration("7x").is_err());
        assert!(parse_duration("d").is_err());
    }

    #[test]
    fn colorize_operation_keeps_the_name() {
        for op in ["create", "reveal-denied", "rollback", "unknown"] {
            assert!(colorize_operation(op).contains(op));
        }
    }
}
