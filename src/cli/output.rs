//! Colored terminal output helpers.
//!
//! All user-facing output goes through these functions so we get
//! consistent styling across every command.

use comfy_table::{ContentArrangement, Table};
use console::style;

use crate::resolver::{RequiredSecretItem, RequirementReason, SecretStatus};
use crate::scanner::{KeyUsages, UsageIndex};
use crate::sync::{SecretsTelemetry, ServiceStatus, SyncState};
use crate::vault::SecretPage;

const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Print a green success message: "check_mark {msg}"
pub fn success(msg: &str) {
    println!("{} {}", style("\u{2713}").green().bold(), msg);
}

/// Print a red error message: "x_mark {msg}"
pub fn error(msg: &str) {
    eprintln!("{} {}", style("\u{2717}").red().bold(), msg);
}

/// Print a yellow warning: "warning_sign {msg}"
pub fn warning(msg: &str) {
    eprintln!("{} {}", style("\u{26a0}").yellow().bold(), msg);
}

/// Print a blue info message: "info_sign {msg}"
pub fn info(msg: &str) {
    println!("{} {}", style("\u{2139}").blue().bold(), msg);
}

/// Print a dim tip/hint: "arrow {msg}"
pub fn tip(msg: &str) {
    println!("{} {}", style("\u{2192}").dim(), style(msg).dim());
}

fn table(header: Vec<&str>) -> Table {
    let mut table = Table::new();
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(header);
    table
}

fn yes_no(flag: bool) -> String {
    if flag {
        style("yes").green().to_string()
    } else {
        style("no").dim().to_string()
    }
}

/// Print one page of secret summaries.
pub fn print_secrets_table(page: &SecretPage) {
    if page.total == 0 {
        info("No secrets in this vault yet.");
        tip("Run `secretsync create <KEY>` to add your first secret.");
        return;
    }

    let mut t = table(vec![
        "Key", "Value", "Visibility", "Source", "Required", "Updated", "By",
    ]);
    for s in &page.items {
        t.add_row(vec![
            s.key.clone(),
            if s.has_value {
                style("set").green().to_string()
            } else {
                style("empty").yellow().to_string()
            },
            s.visibility.to_string(),
            s.source.to_string(),
            yes_no(s.required),
            s.updated_at.format(TIME_FORMAT).to_string(),
            s.updated_by.clone(),
        ]);
    }
    println!("{t}");

    let page_size = page.page_size.max(1);
    let pages = ((page.total + page_size - 1) / page_size).max(1);
    tip(&format!(
        "page {} of {pages} ({} secret(s))",
        page.page, page.total
    ));
}

/// Short human form of a requirement reason.
pub fn describe_reason(reason: &RequirementReason) -> String {
    match reason {
        RequirementReason::Integration { group, .. } => format!("integration:{group}"),
        RequirementReason::Scan { count } => format!("scan x{count}"),
        RequirementReason::Flag => "flagged".to_string(),
    }
}

/// Print requirement ledger rows.
pub fn print_ledger<'a>(items: impl IntoIterator<Item = &'a RequiredSecretItem>) {
    let mut t = table(vec!["App", "Key", "Status", "Why", "Found in", "Pending"]);
    let mut rows = 0;
    for item in items {
        let status = match item.status {
            SecretStatus::Present => style("present").green().to_string(),
            SecretStatus::Missing => style("missing").red().bold().to_string(),
        };
        let reasons: Vec<String> = item.reasons.iter().map(describe_reason).collect();
        t.add_row(vec![
            item.app.clone(),
            item.key.clone(),
            status,
            reasons.join(", "),
            item.found_in.join("\n"),
            yes_no(item.pending_sync),
        ]);
        rows += 1;
    }

    if rows == 0 {
        info("No required secrets.");
        return;
    }
    println!("{t}");
}

/// Print the scanner's usage index.
pub fn print_usage_index(index: &UsageIndex) {
    if index.is_empty() {
        info("No configuration keys referenced in the scanned roots.");
        return;
    }

    let mut t = table(vec!["Key", "Modules", "Refs", "Found in"]);
    for entry in index.iter() {
        let modules: Vec<&str> = entry.modules.iter().map(String::as_str).collect();
        let files: Vec<&str> = entry.found_in.iter().map(String::as_str).collect();
        t.add_row(vec![
            entry.key.clone(),
            modules.join(", "),
            entry.locations.len().to_string(),
            files.join("\n"),
        ]);
    }
    println!("{t}");
    info(&format!("{} key(s) referenced", index.len()));
}

/// Print every occurrence of one key, grouped by module.
pub fn print_key_usages(usages: &KeyUsages) {
    if usages.total == 0 {
        info(&format!("'{}' is not mentioned in the scanned roots.", usages.key));
        return;
    }

    for (module, hits) in &usages.modules {
        println!("{}", style(module).bold());
        for hit in hits {
            println!(
                "  {}:{}  {}",
                style(&hit.file).cyan(),
                hit.line,
                style(&hit.context).dim()
            );
        }
    }
    info(&format!("{} occurrence(s) of '{}'", usages.total, usages.key));
}

fn service_status(status: ServiceStatus) -> String {
    let label = status.as_str();
    match status {
        ServiceStatus::Ok => style(label).green().to_string(),
        ServiceStatus::Degraded | ServiceStatus::Skipped => style(label).yellow().to_string(),
        ServiceStatus::Failed => style(label).red().bold().to_string(),
    }
}

/// Print the per-service outcome of a sync or rollback.
pub fn print_sync_state(state: &SyncState) {
    let mut t = table(vec!["Service", "Status", "Missing", "Updated", "Changed", "Detail"]);
    for (name, s) in &state.services {
        let detail = s
            .error
            .as_deref()
            .or(s.reason.as_deref())
            .or(s.backup.as_deref())
            .unwrap_or("-");
        t.add_row(vec![
            name.clone(),
            service_status(s.status),
            s.missing_count.to_string(),
            s.updated_count.to_string(),
            yes_no(s.changed),
            detail.to_string(),
        ]);
    }
    println!("{t}");
}

/// Print the status overview.
pub fn print_telemetry(telemetry: &SecretsTelemetry, fingerprint: &str) {
    println!("{}", style("Vault").bold());
    println!("  secrets:          {}", telemetry.total_secrets);
    println!("  missing required: {}", telemetry.missing_required);
    println!("  pending sync:     {}", telemetry.queue_length);
    println!("  key fingerprint:  {fingerprint}");

    println!("{}", style("Last action").bold());
    match (telemetry.last_action, telemetry.last_timestamp) {
        (Some(action), Some(at)) => {
            let status = telemetry.last_status.map_or("-", |s| s.as_str());
            println!("  {} at {} ({status})", action.as_str(), at.format(TIME_FORMAT));
        }
        _ => {
            println!("  never synced");
            return;
        }
    }

    if !telemetry.services.is_empty() {
        let mut t = table(vec!["Service", "Status", "Missing", "Changed"]);
        for (name, s) in &telemetry.services {
            t.add_row(vec![
                name.clone(),
                service_status(s.status),
                s.missing_count.to_string(),
                yes_no(s.changed),
            ]);
        }
        println!("{t}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reasons_have_short_labels() {
        let integration = RequirementReason::Integration {
            group: "firebase".into(),
            description: "web key".into(),
        };
        assert_eq!(describe_reason(&integration), "integration:firebase");
        assert_eq!(describe_reason(&RequirementReason::Scan { count: 3 }), "scan x3");
        assert_eq!(describe_reason(&RequirementReason::Flag), "flagged");
    }
}
