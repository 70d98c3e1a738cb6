//! Line-preserving `.env` merges.
//!
//! Only `KEY=value` lines for targeted keys are rewritten.  Comments,
//! blank lines, ordering and unmanaged keys pass through untouched.

use std::collections::{BTreeMap, HashSet};

/// The key of a `KEY=value` line, or `None` for comments, blanks and
/// anything without `=`.  An `export ` prefix is accepted.
pub fn line_key(line: &str) -> Option<&str> {
    let trimmed = line.trim_start();
    if trimmed.is_empty() || trimmed.starts_with('#') {
        return None;
    }

    let trimmed = trimmed.strip_prefix("export ").unwrap_or(trimmed);
    let (key, _) = trimmed.split_once('=')?;
    let key = key.trim();

    if key.is_empty() || key.contains(char::is_whitespace) {
        return None;
    }
    Some(key)
}

/// Render a value for the right-hand side of `KEY=`.
///
/// Values with whitespace, `#`, quotes, `$`, `\` or newlines are
/// double-quoted with `\\`, `\"` and `\n` escapes.  Empty values stay bare.
pub fn format_value(value: &str) -> String {
    let needs_quotes = value
        .chars()
        .any(|c| c.is_whitespace() || matches!(c, '#' | '"' | '\'' | '$' | '\\'));

    if !needs_quotes {
        return value.to_string();
    }

    let escaped = value
        .replace('\\', "\\\\")
        .replace('"', "\\\"")
        .replace('\n', "\\n")
        .replace('\r', "\\r");
    format!("\"{escaped}\"")
}

pub fn format_line(key: &str, value: &str) -> String {
    format!("{key}={}", format_value(value))
}

/// Result of merging entries into an env file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Merged {
    pub content: String,
    /// Lines rewritten with different text, plus lines appended.
    pub updated: usize,
}

/// Merge `entries` into `existing`.
///
/// Every line for a targeted key is replaced; targeted keys with no line
/// are appended once, in key order.  Trailing blank lines are trimmed and
/// the result ends with a single newline (or is empty).
pub fn merge_entries<V: AsRef<str>>(
    existing: Option<&str>,
    entries: &BTreeMap<String, V>,
) -> Merged {
    let mut lines: Vec<String> = Vec::new();
    let mut seen: HashSet<&str> = HashSet::new();
    let mut updated = 0;

    for line in existing.unwrap_or_default().lines() {
        let target = line_key(line).and_then(|k| entries.get_key_value(k));
        let Some((key, value)) = target else {
            lines.push(line.to_string());
            continue;
        };

        let export = line.trim_start().starts_with("export ");
        let mut next = format_line(key, value.as_ref());
        if export {
            next.insert_str(0, "export ");
        }
        if next != line {
            updated += 1;
        }
        seen.insert(key.as_str());
        lines.push(next);
    }

    for (key, value) in entries {
        if !seen.contains(key.as_str()) {
            lines.push(format_line(key, value.as_ref()));
            updated += 1;
        }
    }

    Merged {
        content: join_lines(lines),
        updated,
    }
}

/// Merge a backup forward over the current file.
///
/// The backup is restored as-is; keys defined in `current` but absent
/// from the backup keep their current lines, appended after it.
/// Returns the content and the number of keys carried forward.
pub fn restore_from_backup(backup: &str, current: Option<&str>) -> (String, usize) {
    let backed_up: HashSet<&str> = backup.lines().filter_map(line_key).collect();

    let mut carried: Vec<String> = Vec::new();
    let mut carried_keys: HashSet<&str> = HashSet::new();
    for line in current.unwrap_or_default().lines() {
        if let Some(key) = line_key(line) {
            if !backed_up.contains(key) {
                carried.push(line.to_string());
                carried_keys.insert(key);
            }
        }
    }

    if carried.is_empty() {
        return (backup.to_string(), 0);
    }

    let mut lines: Vec<String> = backup.lines().map(str::to_string).collect();
    lines.extend(carried);
    (join_lines(lines), carried_keys.len())
}

/// Keys defined in `content`, in file order, without duplicates.
pub fn keys_in(content: &str) -> Vec<&str> {
    let mut seen = HashSet::new();
    content
        .lines()
        .filter_map(line_key)
        .filter(|k| seen.insert(*k))
        .collect()
}

fn join_lines(mut lines: Vec<String>) -> String {
    while lines.last().is_some_and(|l| l.trim().is_empty()) {
        lines.pop();
    }
    if lines.is_empty() {
        return String::new();
    }
    let mut out = lines.join("\n");
    out.push('\n');
    out
}
