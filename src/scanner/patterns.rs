//! Patterns that identify configuration keys referenced in source.
//!
//! Each entry is (family, regex).  Capture group 1 is the key.

use std::sync::OnceLock;

use regex::Regex;
use serde::Serialize;

use crate::vault::validation::is_valid_key;

/// How a key was referenced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PatternKind {
    /// `process.env.KEY`, `os.getenv("KEY")`, `env::var("KEY")`
    EnvAccess,
    /// `process.env["KEY"]`, `os.environ["KEY"]`
    BracketAccess,
    /// `import.meta.env.KEY`
    PublicBuildEnv,
    /// `{{ secrets.KEY }}` / `${{ secrets.KEY }}`
    SecretPlaceholder,
}

const KEY_PATTERNS: &[(PatternKind, &str)] = &[
    (PatternKind::EnvAccess, r"process\.env\.([A-Z0-9_]+)\b"),
    (
        PatternKind::EnvAccess,
        r#"os\.environ\.get\(\s*["']([A-Z0-9_.:-]+)["']"#,
    ),
    (
        PatternKind::EnvAccess,
        r#"os\.getenv\(\s*["']([A-Z0-9_.:-]+)["']"#,
    ),
    (
        PatternKind::EnvAccess,
        r#"env::var(?:_os)?\(\s*"([A-Z0-9_.:-]+)""#,
    ),
    (
        PatternKind::BracketAccess,
        r#"process\.env\[\s*["'`]([A-Z0-9_.:-]+)["'`]\s*\]"#,
    ),
    (
        PatternKind::BracketAccess,
        r#"os\.environ\[\s*["']([A-Z0-9_.:-]+)["']\s*\]"#,
    ),
    (
        PatternKind::PublicBuildEnv,
        r"import\.meta\.env\.([A-Z0-9_]+)\b",
    ),
    (
        PatternKind::SecretPlaceholder,
        r"\$?\{\{\s*secrets\.([A-Z0-9_.:-]+)\s*\}\}",
    ),
];

fn compiled() -> &'static [(PatternKind, Regex)] {
    static COMPILED: OnceLock<Vec<(PatternKind, Regex)>> = OnceLock::new();
    COMPILED.get_or_init(|| {
        KEY_PATTERNS
            .iter()
            .map(|(kind, pattern)| (*kind, Regex::new(pattern).expect("static regex is valid")))
            .collect()
    })
}

/// Every valid key referenced on `line`, in order of first appearance.
pub fn extract_keys(line: &str) -> Vec<(String, PatternKind)> {
    let mut found: Vec<(String, PatternKind)> = Vec::new();
    for (kind, regex) in compiled() {
        for caps in regex.captures_iter(line) {
            let Some(key) = caps.get(1).map(|m| m.as_str()) else {
                continue;
            };
            if is_valid_key(key) && !found.iter().any(|(k, _)| k == key) {
                found.push((key.to_string(), *kind));
            }
        }
    }
    found
}

/// Regex matching `key` as a whole identifier.  Keys may contain
/// `. : -`, so the boundaries are spelled out instead of using `\b`.
pub fn whole_key_regex(key: &str) -> Regex {
    let pattern = format!(r"(?:^|[^A-Za-z0-9_]){}(?:$|[^A-Za-z0-9_])", regex::escape(key));
    Regex::new(&pattern).expect("escaped key forms a valid regex")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keys(line: &str) -> Vec<String> {
        extract_keys(line).into_iter().map(|(k, _)| k).collect()
    }

    #[test]
    fn finds_node_env_access() {
        assert_eq!(keys("const u = process.env.DATABASE_URL;"), vec!["DATABASE_URL"]);
        assert_eq!(
            extract_keys("process.env.API_KEY")[0].1,
            PatternKind::EnvAccess
        );
    }

    #[test]
    fn finds_bracket_access() {
        assert_eq!(keys(r#"process.env["STRIPE_KEY"]"#), vec!["STRIPE_KEY"]);
        assert_eq!(keys("process.env['X_TOKEN']"), vec!["X_TOKEN"]);
        assert_eq!(keys(r#"os.environ["OPENAI_API_KEY"]"#), vec!["OPENAI_API_KEY"]);
        assert_eq!(
            extract_keys(r#"process.env["STRIPE_KEY"]"#)[0].1,
            PatternKind::BracketAccess
        );
    }

    #[test]
    fn finds_python_and_rust_access() {
        assert_eq!(keys(r#"os.environ.get("REDIS_URL", "")"#), vec!["REDIS_URL"]);
        assert_eq!(keys("os.getenv('SMTP_HOST')"), vec!["SMTP_HOST"]);
        assert_eq!(keys(r#"std::env::var("RUST_TOKEN")?"#), vec!["RUST_TOKEN"]);
    }

    #[test]
    fn finds_build_time_public_env() {
        let found = extract_keys("const k = import.meta.env.VITE_FIREBASE_API_KEY;");
        assert_eq!(found[0].0, "VITE_FIREBASE_API_KEY");
        assert_eq!(found[0].1, PatternKind::PublicBuildEnv);
    }

    #[test]
    fn finds_templated_placeholders() {
        assert_eq!(keys("token: ${{ secrets.DEPLOY_TOKEN }}"), vec!["DEPLOY_TOKEN"]);
        assert_eq!(keys("url: {{secrets.HOOK_URL}}"), vec!["HOOK_URL"]);
    }

    #[test]
    fn ignores_lowercase_and_short_keys() {
        assert!(keys("process.env.nodeEnv").is_empty());
        assert!(keys("process.env.Mixed_Case").is_empty());
        assert!(keys("process.env.X").is_empty());
    }

    #[test]
    fn dedupes_within_a_line() {
        assert_eq!(
            keys("process.env.A_KEY || process.env['A_KEY']"),
            vec!["A_KEY"]
        );
    }

    #[test]
    fn whole_key_match_respects_boundaries() {
        let re = whole_key_regex("API_KEY");
        assert!(re.is_match("x = API_KEY;"));
        assert!(re.is_match("API_KEY=1"));
        assert!(re.is_match("process.env.API_KEY"));
        assert!(!re.is_match("OPENAI_API_KEY=1"));
        assert!(!re.is_match("API_KEY_2"));
    }
}
