//! Repository scanner: discovers which configuration keys the source
//! tree references.
//!
//! The scanner never touches the vault.  It walks every service root
//! plus the configured extra roots (bounded depth, ignore-list of build
//! and dependency directories), reads text files under a size ceiling,
//! and records every key matched by `patterns`.  Unreadable files and
//! missing roots are skipped: a failed scan yields a smaller index, not
//! an error.

pub mod patterns;

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{debug, warn};
use walkdir::{DirEntry, WalkDir};

use crate::config::Settings;
use crate::errors::Result;
use crate::vault::validation::validate_key;

pub use patterns::PatternKind;

/// Module name for files outside every service root.
pub const CONFIG_MODULE: &str = "config";

/// Directories never descended into.
const IGNORED_DIRS: &[&str] = &[
    "node_modules",
    ".git",
    "dist",
    "build",
    "out",
    ".next",
    ".turbo",
    "coverage",
    "target",
    "__pycache__",
    ".venv",
    "venv",
    ".secretsync",
];

/// Extensions scanned below the top level of a root.
const TEXT_EXTENSIONS: &[&str] = &[
    "js", "jsx", "mjs", "cjs", "ts", "tsx", "vue", "svelte", "py", "rs", "go", "rb", "sh", "json",
    "yml", "yaml", "toml", "ini", "cfg", "conf", "env", "example", "md", "html",
];

/// Longest context snippet returned by `find_key_usages`.
const CONTEXT_CHARS: usize = 120;

/// One place a key was referenced.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceLocation {
    pub path: String,
    pub line: usize,
    pub kind: PatternKind,
}

/// Everything known about one key after a scan.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageIndexEntry {
    pub key: String,
    pub found_in: BTreeSet<String>,
    pub modules: BTreeSet<String>,
    pub locations: Vec<SourceLocation>,
}

/// key -> usage, rebuilt from scratch on every scan.
#[derive(Debug, Clone, Default, Serialize)]
pub struct UsageIndex {
    pub entries: BTreeMap<String, UsageIndexEntry>,
}

impl UsageIndex {
    pub fn get(&self, key: &str) -> Option<&UsageIndexEntry> {
        self.entries.get(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &UsageIndexEntry> {
        self.entries.values()
    }

    fn record(&mut self, key: String, module: &str, path: &str, line: usize, kind: PatternKind) {
        let entry = self
            .entries
            .entry(key.clone())
            .or_insert_with(|| UsageIndexEntry {
                key,
                ..UsageIndexEntry::default()
            });
        entry.found_in.insert(path.to_string());
        entry.modules.insert(module.to_string());
        entry.locations.push(SourceLocation {
            path: path.to_string(),
            line,
            kind,
        });
    }
}

/// One hit of `find_key_usages`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct KeyOccurrence {
    pub file: String,
    pub line: usize,
    pub context: String,
}

/// Result of a targeted search for one key, grouped by module.
#[derive(Debug, Clone, Serialize)]
pub struct KeyUsages {
    pub key: String,
    pub total: usize,
    pub modules: BTreeMap<String, Vec<KeyOccurrence>>,
}

/// A scannable file: absolute path plus project-relative `/` path.
struct ScanFile {
    abs: PathBuf,
    rel: String,
}

/// Source-tree scanner bound to one project directory.
pub struct Scanner {
    project_dir: PathBuf,
    /// (root prefix, module name), service roots first.
    module_roots: Vec<(String, String)>,
    roots: Vec<String>,
    max_depth: usize,
    max_file_bytes: u64,
}

impl Scanner {
    /// Build a scanner from project settings.
    pub fn new(project_dir: &Path, settings: &Settings) -> Self {
        let module_roots: Vec<(String, String)> = settings
            .services
            .iter()
            .map(|s| (normalize_rel(&s.root), s.name.clone()))
            .collect();

        let mut roots: Vec<String> = module_roots.iter().map(|(root, _)| root.clone()).collect();
        for extra in &settings.scan.extra_roots {
            let extra = normalize_rel(extra);
            if !roots.contains(&extra) {
                roots.push(extra);
            }
        }

        Self {
            project_dir: project_dir.to_path_buf(),
            module_roots,
            roots,
            max_depth: settings.scan.max_depth,
            max_file_bytes: settings.scan.max_file_bytes,
        }
    }

    /// Module a project-relative path belongs to, by root prefix.
    ///
    /// Anything outside every service root is attributed to `config`.
    pub fn module_for_path(&self, rel: &str) -> String {
        self.module_roots
            .iter()
            .find(|(root, _)| path_under(rel, root))
            .map_or_else(|| CONFIG_MODULE.to_string(), |(_, module)| module.clone())
    }

    /// The root prefix of a service module, if it is one.
    pub fn root_of(&self, module: &str) -> Option<&str> {
        self.module_roots
            .iter()
            .find(|(_, m)| m == module)
            .map(|(root, _)| root.as_str())
    }

    /// Scan every root and build the usage index.
    pub fn usage_index(&self) -> UsageIndex {
        let mut index = UsageIndex::default();

        for file in self.files() {
            let Some(content) = self.read_text(&file) else {
                continue;
            };
            let module = self.module_for_path(&file.rel);
            for (idx, line) in content.lines().enumerate() {
                for (key, kind) in patterns::extract_keys(line) {
                    index.record(key, &module, &file.rel, idx + 1, kind);
                }
            }
        }

        for entry in index.entries.values_mut() {
            entry.locations.sort();
        }

        debug!(keys = index.len(), "usage index built");
        index
    }

    /// Grep every root for one key, grouped by module and sorted by
    /// (file, line).
    pub fn find_key_usages(&self, key: &str) -> Result<KeyUsages> {
        validate_key(key)?;
        let matcher = patterns::whole_key_regex(key);

        let mut modules: BTreeMap<String, Vec<KeyOccurrence>> = BTreeMap::new();
        for file in self.files() {
            let Some(content) = self.read_text(&file) else {
                continue;
            };
            for (idx, line) in content.lines().enumerate() {
                if matcher.is_match(line) {
                    modules
                        .entry(self.module_for_path(&file.rel))
                        .or_default()
                        .push(KeyOccurrence {
                            file: file.rel.clone(),
                            line: idx + 1,
                            context: truncate_context(line),
                        });
                }
            }
        }

        let mut total = 0;
        for hits in modules.values_mut() {
            hits.sort_by(|a, b| a.file.cmp(&b.file).then(a.line.cmp(&b.line)));
            total += hits.len();
        }

        Ok(KeyUsages {
            key: key.to_string(),
            total,
            modules,
        })
    }

    /// Every candidate file under every root, deduplicated and sorted.
    fn files(&self) -> Vec<ScanFile> {
        let mut files: BTreeMap<String, PathBuf> = BTreeMap::new();

        for root in &self.roots {
            let root_path = self.project_dir.join(root);
            if !root_path.is_dir() {
                debug!(root = %root, "scan root missing, skipped");
                continue;
            }

            let walker = WalkDir::new(&root_path)
                .max_depth(self.max_depth)
                .follow_links(false)
                .into_iter()
                .filter_entry(|e| !is_ignored_dir(e));

            for entry in walker {
                let entry = match entry {
                    Ok(entry) => entry,
                    Err(e) => {
                        warn!(error = %e, "scan entry unreadable, skipped");
                        continue;
                    }
                };
                if !entry.file_type().is_file() {
                    continue;
                }
                // Anything at the top of a root; deeper, only text-like files.
                if entry.depth() > 1 && !has_text_extension(entry.path()) {
                    continue;
                }
                if let Ok(rel) = entry.path().strip_prefix(&self.project_dir) {
                    files.insert(rel_string(rel), entry.path().to_path_buf());
                }
            }
        }

        files
            .into_iter()
            .map(|(rel, abs)| ScanFile { abs, rel })
            .collect()
    }

    /// File content, or `None` if too large, unreadable, or not UTF-8.
    fn read_text(&self, file: &ScanFile) -> Option<String> {
        let size = fs::metadata(&file.abs).ok()?.len();
        if size > self.max_file_bytes {
            debug!(path = %file.rel, size, "file over size ceiling, skipped");
            return None;
        }
        match fs::read_to_string(&file.abs) {
            Ok(content) => Some(content),
            Err(e) => {
                debug!(path = %file.rel, error = %e, "file unreadable, skipped");
                None
            }
        }
    }
}

fn is_ignored_dir(entry: &DirEntry) -> bool {
    entry.depth() > 0
        && entry.file_type().is_dir()
        && entry
            .file_name()
            .to_str()
            .is_some_and(|name| IGNORED_DIRS.contains(&name))
}

fn has_text_extension(path: &Path) -> bool {
    if path
        .file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|n| n.starts_with(".env"))
    {
        return true;
    }
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|ext| TEXT_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
}

/// `true` if `rel` is `root` or lies below it.
pub(crate) fn path_under(rel: &str, root: &str) -> bool {
    if root.is_empty() || root == "." {
        return true;
    }
    rel == root
        || rel
            .strip_prefix(root)
            .is_some_and(|rest| rest.starts_with('/'))
}

pub(crate) fn normalize_rel(path: &str) -> String {
    let trimmed = path.trim().trim_start_matches("./").trim_end_matches('/');
    if trimmed.is_empty() {
        ".".to_string()
    } else {
        trimmed.replace('\\', "/")
    }
}

fn rel_string(rel: &Path) -> String {
    rel.components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

fn truncate_context(line: &str) -> String {
    let trimmed = line.trim();
    if trimmed.chars().count() <= CONTEXT_CHARS {
        trimmed.to_string()
    } else {
        let mut out: String = trimmed.chars().take(CONTEXT_CHARS).collect();
        out.push_str("...");
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write(dir: &Path, rel: &str, content: &str) {
        let path = dir.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    fn scanner(dir: &Path) -> Scanner {
        Scanner::new(dir, &Settings::default())
    }

    #[test]
    fn attributes_modules_by_root_prefix() {
        let dir = TempDir::new().unwrap();
        let s = scanner(dir.path());
        assert_eq!(s.module_for_path("backend/src/app.js"), "backend");
        assert_eq!(s.module_for_path("ai-service/main.py"), "ai-service");
        assert_eq!(s.module_for_path("backend-old/app.js"), "config");
        assert_eq!(s.module_for_path("config/ci.yml"), "config");
        assert_eq!(s.root_of("frontend"), Some("frontend"));
    }

    #[test]
    fn indexes_keys_with_paths_modules_and_lines() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "backend/x.js", "// db\nconst a = process.env.FOO_BAR;\n");
        write(
            dir.path(),
            "frontend/src/api.ts",
            "export const k = import.meta.env.FOO_BAR;\n",
        );

        let index = scanner(dir.path()).usage_index();
        let entry = index.get("FOO_BAR").unwrap();
        assert_eq!(
            entry.found_in.iter().collect::<Vec<_>>(),
            vec!["backend/x.js", "frontend/src/api.ts"]
        );
        assert_eq!(
            entry.modules.iter().collect::<Vec<_>>(),
            vec!["backend", "frontend"]
        );
        assert_eq!(entry.locations[0].line, 2);
    }

    #[test]
    fn skips_ignored_dirs_and_binary_extensions() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "backend/node_modules/lib/index.js", "process.env.VENDORED");
        write(dir.path(), "backend/src/logo.png", "process.env.IN_IMAGE");
        write(dir.path(), "backend/Dockerfile", "ENV X=${{ secrets.TOP_LEVEL }}");

        let index = scanner(dir.path()).usage_index();
        assert!(index.get("VENDORED").is_none());
        assert!(index.get("IN_IMAGE").is_none());
        assert!(index.get("TOP_LEVEL").is_some());
    }

    #[test]
    fn respects_depth_and_size_caps() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "backend/a/b/c/d/e/f/g/deep.js", "process.env.TOO_DEEP");
        write(dir.path(), "backend/big.js", &"x".repeat(64));

        let mut settings = Settings::default();
        settings.scan.max_file_bytes = 32;
        let index = Scanner::new(dir.path(), &settings).usage_index();
        assert!(index.is_empty());
    }

    #[test]
    fn missing_roots_yield_empty_index() {
        let dir = TempDir::new().unwrap();
        assert!(scanner(dir.path()).usage_index().is_empty());
    }

    #[test]
    fn find_key_usages_groups_and_sorts() {
        let dir = TempDir::new().unwrap();
        write(
            dir.path(),
            "backend/z.js",
            "const a = process.env.API_KEY;\nconst b = OPENAI_API_KEY;\nlog(API_KEY)\n",
        );
        write(dir.path(), "backend/a.js", "API_KEY\n");
        write(dir.path(), "config/ci.yml", "key: ${{ secrets.API_KEY }}\n");

        let usages = scanner(dir.path()).find_key_usages("API_KEY").unwrap();
        assert_eq!(usages.total, 4);

        let backend = &usages.modules["backend"];
        let order: Vec<(&str, usize)> = backend.iter().map(|o| (o.file.as_str(), o.line)).collect();
        assert_eq!(order, vec![("backend/a.js", 1), ("backend/z.js", 1), ("backend/z.js", 3)]);
        assert_eq!(usages.modules["config"][0].file, "config/ci.yml");
    }

    #[test]
    fn find_key_usages_validates_key() {
        let dir = TempDir::new().unwrap();
        assert!(scanner(dir.path()).find_key_usages("not a key").is_err());
    }

    #[test]
    fn context_is_truncated() {
        let long = format!("API_KEY {}", "y".repeat(300));
        let ctx = truncate_context(&long);
        assert_eq!(ctx.chars().count(), CONTEXT_CHARS + 3);
        assert!(ctx.ends_with("..."));
    }
}
