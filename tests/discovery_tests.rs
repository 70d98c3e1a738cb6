//! Integration tests for source scanning and the requirement ledger.

use std::fs;
use std::path::Path;

use secretsync::config::Settings;
use secretsync::crypto::MasterKey;
use secretsync::resolver::{IntegrationGroup, IntegrationSecret, RequirementReason, SecretStatus};
use secretsync::scanner::Scanner;
use secretsync::vault::NewSecret;
use secretsync::{ErrorKind, SecretsEngine};
use tempfile::TempDir;

fn write(dir: &Path, rel: &str, content: &str) {
    let path = dir.join(rel);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, content).unwrap();
}

/// Settings with one integration: `SHARED_TOKEN` for frontend and backend.
fn settings() -> Settings {
    Settings {
        integrations: Some(vec![IntegrationGroup {
            name: "partner".to_string(),
            description: "Partner API".to_string(),
            secrets: vec![IntegrationSecret {
                key: "SHARED_TOKEN".to_string(),
                apps: vec!["frontend".to_string(), "backend".to_string()],
                description: "Partner token".to_string(),
            }],
        }]),
        ..Settings::default()
    }
}

fn engine(dir: &Path) -> SecretsEngine {
    SecretsEngine::open(dir, settings(), MasterKey::new([1u8; 32])).expect("open engine")
}

// ---------------------------------------------------------------------------
// Scanner
// ---------------------------------------------------------------------------

#[test]
fn usage_index_attributes_files_to_modules() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "backend/x.js", "const v = process.env.FOO_BAR;\n");
    write(dir.path(), "config/ci.yml", "token: ${{ secrets.CI_TOKEN }}\n");

    let index = Scanner::new(dir.path(), &Settings::default()).usage_index();

    let foo = index.get("FOO_BAR").unwrap();
    assert_eq!(foo.found_in.iter().collect::<Vec<_>>(), vec!["backend/x.js"]);
    assert_eq!(foo.modules.iter().collect::<Vec<_>>(), vec!["backend"]);
    assert_eq!(foo.locations[0].line, 1);

    let ci = index.get("CI_TOKEN").unwrap();
    assert_eq!(ci.modules.iter().collect::<Vec<_>>(), vec!["config"]);
}

#[test]
fn ignored_directories_and_limits_are_respected() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "backend/node_modules/lib/index.js", "process.env.DEP_KEY\n");
    write(dir.path(), "backend/a/b/c/deep.js", "process.env.DEEP_KEY\n");
    write(dir.path(), "backend/a/near.js", "process.env.NEAR_KEY\n");
    write(
        dir.path(),
        "backend/big.js",
        &format!("process.env.BIG_KEY\n{}", "x".repeat(4096)),
    );

    let mut settings = Settings::default();
    settings.scan.max_depth = 2;
    settings.scan.max_file_bytes = 1024;
    let index = Scanner::new(dir.path(), &settings).usage_index();

    assert!(index.get("NEAR_KEY").is_some());
    assert!(index.get("DEP_KEY").is_none());
    assert!(index.get("DEEP_KEY").is_none());
    assert!(index.get("BIG_KEY").is_none());
}

#[test]
fn key_usages_match_whole_keys_only() {
    let dir = TempDir::new().unwrap();
    write(
        dir.path(),
        "backend/app.py",
        "import os\nkey = os.getenv('API_KEY')\nother = os.getenv('API_KEY_2')\n",
    );
    write(dir.path(), "frontend/.env.example", "API_KEY=\n");

    let engine = engine(dir.path());
    let usages = engine.find_key_usages("API_KEY").unwrap();

    assert_eq!(usages.total, 2);
    assert_eq!(usages.modules["backend"][0].line, 2);
    assert_eq!(usages.modules["frontend"][0].file, "frontend/.env.example");

    let err = engine.find_key_usages("not a key").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
}

// ---------------------------------------------------------------------------
// Requirement ledger
// ---------------------------------------------------------------------------

#[test]
fn ledger_merges_integrations_and_scans() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "backend/db.js", "process.env.DATABASE_URL\nprocess.env.DATABASE_URL\n");
    write(dir.path(), "config/deploy.yml", "${{ secrets.DEPLOY_ONLY }}\n");

    let ledger = engine(dir.path()).required_secrets().unwrap();
    let rows: Vec<(&str, &str)> = ledger
        .items
        .iter()
        .map(|i| (i.app.as_str(), i.key.as_str()))
        .collect();
    assert_eq!(
        rows,
        vec![
            ("frontend", "SHARED_TOKEN"),
            ("backend", "DATABASE_URL"),
            ("backend", "SHARED_TOKEN"),
        ]
    );

    let db = ledger.for_app("backend").find(|i| i.key == "DATABASE_URL").unwrap();
    assert_eq!(db.reasons, vec![RequirementReason::Scan { count: 2 }]);
    assert_eq!(db.found_in, vec!["backend/db.js"]);
    assert_eq!(db.status, SecretStatus::Missing);
    assert!(!db.has_secret);
    assert_eq!(ledger.missing_count(), 3);
}

#[test]
fn dotted_service_roots_still_match_scanned_paths() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "backend/x.js", "const v = process.env.FOO_BAR;\n");

    let mut settings = settings();
    for service in &mut settings.services {
        service.root = format!("./{}/", service.name);
    }
    let engine = SecretsEngine::open(dir.path(), settings, MasterKey::new([1u8; 32])).unwrap();

    let ledger = engine.required_secrets().unwrap();
    let item = ledger.for_app("backend").find(|i| i.key == "FOO_BAR").unwrap();
    assert_eq!(item.found_in, vec!["backend/x.js"]);
    assert_eq!(item.reasons, vec![RequirementReason::Scan { count: 1 }]);
}

#[test]
fn presence_is_global_across_apps() {
    let dir = TempDir::new().unwrap();
    let engine = engine(dir.path());
    engine
        .create(NewSecret::new("SHARED_TOKEN").value("t"))
        .unwrap();

    let ledger = engine.required_secrets().unwrap();
    for app in ["frontend", "backend"] {
        let item = ledger.for_app(app).find(|i| i.key == "SHARED_TOKEN").unwrap();
        assert_eq!(item.status, SecretStatus::Present, "{app}");
        assert!(item.pending_sync);
    }
    assert_eq!(ledger.missing_count(), 0);
}

#[test]
fn empty_placeholder_is_still_missing() {
    let dir = TempDir::new().unwrap();
    let engine = engine(dir.path());
    engine.create(NewSecret::new("SHARED_TOKEN")).unwrap();

    let ledger = engine.required_secrets().unwrap();
    assert!(ledger.items.iter().all(|i| i.has_secret && i.is_missing()));
}

#[test]
fn required_flag_adds_a_reason_for_scanned_keys() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "backend/mail.js", "process.env.SMTP_PASSWORD\n");

    let engine = engine(dir.path());
    engine
        .create(NewSecret::new("SMTP_PASSWORD").value("p").required(true))
        .unwrap();

    let ledger = engine.required_secrets().unwrap();
    let item = ledger.for_app("backend").find(|i| i.key == "SMTP_PASSWORD").unwrap();
    assert_eq!(
        item.reasons,
        vec![RequirementReason::Scan { count: 1 }, RequirementReason::Flag]
    );
    assert!(item.required);
}

#[test]
fn unrequired_vault_keys_are_not_in_the_ledger() {
    let dir = TempDir::new().unwrap();
    let engine = engine(dir.path());
    engine.create(NewSecret::new("LONELY_KEY").value("v")).unwrap();

    let ledger = engine.required_secrets().unwrap();
    assert!(ledger.items.iter().all(|i| i.key != "LONELY_KEY"));
    assert_eq!(ledger.pending.len(), 1);
}
