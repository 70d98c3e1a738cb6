use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::errors::{Result, SecretSyncError};
use crate::resolver::schema::{IntegrationGroup, IntegrationSchema};

/// Project-level configuration, loaded from `.secretsync.toml`.
///
/// Every field has a sensible default so secretsync works out-of-the-box
/// without any config file at all.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Vault persistence file (relative to project root).
    #[serde(default = "default_vault_file")]
    pub vault_file: String,

    /// Directory holding sync state, the pending queue and the audit db.
    #[serde(default = "default_state_dir")]
    pub state_dir: String,

    /// Environment variable the master key is read from.
    #[serde(default = "default_master_key_env")]
    pub master_key_env: String,

    /// Name recorded in `created_by` / `updated_by`.
    #[serde(default = "default_actor")]
    pub actor: String,

    /// Repository scanner limits.
    #[serde(default)]
    pub scan: ScanSettings,

    /// Env file backup retention.
    #[serde(default)]
    pub backups: BackupSettings,

    /// Target services, in display order.
    #[serde(default = "default_services")]
    pub services: Vec<ServiceConfig>,

    /// Integration group whose keys never get a `flag` reason.
    #[serde(default = "default_internal_group")]
    pub internal_group: String,

    /// Replaces the built-in integration schema when present.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub integrations: Option<Vec<IntegrationGroup>>,
}

/// One deployable service that receives an env file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// App name used in requirements (e.g. "backend").
    pub name: String,
    /// Source root of the service, relative to the project.
    pub root: String,
    /// Env file the service reads, relative to the project.
    pub env_file: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanSettings {
    #[serde(default = "default_max_depth")]
    pub max_depth: usize,

    #[serde(default = "default_max_file_bytes")]
    pub max_file_bytes: u64,

    /// Roots scanned in addition to every service root.
    #[serde(default = "default_extra_roots")]
    pub extra_roots: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackupSettings {
    /// Backups kept per env file; 0 keeps everything.
    #[serde(default = "default_backup_keep")]
    pub keep: usize,
}

// ── Serde default helpers ────────────────────────────────────────────

fn default_vault_file() -> String {
    ".secretsync/vault.json".to_string()
}

fn default_state_dir() -> String {
    ".secretsync".to_string()
}

fn default_master_key_env() -> String {
    "SECRETSYNC_MASTER_KEY".to_string()
}

fn default_actor() -> String {
    "admin".to_string()
}

fn default_max_depth() -> usize {
    6
}

fn default_max_file_bytes() -> u64 {
    2 * 1024 * 1024 // 2 MiB
}

fn default_extra_roots() -> Vec<String> {
    vec!["config".to_string()]
}

fn default_backup_keep() -> usize {
    10
}

fn default_internal_group() -> String {
    "internal".to_string()
}

fn default_services() -> Vec<ServiceConfig> {
    [
        ("frontend", "frontend/.env.local"),
        ("backend", "backend/.env"),
        ("ai-service", "ai-service/.env"),
    ]
    .into_iter()
    .map(|(name, env_file)| ServiceConfig {
        name: name.to_string(),
        root: name.to_string(),
        env_file: env_file.to_string(),
    })
    .collect()
}

// ── Implementation ───────────────────────────────────────────────────

impl Default for ScanSettings {
    fn default() -> Self {
        Self {
            max_depth: default_max_depth(),
            max_file_bytes: default_max_file_bytes(),
            extra_roots: default_extra_roots(),
        }
    }
}

impl Default for BackupSettings {
    fn default() -> Self {
        Self {
            keep: default_backup_keep(),
        }
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            vault_file: default_vault_file(),
            state_dir: default_state_dir(),
            master_key_env: default_master_key_env(),
            actor: default_actor(),
            scan: ScanSettings::default(),
            backups: BackupSettings::default(),
            services: default_services(),
            internal_group: default_internal_group(),
            integrations: None,
        }
    }
}

impl Settings {
    /// Name of the config file we look for in the project root.
    pub const FILE_NAME: &'static str = ".secretsync.toml";

    /// Load settings from `<project_dir>/.secretsync.toml`.
    ///
    /// If the file does not exist, sensible defaults are returned.
    /// If the file exists but cannot be parsed, an error is returned.
    pub fn load(project_dir: &Path) -> Result<Self> {
        let config_path = project_dir.join(Self::FILE_NAME);

        if !config_path.exists() {
            return Ok(Self::default());
        }

        let contents = std::fs::read_to_string(&config_path)?;

        let settings: Settings = toml::from_str(&contents).map_err(|e| {
            SecretSyncError::Config(format!("Failed to parse {}: {e}", config_path.display()))
        })?;

        settings.validate()?;
        Ok(settings)
    }

    /// Reject configurations the engine cannot operate on.
    pub fn validate(&self) -> Result<()> {
        if self.services.is_empty() {
            return Err(SecretSyncError::Config(
                "at least one service must be configured".into(),
            ));
        }

        let mut seen = BTreeSet::new();
        for service in &self.services {
            if service.name.trim().is_empty() || service.env_file.trim().is_empty() {
                return Err(SecretSyncError::Config(
                    "service name and env_file cannot be empty".into(),
                ));
            }
            if !seen.insert(service.name.as_str()) {
                return Err(SecretSyncError::Config(format!(
                    "service '{}' is configured twice",
                    service.name
                )));
            }
        }

        if self.scan.max_depth == 0 {
            return Err(SecretSyncError::Config(
                "scan.max_depth must be at least 1".into(),
            ));
        }

        Ok(())
    }

    /// Full path of the vault persistence file.
    pub fn vault_path(&self, project_dir: &Path) -> PathBuf {
        project_dir.join(&self.vault_file)
    }

    /// Full path of the state directory.
    pub fn state_dir_path(&self, project_dir: &Path) -> PathBuf {
        project_dir.join(&self.state_dir)
    }

    /// Where the last `SyncState` snapshot lives.
    pub fn sync_state_path(&self, project_dir: &Path) -> PathBuf {
        self.state_dir_path(project_dir).join("sync-state.json")
    }

    /// Where the pending-sync queue lives.
    pub fn queue_path(&self, project_dir: &Path) -> PathBuf {
        self.state_dir_path(project_dir).join("sync-queue.json")
    }

    /// App names in display order.
    pub fn app_names(&self) -> Vec<String> {
        self.services.iter().map(|s| s.name.clone()).collect()
    }

    /// Look up a configured service by name.
    pub fn service(&self, name: &str) -> Option<&ServiceConfig> {
        self.services.iter().find(|s| s.name == name)
    }

    /// The integration schema in effect: config override or built-in.
    pub fn integration_schema(&self) -> IntegrationSchema {
        match &self.integrations {
            Some(groups) => IntegrationSchema::new(groups.clone()),
            None => IntegrationSchema::builtin(),
        }
    }
}

// ── Tests ────────────────────────────────────────────────────────────
