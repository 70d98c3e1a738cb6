//! Project configuration (`.secretsync.toml`).

pub mod settings;

pub use settings::{BackupSettings, ScanSettings, ServiceConfig, Settings};
