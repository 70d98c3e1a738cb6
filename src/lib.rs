pub mod audit;
pub mod cli;
pub mod config;
pub mod crypto;
pub mod engine;
pub mod errors;
pub mod fsutil;
pub mod resolver;
pub mod scanner;
pub mod sync;
pub mod vault;

pub use engine::{BootstrapReport, SecretsEngine};
pub use errors::{ErrorKind, Result, SecretSyncError};
