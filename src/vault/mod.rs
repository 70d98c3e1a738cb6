//! Vault module: encrypted secret storage.
//!
//! This module provides:
//! - `SecretRecord` and the redacted/revealed views of it (`record`)
//! - Key, value and paging validation (`validation`)
//! - The JSON-array vault file (`format`)
//! - High-level `VaultStore` for creating, revealing and exporting secrets (`store`)

pub mod format;
pub mod record;
pub mod store;
pub mod validation;

// Re-export the most commonly used items.
pub use record::{
    ExportedSecret, NewSecret, RevealedSecret, SecretPage, SecretPatch, SecretRecord,
    SecretSource, SecretSummary, Visibility,
};
pub use store::VaultStore;
pub use validation::{is_valid_key, validate_key};
