//! Cryptographic primitives for secretsync.
//!
//! This module provides:
//! - AES-256-GCM encryption and decryption into a base64 triple (`encryption`)
//! - Master key resolution, fingerprinting and generation (`keys`)

pub mod encryption;
pub mod keys;

pub use encryption::{decrypt, encrypt};
pub use keys::{generate_master_key, MasterKey};
