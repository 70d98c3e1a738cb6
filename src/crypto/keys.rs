//! Master key resolution.
//!
//! The vault is keyed by one 32-byte master key taken from an external
//! secret (normally an environment variable).  The secret may be given
//! either as exactly 32 raw UTF-8 bytes or as base64 that decodes to
//! exactly 32 bytes.  Anything else is a `Config` error: there is no
//! fallback key and no degraded mode.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use rand::RngCore;
use sha2::{Digest, Sha256};
use zeroize::{Zeroize, Zeroizing};

use crate::errors::{Result, SecretSyncError};

/// Length of the master key (256 bits).
pub const KEY_LEN: usize = 32;

/// A wrapper around the 32-byte master key that automatically zeroes
/// its memory when dropped.
#[derive(Zeroize)]
#[zeroize(drop)]
pub struct MasterKey {
    bytes: [u8; KEY_LEN],
}

impl MasterKey {
    /// Create a new `MasterKey` from raw bytes.
    pub fn new(bytes: [u8; KEY_LEN]) -> Self {
        Self { bytes }
    }

    /// Resolve a master key from its external representation.
    ///
    /// Raw UTF-8 is tried first, byte for byte as given.  Surrounding
    /// whitespace is only ignored for the base64 form.
    pub fn resolve(secret: &str) -> Result<Self> {
        if secret.trim().is_empty() {
            return Err(SecretSyncError::Config("master key is empty".into()));
        }

        if secret.len() == KEY_LEN {
            let mut bytes = [0u8; KEY_LEN];
            bytes.copy_from_slice(secret.as_bytes());
            return Ok(Self::new(bytes));
        }

        if let Ok(decoded) = BASE64.decode(secret.trim()) {
            let decoded = Zeroizing::new(decoded);
            if decoded.len() == KEY_LEN {
                let mut bytes = [0u8; KEY_LEN];
                bytes.copy_from_slice(&decoded);
                return Ok(Self::new(bytes));
            }
        }

        Err(SecretSyncError::Config(format!(
            "master key must be {KEY_LEN} raw bytes or base64 of {KEY_LEN} bytes"
        )))
    }

    /// Resolve the master key from the environment variable `var`.
    pub fn from_env(var: &str) -> Result<Self> {
        let value = std::env::var(var).map_err(|_| {
            SecretSyncError::Config(format!("master key variable {var} is not set"))
        })?;
        let value = Zeroizing::new(value);
        Self::resolve(&value)
    }

    /// Access the raw key bytes (e.g. to pass to the cipher).
    pub fn as_bytes(&self) -> &[u8; KEY_LEN] {
        &self.bytes
    }

    /// Short, non-reversible identifier of this key for logs.
    ///
    /// Hex of the first 8 bytes of SHA-256 over the key.
    pub fn fingerprint(&self) -> String {
        let digest = Sha256::digest(self.bytes);
        digest[..8].iter().map(|b| format!("{b:02x}")).collect()
    }
}

impl std::fmt::Debug for MasterKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MasterKey")
            .field("fingerprint", &self.fingerprint())
            .finish()
    }
}

/// Generate a fresh random master key, returned base64-encoded.
pub fn generate_master_key() -> Zeroizing<String> {
    let mut bytes = Zeroizing::new([0u8; KEY_LEN]);
    rand::rng().fill_bytes(&mut bytes[..]);
    Zeroizing::new(BASE64.encode(&bytes[..]))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_raw_utf8_key() {
        let key = MasterKey::resolve("0123456789abcdef0123456789abcdef").unwrap();
        assert_eq!(&key.as_bytes()[..4], b"0123");
    }

    #[test]
    fn resolves_base64_key() {
        let encoded = BASE64.encode([7u8; KEY_LEN]);
        let key = MasterKey::resolve(&encoded).unwrap();
        assert_eq!(key.as_bytes(), &[7u8; KEY_LEN]);
    }

    #[test]
    fn raw_key_whitespace_is_key_material() {
        let padded = format!(" {} ", "k".repeat(30));
        let key = MasterKey::resolve(&padded).unwrap();
        assert_eq!(key.as_bytes(), padded.as_bytes());
        assert_ne!(
            key.fingerprint(),
            MasterKey::resolve(&"k".repeat(32)).unwrap().fingerprint()
        );
    }

    #[test]
    fn base64_key_tolerates_surrounding_whitespace() {
        let encoded = format!("{}\n", BASE64.encode([7u8; KEY_LEN]));
        let key = MasterKey::resolve(&encoded).unwrap();
        assert_eq!(key.as_bytes(), &[7u8; KEY_LEN]);
    }

    #[test]
    fn rejects_short_and_long_keys() {
        assert!(MasterKey::resolve("").is_err());
        assert!(MasterKey::resolve("too-short").is_err());
        assert!(MasterKey::resolve(&BASE64.encode([1u8; 16])).is_err());
        assert!(MasterKey::resolve(&"x".repeat(33)).is_err());
    }

    #[test]
    fn resolve_failure_is_config_error() {
        let err = MasterKey::resolve("nope").unwrap_err();
        assert!(matches!(err, SecretSyncError::Config(_)));
    }

    #[test]
    fn generated_keys_resolve_and_differ() {
        let a = generate_master_key();
        let b = generate_master_key();
        assert_ne!(*a, *b);
        assert!(MasterKey::resolve(&a).is_ok());
    }

    #[test]
    fn fingerprint_is_stable_and_hides_key() {
        let key = MasterKey::new([9u8; KEY_LEN]);
        assert_eq!(key.fingerprint(), MasterKey::new([9u8; KEY_LEN]).fingerprint());
        assert_eq!(key.fingerprint().len(), 16);
        assert!(!format!("{key:?}").contains("9, 9"));
    }
}
