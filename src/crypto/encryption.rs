//! AES-256-GCM authenticated encryption.
//!
//! Each call to `encrypt` generates a fresh random 12-byte nonce.  The
//! result is stored as three independently base64-encoded parts joined
//! by `:`:
//!
//! ```text
//! base64(nonce) : base64(ciphertext) : base64(16-byte auth tag)
//! ```
//!
//! The record key is passed as additional authenticated data, so a
//! sealed value only opens under the key it was written for.

use aes_gcm::aead::{Aead, KeyInit, OsRng, Payload};
use aes_gcm::{AeadCore, Aes256Gcm, Nonce};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;

use crate::errors::{Result, SecretSyncError};

/// Size of the AES-256-GCM nonce in bytes.
pub const NONCE_LEN: usize = 12;

/// Size of the GCM authentication tag in bytes (128 bits).
pub const TAG_LEN: usize = 16;

/// Separator between the three encoded parts.
const DELIMITER: char = ':';

/// Encrypt `plaintext` with a 32-byte `key`, binding it to `aad`.
///
/// Returns the `nonce:ciphertext:tag` triple.
pub fn encrypt(key: &[u8], aad: &[u8], plaintext: &[u8]) -> Result<String> {
    let cipher = Aes256Gcm::new_from_slice(key)
        .map_err(|e| SecretSyncError::EncryptionFailed(format!("invalid key length: {e}")))?;

    let nonce = Aes256Gcm::generate_nonce(&mut OsRng);

    // aes-gcm appends the tag to the ciphertext; split it back out.
    let mut sealed = cipher
        .encrypt(
            &nonce,
            Payload {
                msg: plaintext,
                aad,
            },
        )
        .map_err(|e| SecretSyncError::EncryptionFailed(format!("encryption error: {e}")))?;
    let tag = sealed.split_off(sealed.len() - TAG_LEN);

    Ok(format!(
        "{}{DELIMITER}{}{DELIMITER}{}",
        BASE64.encode(nonce),
        BASE64.encode(&sealed),
        BASE64.encode(tag)
    ))
}

/// Decrypt a triple produced by `encrypt`.
pub fn decrypt(key: &[u8], aad: &[u8], triple: &str) -> Result<Vec<u8>> {
    let mut parts = triple.split(DELIMITER);
    let (Some(nonce_b64), Some(ct_b64), Some(tag_b64), None) =
        (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        return Err(SecretSyncError::Decrypt(
            "expected nonce:ciphertext:tag".into(),
        ));
    };

    let nonce_bytes = decode_part(nonce_b64, "nonce")?;
    let mut ciphertext = decode_part(ct_b64, "ciphertext")?;
    let tag = decode_part(tag_b64, "tag")?;

    if nonce_bytes.len() != NONCE_LEN {
        return Err(SecretSyncError::Decrypt(format!(
            "nonce must be {NONCE_LEN} bytes, got {}",
            nonce_bytes.len()
        )));
    }
    if tag.len() != TAG_LEN {
        return Err(SecretSyncError::Decrypt(format!(
            "tag must be {TAG_LEN} bytes, got {}",
            tag.len()
        )));
    }

    let cipher = Aes256Gcm::new_from_slice(key)
        .map_err(|_| SecretSyncError::Decrypt("invalid key length".into()))?;

    ciphertext.extend_from_slice(&tag);
    cipher
        .decrypt(
            Nonce::from_slice(&nonce_bytes),
            Payload {
                msg: &ciphertext,
                aad,
            },
        )
        .map_err(|_| SecretSyncError::Decrypt("authentication tag mismatch".into()))
}

fn decode_part(part: &str, what: &str) -> Result<Vec<u8>> {
    BASE64
        .decode(part)
        .map_err(|e| SecretSyncError::Decrypt(format!("{what} is not valid base64: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    const KEY: [u8; 32] = [0x42; 32];

    #[test]
    fn triple_has_three_parts_with_expected_sizes() {
        let sealed = encrypt(&KEY, b"API_KEY", b"hello").unwrap();
        let parts: Vec<&str> = sealed.split(':').collect();
        assert_eq!(parts.len(), 3);
        assert_eq!(BASE64.decode(parts[0]).unwrap().len(), NONCE_LEN);
        assert_eq!(BASE64.decode(parts[1]).unwrap().len(), 5);
        assert_eq!(BASE64.decode(parts[2]).unwrap().len(), TAG_LEN);
    }

    #[test]
    fn decrypt_roundtrip() {
        let sealed = encrypt(&KEY, b"API_KEY", b"sk-live-123").unwrap();
        assert_eq!(decrypt(&KEY, b"API_KEY", &sealed).unwrap(), b"sk-live-123");
    }

    #[test]
    fn nonces_are_never_reused() {
        let a = encrypt(&KEY, b"K", b"same").unwrap();
        let b = encrypt(&KEY, b"K", b"same").unwrap();
        assert_ne!(a.split(':').next(), b.split(':').next());
    }

    #[test]
    fn wrong_aad_is_rejected() {
        let sealed = encrypt(&KEY, b"FIRST_KEY", b"value").unwrap();
        assert!(decrypt(&KEY, b"OTHER_KEY", &sealed).is_err());
    }

    #[test]
    fn tampered_tag_is_rejected() {
        let sealed = encrypt(&KEY, b"K", b"value").unwrap();
        let mut parts: Vec<String> = sealed.split(':').map(String::from).collect();
        parts[2] = BASE64.encode([0u8; TAG_LEN]);
        assert!(decrypt(&KEY, b"K", &parts.join(":")).is_err());
    }

    #[test]
    fn malformed_triple_is_rejected() {
        assert!(decrypt(&KEY, b"K", "only-one-part").is_err());
        assert!(decrypt(&KEY, b"K", "a:b:c:d").is_err());
        assert!(decrypt(&KEY, b"K", "!!:??:##").is_err());
    }
}
