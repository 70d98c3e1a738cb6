//! Integration tests for master key resolution and value sealing.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use secretsync::crypto::{decrypt, encrypt, generate_master_key, MasterKey};
use secretsync::ErrorKind;

// ---------------------------------------------------------------------------
// Master key
// ---------------------------------------------------------------------------

#[test]
fn raw_and_base64_forms_resolve_to_the_same_key() {
    let raw = "k".repeat(32);
    let encoded = BASE64.encode(raw.as_bytes());

    let a = MasterKey::resolve(&raw).unwrap();
    let b = MasterKey::resolve(&encoded).unwrap();
    assert_eq!(a.as_bytes(), b.as_bytes());
    assert_eq!(a.fingerprint(), b.fingerprint());
}

#[test]
fn malformed_keys_are_config_errors() {
    let short_b64 = BASE64.encode([1u8; 16]);
    let long = "x".repeat(33);
    for bad in ["", "too-short", short_b64.as_str(), long.as_str()] {
        let err = MasterKey::resolve(bad).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Config, "{bad:?}");
        assert!(err.is_fatal());
    }
}

#[test]
fn missing_env_var_is_a_config_error() {
    let err = MasterKey::from_env("SECRETSYNC_TEST_UNSET_MASTER_KEY").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Config);
    assert!(err.to_string().contains("SECRETSYNC_TEST_UNSET_MASTER_KEY"));
}

#[test]
fn generated_keys_resolve_and_differ() {
    let a = generate_master_key();
    let b = generate_master_key();
    assert_ne!(*a, *b);
    assert_eq!(a.len(), 44);
    assert!(MasterKey::resolve(&a).is_ok());
}

#[test]
fn debug_output_hides_key_bytes() {
    let key = MasterKey::new([0xAB; 32]);
    let shown = format!("{key:?}");
    assert!(shown.contains(&key.fingerprint()));
    assert!(!shown.contains("171, 171"));
}

// ---------------------------------------------------------------------------
// Sealing
// ---------------------------------------------------------------------------

#[test]
fn sealed_value_opens_only_under_the_same_record_key() {
    let key = [3u8; 32];
    let triple = encrypt(&key, b"API_KEY", b"s3cret").unwrap();

    assert_eq!(decrypt(&key, b"API_KEY", &triple).unwrap(), b"s3cret");

    let err = decrypt(&key, b"OTHER_KEY", &triple).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Decrypt);
}

#[test]
fn each_seal_uses_a_fresh_nonce() {
    let key = [3u8; 32];
    let a = encrypt(&key, b"K_EY", b"same").unwrap();
    let b = encrypt(&key, b"K_EY", b"same").unwrap();
    assert_ne!(a, b);
}

#[test]
fn tampered_triples_are_rejected() {
    let key = [3u8; 32];
    let triple = encrypt(&key, b"K_EY", b"value").unwrap();
    let parts: Vec<&str> = triple.split(':').collect();
    assert_eq!(parts.len(), 3);

    let mut ct = BASE64.decode(parts[1]).unwrap();
    ct[0] ^= 0x01;
    let flipped = format!("{}:{}:{}", parts[0], BASE64.encode(&ct), parts[2]);
    let truncated = format!("{}:{}", parts[0], parts[1]);

    for bad in [
        flipped.as_str(),
        truncated.as_str(),
        "not-a-triple",
        "!!:??:**",
    ] {
        let err = decrypt(&key, b"K_EY", bad).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Decrypt, "{bad}");
    }
}
