//! Vault record types.
//!
//! `SecretRecord` is what gets persisted.  Everything handed back to
//! callers is a `SecretSummary`, which never carries ciphertext or
//! plaintext; plaintext only leaves the vault through `RevealedSecret`
//! (visibility-gated) and `ExportedSecret` (sync path).

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

use crate::errors::SecretSyncError;

/// Whether plaintext may be returned by `reveal`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    #[default]
    Hidden,
    Visible,
}

/// Provenance of a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SecretSource {
    #[default]
    App,
    Account,
    Scanned,
}

impl Visibility {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Hidden => "hidden",
            Self::Visible => "visible",
        }
    }
}

impl SecretSource {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::App => "app",
            Self::Account => "account",
            Self::Scanned => "scanned",
        }
    }
}

impl fmt::Display for Visibility {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for SecretSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Visibility {
    type Err = SecretSyncError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "hidden" => Ok(Self::Hidden),
            "visible" => Ok(Self::Visible),
            other => Err(SecretSyncError::Validation(format!(
                "visibility must be 'hidden' or 'visible', got '{other}'"
            ))),
        }
    }
}

impl FromStr for SecretSource {
    type Err = SecretSyncError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "app" => Ok(Self::App),
            "account" => Ok(Self::Account),
            "scanned" => Ok(Self::Scanned),
            other => Err(SecretSyncError::Validation(format!(
                "source must be 'app', 'account' or 'scanned', got '{other}'"
            ))),
        }
    }
}

/// A single vault entry as stored on disk.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SecretRecord {
    pub key: String,

    /// `nonce:ciphertext:tag`, absent when no value has been set.
    #[serde(default)]
    pub encrypted_value: Option<String>,

    #[serde(default)]
    pub visibility: Visibility,

    #[serde(default)]
    pub source: SecretSource,

    #[serde(default)]
    pub required: bool,

    pub created_at: DateTime<Utc>,
    pub created_by: String,
    pub updated_at: DateTime<Utc>,
    pub updated_by: String,
}

impl SecretRecord {
    pub fn has_value(&self) -> bool {
        self.encrypted_value.is_some()
    }

    /// Redacted view of this record.
    pub fn summary(&self) -> SecretSummary {
        SecretSummary {
            key: self.key.clone(),
            visibility: self.visibility,
            source: self.source,
            required: self.required,
            has_value: self.has_value(),
            created_at: self.created_at,
            created_by: self.created_by.clone(),
            updated_at: self.updated_at,
            updated_by: self.updated_by.clone(),
        }
    }
}

/// Redacted record metadata, safe to show anywhere.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SecretSummary {
    pub key: String,
    pub visibility: Visibility,
    pub source: SecretSource,
    pub required: bool,
    pub has_value: bool,
    pub created_at: DateTime<Utc>,
    pub created_by: String,
    pub updated_at: DateTime<Utc>,
    pub updated_by: String,
}

/// Input to `VaultStore::create`.
#[derive(Debug, Clone, Default)]
pub struct NewSecret {
    pub key: String,
    pub value: Option<String>,
    pub visibility: Visibility,
    pub source: SecretSource,
    pub required: bool,
}

impl NewSecret {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            ..Self::default()
        }
    }

    pub fn value(mut self, value: impl Into<String>) -> Self {
        self.value = Some(value.into());
        self
    }

    pub fn visibility(mut self, visibility: Visibility) -> Self {
        self.visibility = visibility;
        self
    }

    pub fn source(mut self, source: SecretSource) -> Self {
        self.source = source;
        self
    }

    pub fn required(mut self, required: bool) -> Self {
        self.required = required;
        self
    }
}

/// Partial update for `VaultStore::update`.  At least one field must
/// be set.
#[derive(Debug, Clone, Default)]
pub struct SecretPatch {
    /// New plaintext; an empty string clears the stored value.
    pub value: Option<String>,
    pub visibility: Option<Visibility>,
    pub source: Option<SecretSource>,
    pub required: Option<bool>,
}

impl SecretPatch {
    pub fn is_empty(&self) -> bool {
        self.value.is_none()
            && self.visibility.is_none()
            && self.source.is_none()
            && self.required.is_none()
    }
}

/// Result of `reveal`.
#[derive(Clone)]
pub struct RevealedSecret {
    pub key: String,
    pub value: Option<Zeroizing<String>>,
}

impl fmt::Debug for RevealedSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RevealedSecret")
            .field("key", &self.key)
            .field("has_value", &self.has_value())
            .finish()
    }
}

impl RevealedSecret {
    pub fn has_value(&self) -> bool {
        self.value.is_some()
    }
}

/// One page of `list` results.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SecretPage {
    pub items: Vec<SecretSummary>,
    pub total: usize,
    pub page: usize,
    pub page_size: usize,
}

/// A fully decrypted record handed to the sync engine.
#[derive(Clone)]
pub struct ExportedSecret {
    pub key: String,
    pub value: Option<Zeroizing<String>>,
    pub required: bool,
    pub source: SecretSource,
}

impl fmt::Debug for ExportedSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExportedSecret")
            .field("key", &self.key)
            .field("has_value", &self.value.is_some())
            .field("required", &self.required)
            .field("source", &self.source)
            .finish()
    }
}

impl ExportedSecret {
    /// Plaintext, or empty when the record has no value.
    pub fn value_or_empty(&self) -> &str {
        self.value.as_ref().map_or("", |v| v.as_str())
    }
}
