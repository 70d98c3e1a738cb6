use thiserror::Error;

/// All errors that can occur in secretsync.
#[derive(Debug, Error)]
pub enum SecretSyncError {
    // --- Caller errors ---
    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Secret '{0}' already exists (use `update` to change it)")]
    Duplicate(String),

    #[error("Secret '{0}' not found")]
    NotFound(String),

    #[error("Secret '{0}' is hidden and cannot be revealed")]
    Forbidden(String),

    // --- Fatal errors ---
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Storage error: {0}")]
    Storage(String),

    // --- Crypto errors ---
    #[error("Encryption failed: {0}")]
    EncryptionFailed(String),

    #[error("Decryption failed: {0}")]
    Decrypt(String),

    // --- IO errors ---
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // --- Serialization errors ---
    #[error("Serialization error: {0}")]
    Serialization(String),

    // --- Audit errors ---
    #[error("Audit error: {0}")]
    Audit(String),

    // --- CLI errors ---
    #[error("Command failed: {0}")]
    CommandFailed(String),
}

/// Coarse error classification, used by callers that render status
/// instead of raw error text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    Duplicate,
    NotFound,
    Forbidden,
    Config,
    Decrypt,
    Storage,
    Internal,
}

impl SecretSyncError {
    /// The taxonomy bucket this error belongs to.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation(_) => ErrorKind::Validation,
            Self::Duplicate(_) => ErrorKind::Duplicate,
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::Forbidden(_) => ErrorKind::Forbidden,
            Self::Config(_) => ErrorKind::Config,
            Self::Decrypt(_) => ErrorKind::Decrypt,
            Self::Storage(_) => ErrorKind::Storage,
            Self::EncryptionFailed(_)
            | Self::Io(_)
            | Self::Serialization(_)
            | Self::Audit(_)
            | Self::CommandFailed(_) => ErrorKind::Internal,
        }
    }

    /// Only configuration and storage failures should stop the caller.
    pub fn is_fatal(&self) -> bool {
        matches!(self.kind(), ErrorKind::Config | ErrorKind::Storage)
    }
}

/// Convenience type alias for secretsync results.
pub type Result<T> = std::result::Result<T, SecretSyncError>;
