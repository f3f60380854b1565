#[derive(Debug, thiserror::Error)]
pub enum BackupError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("Configuration error: {0}")]
    Configuration(String),
    #[error("Key import failed: {0}")]
    KeyImport(String),
    #[error("Recipient key {recipient} does not match pinned fingerprint {pinned}")]
    FingerprintMismatch { recipient: String, pinned: String },
    #[error("Recipient not found: {0}")]
    RecipientNotFound(String),
    #[error("Provider error: {0}")]
    Provider(String),
    #[error("No value fetched for parameter '{name}'")]
    MissingValue { name: String },
    #[error("Encryption error: {0}")]
    Encryption(String),
    #[error("Decryption error: {0}")]
    Decryption(String),
    #[error("Invalid armor: {0}")]
    InvalidArmor(String),
    #[error("Upload to s3://{bucket} ({region}) failed: {message}")]
    Upload {
        bucket: String,
        region: String,
        message: String,
    },
}

impl BackupError {
    /// Create a key import error that names the offending path
    pub fn key_import_at(path: &std::path::Path, msg: impl std::fmt::Display) -> Self {
        BackupError::KeyImport(format!("{}: {}", path.display(), msg))
    }

    /// True when the failure happened before anything left the process
    pub fn is_local(&self) -> bool {
        matches!(
            self,
            BackupError::Io(_)
                | BackupError::Configuration(_)
                | BackupError::KeyImport(_)
                | BackupError::FingerprintMismatch { .. }
                | BackupError::RecipientNotFound(_)
        )
    }
}

pub type BackupResult<T> = Result<T, BackupError>;

