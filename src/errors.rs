use std::path::PathBuf;
use thiserror::Error;

/// All errors that can occur in Strongbox.
///
/// Messages name the operation, secret key or backup involved but never
/// include key material or plaintext.
#[derive(Debug, Error)]
pub enum StrongboxError {
    // --- Input errors ---
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    // --- Lookup errors ---
    #[error("Secret '{0}' not found")]
    SecretNotFound(String),

    #[error("Secret '{0}' is disabled (use `enable` to make it retrievable again)")]
    SecretDisabled(String),

    #[error("Backup '{0}' not found")]
    BackupNotFound(String),

    #[error("No valid backup available to restore from")]
    NoValidBackup,

    // --- Crypto errors ---
    #[error("Encryption failed: {0}")]
    EncryptionFailed(String),

    #[error("Decryption failed: wrong key or corrupted data")]
    DecryptionFailed,

    #[error("Failed to decrypt secret '{0}': store may be corrupted or keyed differently")]
    SecretDecryptionFailed(String),

    #[error("Invalid master key: {0}")]
    InvalidMasterKey(String),

    // --- Store errors ---
    #[error("Store not initialized at {0} (run `strongbox init`)")]
    StoreNotInitialized(PathBuf),

    #[error("Store already exists at {0}")]
    StoreAlreadyExists(PathBuf),

    #[error("Corrupted store data: {0}")]
    Corruption(String),

    #[error("Backup '{name}' is incomplete: {reason}")]
    InvalidBackup { name: String, reason: String },

    #[error("Store lock poisoned: a previous operation panicked while holding it")]
    LockPoisoned,

    // --- Rotation errors ---
    #[error("Rotation aborted during {phase}: {reason} (store unchanged)")]
    RotationAborted { phase: String, reason: String },

    #[error("ROTATION FAILED AFTER PARTIAL COMMIT: {reason}; run `strongbox restore {backup}`")]
    RotationFailedAfterPartialCommit { backup: String, reason: String },

    #[error("Operation cancelled")]
    Cancelled,

    // --- IO errors ---
    #[error("IO error during {context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    // --- Serialization errors ---
    #[error("Serialization error: {0}")]
    SerializationError(String),

    // --- Config errors ---
    #[error("Config file error: {0}")]
    ConfigError(String),

    // --- Audit errors ---
    #[error("Audit error: {0}")]
    AuditError(String),

    // --- CLI errors ---
    #[error("Command failed: {0}")]
    CommandFailed(String),

    #[error("User cancelled operation")]
    UserCancelled,
}

impl StrongboxError {
    /// Wrap an IO error with the operation that produced it.
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    /// Returns `true` for conditions a caller is expected to branch on
    /// (bad input, missing or disabled secrets, missing backups, cancellation).
    ///
    /// Everything else signals corruption, I/O trouble or a failed rotation
    /// and must be surfaced to the top-level caller.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::InvalidInput(_)
                | Self::SecretNotFound(_)
                | Self::SecretDisabled(_)
                | Self::BackupNotFound(_)
                | Self::NoValidBackup
                | Self::InvalidBackup { .. }
                | Self::Cancelled
                | Self::UserCancelled
        )
    }

    /// Returns `true` if the error means the requested item does not exist.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::SecretNotFound(_) | Self::BackupNotFound(_) | Self::NoValidBackup
        )
    }
}

/// Convenience type alias for Strongbox results.
pub type Result<T> = std::result::Result<T, StrongboxError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recoverable_classification() {
        assert!(StrongboxError::SecretDisabled("a".into()).is_recoverable());
        assert!(StrongboxError::BackupNotFound("b".into()).is_recoverable());
        assert!(!StrongboxError::Corruption("bad json".into()).is_recoverable());
        assert!(!StrongboxError::RotationFailedAfterPartialCommit {
            backup: "rotate-20240309-140559".into(),
            reason: "x".into(),
        }
        .is_recoverable());
    }

    #[test]
    fn io_error_carries_context() {
        let err = StrongboxError::io(
            "write secrets.json",
            std::io::Error::new(std::io::ErrorKind::Other, "disk full"),
        );
        let msg = err.to_string();
        assert!(msg.contains("write secrets.json"));
        assert!(msg.contains("disk full"));
    }
}
