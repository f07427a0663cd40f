//! Secret and SecretMetadata types stored inside `secrets.json`.
//!
//! Each secret holds its sealed value (`base64(nonce || ciphertext)`)
//! and the metadata describing its lifecycle.  The secret's key is the
//! map key in the document, so it is not repeated here.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single encrypted secret as persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Secret {
    /// Sealed value, decryptable only with the current master key.
    pub ciphertext: String,

    pub metadata: SecretMetadata,
}

/// Lifecycle metadata kept next to every secret.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecretMetadata {
    /// When this secret was first created.
    pub created_at: DateTime<Utc>,

    /// When the value was last changed by `put`. Rotation never touches it.
    pub modified_at: DateTime<Utc>,

    /// Disabled secrets are kept but cannot be read or listed normally.
    #[serde(default)]
    pub disabled: bool,

    /// Plaintext length in bytes.
    pub size: usize,

    /// Number of master-key rotations this secret has been through.
    #[serde(default)]
    pub rotation_count: u64,

    /// When the last of those rotations happened.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_rotated_at: Option<DateTime<Utc>>,
}

impl SecretMetadata {
    /// Metadata for a secret created at `now`.
    pub fn new(now: DateTime<Utc>, size: usize) -> Self {
        Self {
            created_at: now,
            modified_at: now,
            disabled: false,
            size,
            rotation_count: 0,
            last_rotated_at: None,
        }
    }
}

/// A secret's key together with its metadata (no ciphertext).
///
/// Returned by `SecretStore::list` so callers can display secrets
/// without touching any encrypted data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecretEntry {
    pub key: String,
    pub metadata: SecretMetadata,
}
