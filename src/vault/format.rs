//! The `secrets.json` document.
//!
//! ```text
//! {
//!   "version": 2,
//!   "secrets": {
//!     "<key>": { "ciphertext": "<base64>", "metadata": { ... } }
//!   }
//! }
//! ```
//!
//! Older stores wrote a flat `{ "<key>": "<base64>" }` map with no
//! version tag.  Such documents are migrated on load: metadata is
//! synthesised (timestamps set to the migration time, size taken from
//! the decrypted value) and the caller rewrites the file once.

use std::collections::BTreeMap;

use chrono::Utc;
use serde::{Deserialize, Serialize};

use super::secret::{Secret, SecretMetadata};
use crate::crypto::{open, MasterKey};
use crate::errors::{Result, StrongboxError};

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Current document version.
pub const CURRENT_VERSION: u32 = 2;

/// File holding the encoded master key.
pub const MASTER_KEY_FILE: &str = "master.key";

/// File holding the secrets document.
pub const SECRETS_FILE: &str = "secrets.json";

// ---------------------------------------------------------------------------
// Document shapes
// ---------------------------------------------------------------------------

#[derive(Serialize)]
struct SecretsFileRef<'a> {
    version: u32,
    secrets: &'a BTreeMap<String, Secret>,
}

#[derive(Deserialize)]
struct SecretsFile {
    version: u32,
    secrets: BTreeMap<String, Secret>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum SecretsDocument {
    Current(SecretsFile),
    Legacy(BTreeMap<String, String>),
}

/// Result of decoding a secrets document.
#[derive(Debug)]
pub struct DecodedSecrets {
    pub secrets: BTreeMap<String, Secret>,

    /// `true` if the document was in the legacy flat format and should be
    /// rewritten in the current format.
    pub migrated: bool,
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Serialize the secret map into the current document format.
pub fn encode_secrets(secrets: &BTreeMap<String, Secret>) -> Result<Vec<u8>> {
    let doc = SecretsFileRef {
        version: CURRENT_VERSION,
        secrets,
    };
    serde_json::to_vec_pretty(&doc)
        .map_err(|e| StrongboxError::SerializationError(format!("secrets: {e}")))
}

/// Parse a secrets document without migrating it.
///
/// Legacy documents are rejected here because turning them into the
/// current shape needs the master key; use `decode_secrets` for that.
pub fn parse_secrets(data: &[u8]) -> Result<BTreeMap<String, Secret>> {
    match parse_document(data)? {
        SecretsDocument::Current(file) => Ok(file.secrets),
        SecretsDocument::Legacy(_) => Err(StrongboxError::Corruption(
            "legacy secrets document needs migration".into(),
        )),
    }
}

/// Parse a secrets document, migrating the legacy format with `key`.
pub fn decode_secrets(data: &[u8], key: &MasterKey) -> Result<DecodedSecrets> {
    match parse_document(data)? {
        SecretsDocument::Current(file) => Ok(DecodedSecrets {
            secrets: file.secrets,
            migrated: false,
        }),
        SecretsDocument::Legacy(flat) => Ok(DecodedSecrets {
            secrets: migrate_legacy(flat, key)?,
            migrated: true,
        }),
    }
}

fn parse_document(data: &[u8]) -> Result<SecretsDocument> {
    let doc: SecretsDocument = serde_json::from_slice(data).map_err(|e| {
        StrongboxError::Corruption(format!("{SECRETS_FILE} is not a valid secrets document: {e}"))
    })?;

    if let SecretsDocument::Current(ref file) = doc {
        if file.version == 0 || file.version > CURRENT_VERSION {
            return Err(StrongboxError::Corruption(format!(
                "unsupported {SECRETS_FILE} version {}, expected at most {CURRENT_VERSION}",
                file.version
            )));
        }
    }

    Ok(doc)
}

fn migrate_legacy(
    flat: BTreeMap<String, String>,
    key: &MasterKey,
) -> Result<BTreeMap<String, Secret>> {
    let now = Utc::now();
    let mut secrets = BTreeMap::new();

    for (name, ciphertext) in flat {
        let plaintext = open(key.as_bytes(), &ciphertext)
            .map_err(|_| StrongboxError::SecretDecryptionFailed(name.clone()))?;
        let metadata = SecretMetadata::new(now, plaintext.len());
        secrets.insert(
            name,
            Secret {
                ciphertext,
                metadata,
            },
        );
    }

    Ok(secrets)
}
