//! High-level secret store used by CLI commands, rotation and restore.
//!
//! `SecretStore` owns the active master key and the in-memory secret map
//! behind a single `RwLock`, so a lock holder always sees a map and a key
//! that belong together.  Reads take the shared lock; every mutation
//! takes the exclusive lock, builds the next map, persists it with an
//! atomic write and only then swaps it into memory.  A failed write
//! therefore leaves both the file on disk and the in-memory map as they
//! were.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::Utc;
use zeroize::Zeroize;

use crate::cancel::CancelToken;
use crate::crypto::{generate_key, generate_secret_value, open, seal, MasterKey};
use crate::errors::{Result, StrongboxError};
use crate::storage::{FsBackend, StorageBackend};

use super::format::{self, MASTER_KEY_FILE, SECRETS_FILE};
use super::secret::{Secret, SecretEntry, SecretMetadata};

/// The key and the secrets encrypted under it, guarded as one unit.
pub(crate) struct StoreState {
    pub(crate) master_key: MasterKey,
    pub(crate) secrets: BTreeMap<String, Secret>,
}

/// The main store handle.  Create one with `SecretStore::create` or
/// `SecretStore::open`, then share it (e.g. behind an `Arc`) between
/// callers; every method takes `&self`.
pub struct SecretStore {
    backend: Arc<dyn StorageBackend>,
    state: RwLock<StoreState>,
}

impl std::fmt::Debug for SecretStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecretStore")
            .field("backend", &self.backend)
            .finish_non_exhaustive()
    }
}

impl SecretStore {
    // ------------------------------------------------------------------
    // Construction
    // ------------------------------------------------------------------

    /// Initialize a brand-new store on `backend`.
    ///
    /// Generates a random master key and writes it together with an
    /// empty secrets document.
    pub fn create(backend: Arc<dyn StorageBackend>, cancel: &CancelToken) -> Result<Self> {
        cancel.check()?;

        let key_path = Path::new(MASTER_KEY_FILE);
        if backend.exists(key_path) {
            return Err(StrongboxError::StoreAlreadyExists(backend.location(key_path)));
        }

        backend.create_dir_all(Path::new(""))?;

        let master_key = generate_key();
        let secrets = BTreeMap::new();
        let doc = format::encode_secrets(&secrets)?;

        cancel.check()?;
        backend.write_atomic(key_path, &master_key.to_file_bytes())?;
        backend.write_atomic(Path::new(SECRETS_FILE), &doc)?;

        tracing::info!(location = %backend.location(Path::new("")).display(), "store created");

        Ok(Self {
            backend,
            state: RwLock::new(StoreState {
                master_key,
                secrets,
            }),
        })
    }

    /// Open an existing store on `backend`.
    ///
    /// A legacy flat secrets document is migrated and rewritten once.
    pub fn open(backend: Arc<dyn StorageBackend>) -> Result<Self> {
        let (state, migrated) = Self::load_state(backend.as_ref())?;

        let store = Self {
            backend,
            state: RwLock::new(state),
        };

        if migrated {
            let state = store.lock_read()?;
            store.persist_secrets(&state.secrets, &CancelToken::new())?;
            tracing::info!(
                secrets = state.secrets.len(),
                "migrated legacy secrets document to version {}",
                format::CURRENT_VERSION
            );
        }

        Ok(store)
    }

    /// Create a store in a directory on the local filesystem.
    pub fn create_dir(root: impl Into<PathBuf>, cancel: &CancelToken) -> Result<Self> {
        Self::create(Arc::new(FsBackend::new(root)), cancel)
    }

    /// Open a store in a directory on the local filesystem.
    pub fn open_dir(root: impl Into<PathBuf>) -> Result<Self> {
        Self::open(Arc::new(FsBackend::new(root)))
    }

    /// Re-read the key and secrets from storage, replacing the in-memory state.
    pub fn reload(&self) -> Result<()> {
        let mut state = self.lock_write()?;
        let (fresh, _) = Self::load_state(self.backend.as_ref())?;
        *state = fresh;
        Ok(())
    }

    /// Read `master.key` and `secrets.json` from `backend`.
    ///
    /// Returns the state and whether the secrets document was migrated.
    fn load_state(backend: &dyn StorageBackend) -> Result<(StoreState, bool)> {
        let key_path = Path::new(MASTER_KEY_FILE);
        if !backend.exists(key_path) {
            return Err(StrongboxError::StoreNotInitialized(
                backend.location(Path::new("")),
            ));
        }

        let mut key_bytes = backend.read(key_path)?;
        let master_key = MasterKey::from_file_bytes(&key_bytes);
        key_bytes.zeroize();
        let master_key = master_key?;

        let secrets_path = Path::new(SECRETS_FILE);
        if !backend.exists(secrets_path) {
            // A crash between writing the key and the first secrets
            // document during `create` leaves an empty store.
            return Ok((
                StoreState {
                    master_key,
                    secrets: BTreeMap::new(),
                },
                false,
            ));
        }

        let data = backend.read(secrets_path)?;
        let decoded = format::decode_secrets(&data, &master_key)?;

        Ok((
            StoreState {
                master_key,
                secrets: decoded.secrets,
            },
            decoded.migrated,
        ))
    }

    // ------------------------------------------------------------------
    // Secret operations
    // ------------------------------------------------------------------

    /// Add or update a secret.
    ///
    /// Updating keeps `created_at`, `rotation_count`, `last_rotated_at` and
    /// the disabled flag, and refreshes `modified_at` and `size`.
    pub fn put(&self, key: &str, value: &str, cancel: &CancelToken) -> Result<()> {
        cancel.check()?;
        let mut state = self.lock_write()?;
        self.put_locked(&mut state, key, value, cancel)
    }

    /// Decrypt and return the plaintext value of an enabled secret.
    pub fn get(&self, key: &str) -> Result<String> {
        validate_key(key)?;
        let state = self.lock_read()?;
        let secret = state
            .secrets
            .get(key)
            .ok_or_else(|| StrongboxError::SecretNotFound(key.to_string()))?;

        if secret.metadata.disabled {
            return Err(StrongboxError::SecretDisabled(key.to_string()));
        }

        let mut plaintext = open(state.master_key.as_bytes(), &secret.ciphertext)
            .map_err(|_| StrongboxError::SecretDecryptionFailed(key.to_string()))?;

        // Move the bytes out so the String owns them; the emptied
        // `Zeroizing` buffer is still wiped on drop.
        let bytes = std::mem::take(&mut *plaintext);
        String::from_utf8(bytes).map_err(|e| {
            let mut bad_bytes = e.into_bytes();
            bad_bytes.zeroize();
            StrongboxError::SerializationError(format!("secret '{key}' is not valid UTF-8"))
        })
    }

    /// Permanently remove a secret.
    pub fn delete(&self, key: &str, cancel: &CancelToken) -> Result<()> {
        validate_key(key)?;
        cancel.check()?;
        let mut state = self.lock_write()?;

        if !state.secrets.contains_key(key) {
            return Err(StrongboxError::SecretNotFound(key.to_string()));
        }

        let mut next = state.secrets.clone();
        next.remove(key);
        self.persist_secrets(&next, cancel)?;
        state.secrets = next;

        tracing::debug!(key = %key, "secret deleted");
        Ok(())
    }

    /// Metadata for all enabled secrets, sorted by key.
    pub fn list(&self) -> Result<Vec<SecretEntry>> {
        self.list_where(|m| !m.disabled)
    }

    /// Metadata for all disabled secrets, sorted by key.
    pub fn list_disabled(&self) -> Result<Vec<SecretEntry>> {
        self.list_where(|m| m.disabled)
    }

    /// Make a disabled secret retrievable again.
    pub fn enable(&self, key: &str, cancel: &CancelToken) -> Result<()> {
        self.set_disabled(key, false, cancel)
    }

    /// Hide a secret from `get` and `list` without deleting it.
    pub fn disable(&self, key: &str, cancel: &CancelToken) -> Result<()> {
        self.set_disabled(key, true, cancel)
    }

    /// Generate a random value of `length` characters, store it under
    /// `key` and return it.
    pub fn generate(&self, key: &str, length: usize, cancel: &CancelToken) -> Result<String> {
        let value = generate_secret_value(length)?;
        self.put(key, &value, cancel)?;
        Ok((*value).clone())
    }

    /// Metadata for a single secret, enabled or not.
    pub fn metadata(&self, key: &str) -> Result<SecretMetadata> {
        let state = self.lock_read()?;
        state
            .secrets
            .get(key)
            .map(|s| s.metadata.clone())
            .ok_or_else(|| StrongboxError::SecretNotFound(key.to_string()))
    }

    /// Returns `true` if a secret with this key exists (enabled or not).
    pub fn contains(&self, key: &str) -> Result<bool> {
        Ok(self.lock_read()?.secrets.contains_key(key))
    }

    /// Number of secrets, enabled and disabled.
    pub fn len(&self) -> Result<usize> {
        Ok(self.lock_read()?.secrets.len())
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    /// The backend this store persists to.
    pub fn backend(&self) -> &Arc<dyn StorageBackend> {
        &self.backend
    }

    // ------------------------------------------------------------------
    // Crate-internal access for rotation and restore
    // ------------------------------------------------------------------

    pub(crate) fn lock_read(&self) -> Result<RwLockReadGuard<'_, StoreState>> {
        self.state.read().map_err(|_| StrongboxError::LockPoisoned)
    }

    pub(crate) fn lock_write(&self) -> Result<RwLockWriteGuard<'_, StoreState>> {
        self.state.write().map_err(|_| StrongboxError::LockPoisoned)
    }

    /// `put` for a caller that already holds the write lock.
    pub(crate) fn put_locked(
        &self,
        state: &mut StoreState,
        key: &str,
        value: &str,
        cancel: &CancelToken,
    ) -> Result<()> {
        validate_key(key)?;

        let ciphertext = seal(state.master_key.as_bytes(), value.as_bytes())?;
        let now = Utc::now();

        let metadata = match state.secrets.get(key) {
            Some(existing) => SecretMetadata {
                modified_at: now,
                size: value.len(),
                ..existing.metadata.clone()
            },
            None => SecretMetadata::new(now, value.len()),
        };

        let mut next = state.secrets.clone();
        next.insert(
            key.to_string(),
            Secret {
                ciphertext,
                metadata,
            },
        );
        self.persist_secrets(&next, cancel)?;
        state.secrets = next;

        tracing::debug!(key = %key, size = value.len(), "secret stored");
        Ok(())
    }

    /// Atomically write `secrets` as the committed secrets document.
    fn persist_secrets(
        &self,
        secrets: &BTreeMap<String, Secret>,
        cancel: &CancelToken,
    ) -> Result<()> {
        let doc = format::encode_secrets(secrets)?;
        cancel.check()?;
        self.backend.write_atomic(Path::new(SECRETS_FILE), &doc)
    }

    fn set_disabled(&self, key: &str, disabled: bool, cancel: &CancelToken) -> Result<()> {
        validate_key(key)?;
        cancel.check()?;
        let mut state = self.lock_write()?;

        let mut next = state.secrets.clone();
        let secret = next
            .get_mut(key)
            .ok_or_else(|| StrongboxError::SecretNotFound(key.to_string()))?;

        if secret.metadata.disabled == disabled {
            return Ok(());
        }
        secret.metadata.disabled = disabled;

        self.persist_secrets(&next, cancel)?;
        state.secrets = next;

        tracing::debug!(key = %key, disabled, "secret visibility changed");
        Ok(())
    }

    fn list_where(&self, keep: impl Fn(&SecretMetadata) -> bool) -> Result<Vec<SecretEntry>> {
        let state = self.lock_read()?;
        // BTreeMap iteration is already sorted by key.
        Ok(state
            .secrets
            .iter()
            .filter(|(_, s)| keep(&s.metadata))
            .map(|(key, s)| SecretEntry {
                key: key.clone(),
                metadata: s.metadata.clone(),
            })
            .collect())
    }
}

/// The store only insists on a non-empty key.  Path and character rules
/// are enforced by the CLI before a key reaches this point; the key is
/// never normalized or escaped here.
fn validate_key(key: &str) -> Result<()> {
    if key.is_empty() {
        return Err(StrongboxError::InvalidInput(
            "secret key cannot be empty".into(),
        ));
    }
    Ok(())
}
