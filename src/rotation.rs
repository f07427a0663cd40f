//! Master-key rotation.
//!
//! ```text
//! Idle → BackingUp → Decrypting → KeyGenerated → ReEncrypting → Committing → Committed
//!                                                                          ↘ RolledBack
//! ```
//!
//! The whole sequence runs under the store's exclusive lock.  Nothing
//! live is mutated before `Committing`.  The commit stages the new key
//! and secrets next to the live files, renames the key first and the
//! secrets second; if the second rename fails the previous key is
//! written back from memory.
//!
//! After the commit, older backups are re-encrypted under the new key
//! and old rotation backups beyond the retention count are removed.
//! Both steps only log on failure.

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

use chrono::{DateTime, Utc};
use zeroize::Zeroizing;

use crate::backup::{BackupKind, BackupManager};
use crate::cancel::CancelToken;
use crate::config::{StoreConfig, DEFAULT_ROTATION_BACKUP_COUNT};
use crate::crypto::{generate_key, open, seal, MasterKey};
use crate::errors::{Result, StrongboxError};
use crate::storage::StorageBackend;
use crate::vault::format::{self, MASTER_KEY_FILE, SECRETS_FILE};
use crate::vault::{Secret, SecretStore};

/// Staging file for the new key, renamed over `master.key` on commit.
const KEY_STAGING_FILE: &str = ".master.key.rotating";

/// Staging file for the re-encrypted secrets, renamed over `secrets.json`.
const SECRETS_STAGING_FILE: &str = ".secrets.json.rotating";

/// Where a rotation is (or stopped).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RotationPhase {
    Idle,
    BackingUp,
    Decrypting,
    KeyGenerated,
    ReEncrypting,
    Committing,
    Committed,
    RolledBack,
}

impl fmt::Display for RotationPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RotationPhase::Idle => "idle",
            RotationPhase::BackingUp => "backing up",
            RotationPhase::Decrypting => "decrypting",
            RotationPhase::KeyGenerated => "key generation",
            RotationPhase::ReEncrypting => "re-encrypting",
            RotationPhase::Committing => "committing",
            RotationPhase::Committed => "committed",
            RotationPhase::RolledBack => "rolled back",
        };
        f.write_str(name)
    }
}

/// What a successful rotation did.
#[derive(Debug, Clone)]
pub struct RotationReport {
    /// Backup holding the pre-rotation key and secrets.
    pub backup: String,
    pub secrets_rotated: usize,
    pub started_at: DateTime<Utc>,
    /// The `last_rotated_at` stamped on every secret.
    pub rotated_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    /// Older backups rewritten under the new key.
    pub backups_reencrypted: Vec<String>,
    /// Older backups that could not be rewritten and were left as they were.
    pub backups_skipped: Vec<String>,
    /// Rotation backups removed by retention cleanup.
    pub backups_removed: Vec<String>,
}

/// Rotates the master key of a `SecretStore`.
pub struct RotationEngine<'a> {
    store: &'a SecretStore,
    backups: BackupManager,
    retention: usize,
}

/// Tracks the current phase and logs each transition.
struct PhaseTracker {
    phase: RotationPhase,
}

impl PhaseTracker {
    fn new() -> Self {
        Self {
            phase: RotationPhase::Idle,
        }
    }

    fn enter(&mut self, next: RotationPhase) {
        tracing::debug!(from = %self.phase, to = %next, "rotation phase");
        self.phase = next;
    }

    /// Turn an error raised in the current phase into a rotation abort.
    /// Cancellation passes through unchanged.
    fn abort(&self, err: StrongboxError) -> StrongboxError {
        match err {
            StrongboxError::Cancelled => StrongboxError::Cancelled,
            other => self.abort_with(other.to_string()),
        }
    }

    fn abort_with(&self, reason: impl Into<String>) -> StrongboxError {
        let reason = reason.into();
        tracing::warn!(phase = %self.phase, reason = %reason, "rotation aborted");
        StrongboxError::RotationAborted {
            phase: self.phase.to_string(),
            reason,
        }
    }
}

impl<'a> RotationEngine<'a> {
    /// An engine using the retention count from `config`.
    pub fn new(store: &'a SecretStore, config: &StoreConfig) -> Self {
        Self::with_retention(store, config.rotation_backup_count)
    }

    /// An engine keeping `retention` rotation backups (zero means the default).
    pub fn with_retention(store: &'a SecretStore, retention: usize) -> Self {
        let retention = if retention == 0 {
            DEFAULT_ROTATION_BACKUP_COUNT
        } else {
            retention
        };
        Self {
            store,
            backups: BackupManager::for_store(store),
            retention,
        }
    }

    /// Rotate the master key, taking a `rotate-` backup first.
    pub fn rotate_master_key(&self, cancel: &CancelToken) -> Result<RotationReport> {
        self.rotate_master_key_labeled(BackupKind::Rotate, cancel)
    }

    /// Rotate the master key, labelling the pre-rotation backup with `label`
    /// (`Rotate` or `Manual`).  Manual backups are not subject to retention.
    pub fn rotate_master_key_labeled(
        &self,
        label: BackupKind,
        cancel: &CancelToken,
    ) -> Result<RotationReport> {
        let started_at = Utc::now();
        let mut tracker = PhaseTracker::new();

        cancel.check()?;
        if label == BackupKind::PreRestore {
            return Err(StrongboxError::InvalidInput(
                "pre-restore is not a valid rotation backup label".into(),
            ));
        }

        let backend = self.store.backend();
        if !backend.supports_atomic_rename() {
            return Err(tracker.abort_with(
                "storage backend cannot replace files atomically; refusing to rotate",
            ));
        }

        let mut state = self.store.lock_write()?;

        // 1. Snapshot the live files before anything changes.
        tracker.enter(RotationPhase::BackingUp);
        let backup = self
            .backups
            .snapshot_live(label, cancel)
            .map_err(|e| tracker.abort(e))?;

        // 2. Decrypt everything under the old key.
        tracker.enter(RotationPhase::Decrypting);
        let mut plaintexts: BTreeMap<&str, Zeroizing<Vec<u8>>> = BTreeMap::new();
        for (key, secret) in &state.secrets {
            let plaintext = open(state.master_key.as_bytes(), &secret.ciphertext).map_err(|_| {
                tracker.abort_with(format!(
                    "secret '{key}' could not be decrypted with the current master key"
                ))
            })?;
            plaintexts.insert(key.as_str(), plaintext);
        }

        // 3. New key.
        tracker.enter(RotationPhase::KeyGenerated);
        let new_key = generate_key();

        // 4. Re-encrypt into a complete new collection.
        tracker.enter(RotationPhase::ReEncrypting);
        let rotated_at = Utc::now();
        let mut next = BTreeMap::new();
        for (key, secret) in &state.secrets {
            let plaintext = plaintexts.get(key.as_str()).ok_or_else(|| {
                tracker.abort_with(format!("secret '{key}' missing from decrypted set"))
            })?;
            let ciphertext = seal(new_key.as_bytes(), plaintext).map_err(|e| tracker.abort(e))?;

            let mut metadata = secret.metadata.clone();
            metadata.rotation_count += 1;
            metadata.last_rotated_at = Some(rotated_at);

            next.insert(key.clone(), Secret { ciphertext, metadata });
        }
        drop(plaintexts);

        // 5. Swap the files.
        tracker.enter(RotationPhase::Committing);
        let staged = Staged {
            old_key: &state.master_key,
            new_key: &new_key,
            secrets: &next,
            backup: &backup.name,
        };
        self.commit(backend.as_ref(), &staged, &mut tracker, cancel)?;

        // 6. Swap the in-memory state to match.
        let old_key = std::mem::replace(&mut state.master_key, new_key);
        state.secrets = next;
        tracker.enter(RotationPhase::Committed);

        let secrets_rotated = state.secrets.len();
        tracing::info!(backup = %backup.name, secrets = secrets_rotated, "master key rotated");

        // 7. Keep older backups restorable without the old key.
        let summary = self
            .backups
            .reencrypt_backups(&old_key, &state.master_key, &backup.name);
        drop(old_key);

        // 8. Retention.
        let backups_removed = self.backups.enforce_retention(self.retention);

        Ok(RotationReport {
            backup: backup.name,
            secrets_rotated,
            started_at,
            rotated_at,
            finished_at: Utc::now(),
            backups_reencrypted: summary.reencrypted,
            backups_skipped: summary.skipped,
            backups_removed,
        })
    }

    /// Stage both files, then rename key first and secrets second.
    fn commit(
        &self,
        backend: &dyn StorageBackend,
        staged: &Staged<'_>,
        tracker: &mut PhaseTracker,
        cancel: &CancelToken,
    ) -> Result<()> {
        let key_staging = Path::new(KEY_STAGING_FILE);
        let secrets_staging = Path::new(SECRETS_STAGING_FILE);

        let doc = format::encode_secrets(staged.secrets).map_err(|e| tracker.abort(e))?;

        let written = backend
            .write(key_staging, &staged.new_key.to_file_bytes())
            .and_then(|()| backend.write(secrets_staging, &doc));
        if let Err(e) = written {
            discard_staging(backend);
            return Err(tracker.abort(e));
        }

        // Last chance to back out before anything live changes.
        if cancel.is_cancelled() {
            discard_staging(backend);
            return Err(StrongboxError::Cancelled);
        }

        if let Err(e) = backend.rename(key_staging, Path::new(MASTER_KEY_FILE)) {
            discard_staging(backend);
            return Err(tracker.abort(e));
        }

        // From here `master.key` holds the new key.
        if let Err(e) = backend.rename(secrets_staging, Path::new(SECRETS_FILE)) {
            discard_staging(backend);
            tracing::warn!(
                error = %e,
                "secrets swap failed after key swap; restoring previous master key"
            );

            let old_key_bytes = staged.old_key.to_file_bytes();
            return match backend.write_atomic(Path::new(MASTER_KEY_FILE), &old_key_bytes) {
                Ok(()) => {
                    tracker.enter(RotationPhase::RolledBack);
                    Err(StrongboxError::RotationAborted {
                        phase: RotationPhase::Committing.to_string(),
                        reason: format!("{e}; previous master key restored"),
                    })
                }
                Err(rollback) => {
                    tracing::error!(
                        error = %e,
                        rollback_error = %rollback,
                        "master.key holds the new key but secrets.json was not replaced"
                    );
                    Err(StrongboxError::RotationFailedAfterPartialCommit {
                        backup: staged.backup.to_string(),
                        reason: format!(
                            "replacing {SECRETS_FILE} failed ({e}) and restoring the previous \
                             {MASTER_KEY_FILE} failed ({rollback})"
                        ),
                    })
                }
            };
        }

        Ok(())
    }
}

/// Everything `commit` needs to swap the live files.
struct Staged<'s> {
    old_key: &'s MasterKey,
    new_key: &'s MasterKey,
    secrets: &'s BTreeMap<String, Secret>,
    /// Pre-rotation snapshot, named in the fatal error.
    backup: &'s str,
}

/// Remove leftover staging files; they may or may not exist.
fn discard_staging(backend: &dyn StorageBackend) {
    for file in [KEY_STAGING_FILE, SECRETS_STAGING_FILE] {
        let path = Path::new(file);
        if backend.exists(path) {
            if let Err(e) = backend.remove_file(path) {
                tracing::warn!(file, error = %e, "failed to remove rotation staging file");
            }
        }
    }
}
