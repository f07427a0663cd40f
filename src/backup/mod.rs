//! Backup/restore: timestamped snapshots of the key and secrets files.
//!
//! Every backup is a directory under `<store>/backups/` holding a copy of
//! `master.key` and `secrets.json` as they were when it was taken.  A
//! backup is always self-consistent: its ciphertexts decrypt under its
//! own key file.  After a rotation, older backups are rewritten under
//! the new key (both files), so they stay restorable once the old key
//! is gone.
//!
//! Storage layout:
//!   backups/rotate-20240309-140559/{master.key,secrets.json}
//!   backups/manual-20240310-090000/...
//!   backups/pre-restore-20240311-120000/...
//!
//! Retention: rotation prunes `rotate-` backups to the configured count,
//! and each restore prunes `pre-restore-` snapshots to the newest
//! `PRE_RESTORE_KEEP`.  `manual-` backups are only removed by hand.

pub mod naming;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use zeroize::Zeroizing;

use crate::cancel::CancelToken;
use crate::crypto::{open, seal, MasterKey};
use crate::errors::{Result, StrongboxError};
use crate::storage::StorageBackend;
use crate::vault::format::{self, MASTER_KEY_FILE, SECRETS_FILE};
use crate::vault::store::StoreState;
use crate::vault::{Secret, SecretStore};

pub use naming::{format_name, parse_name, BackupKind, ParsedName, TIMESTAMP_FORMAT};

/// Directory (relative to the store root) holding all backups.
pub const BACKUPS_DIR: &str = "backups";

/// Number of `pre-restore-` snapshots kept after a restore.
pub const PRE_RESTORE_KEEP: usize = 3;

/// Information about one backup directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackupInfo {
    /// Directory name, e.g. `rotate-20240309-140559`.
    pub name: String,
    /// Where the directory lives (absolute for the filesystem backend).
    pub path: PathBuf,
    pub kind: BackupKind,
    /// Parsed from the name; the epoch if the name has no valid timestamp.
    pub timestamp: DateTime<Utc>,
    /// Both `master.key` and `secrets.json` are present.
    pub is_valid: bool,
    sequence: u32,
}

/// Outcome of a whole-store restore.
#[derive(Debug, Clone)]
pub struct RestoreReport {
    /// The backup that was restored.
    pub restored_from: String,
    /// Snapshot of the state that was live before the restore.
    pub safety_backup: String,
    /// Number of secrets in the restored store.
    pub secret_count: usize,
    /// Older `pre-restore-` snapshots pruned afterwards.
    pub backups_removed: Vec<String>,
}

/// Outcome of re-encrypting historical backups after a rotation.
#[derive(Debug, Clone, Default)]
pub struct ReencryptSummary {
    pub reencrypted: Vec<String>,
    pub skipped: Vec<String>,
}

/// A backup's files, read and decoded before anything live is touched.
struct Restorable {
    key_bytes: Zeroizing<Vec<u8>>,
    /// Current-format secrets document.
    doc: Vec<u8>,
    state: StoreState,
}

/// Lists, creates, restores and prunes backups on a storage backend.
#[derive(Debug, Clone)]
pub struct BackupManager {
    backend: Arc<dyn StorageBackend>,
}

fn backup_dir(name: &str) -> PathBuf {
    Path::new(BACKUPS_DIR).join(name)
}

fn backup_file(name: &str, file: &str) -> PathBuf {
    backup_dir(name).join(file)
}

/// Backup names come from callers; they must name a single directory.
fn validate_backup_name(name: &str) -> Result<()> {
    if name.contains('/')
        || name.contains('\\')
        || name.contains("..")
        || name.chars().any(char::is_control)
    {
        return Err(StrongboxError::InvalidInput(format!(
            "invalid backup name '{}'",
            name.escape_debug()
        )));
    }
    Ok(())
}

impl BackupManager {
    pub fn new(backend: Arc<dyn StorageBackend>) -> Self {
        Self { backend }
    }

    /// A manager working on the same backend as `store`.
    pub fn for_store(store: &SecretStore) -> Self {
        Self::new(Arc::clone(store.backend()))
    }

    // ------------------------------------------------------------------
    // Listing
    // ------------------------------------------------------------------

    /// All backups, newest first.
    ///
    /// Entries that do not follow the naming convention are ignored.
    /// Validity only checks that both files are present.
    pub fn list_backups(&self) -> Result<Vec<BackupInfo>> {
        let root = Path::new(BACKUPS_DIR);
        if !self.backend.exists(root) {
            return Ok(Vec::new());
        }

        let mut backups: Vec<BackupInfo> = self
            .backend
            .list_dir(root)?
            .into_iter()
            .filter_map(|name| self.info_for(&name))
            .collect();

        backups.sort_by(|a, b| {
            (b.timestamp, b.sequence, &b.name).cmp(&(a.timestamp, a.sequence, &a.name))
        });
        Ok(backups)
    }

    fn info_for(&self, name: &str) -> Option<BackupInfo> {
        let parsed = parse_name(name)?;
        let is_valid = self.backend.exists(&backup_file(name, MASTER_KEY_FILE))
            && self.backend.exists(&backup_file(name, SECRETS_FILE));

        Some(BackupInfo {
            name: name.to_string(),
            path: self.backend.location(&backup_dir(name)),
            kind: parsed.kind,
            timestamp: parsed.timestamp,
            is_valid,
            sequence: parsed.sequence,
        })
    }

    // ------------------------------------------------------------------
    // Creating
    // ------------------------------------------------------------------

    /// Snapshot the live store into a new backup of `kind`.
    ///
    /// Holds the store's shared lock so no writer can change the files
    /// while they are copied.
    pub fn create_backup(
        &self,
        store: &SecretStore,
        kind: BackupKind,
        cancel: &CancelToken,
    ) -> Result<BackupInfo> {
        cancel.check()?;
        let _state = store.lock_read()?;
        self.snapshot_live(kind, cancel)
    }

    /// Copy the live key and secrets files into a fresh backup directory.
    ///
    /// The caller must hold the store lock.  On failure the partially
    /// written directory is removed again.
    pub(crate) fn snapshot_live(
        &self,
        kind: BackupKind,
        cancel: &CancelToken,
    ) -> Result<BackupInfo> {
        cancel.check()?;

        let key_bytes = Zeroizing::new(self.backend.read(Path::new(MASTER_KEY_FILE))?);
        let secrets_bytes = if self.backend.exists(Path::new(SECRETS_FILE)) {
            self.backend.read(Path::new(SECRETS_FILE))?
        } else {
            format::encode_secrets(&BTreeMap::new())?
        };

        let name = self.next_name(kind, Utc::now())?;
        let dir = backup_dir(&name);
        self.backend.create_dir_all(&dir)?;

        let written = cancel
            .check()
            .and_then(|()| {
                self.backend
                    .write_atomic(&backup_file(&name, MASTER_KEY_FILE), &key_bytes)
            })
            .and_then(|()| {
                self.backend
                    .write_atomic(&backup_file(&name, SECRETS_FILE), &secrets_bytes)
            });

        if let Err(e) = written {
            if let Err(cleanup) = self.backend.remove_dir_all(&dir) {
                tracing::warn!(
                    backup = %name,
                    error = %cleanup,
                    "failed to remove incomplete backup"
                );
            }
            return Err(e);
        }

        tracing::info!(backup = %name, "backup created");

        self.info_for(&name).ok_or_else(|| {
            StrongboxError::Corruption(format!("backup '{name}' vanished after creation"))
        })
    }

    /// Pick a name that sorts after every existing backup of the same
    /// kind taken in the same second.
    fn next_name(&self, kind: BackupKind, now: DateTime<Utc>) -> Result<String> {
        let base = format_name(kind, now, 0);
        let root = Path::new(BACKUPS_DIR);
        if !self.backend.exists(root) {
            return Ok(base);
        }

        let stamp = now.format(TIMESTAMP_FORMAT).to_string();
        let highest = self
            .backend
            .list_dir(root)?
            .iter()
            .filter_map(|name| parse_name(name).map(|p| (name, p)))
            .filter(|(name, p)| p.kind == kind && name[kind.prefix().len()..].starts_with(&stamp))
            .map(|(_, p)| p.sequence)
            .max();

        Ok(match highest {
            Some(seq) => format_name(kind, now, seq + 1),
            None => base,
        })
    }

    // ------------------------------------------------------------------
    // Restoring
    // ------------------------------------------------------------------

    /// Replace the live store with the contents of a backup.
    ///
    /// An empty `name` selects the newest valid rotate- or manual- backup.
    /// The live state is snapshotted as a `pre-restore-` backup first, the
    /// files are copied over the live ones (key first), and the store's
    /// in-memory state is replaced by the backup's decoded contents.
    /// Afterwards only the newest `PRE_RESTORE_KEEP` pre-restore
    /// snapshots are kept.
    pub fn restore_from_backup(
        &self,
        store: &SecretStore,
        name: &str,
        cancel: &CancelToken,
    ) -> Result<RestoreReport> {
        cancel.check()?;
        let mut state = store.lock_write()?;

        let target = self.select_backup(name)?;
        let restorable = self.read_restorable(&target.name)?;

        let safety = self.snapshot_live(BackupKind::PreRestore, cancel)?;

        cancel.check()?;
        let previous_key = state.master_key.to_file_bytes();
        self.backend
            .write_atomic(Path::new(MASTER_KEY_FILE), &restorable.key_bytes)?;

        if let Err(e) = self
            .backend
            .write_atomic(Path::new(SECRETS_FILE), &restorable.doc)
        {
            // Put the live key back so it matches the live secrets again.
            return match self
                .backend
                .write_atomic(Path::new(MASTER_KEY_FILE), &previous_key)
            {
                Ok(()) => Err(e),
                Err(rollback) => {
                    tracing::error!(
                        backup = %target.name,
                        safety = %safety.name,
                        error = %rollback,
                        "restore left a mismatched key and secrets file"
                    );
                    Err(StrongboxError::Corruption(format!(
                        "restore of '{}' failed half-way ({e}); recover with `restore {}`",
                        target.name, safety.name
                    )))
                }
            };
        }

        // Disk now holds exactly the pair that was decoded above.
        *state = restorable.state;

        tracing::info!(
            backup = %target.name,
            safety = %safety.name,
            secrets = state.secrets.len(),
            "store restored from backup"
        );

        let backups_removed = self.prune(BackupKind::PreRestore, PRE_RESTORE_KEEP);

        Ok(RestoreReport {
            restored_from: target.name,
            safety_backup: safety.name,
            secret_count: state.secrets.len(),
            backups_removed,
        })
    }

    /// Bring back a single secret from the newest backup that holds it.
    ///
    /// The value is decrypted with that backup's own key and re-`put`
    /// under the current master key.  Returns the backup's name.
    pub fn restore_secret(
        &self,
        store: &SecretStore,
        key: &str,
        cancel: &CancelToken,
    ) -> Result<String> {
        if key.is_empty() {
            return Err(StrongboxError::InvalidInput(
                "secret key cannot be empty".into(),
            ));
        }
        cancel.check()?;
        let mut state = store.lock_write()?;

        for info in self.list_backups()?.into_iter().filter(|b| b.is_valid) {
            let (backup_key, secrets) = match self.load_backup(&info.name) {
                Ok(loaded) => loaded,
                Err(e) => {
                    tracing::warn!(backup = %info.name, error = %e, "skipping unreadable backup");
                    continue;
                }
            };

            let Some(secret) = secrets.get(key) else {
                continue;
            };

            let mut plaintext = match open(backup_key.as_bytes(), &secret.ciphertext) {
                Ok(p) => p,
                Err(_) => {
                    tracing::warn!(
                        backup = %info.name,
                        key = %key,
                        "backup copy of secret does not decrypt"
                    );
                    continue;
                }
            };

            let value = Zeroizing::new(
                String::from_utf8(std::mem::take(&mut *plaintext)).map_err(|_| {
                    StrongboxError::SerializationError(format!("secret '{key}' is not valid UTF-8"))
                })?,
            );

            store.put_locked(&mut state, key, &value, cancel)?;
            tracing::info!(backup = %info.name, key = %key, "secret restored from backup");
            return Ok(info.name);
        }

        Err(StrongboxError::SecretNotFound(key.to_string()))
    }

    fn select_backup(&self, name: &str) -> Result<BackupInfo> {
        if name.is_empty() {
            return self
                .list_backups()?
                .into_iter()
                .find(|b| b.is_valid && b.kind != BackupKind::PreRestore)
                .ok_or(StrongboxError::NoValidBackup);
        }

        validate_backup_name(name)?;
        if !self.backend.exists(&backup_dir(name)) {
            return Err(StrongboxError::BackupNotFound(name.to_string()));
        }
        let info = self
            .info_for(name)
            .ok_or_else(|| StrongboxError::BackupNotFound(name.to_string()))?;

        for file in [MASTER_KEY_FILE, SECRETS_FILE] {
            if !self.backend.exists(&backup_file(name, file)) {
                return Err(StrongboxError::InvalidBackup {
                    name: name.to_string(),
                    reason: format!("missing {file}"),
                });
            }
        }
        Ok(info)
    }

    /// Read and validate a backup's files before anything live is touched.
    fn read_restorable(&self, name: &str) -> Result<Restorable> {
        let key_bytes = Zeroizing::new(self.backend.read(&backup_file(name, MASTER_KEY_FILE))?);
        let key = MasterKey::from_file_bytes(&key_bytes).map_err(|e| StrongboxError::InvalidBackup {
            name: name.to_string(),
            reason: e.to_string(),
        })?;

        let data = self.backend.read(&backup_file(name, SECRETS_FILE))?;
        let decoded = format::decode_secrets(&data, &key)
            .map_err(|e| StrongboxError::Corruption(format!("backup '{name}': {e}")))?;

        let doc = if decoded.migrated {
            format::encode_secrets(&decoded.secrets)?
        } else {
            data
        };
        Ok(Restorable {
            key_bytes,
            doc,
            state: StoreState {
                master_key: key,
                secrets: decoded.secrets,
            },
        })
    }

    fn load_backup(&self, name: &str) -> Result<(MasterKey, BTreeMap<String, Secret>)> {
        let key_bytes = Zeroizing::new(self.backend.read(&backup_file(name, MASTER_KEY_FILE))?);
        let key = MasterKey::from_file_bytes(&key_bytes)?;
        let data = self.backend.read(&backup_file(name, SECRETS_FILE))?;
        let decoded = format::decode_secrets(&data, &key)?;
        Ok((key, decoded.secrets))
    }

    // ------------------------------------------------------------------
    // Post-rotation maintenance
    // ------------------------------------------------------------------

    /// Rewrite every backup except `exclude` under `new_key`.
    ///
    /// Each backup is decrypted with `old_key`, or failing that with its
    /// own key file.  A backup that neither key opens is logged and left
    /// untouched; it stays restorable as long as its own key file still
    /// matches its ciphertexts.
    pub(crate) fn reencrypt_backups(
        &self,
        old_key: &MasterKey,
        new_key: &MasterKey,
        exclude: &str,
    ) -> ReencryptSummary {
        let mut summary = ReencryptSummary::default();

        let backups = match self.list_backups() {
            Ok(backups) => backups,
            Err(e) => {
                tracing::warn!(error = %e, "cannot list backups for re-encryption");
                return summary;
            }
        };

        for info in backups.into_iter().filter(|b| b.name != exclude) {
            if !info.is_valid {
                tracing::warn!(
                    backup = %info.name,
                    "skipping incomplete backup during re-encryption"
                );
                summary.skipped.push(info.name);
                continue;
            }

            match self.reencrypt_one(&info.name, old_key, new_key) {
                Ok(()) => summary.reencrypted.push(info.name),
                Err(e) => {
                    tracing::warn!(
                        backup = %info.name,
                        error = %e,
                        "could not re-encrypt backup under the new master key"
                    );
                    summary.skipped.push(info.name);
                }
            }
        }

        summary
    }

    fn reencrypt_one(&self, name: &str, old_key: &MasterKey, new_key: &MasterKey) -> Result<()> {
        let key_path = backup_file(name, MASTER_KEY_FILE);
        let secrets_path = backup_file(name, SECRETS_FILE);

        let own_key = {
            let bytes = Zeroizing::new(self.backend.read(&key_path)?);
            MasterKey::from_file_bytes(&bytes)?
        };
        if own_key == *new_key {
            return Ok(());
        }

        let original = self.backend.read(&secrets_path)?;

        let candidates = if own_key == *old_key {
            vec![old_key]
        } else {
            vec![old_key, &own_key]
        };
        let rewritten = candidates
            .into_iter()
            .find_map(|key| reseal_document(&original, key, new_key).ok())
            .ok_or(StrongboxError::DecryptionFailed)?;

        self.backend.write_atomic(&secrets_path, &rewritten)?;
        if let Err(e) = self
            .backend
            .write_atomic(&key_path, &new_key.to_file_bytes())
        {
            // Keep the pair consistent: put the original ciphertexts back.
            if let Err(undo) = self.backend.write_atomic(&secrets_path, &original) {
                tracing::error!(
                    backup = %name,
                    error = %undo,
                    "backup left with mismatched key and secrets"
                );
            }
            return Err(e);
        }

        tracing::debug!(backup = %name, "backup re-encrypted under new master key");
        Ok(())
    }

    /// Delete all but the newest `keep` rotation backups.
    ///
    /// Failures are logged and skipped.  Returns the removed names.
    pub(crate) fn enforce_retention(&self, keep: usize) -> Vec<String> {
        self.prune(BackupKind::Rotate, keep)
    }

    /// Delete all but the newest `keep` backups of `kind`.
    fn prune(&self, kind: BackupKind, keep: usize) -> Vec<String> {
        let keep = keep.max(1);
        let backups = match self.list_backups() {
            Ok(backups) => backups,
            Err(e) => {
                tracing::warn!(error = %e, "cannot list backups for retention cleanup");
                return Vec::new();
            }
        };

        let mut removed = Vec::new();
        for info in backups
            .into_iter()
            .filter(|b| b.kind == kind)
            .skip(keep)
        {
            match self.backend.remove_dir_all(&backup_dir(&info.name)) {
                Ok(()) => {
                    tracing::debug!(backup = %info.name, "old backup removed");
                    removed.push(info.name);
                }
                Err(e) => {
                    tracing::warn!(
                        backup = %info.name,
                        error = %e,
                        "failed to remove old backup"
                    );
                }
            }
        }
        removed
    }
}

/// Decrypt every secret in `data` with `from` and re-seal it under `to`.
/// Metadata is left exactly as it was in the snapshot.
fn reseal_document(data: &[u8], from: &MasterKey, to: &MasterKey) -> Result<Vec<u8>> {
    let decoded = format::decode_secrets(data, from)?;
    let mut resealed = BTreeMap::new();

    for (name, secret) in decoded.secrets {
        let plaintext = open(from.as_bytes(), &secret.ciphertext)?;
        resealed.insert(
            name,
            Secret {
                ciphertext: seal(to.as_bytes(), &plaintext)?,
                metadata: secret.metadata,
            },
        );
    }

    format::encode_secrets(&resealed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryBackend;

    fn manager_with_dirs(names: &[&str]) -> BackupManager {
        let backend = Arc::new(MemoryBackend::new());
        for name in names {
            backend.create_dir_all(&backup_dir(name)).unwrap();
            backend
                .write(&backup_file(name, MASTER_KEY_FILE), b"k")
                .unwrap();
            backend
                .write(&backup_file(name, SECRETS_FILE), b"{}")
                .unwrap();
        }
        BackupManager::new(backend)
    }

    #[test]
    fn list_is_newest_first_and_ignores_foreign_entries() {
        let manager = manager_with_dirs(&[
            "rotate-20240101-000000",
            "manual-20240301-000000",
            "rotate-20240201-000000",
            "notes",
        ]);

        let names: Vec<String> = manager
            .list_backups()
            .unwrap()
            .into_iter()
            .map(|b| b.name)
            .collect();
        assert_eq!(
            names,
            vec![
                "manual-20240301-000000",
                "rotate-20240201-000000",
                "rotate-20240101-000000",
            ]
        );
    }

    #[test]
    fn same_second_sequence_orders_newest_first() {
        let manager = manager_with_dirs(&[
            "rotate-20240101-000000",
            "rotate-20240101-000000-2",
            "rotate-20240101-000000-1",
        ]);
        let names: Vec<String> = manager
            .list_backups()
            .unwrap()
            .into_iter()
            .map(|b| b.name)
            .collect();
        assert_eq!(
            names,
            vec![
                "rotate-20240101-000000-2",
                "rotate-20240101-000000-1",
                "rotate-20240101-000000",
            ]
        );
    }

    #[test]
    fn missing_backups_dir_lists_nothing() {
        let manager = BackupManager::new(Arc::new(MemoryBackend::new()));
        assert!(manager.list_backups().unwrap().is_empty());
    }

    #[test]
    fn backup_names_with_separators_are_rejected() {
        assert!(validate_backup_name("../etc").is_err());
        assert!(validate_backup_name("a/b").is_err());
        assert!(validate_backup_name("rotate-20240101-000000").is_ok());
    }

    #[test]
    fn pre_restore_pruning_leaves_other_kinds_alone() {
        let manager = manager_with_dirs(&[
            "pre-restore-20240101-000000",
            "pre-restore-20240102-000000",
            "pre-restore-20240103-000000",
            "pre-restore-20240104-000000",
            "rotate-20231201-000000",
            "manual-20231202-000000",
        ]);

        let removed = manager.prune(BackupKind::PreRestore, PRE_RESTORE_KEEP);
        assert_eq!(removed, vec!["pre-restore-20240101-000000"]);
        assert_eq!(manager.list_backups().unwrap().len(), 5);
    }

    #[test]
    fn retention_only_prunes_rotation_backups() {
        let manager = manager_with_dirs(&[
            "rotate-20240101-000000",
            "rotate-20240102-000000",
            "rotate-20240103-000000",
            "manual-20231201-000000",
        ]);

        let removed = manager.enforce_retention(1);
        assert_eq!(
            removed,
            vec!["rotate-20240102-000000", "rotate-20240101-000000"]
        );

        let remaining: Vec<String> = manager
            .list_backups()
            .unwrap()
            .into_iter()
            .map(|b| b.name)
            .collect();
        assert_eq!(
            remaining,
            vec!["rotate-20240103-000000", "manual-20231201-000000"]
        );
    }
}
