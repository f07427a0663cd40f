//! Integration tests for master-key rotation.

use std::path::Path;
use std::sync::Arc;
use std::thread;

use chrono::Utc;
use strongbox::backup::{BackupKind, BackupManager};
use strongbox::crypto::{generate_key, seal};
use strongbox::rotation::RotationEngine;
use strongbox::storage::{MemoryBackend, StorageBackend};
use strongbox::vault::{SecretStore, MASTER_KEY_FILE, SECRETS_FILE};
use strongbox::{CancelToken, StoreConfig, StrongboxError};

/// Helper: a store on an in-memory backend with a few secrets in it.
fn seeded_store() -> (Arc<MemoryBackend>, SecretStore) {
    let backend = Arc::new(MemoryBackend::new());
    let store = SecretStore::create(backend.clone(), &CancelToken::new()).unwrap();
    for (k, v) in [("db-pass", "hunter2"), ("api-token", "tok_123"), ("empty", "")] {
        store.put(k, v, &CancelToken::new()).unwrap();
    }
    (backend, store)
}

fn read(backend: &MemoryBackend, file: &str) -> Vec<u8> {
    backend.read(Path::new(file)).unwrap()
}

fn ciphertext_of(backend: &MemoryBackend, key: &str) -> String {
    let doc: serde_json::Value = serde_json::from_slice(&read(backend, SECRETS_FILE)).unwrap();
    doc["secrets"][key]["ciphertext"]
        .as_str()
        .unwrap()
        .to_string()
}

fn no_staging_files_left(backend: &MemoryBackend) -> bool {
    backend
        .files()
        .iter()
        .all(|p| !p.to_string_lossy().contains(".rotating"))
}

// ---------------------------------------------------------------------------
// Successful rotation
// ---------------------------------------------------------------------------

#[test]
fn rotation_preserves_values_and_updates_metadata() {
    let (backend, store) = seeded_store();
    let before_meta = store.metadata("db-pass").unwrap();
    let old_key_file = read(&backend, MASTER_KEY_FILE);
    let old_ciphertext = ciphertext_of(&backend, "db-pass");

    let started = Utc::now();
    let report = RotationEngine::with_retention(&store, 1)
        .rotate_master_key(&CancelToken::new())
        .unwrap();
    let finished = Utc::now();

    assert_eq!(report.secrets_rotated, 3);
    assert!(report.backup.starts_with("rotate-"));

    // Same plaintexts, new ciphertexts, new key.
    assert_eq!(store.get("db-pass").unwrap(), "hunter2");
    assert_eq!(store.get("api-token").unwrap(), "tok_123");
    assert_eq!(store.get("empty").unwrap(), "");
    assert_ne!(ciphertext_of(&backend, "db-pass"), old_ciphertext);
    assert_ne!(read(&backend, MASTER_KEY_FILE), old_key_file);

    let meta = store.metadata("db-pass").unwrap();
    assert_eq!(meta.rotation_count, before_meta.rotation_count + 1);
    assert_eq!(meta.modified_at, before_meta.modified_at);
    assert_eq!(meta.created_at, before_meta.created_at);
    let rotated_at = meta.last_rotated_at.expect("last_rotated_at set");
    assert!(rotated_at >= started && rotated_at <= finished);

    // The backup holds the pre-rotation key.
    let backup_key = backend
        .read(&Path::new("backups").join(&report.backup).join(MASTER_KEY_FILE))
        .unwrap();
    assert_eq!(backup_key, old_key_file);

    assert!(no_staging_files_left(&backend));
}

#[test]
fn rotated_store_reopens_from_disk() {
    let (backend, store) = seeded_store();
    RotationEngine::with_retention(&store, 1)
        .rotate_master_key(&CancelToken::new())
        .unwrap();
    drop(store);

    let reopened = SecretStore::open(backend).unwrap();
    assert_eq!(reopened.get("db-pass").unwrap(), "hunter2");
    assert_eq!(reopened.metadata("db-pass").unwrap().rotation_count, 1);
}

#[test]
fn disabled_secrets_are_rotated_too() {
    let (_backend, store) = seeded_store();
    store.disable("api-token", &CancelToken::new()).unwrap();

    RotationEngine::with_retention(&store, 1)
        .rotate_master_key(&CancelToken::new())
        .unwrap();

    let meta = store.metadata("api-token").unwrap();
    assert!(meta.disabled);
    assert_eq!(meta.rotation_count, 1);

    store.enable("api-token", &CancelToken::new()).unwrap();
    assert_eq!(store.get("api-token").unwrap(), "tok_123");
}

#[test]
fn empty_store_rotates() {
    let backend = Arc::new(MemoryBackend::new());
    let store = SecretStore::create(backend.clone(), &CancelToken::new()).unwrap();
    let old_key_file = read(&backend, MASTER_KEY_FILE);

    let report = RotationEngine::with_retention(&store, 1)
        .rotate_master_key(&CancelToken::new())
        .unwrap();

    assert_eq!(report.secrets_rotated, 0);
    assert_ne!(read(&backend, MASTER_KEY_FILE), old_key_file);
}

// ---------------------------------------------------------------------------
// Aborts before commit
// ---------------------------------------------------------------------------

#[test]
fn undecryptable_secret_aborts_without_touching_live_files() {
    let (backend, store) = seeded_store();

    // Swap one ciphertext for one sealed under a different key.
    let mut doc: serde_json::Value =
        serde_json::from_slice(&read(&backend, SECRETS_FILE)).unwrap();
    doc["secrets"]["api-token"]["ciphertext"] =
        serde_json::Value::String(seal(generate_key().as_bytes(), b"x").unwrap());
    backend
        .write(Path::new(SECRETS_FILE), doc.to_string().as_bytes())
        .unwrap();
    store.reload().unwrap();

    let key_before = read(&backend, MASTER_KEY_FILE);
    let secrets_before = read(&backend, SECRETS_FILE);

    let err = RotationEngine::with_retention(&store, 1)
        .rotate_master_key(&CancelToken::new())
        .unwrap_err();

    match err {
        StrongboxError::RotationAborted { phase, reason } => {
            assert_eq!(phase, "decrypting");
            assert!(reason.contains("api-token"));
        }
        other => panic!("expected RotationAborted, got {other:?}"),
    }

    assert_eq!(read(&backend, MASTER_KEY_FILE), key_before);
    assert_eq!(read(&backend, SECRETS_FILE), secrets_before);
    assert_eq!(store.get("db-pass").unwrap(), "hunter2");
    assert!(no_staging_files_left(&backend));
}

#[test]
fn backend_without_atomic_rename_is_refused() {
    let backend = Arc::new(MemoryBackend::without_atomic_rename());
    let store = SecretStore::create(backend.clone(), &CancelToken::new()).unwrap();
    store.put("k", "v", &CancelToken::new()).unwrap();
    let key_before = read(&backend, MASTER_KEY_FILE);

    let err = RotationEngine::with_retention(&store, 1)
        .rotate_master_key(&CancelToken::new())
        .unwrap_err();

    assert!(matches!(err, StrongboxError::RotationAborted { .. }));
    assert_eq!(read(&backend, MASTER_KEY_FILE), key_before);
    assert!(!backend.exists(Path::new("backups")));
}

#[test]
fn cancelled_rotation_changes_nothing() {
    let (backend, store) = seeded_store();
    let key_before = read(&backend, MASTER_KEY_FILE);

    let cancel = CancelToken::new();
    cancel.cancel();
    let err = RotationEngine::with_retention(&store, 1)
        .rotate_master_key(&cancel)
        .unwrap_err();

    assert!(matches!(err, StrongboxError::Cancelled));
    assert_eq!(read(&backend, MASTER_KEY_FILE), key_before);
    assert!(!backend.exists(Path::new("backups")));
}

#[test]
fn pre_restore_label_is_rejected() {
    let (_backend, store) = seeded_store();
    let err = RotationEngine::with_retention(&store, 1)
        .rotate_master_key_labeled(BackupKind::PreRestore, &CancelToken::new())
        .unwrap_err();
    assert!(matches!(err, StrongboxError::InvalidInput(_)));
}

#[test]
fn failed_key_swap_aborts_cleanly() {
    let (backend, store) = seeded_store();
    let key_before = read(&backend, MASTER_KEY_FILE);
    let secrets_before = read(&backend, SECRETS_FILE);

    backend.fail_renames_to(MASTER_KEY_FILE);
    let err = RotationEngine::with_retention(&store, 1)
        .rotate_master_key(&CancelToken::new())
        .unwrap_err();

    assert!(matches!(err, StrongboxError::RotationAborted { .. }));
    assert_eq!(read(&backend, MASTER_KEY_FILE), key_before);
    assert_eq!(read(&backend, SECRETS_FILE), secrets_before);
    assert!(no_staging_files_left(&backend));
    assert_eq!(store.get("db-pass").unwrap(), "hunter2");
}

// ---------------------------------------------------------------------------
// Failures inside the commit
// ---------------------------------------------------------------------------

#[test]
fn failed_secrets_swap_rolls_key_back() {
    let (backend, store) = seeded_store();
    let key_before = read(&backend, MASTER_KEY_FILE);
    let secrets_before = read(&backend, SECRETS_FILE);

    backend.fail_renames_to(SECRETS_FILE);
    let err = RotationEngine::with_retention(&store, 1)
        .rotate_master_key(&CancelToken::new())
        .unwrap_err();

    match err {
        StrongboxError::RotationAborted { phase, .. } => assert_eq!(phase, "committing"),
        other => panic!("expected RotationAborted, got {other:?}"),
    }

    // The old key is back and matches the untouched secrets.
    assert_eq!(read(&backend, MASTER_KEY_FILE), key_before);
    assert_eq!(read(&backend, SECRETS_FILE), secrets_before);
    assert!(no_staging_files_left(&backend));

    backend.clear_failures();
    let reopened = SecretStore::open(backend).unwrap();
    assert_eq!(reopened.get("db-pass").unwrap(), "hunter2");
    assert_eq!(reopened.metadata("db-pass").unwrap().rotation_count, 0);
}

#[test]
fn failed_rollback_reports_partial_commit_and_backup_recovers() {
    let (backend, store) = seeded_store();

    backend.fail_renames_to(SECRETS_FILE);
    backend.fail_writes_to(MASTER_KEY_FILE);
    let err = RotationEngine::with_retention(&store, 1)
        .rotate_master_key(&CancelToken::new())
        .unwrap_err();
    assert!(!err.is_recoverable());
    let rotate_backup = match &err {
        StrongboxError::RotationFailedAfterPartialCommit { backup, .. } => backup.clone(),
        other => panic!("expected RotationFailedAfterPartialCommit, got {other:?}"),
    };
    assert!(rotate_backup.starts_with("rotate-"));

    // The live pair is mismatched now; the rotation backup brings it back.
    backend.clear_failures();
    let manager = BackupManager::for_store(&store);
    let report = manager
        .restore_from_backup(&store, "", &CancelToken::new())
        .unwrap();
    assert_eq!(report.restored_from, rotate_backup);
    assert_eq!(store.get("db-pass").unwrap(), "hunter2");
}

#[test]
fn partial_commit_error_names_the_manual_backup() {
    let (backend, store) = seeded_store();

    backend.fail_renames_to(SECRETS_FILE);
    backend.fail_writes_to(MASTER_KEY_FILE);
    let err = RotationEngine::with_retention(&store, 1)
        .rotate_master_key_labeled(BackupKind::Manual, &CancelToken::new())
        .unwrap_err();

    backend.clear_failures();
    let backups = BackupManager::for_store(&store).list_backups().unwrap();
    assert_eq!(backups.len(), 1);
    let manual = &backups[0].name;
    assert!(manual.starts_with("manual-"));

    match &err {
        StrongboxError::RotationFailedAfterPartialCommit { backup, .. } => {
            assert_eq!(backup, manual)
        }
        other => panic!("expected RotationFailedAfterPartialCommit, got {other:?}"),
    }
    let message = err.to_string();
    assert!(message.contains(manual.as_str()));
    assert!(!message.contains("rotate-"));
}

// ---------------------------------------------------------------------------
// Backups and retention
// ---------------------------------------------------------------------------

#[test]
fn retention_keeps_newest_rotation_backups() {
    let (_backend, store) = seeded_store();
    let engine = RotationEngine::with_retention(&store, 2);
    let manager = BackupManager::for_store(&store);

    let manual = manager
        .create_backup(&store, BackupKind::Manual, &CancelToken::new())
        .unwrap();

    let mut names = Vec::new();
    for _ in 0..3 {
        names.push(engine.rotate_master_key(&CancelToken::new()).unwrap().backup);
    }

    let rotate_backups: Vec<String> = manager
        .list_backups()
        .unwrap()
        .into_iter()
        .filter(|b| b.kind == BackupKind::Rotate)
        .map(|b| b.name)
        .collect();
    assert_eq!(rotate_backups, vec![names[2].clone(), names[1].clone()]);

    // Manual backups are never pruned.
    assert!(manager
        .list_backups()
        .unwrap()
        .iter()
        .any(|b| b.name == manual.name));

    assert_eq!(store.get("db-pass").unwrap(), "hunter2");
    assert_eq!(store.metadata("db-pass").unwrap().rotation_count, 3);
}

#[test]
fn engine_takes_retention_from_config() {
    let (_backend, store) = seeded_store();
    let config = StoreConfig::new("/unused").with_rotation_backup_count(1);
    let engine = RotationEngine::new(&store, &config);

    let first = engine.rotate_master_key(&CancelToken::new()).unwrap();
    let second = engine.rotate_master_key(&CancelToken::new()).unwrap();

    assert_eq!(second.backups_removed, vec![first.backup]);
}

#[test]
fn older_backups_are_reencrypted_under_new_key() {
    let (backend, store) = seeded_store();
    let manager = BackupManager::for_store(&store);
    let manual = manager
        .create_backup(&store, BackupKind::Manual, &CancelToken::new())
        .unwrap();

    let report = RotationEngine::with_retention(&store, 1)
        .rotate_master_key(&CancelToken::new())
        .unwrap();
    assert_eq!(report.backups_reencrypted, vec![manual.name.clone()]);
    assert!(report.backups_skipped.is_empty());

    // The manual backup now carries the live key.
    let manual_key = backend
        .read(&Path::new("backups").join(&manual.name).join(MASTER_KEY_FILE))
        .unwrap();
    assert_eq!(manual_key, read(&backend, MASTER_KEY_FILE));
}

#[test]
fn manual_label_is_exempt_from_retention() {
    let (_backend, store) = seeded_store();
    let engine = RotationEngine::with_retention(&store, 1);

    let manual = engine
        .rotate_master_key_labeled(BackupKind::Manual, &CancelToken::new())
        .unwrap();
    assert!(manual.backup.starts_with("manual-"));

    engine.rotate_master_key(&CancelToken::new()).unwrap();
    engine.rotate_master_key(&CancelToken::new()).unwrap();

    let names: Vec<String> = BackupManager::for_store(&store)
        .list_backups()
        .unwrap()
        .into_iter()
        .map(|b| b.name)
        .collect();
    assert!(names.contains(&manual.backup));
    assert_eq!(names.iter().filter(|n| n.starts_with("rotate-")).count(), 1);
}

// ---------------------------------------------------------------------------
// Concurrency
// ---------------------------------------------------------------------------

#[test]
fn rotation_serializes_with_concurrent_writers() {
    let (_backend, store) = seeded_store();
    let store = Arc::new(store);

    let writers: Vec<_> = (0..4)
        .map(|t| {
            let store = Arc::clone(&store);
            thread::spawn(move || {
                for i in 0..10 {
                    store
                        .put(&format!("w{t}-{i}"), &format!("{t}:{i}"), &CancelToken::new())
                        .unwrap();
                }
            })
        })
        .collect();

    for _ in 0..2 {
        RotationEngine::with_retention(&store, 1)
            .rotate_master_key(&CancelToken::new())
            .unwrap();
    }

    for writer in writers {
        writer.join().unwrap();
    }

    // Every secret decrypts under whatever key ended up live.
    for t in 0..4 {
        for i in 0..10 {
            assert_eq!(store.get(&format!("w{t}-{i}")).unwrap(), format!("{t}:{i}"));
        }
    }
    assert_eq!(store.get("db-pass").unwrap(), "hunter2");
}
