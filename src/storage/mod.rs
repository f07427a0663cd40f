//! Storage backends: durable persistence of named blobs.
//!
//! All paths are relative to the backend's root (the store directory).
//! Both implementations honour the same contract:
//! - `write_atomic` leaves either the old complete file or the new
//!   complete file behind, never a partial one.
//! - `write` requires the parent directory to exist.
//! - `create_dir_all` is idempotent.

pub mod fs;
pub mod memory;

use std::fmt::Debug;
use std::path::{Path, PathBuf};

use crate::errors::Result;

pub use self::fs::FsBackend;
pub use self::memory::MemoryBackend;

/// Durable key-value persistence of arbitrary named blobs.
pub trait StorageBackend: Debug + Send + Sync {
    /// Read the full contents of a file.
    fn read(&self, path: &Path) -> Result<Vec<u8>>;

    /// Write a file in place. Only used for staging files that are
    /// renamed into place afterwards.
    fn write(&self, path: &Path, data: &[u8]) -> Result<()>;

    /// Write a file via temp-file + rename.
    fn write_atomic(&self, path: &Path, data: &[u8]) -> Result<()>;

    /// Atomically replace `to` with `from`.
    fn rename(&self, from: &Path, to: &Path) -> Result<()>;

    fn remove_file(&self, path: &Path) -> Result<()>;

    /// Remove a directory and everything below it.
    fn remove_dir_all(&self, path: &Path) -> Result<()>;

    fn create_dir_all(&self, path: &Path) -> Result<()>;

    fn exists(&self, path: &Path) -> bool;

    /// Names of the direct children of a directory, sorted.
    fn list_dir(&self, path: &Path) -> Result<Vec<String>>;

    /// Human-readable location of `path`, for messages and `BackupInfo`.
    fn location(&self, path: &Path) -> PathBuf;

    /// Whether `rename` replaces its target atomically on this backend.
    ///
    /// Rotation refuses to run when this is `false`.
    fn supports_atomic_rename(&self) -> bool {
        true
    }
}
