//! In-memory storage backend for tests.
//!
//! Honours the same contract as `FsBackend` (writes need an existing
//! parent directory, renames replace atomically) and can be told to fail
//! specific writes or renames to simulate a crash mid-commit.

use std::collections::{BTreeMap, BTreeSet};
use std::io;
use std::path::{Component, Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use crate::errors::{Result, StrongboxError};

use super::StorageBackend;

#[derive(Debug, Default)]
struct Inner {
    files: BTreeMap<PathBuf, Vec<u8>>,
    dirs: BTreeSet<PathBuf>,
    fail_writes: BTreeSet<PathBuf>,
    fail_renames: BTreeSet<PathBuf>,
}

/// A backend that keeps every file in a mutex-guarded map.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    inner: Mutex<Inner>,
    non_atomic: bool,
}

/// Strip `.` components so `./a` and `a` name the same entry.
fn normalize(path: &Path) -> PathBuf {
    path.components()
        .filter(|c| !matches!(c, Component::CurDir))
        .collect()
}

fn parent_of(path: &Path) -> PathBuf {
    path.parent().map(Path::to_path_buf).unwrap_or_default()
}

fn not_found(op: &str, path: &Path) -> StrongboxError {
    StrongboxError::io(
        format!("{op} {}", path.display()),
        io::Error::new(io::ErrorKind::NotFound, "no such file or directory"),
    )
}

fn injected(op: &str, path: &Path) -> StrongboxError {
    StrongboxError::io(
        format!("{op} {}", path.display()),
        io::Error::new(io::ErrorKind::Other, "injected failure"),
    )
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// A backend that reports it cannot rename atomically.
    pub fn without_atomic_rename() -> Self {
        Self {
            non_atomic: true,
            ..Self::default()
        }
    }

    /// Make every write (plain or atomic) targeting `path` fail.
    pub fn fail_writes_to(&self, path: impl AsRef<Path>) {
        if let Ok(mut inner) = self.inner.lock() {
            inner.fail_writes.insert(normalize(path.as_ref()));
        }
    }

    /// Make every rename whose destination is `path` fail.
    pub fn fail_renames_to(&self, path: impl AsRef<Path>) {
        if let Ok(mut inner) = self.inner.lock() {
            inner.fail_renames.insert(normalize(path.as_ref()));
        }
    }

    /// Remove all injected failures.
    pub fn clear_failures(&self) {
        if let Ok(mut inner) = self.inner.lock() {
            inner.fail_writes.clear();
            inner.fail_renames.clear();
        }
    }

    /// Every file path currently stored, sorted.
    pub fn files(&self) -> Vec<PathBuf> {
        self.inner
            .lock()
            .map(|inner| inner.files.keys().cloned().collect())
            .unwrap_or_default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, Inner>> {
        self.inner.lock().map_err(|_| StrongboxError::LockPoisoned)
    }
}

impl Inner {
    fn dir_exists(&self, dir: &Path) -> bool {
        dir.as_os_str().is_empty() || self.dirs.contains(dir)
    }
}

impl StorageBackend for MemoryBackend {
    fn read(&self, path: &Path) -> Result<Vec<u8>> {
        let path = normalize(path);
        let inner = self.lock()?;
        inner
            .files
            .get(&path)
            .cloned()
            .ok_or_else(|| not_found("read", &path))
    }

    fn write(&self, path: &Path, data: &[u8]) -> Result<()> {
        let path = normalize(path);
        let mut inner = self.lock()?;
        if inner.fail_writes.contains(&path) {
            return Err(injected("write", &path));
        }
        if !inner.dir_exists(&parent_of(&path)) {
            return Err(not_found("write", &path));
        }
        inner.files.insert(path, data.to_vec());
        Ok(())
    }

    fn write_atomic(&self, path: &Path, data: &[u8]) -> Result<()> {
        // A single insert under the mutex is already all-or-nothing.
        self.write(path, data)
    }

    fn rename(&self, from: &Path, to: &Path) -> Result<()> {
        let from = normalize(from);
        let to = normalize(to);
        let mut inner = self.lock()?;
        if inner.fail_renames.contains(&to) {
            return Err(injected("rename into", &to));
        }
        if !inner.dir_exists(&parent_of(&to)) {
            return Err(not_found("rename into", &to));
        }
        let data = inner
            .files
            .remove(&from)
            .ok_or_else(|| not_found("rename", &from))?;
        inner.files.insert(to, data);
        Ok(())
    }

    fn remove_file(&self, path: &Path) -> Result<()> {
        let path = normalize(path);
        let mut inner = self.lock()?;
        inner
            .files
            .remove(&path)
            .map(|_| ())
            .ok_or_else(|| not_found("remove", &path))
    }

    fn remove_dir_all(&self, path: &Path) -> Result<()> {
        let path = normalize(path);
        let mut inner = self.lock()?;
        if !inner.dirs.contains(&path) {
            return Err(not_found("remove", &path));
        }
        inner.files.retain(|p, _| !p.starts_with(&path));
        inner.dirs.retain(|d| !d.starts_with(&path));
        Ok(())
    }

    fn create_dir_all(&self, path: &Path) -> Result<()> {
        let path = normalize(path);
        let mut inner = self.lock()?;
        if inner.files.contains_key(&path) {
            return Err(StrongboxError::io(
                format!("create {}", path.display()),
                io::Error::new(io::ErrorKind::AlreadyExists, "a file exists at this path"),
            ));
        }
        for ancestor in path.ancestors() {
            if ancestor.as_os_str().is_empty() {
                break;
            }
            inner.dirs.insert(ancestor.to_path_buf());
        }
        Ok(())
    }

    fn exists(&self, path: &Path) -> bool {
        let path = normalize(path);
        match self.inner.lock() {
            Ok(inner) => inner.files.contains_key(&path) || inner.dir_exists(&path),
            Err(_) => false,
        }
    }

    fn list_dir(&self, path: &Path) -> Result<Vec<String>> {
        let path = normalize(path);
        let inner = self.lock()?;
        if !inner.dir_exists(&path) {
            return Err(not_found("list", &path));
        }

        let children = inner
            .files
            .keys()
            .chain(inner.dirs.iter())
            .filter(|p| p.parent() == Some(path.as_path()))
            .filter_map(|p| p.file_name())
            .map(|name| name.to_string_lossy().into_owned())
            .collect::<BTreeSet<_>>();

        Ok(children.into_iter().collect())
    }

    fn location(&self, path: &Path) -> PathBuf {
        normalize(path)
    }

    fn supports_atomic_rename(&self) -> bool {
        !self.non_atomic
    }
}
