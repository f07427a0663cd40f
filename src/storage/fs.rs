//! Filesystem storage backend.
//!
//! Atomic writes go to a temp file in the same directory as the target,
//! are flushed with `sync_all`, and are then renamed over the target.
//! The temp file is in the same directory so the rename never crosses a
//! filesystem boundary.
//!
//! On Unix, directories are created `0700` and files `0600`.

use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::errors::{Result, StrongboxError};

use super::StorageBackend;

/// A backend rooted at a directory on the local filesystem.
#[derive(Debug, Clone)]
pub struct FsBackend {
    root: PathBuf,
}

impl FsBackend {
    /// Create a backend rooted at `root`. The directory is not created
    /// until something is written.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// The store directory this backend is rooted at.
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn full(&self, path: &Path) -> PathBuf {
        self.root.join(path)
    }

    /// Temp path next to `path`: `<dir>/.<name>.tmp`.
    fn temp_path(full: &Path) -> PathBuf {
        let parent = full.parent().unwrap_or(Path::new("."));
        parent.join(format!(
            ".{}.tmp",
            full.file_name().unwrap_or_default().to_string_lossy()
        ))
    }

    fn write_file(full: &Path, data: &[u8]) -> std::io::Result<()> {
        let mut options = OpenOptions::new();
        options.write(true).create(true).truncate(true);

        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(0o600);
        }

        let mut file = options.open(full)?;
        file.write_all(data)?;
        file.sync_all()?;
        Ok(())
    }

    fn restrict_dir(full: &Path) -> std::io::Result<()> {
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(full, fs::Permissions::from_mode(0o700))?;
        }
        #[cfg(not(unix))]
        let _ = full;
        Ok(())
    }

    /// Flush a rename to disk by syncing the containing directory.
    fn sync_parent(full: &Path) {
        #[cfg(unix)]
        if let Some(parent) = full.parent() {
            if let Ok(dir) = File::open(parent) {
                let _ = dir.sync_all();
            }
        }
        #[cfg(not(unix))]
        let _ = full;
    }
}

impl StorageBackend for FsBackend {
    fn read(&self, path: &Path) -> Result<Vec<u8>> {
        let full = self.full(path);
        fs::read(&full).map_err(|e| StrongboxError::io(format!("read {}", full.display()), e))
    }

    fn write(&self, path: &Path, data: &[u8]) -> Result<()> {
        let full = self.full(path);
        Self::write_file(&full, data)
            .map_err(|e| StrongboxError::io(format!("write {}", full.display()), e))
    }

    fn write_atomic(&self, path: &Path, data: &[u8]) -> Result<()> {
        let full = self.full(path);
        let tmp = Self::temp_path(&full);

        if let Err(e) = Self::write_file(&tmp, data) {
            let _ = fs::remove_file(&tmp);
            return Err(StrongboxError::io(format!("write {}", tmp.display()), e));
        }

        if let Err(e) = fs::rename(&tmp, &full) {
            let _ = fs::remove_file(&tmp);
            return Err(StrongboxError::io(
                format!("rename into {}", full.display()),
                e,
            ));
        }

        Self::sync_parent(&full);
        Ok(())
    }

    fn rename(&self, from: &Path, to: &Path) -> Result<()> {
        let from_full = self.full(from);
        let to_full = self.full(to);
        fs::rename(&from_full, &to_full).map_err(|e| {
            StrongboxError::io(
                format!("rename {} -> {}", from_full.display(), to_full.display()),
                e,
            )
        })?;
        Self::sync_parent(&to_full);
        Ok(())
    }

    fn remove_file(&self, path: &Path) -> Result<()> {
        let full = self.full(path);
        fs::remove_file(&full)
            .map_err(|e| StrongboxError::io(format!("remove {}", full.display()), e))
    }

    fn remove_dir_all(&self, path: &Path) -> Result<()> {
        let full = self.full(path);
        fs::remove_dir_all(&full)
            .map_err(|e| StrongboxError::io(format!("remove {}", full.display()), e))
    }

    fn create_dir_all(&self, path: &Path) -> Result<()> {
        let full = self.full(path);
        fs::create_dir_all(&full)
            .and_then(|()| Self::restrict_dir(&full))
            .map_err(|e| StrongboxError::io(format!("create {}", full.display()), e))
    }

    fn exists(&self, path: &Path) -> bool {
        self.full(path).exists()
    }

    fn list_dir(&self, path: &Path) -> Result<Vec<String>> {
        let full = self.full(path);
        let entries = fs::read_dir(&full)
            .map_err(|e| StrongboxError::io(format!("list {}", full.display()), e))?;

        let mut names = Vec::new();
        for entry in entries {
            let entry =
                entry.map_err(|e| StrongboxError::io(format!("list {}", full.display()), e))?;
            names.push(entry.file_name().to_string_lossy().into_owned());
        }
        names.sort();
        Ok(names)
    }

    fn location(&self, path: &Path) -> PathBuf {
        self.full(path)
    }
}
