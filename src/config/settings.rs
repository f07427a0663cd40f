use std::path::{Path, PathBuf};

use serde::Deserialize;
use serde_json::Value;

use crate::errors::{Result, StrongboxError};

/// Number of rotation backups kept when `config.json` does not say otherwise.
pub const DEFAULT_ROTATION_BACKUP_COUNT: usize = 1;

/// Store-level configuration, loaded from `<store>/config.json`.
///
/// Every field has a sensible default so Strongbox works out-of-the-box
/// without any config file at all.
#[derive(Debug, Clone)]
pub struct Settings {
    /// How many `rotate-` backups to keep after a rotation.
    pub rotation_backup_count: usize,
}

/// Raw shape of `config.json`. Values are validated by hand so that a bad
/// retention count falls back to the default instead of failing the load.
#[derive(Debug, Default, Deserialize)]
struct RawSettings {
    #[serde(default)]
    rotation_backup_count: Option<Value>,
}

// ── Implementation ───────────────────────────────────────────────────

impl Default for Settings {
    fn default() -> Self {
        Self {
            rotation_backup_count: DEFAULT_ROTATION_BACKUP_COUNT,
        }
    }
}

impl Settings {
    /// Name of the config file we look for in the store directory.
    pub const FILE_NAME: &'static str = "config.json";

    /// Load settings from `<store_dir>/config.json`.
    ///
    /// If the file does not exist, defaults are returned.
    /// If the file exists but is not JSON, an error is returned.
    /// A missing, non-integer or non-positive `rotation_backup_count`
    /// falls back to the default.
    pub fn load(store_dir: &Path) -> Result<Self> {
        let config_path = store_dir.join(Self::FILE_NAME);

        if !config_path.exists() {
            return Ok(Self::default());
        }

        let contents = std::fs::read_to_string(&config_path)
            .map_err(|e| StrongboxError::io(format!("read {}", config_path.display()), e))?;

        Self::from_json(&contents).map_err(|e| {
            StrongboxError::ConfigError(format!("Failed to parse {}: {e}", config_path.display()))
        })
    }

    fn from_json(contents: &str) -> std::result::Result<Self, serde_json::Error> {
        let raw: RawSettings = serde_json::from_str(contents)?;

        let rotation_backup_count = match raw.rotation_backup_count {
            None => DEFAULT_ROTATION_BACKUP_COUNT,
            Some(value) => match value.as_u64().and_then(|n| usize::try_from(n).ok()) {
                Some(n) if n > 0 => n,
                _ => {
                    tracing::warn!(
                        value = %value,
                        "invalid rotation_backup_count in config.json, using default"
                    );
                    DEFAULT_ROTATION_BACKUP_COUNT
                }
            },
        };

        Ok(Self {
            rotation_backup_count,
        })
    }
}

/// Explicit configuration handed to the store, rotation engine and
/// backup manager.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// The store directory holding `master.key`, `secrets.json` and `backups/`.
    pub root: PathBuf,

    /// How many `rotate-` backups survive retention cleanup.
    pub rotation_backup_count: usize,
}

impl StoreConfig {
    /// Configuration for `root` with default settings.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            rotation_backup_count: DEFAULT_ROTATION_BACKUP_COUNT,
        }
    }

    /// Configuration for `root`, reading `config.json` if present.
    pub fn load(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        let settings = Settings::load(&root)?;
        Ok(Self {
            root,
            rotation_backup_count: settings.rotation_backup_count,
        })
    }

    /// Override the retention count. Zero is treated as the default.
    pub fn with_rotation_backup_count(mut self, count: usize) -> Self {
        self.rotation_backup_count = if count == 0 {
            DEFAULT_ROTATION_BACKUP_COUNT
        } else {
            count
        };
        self
    }
}

// ── Tests ────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn default_settings_are_sensible() {
        let s = Settings::default();
        assert_eq!(s.rotation_backup_count, 1);
    }

    #[test]
    fn load_returns_defaults_when_no_config_file() {
        let tmp = TempDir::new().unwrap();
        let settings = Settings::load(tmp.path()).unwrap();
        assert_eq!(settings.rotation_backup_count, 1);
    }

    #[test]
    fn load_parses_json_file() {
        let tmp = TempDir::new().unwrap();
        fs::write(
            tmp.path().join("config.json"),
            r#"{ "rotation_backup_count": 5 }"#,
        )
        .unwrap();

        let settings = Settings::load(tmp.path()).unwrap();
        assert_eq!(settings.rotation_backup_count, 5);
    }

    #[test]
    fn invalid_counts_fall_back_to_default() {
        for body in [
            r#"{ "rotation_backup_count": 0 }"#,
            r#"{ "rotation_backup_count": -3 }"#,
            r#"{ "rotation_backup_count": "three" }"#,
            r#"{ "rotation_backup_count": 2.5 }"#,
            r#"{}"#,
        ] {
            let settings = Settings::from_json(body).unwrap();
            assert_eq!(settings.rotation_backup_count, 1, "body: {body}");
        }
    }

    #[test]
    fn load_errors_on_invalid_json() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("config.json"), "not json {{").unwrap();

        let result = Settings::load(tmp.path());
        assert!(matches!(result, Err(StrongboxError::ConfigError(_))));
    }

    #[test]
    fn store_config_reads_settings() {
        let tmp = TempDir::new().unwrap();
        fs::write(
            tmp.path().join("config.json"),
            r#"{ "rotation_backup_count": 3 }"#,
        )
        .unwrap();

        let config = StoreConfig::load(tmp.path()).unwrap();
        assert_eq!(config.root, tmp.path());
        assert_eq!(config.rotation_backup_count, 3);
    }

    #[test]
    fn zero_override_keeps_default() {
        let config = StoreConfig::new("/tmp/x").with_rotation_backup_count(0);
        assert_eq!(config.rotation_backup_count, 1);
    }
}
