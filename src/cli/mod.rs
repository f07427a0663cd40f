//! CLI module: Clap argument parser, output helpers, and command implementations.

pub mod commands;
pub mod output;

use std::path::PathBuf;

use clap::Parser;

use crate::config::StoreConfig;
use crate::errors::{Result, StrongboxError};
use crate::vault::{SecretStore, MASTER_KEY_FILE};

/// Longest key name the CLI accepts.
const MAX_KEY_LEN: usize = 256;

/// Strongbox CLI: local encrypted secret store.
#[derive(Parser)]
#[command(name = "strongbox", about = "Local encrypted secret store", version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Store directory (default: ~/.strongbox)
    #[arg(long, env = "STRONGBOX_DIR", global = true)]
    pub store_dir: Option<PathBuf>,
}

/// All available subcommands.
#[derive(clap::Subcommand)]
pub enum Commands {
    /// Initialize a new store with a fresh master key
    Init,

    /// Set a secret (add or update)
    Set {
        /// Secret name (e.g. db-pass)
        key: String,
        /// Secret value (omit for interactive prompt or piped stdin)
        value: Option<String>,
    },

    /// Get a secret's value
    Get {
        /// Secret name
        key: String,
    },

    /// Delete a secret
    Delete {
        /// Secret name
        key: String,
        /// Skip confirmation prompt
        #[arg(short, long)]
        force: bool,
    },

    /// List secrets (enabled ones by default)
    List {
        /// Show disabled secrets instead
        #[arg(long)]
        disabled: bool,
    },

    /// Make a disabled secret retrievable again
    Enable {
        /// Secret name
        key: String,
    },

    /// Hide a secret from `get` and `list` without deleting it
    Disable {
        /// Secret name
        key: String,
    },

    /// Generate a random secret value and store it
    Generate {
        /// Secret name
        key: String,
        /// Number of characters
        #[arg(short, long, default_value = "32")]
        length: usize,
    },

    /// Replace the master key and re-encrypt every secret
    RotateKey {
        /// Label the pre-rotation backup `manual-` (exempt from retention)
        #[arg(long)]
        manual: bool,
    },

    /// Take a manual backup of the key and secrets
    Backup,

    /// List backups, newest first
    Backups,

    /// Restore the whole store from a backup (default: newest valid one)
    Restore {
        /// Backup name, e.g. rotate-20240309-140559
        name: Option<String>,
        /// Skip confirmation prompt
        #[arg(short, long)]
        force: bool,
    },

    /// Bring back a single secret from the newest backup holding it
    RestoreSecret {
        /// Secret name
        key: String,
    },

    /// View the audit log of store operations
    Audit {
        /// Number of entries to show (default: 50)
        #[arg(long, default_value = "50")]
        last: usize,
        /// Show entries since a duration ago (e.g. 7d, 24h, 30m)
        #[arg(long)]
        since: Option<String>,
    },
}

// ---------------------------------------------------------------------------
// Shared helpers used by multiple commands
// ---------------------------------------------------------------------------

/// Resolve the store directory: `--store-dir` / `STRONGBOX_DIR`, else `~/.strongbox`.
pub fn store_dir(cli: &Cli) -> Result<PathBuf> {
    if let Some(dir) = &cli.store_dir {
        return Ok(dir.clone());
    }
    let home = dirs::home_dir().ok_or_else(|| {
        StrongboxError::ConfigError("cannot determine home directory; pass --store-dir".into())
    })?;
    Ok(home.join(".strongbox"))
}

/// Load the store configuration (`<store>/config.json`) for the CLI's store.
pub fn store_config(cli: &Cli) -> Result<StoreConfig> {
    StoreConfig::load(store_dir(cli)?)
}

/// Open the existing store, with a friendly error if it was never initialized.
pub fn open_store(cli: &Cli) -> Result<SecretStore> {
    let dir = store_dir(cli)?;
    if !dir.join(MASTER_KEY_FILE).exists() {
        return Err(StrongboxError::StoreNotInitialized(dir));
    }
    SecretStore::open_dir(dir)
}

/// Validate a secret key before it reaches the store.
///
/// Keys become JSON map keys and appear in audit rows and terminal
/// output, so path separators, traversal sequences and control
/// characters are rejected here.
pub fn validate_key(key: &str) -> Result<()> {
    if key.is_empty() {
        return Err(StrongboxError::InvalidInput(
            "secret key cannot be empty".into(),
        ));
    }

    if key.len() > MAX_KEY_LEN {
        return Err(StrongboxError::InvalidInput(format!(
            "secret key cannot exceed {MAX_KEY_LEN} bytes"
        )));
    }

    if key.contains('/') || key.contains('\\') {
        return Err(StrongboxError::InvalidInput(format!(
            "secret key '{key}' cannot contain path separators"
        )));
    }

    if key.contains("..") {
        return Err(StrongboxError::InvalidInput(format!(
            "secret key '{key}' cannot contain '..'"
        )));
    }

    if key.chars().any(char::is_control) {
        return Err(StrongboxError::InvalidInput(format!(
            "secret key '{}' cannot contain control characters",
            key.escape_debug()
        )));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_keys() {
        assert!(validate_key("db-pass").is_ok());
        assert!(validate_key("API_TOKEN").is_ok());
        assert!(validate_key("service.prod.password").is_ok());
        assert!(validate_key("user@example.com").is_ok());
    }

    #[test]
    fn rejects_empty_key() {
        assert!(validate_key("").is_err());
    }

    #[test]
    fn rejects_path_separators() {
        assert!(validate_key("a/b").is_err());
        assert!(validate_key("a\\b").is_err());
    }

    #[test]
    fn rejects_traversal() {
        assert!(validate_key("..").is_err());
        assert!(validate_key("x..y").is_err());
    }

    #[test]
    fn rejects_control_chars() {
        assert!(validate_key("a\nb").is_err());
        assert!(validate_key("tab\there").is_err());
        assert!(validate_key("nul\0").is_err());
    }

    #[test]
    fn rejects_too_long_key() {
        assert!(validate_key(&"k".repeat(MAX_KEY_LEN)).is_ok());
        assert!(validate_key(&"k".repeat(MAX_KEY_LEN + 1)).is_err());
    }

    #[test]
    fn explicit_store_dir_wins() {
        let cli = Cli::parse_from(["strongbox", "--store-dir", "/tmp/sb", "list"]);
        assert_eq!(store_dir(&cli).unwrap(), PathBuf::from("/tmp/sb"));
    }
}
