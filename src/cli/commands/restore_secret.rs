//! `strongbox restore-secret`: bring back one secret from the backups.

use crate::backup::BackupManager;
use crate::cancel::CancelToken;
use crate::cli::output;
use crate::cli::{open_store, store_dir, validate_key, Cli};
use crate::errors::Result;

/// Execute the `restore-secret` command.
pub fn execute(cli: &Cli, key: &str) -> Result<()> {
    validate_key(key)?;
    let store = open_store(cli)?;

    let from = BackupManager::for_store(&store).restore_secret(&store, key, &CancelToken::new())?;

    crate::audit::log_audit(&store_dir(cli)?, "restore-secret", Some(key), Some(&from));
    output::success(&format!("Secret '{key}' restored from '{from}'"));

    Ok(())
}
