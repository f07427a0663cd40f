//! `strongbox backup`: take a manual snapshot of the key and secrets.

use crate::backup::{BackupKind, BackupManager};
use crate::cancel::CancelToken;
use crate::cli::output;
use crate::cli::{open_store, store_dir, Cli};
use crate::errors::Result;

/// Execute the `backup` command.
pub fn execute(cli: &Cli) -> Result<()> {
    let store = open_store(cli)?;
    let manager = BackupManager::for_store(&store);

    let info = manager.create_backup(&store, BackupKind::Manual, &CancelToken::new())?;

    crate::audit::log_audit(&store_dir(cli)?, "backup", None, Some(&info.name));
    output::success(&format!("Backup '{}' created", info.name));
    output::tip("Manual backups are never pruned; remove them yourself when no longer needed.");

    Ok(())
}
