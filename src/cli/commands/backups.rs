//! `strongbox backups`: list backups, newest first.

use crate::backup::BackupManager;
use crate::cli::output;
use crate::cli::{open_store, Cli};
use crate::errors::Result;

/// Execute the `backups` command.
pub fn execute(cli: &Cli) -> Result<()> {
    let store = open_store(cli)?;
    let backups = BackupManager::for_store(&store).list_backups()?;

    if backups.is_empty() {
        output::info("No backups yet.");
        output::tip("Run `strongbox backup` or `strongbox rotate-key` to create one.");
        return Ok(());
    }

    output::info(&format!("{} backup(s)", backups.len()));
    output::print_backups_table(&backups);

    Ok(())
}
