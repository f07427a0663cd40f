//! `strongbox restore`: replace the store with the contents of a backup.

use dialoguer::Confirm;

use crate::backup::BackupManager;
use crate::cancel::CancelToken;
use crate::cli::output;
use crate::cli::{open_store, store_dir, Cli};
use crate::errors::{Result, StrongboxError};

/// Execute the `restore` command.
///
/// Without a name, the newest valid `rotate-` or `manual-` backup is used.
pub fn execute(cli: &Cli, name: Option<&str>, force: bool) -> Result<()> {
    let store = open_store(cli)?;
    let manager = BackupManager::for_store(&store);

    if !force {
        let target = name.unwrap_or("the newest valid backup");
        let confirmed = Confirm::new()
            .with_prompt(format!(
                "Replace all current secrets with {target}? (a pre-restore backup is taken first)"
            ))
            .default(false)
            .interact()
            .map_err(|e| StrongboxError::CommandFailed(format!("confirm prompt: {e}")))?;

        if !confirmed {
            output::info("Cancelled.");
            return Ok(());
        }
    }

    let report = manager.restore_from_backup(&store, name.unwrap_or(""), &CancelToken::new())?;

    crate::audit::log_audit(
        &store_dir(cli)?,
        "restore",
        None,
        Some(&format!(
            "from {}, safety backup {}",
            report.restored_from, report.safety_backup
        )),
    );

    output::success(&format!(
        "Restored {} secret(s) from '{}'",
        report.secret_count, report.restored_from
    ));
    output::tip(&format!(
        "Previous state saved as '{}'; run `strongbox restore {}` to undo.",
        report.safety_backup, report.safety_backup
    ));
    if !report.backups_removed.is_empty() {
        output::info(&format!(
            "Removed old pre-restore backup(s): {}",
            report.backups_removed.join(", ")
        ));
    }

    Ok(())
}
