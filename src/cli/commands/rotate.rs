//! `strongbox rotate-key`: replace the master key.
//!
//! Backs up the key and secrets, re-encrypts every secret under a fresh
//! key, swaps the files, then rewrites older backups under the new key
//! and prunes rotation backups beyond the configured count.

use crate::backup::BackupKind;
use crate::cancel::CancelToken;
use crate::cli::output;
use crate::cli::{open_store, store_config, Cli};
use crate::errors::Result;
use crate::rotation::RotationEngine;

/// Execute the `rotate-key` command.
pub fn execute(cli: &Cli, manual: bool) -> Result<()> {
    let config = store_config(cli)?;
    let store = open_store(cli)?;

    let label = if manual {
        BackupKind::Manual
    } else {
        BackupKind::Rotate
    };

    let engine = RotationEngine::new(&store, &config);
    let report = engine.rotate_master_key_labeled(label, &CancelToken::new())?;

    crate::audit::log_audit(
        &config.root,
        "rotate-key",
        None,
        Some(&format!(
            "{} secrets re-encrypted, backup {}",
            report.secrets_rotated, report.backup
        )),
    );

    output::success(&format!(
        "Master key rotated ({} secrets re-encrypted)",
        report.secrets_rotated
    ));
    output::info(&format!("Previous key and secrets saved as '{}'", report.backup));

    if !report.backups_reencrypted.is_empty() {
        output::info(&format!(
            "{} older backup(s) re-encrypted under the new key",
            report.backups_reencrypted.len()
        ));
    }
    for name in &report.backups_skipped {
        output::warning(&format!(
            "Backup '{name}' could not be re-encrypted and was left under its own key"
        ));
    }
    if !report.backups_removed.is_empty() {
        output::info(&format!(
            "Removed old rotation backup(s): {}",
            report.backups_removed.join(", ")
        ));
    }

    Ok(())
}
