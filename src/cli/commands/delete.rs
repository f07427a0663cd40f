//! `strongbox delete`: remove a secret from the store.

use dialoguer::Confirm;

use crate::cancel::CancelToken;
use crate::cli::output;
use crate::cli::{open_store, store_dir, validate_key, Cli};
use crate::errors::{Result, StrongboxError};

/// Execute the `delete` command.
pub fn execute(cli: &Cli, key: &str, force: bool) -> Result<()> {
    validate_key(key)?;
    let store = open_store(cli)?;

    // Check first so a typo doesn't get a confirmation prompt.
    if !store.contains(key)? {
        return Err(StrongboxError::SecretNotFound(key.to_string()));
    }

    // Unless --force is set, ask for confirmation before deleting.
    if !force {
        let confirmed = Confirm::new()
            .with_prompt(format!("Delete secret '{key}'?"))
            .default(false)
            .interact()
            .map_err(|e| StrongboxError::CommandFailed(format!("confirm prompt: {e}")))?;

        if !confirmed {
            output::info("Cancelled.");
            return Ok(());
        }
    }

    store.delete(key, &CancelToken::new())?;

    crate::audit::log_audit(&store_dir(cli)?, "delete", Some(key), None);
    output::success(&format!("Deleted secret '{key}'"));
    output::tip("Run `strongbox restore-secret <KEY>` to bring it back from a backup.");

    Ok(())
}
