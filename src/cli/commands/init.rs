//! `strongbox init`: create a new store with a fresh master key.

use crate::cancel::CancelToken;
use crate::cli::output;
use crate::cli::{store_dir, Cli};
use crate::errors::{Result, StrongboxError};
use crate::vault::{SecretStore, MASTER_KEY_FILE};

/// Execute the `init` command.
pub fn execute(cli: &Cli) -> Result<()> {
    let dir = store_dir(cli)?;

    // 1. Refuse to overwrite an existing key.
    let key_path = dir.join(MASTER_KEY_FILE);
    if key_path.exists() {
        output::tip("Use `strongbox set` to add secrets to the existing store.");
        return Err(StrongboxError::StoreAlreadyExists(dir));
    }

    // 2. Generate the key and write an empty secrets document.
    SecretStore::create_dir(&dir, &CancelToken::new())?;
    output::success(&format!("Store created at {}", dir.display()));

    // 3. Audit log.
    crate::audit::log_audit(&dir, "init", None, Some("store created"));

    // 4. Show helpful tips.
    output::tip("Run `strongbox set <KEY>` to add a secret.");
    output::tip("Run `strongbox generate <KEY>` to create a random one.");

    Ok(())
}
