//! `strongbox disable`: hide a secret without deleting it.

use crate::cancel::CancelToken;
use crate::cli::output;
use crate::cli::{open_store, store_dir, validate_key, Cli};
use crate::errors::Result;

/// Execute the `disable` command.
pub fn execute(cli: &Cli, key: &str) -> Result<()> {
    validate_key(key)?;
    let store = open_store(cli)?;

    store.disable(key, &CancelToken::new())?;

    crate::audit::log_audit(&store_dir(cli)?, "disable", Some(key), None);
    output::success(&format!("Secret '{key}' disabled"));
    output::tip("It no longer shows up in `get` or `list`; see `strongbox list --disabled`.");

    Ok(())
}
