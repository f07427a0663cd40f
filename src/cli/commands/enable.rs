//! `strongbox enable`: make a disabled secret retrievable again.

use crate::cancel::CancelToken;
use crate::cli::output;
use crate::cli::{open_store, store_dir, validate_key, Cli};
use crate::errors::Result;

/// Execute the `enable` command.
pub fn execute(cli: &Cli, key: &str) -> Result<()> {
    validate_key(key)?;
    let store = open_store(cli)?;

    store.enable(key, &CancelToken::new())?;

    crate::audit::log_audit(&store_dir(cli)?, "enable", Some(key), None);
    output::success(&format!("Secret '{key}' enabled"));

    Ok(())
}
