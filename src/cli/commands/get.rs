//! `strongbox get`: retrieve and print a single secret's value.

use crate::cli::{open_store, validate_key, Cli};
use crate::errors::Result;

/// Execute the `get` command.
pub fn execute(cli: &Cli, key: &str) -> Result<()> {
    validate_key(key)?;
    let store = open_store(cli)?;

    // Decrypt and print the secret value to stdout.
    let value = zeroize::Zeroizing::new(store.get(key)?);
    println!("{}", value.as_str());

    Ok(())
}
