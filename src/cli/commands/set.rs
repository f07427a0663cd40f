//! `strongbox set`: add or update a secret.

use std::io::{self, IsTerminal, Read};

use zeroize::Zeroizing;

use crate::cancel::CancelToken;
use crate::cli::output;
use crate::cli::{open_store, store_dir, validate_key, Cli};
use crate::errors::{Result, StrongboxError};

/// Execute the `set` command.
pub fn execute(cli: &Cli, key: &str, value: Option<&str>) -> Result<()> {
    validate_key(key)?;

    // Determine the secret value from one of three sources.
    let secret_value = if let Some(v) = value {
        // Source 1: Inline value on the command line.
        output::warning("Value provided on command line; it may appear in shell history.");
        Zeroizing::new(v.to_string())
    } else if !io::stdin().is_terminal() {
        // Source 2: Piped input (stdin is not a terminal).
        let mut buf = Zeroizing::new(String::new());
        io::stdin()
            .read_to_string(&mut buf)
            .map_err(|e| StrongboxError::io("read stdin", e))?;
        Zeroizing::new(buf.trim_end().to_string())
    } else {
        // Source 3: Interactive secure prompt (default).
        let entered = dialoguer::Password::new()
            .with_prompt(format!("Enter value for {key}"))
            .allow_empty_password(true)
            .interact()
            .map_err(|e| StrongboxError::CommandFailed(format!("input prompt: {e}")))?;
        Zeroizing::new(entered)
    };

    let store = open_store(cli)?;
    let existed = store.contains(key)?;
    store.put(key, &secret_value, &CancelToken::new())?;

    let op_detail = if existed { "updated" } else { "added" };
    crate::audit::log_audit(&store_dir(cli)?, "set", Some(key), Some(op_detail));

    output::success(&format!(
        "Secret '{key}' {op_detail} ({} total)",
        store.len()?
    ));

    Ok(())
}
