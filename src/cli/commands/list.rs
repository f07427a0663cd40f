//! `strongbox list`: display secrets in a table.

use crate::cli::output;
use crate::cli::{open_store, Cli};
use crate::errors::Result;

/// Execute the `list` command.
pub fn execute(cli: &Cli, disabled: bool) -> Result<()> {
    let store = open_store(cli)?;

    let secrets = if disabled {
        store.list_disabled()?
    } else {
        store.list()?
    };

    if secrets.is_empty() {
        if disabled {
            output::info("No disabled secrets.");
        } else {
            output::info("No secrets in this store yet.");
            output::tip("Run `strongbox set <KEY>` to add your first secret.");
        }
        return Ok(());
    }

    let label = if disabled { "disabled secret(s)" } else { "secret(s)" };
    output::info(&format!("{} {label}", secrets.len()));
    output::print_secrets_table(&secrets);

    Ok(())
}
