//! `strongbox generate`: create a random secret, store it and print it.

use zeroize::Zeroizing;

use crate::cancel::CancelToken;
use crate::cli::{open_store, store_dir, validate_key, Cli};
use crate::errors::Result;

/// Execute the `generate` command.
///
/// The value goes to stdout on its own line so it can be piped; the
/// confirmation goes to stderr.
pub fn execute(cli: &Cli, key: &str, length: usize) -> Result<()> {
    validate_key(key)?;
    let store = open_store(cli)?;

    let value = Zeroizing::new(store.generate(key, length, &CancelToken::new())?);

    crate::audit::log_audit(
        &store_dir(cli)?,
        "generate",
        Some(key),
        Some(&format!("{length} characters")),
    );

    println!("{}", value.as_str());
    eprintln!(
        "{} Generated {length}-character secret '{key}'",
        console::style("\u{2713}").green().bold()
    );

    Ok(())
}
