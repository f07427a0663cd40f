//! Colored terminal output helpers.
//!
//! All user-facing output goes through these functions so we get
//! consistent styling across every command.

use comfy_table::{ContentArrangement, Table};
use console::style;

use crate::backup::BackupInfo;
use crate::vault::SecretEntry;

const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Print a green success message: "check_mark {msg}"
pub fn success(msg: &str) {
    println!("{} {}", style("\u{2713}").green().bold(), msg);
}

/// Print a red error message: "x_mark {msg}"
pub fn error(msg: &str) {
    eprintln!("{} {}", style("\u{2717}").red().bold(), msg);
}

/// Print a yellow warning: "warning_sign {msg}"
pub fn warning(msg: &str) {
    eprintln!("{} {}", style("\u{26a0}").yellow().bold(), msg);
}

/// Print a blue info message: "info_sign {msg}"
pub fn info(msg: &str) {
    println!("{} {}", style("\u{2139}").blue().bold(), msg);
}

/// Print a dim tip/hint: "arrow {msg}"
pub fn tip(msg: &str) {
    println!("{} {}", style("\u{2192}").dim(), style(msg).dim());
}

/// Print a table of secrets (Key, Size, Created, Modified, Rotations).
pub fn print_secrets_table(secrets: &[SecretEntry]) {
    let mut table = Table::new();
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec!["Key", "Size", "Created", "Modified", "Rotations"]);

    for s in secrets {
        let m = &s.metadata;
        table.add_row(vec![
            s.key.clone(),
            m.size.to_string(),
            m.created_at.format(TIME_FORMAT).to_string(),
            m.modified_at.format(TIME_FORMAT).to_string(),
            m.rotation_count.to_string(),
        ]);
    }

    println!("{table}");
}

/// Print a table of backups (Name, Kind, Taken, Valid).
pub fn print_backups_table(backups: &[BackupInfo]) {
    let mut table = Table::new();
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec!["Name", "Kind", "Taken", "Valid"]);

    for b in backups {
        let valid = if b.is_valid {
            style("yes").green().to_string()
        } else {
            style("incomplete").red().to_string()
        };
        table.add_row(vec![
            b.name.clone(),
            b.kind.to_string(),
            b.timestamp.format(TIME_FORMAT).to_string(),
            valid,
        ]);
    }

    println!("{table}");
}
