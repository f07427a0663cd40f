use clap::Parser;
use strongbox::cli::{Cli, Commands};
use tracing_subscriber::EnvFilter;

fn main() {
    // Diagnostics go to stderr so they never mix with secret values on stdout.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_env("STRONGBOX_LOG").unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Init => strongbox::cli::commands::init::execute(&cli),
        Commands::Set { ref key, ref value } => {
            strongbox::cli::commands::set::execute(&cli, key, value.as_deref())
        }
        Commands::Get { ref key } => strongbox::cli::commands::get::execute(&cli, key),
        Commands::Delete { ref key, force } => {
            strongbox::cli::commands::delete::execute(&cli, key, force)
        }
        Commands::List { disabled } => strongbox::cli::commands::list::execute(&cli, disabled),
        Commands::Enable { ref key } => strongbox::cli::commands::enable::execute(&cli, key),
        Commands::Disable { ref key } => strongbox::cli::commands::disable::execute(&cli, key),
        Commands::Generate { ref key, length } => {
            strongbox::cli::commands::generate::execute(&cli, key, length)
        }
        Commands::RotateKey { manual } => strongbox::cli::commands::rotate::execute(&cli, manual),
        Commands::Backup => strongbox::cli::commands::backup::execute(&cli),
        Commands::Backups => strongbox::cli::commands::backups::execute(&cli),
        Commands::Restore { ref name, force } => {
            strongbox::cli::commands::restore::execute(&cli, name.as_deref(), force)
        }
        Commands::RestoreSecret { ref key } => {
            strongbox::cli::commands::restore_secret::execute(&cli, key)
        }
        Commands::Audit { last, ref since } => {
            strongbox::cli::commands::audit_cmd::execute(&cli, last, since.as_deref())
        }
    };

    if let Err(e) = result {
        strongbox::cli::output::error(&e.to_string());
        std::process::exit(1);
    }
}
