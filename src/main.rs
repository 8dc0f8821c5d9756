use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use savekeep::cli::{handle_command, Commands, Options};

#[derive(Parser)]
#[command(
    name = "savekeep",
    author = "Kaylee Beyene",
    version,
    about = "Continuous versioning for application save files",
    long_about = "savekeep watches a directory for save files being written and \
                  keeps timestamped backups of each one, pruning old backups by \
                  count and optionally by age."
)]
struct Cli {
    #[command(flatten)]
    options: Options,

    #[command(subcommand)]
    command: Option<Commands>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.options.verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    // Configuration errors abort before anything is watched
    let settings = cli.options.to_settings()?.prepare()?;

    handle_command(settings, cli.command.unwrap_or(Commands::Watch))?;

    Ok(())
}
