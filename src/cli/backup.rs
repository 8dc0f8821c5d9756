//! Backup CLI commands
//!
//! Implements the one-shot commands and hands `watch` off to the daemon.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::Utc;
use clap::Subcommand;

use crate::backup::{BackupEngine, BackupEntry, PruneReport};
use crate::config::paths::absolutize;
use crate::config::Settings;
use crate::daemon;
use crate::error::SaveKeepResult;

/// Subcommands; `watch` is used when none is given
#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Commands {
    /// Watch the scan directory and back up every saved file
    Watch,

    /// Apply count and age retention once, then exit
    Prune,

    /// List the backups of a source file, oldest first
    List {
        /// Source file under the scan directory
        file: PathBuf,

        /// Print as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show the resolved configuration
    Config,
}

/// Handle a command with validated settings
pub fn handle_command(settings: Settings, cmd: Commands) -> SaveKeepResult<()> {
    match cmd {
        Commands::Watch => daemon::run(settings)?,

        Commands::Prune => {
            let engine = BackupEngine::new(settings);
            let report = engine.prune_all()?;
            print!("{}", format_prune_report(&report));
        }

        Commands::List { file, json } => {
            let source = resolve_source(&file)?;
            let engine = BackupEngine::new(settings);
            let entries = engine.retention().list_retention_set(&source)?;

            if json {
                println!("{}", serde_json::to_string_pretty(&entries)?);
            } else {
                print!("{}", format_backup_list(&source, &entries));
            }
        }

        Commands::Config => {
            println!("{}", serde_json::to_string_pretty(&settings)?);
        }
    }

    Ok(())
}

/// Canonical form of a source path, falling back to an absolute path when
/// the file itself no longer exists
fn resolve_source(file: &Path) -> SaveKeepResult<PathBuf> {
    if let Ok(canonical) = fs::canonicalize(file) {
        return Ok(canonical);
    }
    let absolute = absolutize(file)?;
    match (absolute.parent(), absolute.file_name()) {
        (Some(parent), Some(name)) => match fs::canonicalize(parent) {
            Ok(parent) => Ok(parent.join(name)),
            Err(_) => Ok(absolute),
        },
        _ => Ok(absolute),
    }
}

/// Render a retention set as a table
pub fn format_backup_list(source: &Path, entries: &[BackupEntry]) -> String {
    if entries.is_empty() {
        return format!("No backups found for {}\n", source.display());
    }

    let name_width = entries
        .iter()
        .map(|e| e.filename.len())
        .max()
        .unwrap_or(4)
        .max(4);

    let mut output = String::new();
    output.push_str(&format!("Backups of {}\n\n", source.display()));
    output.push_str(&format!(
        "{:<name_width$}  {:<23}  {:>8}  {:>10}\n",
        "Name",
        "Created",
        "Age",
        "Size",
        name_width = name_width,
    ));
    output.push_str(&format!(
        "{:-<name_width$}  {:-<23}  {:->8}  {:->10}\n",
        "",
        "",
        "",
        "",
        name_width = name_width,
    ));

    let now = Utc::now();
    for entry in entries {
        output.push_str(&format!(
            "{:<name_width$}  {:<23}  {:>8}  {:>10}\n",
            entry.filename,
            entry.created_at.format("%Y-%m-%d %H:%M:%S UTC"),
            format_age(now.signed_duration_since(entry.created_at)),
            format_size(entry.size_bytes),
            name_width = name_width,
        ));
    }

    output.push_str(&format!("\nTotal: {} backup(s)\n", entries.len()));
    output
}

/// Render the outcome of `prune`
pub fn format_prune_report(report: &PruneReport) -> String {
    let mut output = String::new();
    output.push_str("Prune Summary\n");
    output.push_str("=============\n");
    output.push_str(&format!("Source files checked: {}\n", report.sources));
    output.push_str(&format!(
        "Removed by count:     {}\n",
        report.removed_by_count.len()
    ));
    output.push_str(&format!(
        "Removed by age:       {}\n",
        report.by_age.total_removed()
    ));
    let failures = report.failures + report.by_age.failures;
    if failures > 0 {
        output.push_str(&format!("Failures:             {}\n", failures));
    }
    output
}

/// Age of a backup as two units, e.g. `4h 07m` or `2w 3d`
fn format_age(age: chrono::Duration) -> String {
    let secs = age.num_seconds().max(0);
    let (mins, hours, days) = (secs / 60, secs / 3600, secs / 86_400);

    if mins == 0 {
        format!("{}s", secs)
    } else if hours == 0 {
        format!("{}m {:02}s", mins, secs % 60)
    } else if days == 0 {
        format!("{}h {:02}m", hours, mins % 60)
    } else if days < 14 {
        format!("{}d {}h", days, hours % 24)
    } else {
        format!("{}w {}d", days / 7, days % 7)
    }
}

/// Backup size in binary units
fn format_size(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["KiB", "MiB", "GiB", "TiB"];

    if bytes < 1024 {
        return format!("{} B", bytes);
    }
    let mut value = bytes as f64 / 1024.0;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    format!("{:.1} {}", value, UNITS[unit])
}
