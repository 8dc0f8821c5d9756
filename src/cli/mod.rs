//! CLI argument definitions and command handlers
//!
//! This module bridges clap argument parsing with the backup engine. Every
//! option can also be supplied through a `SAVEKEEP_*` environment variable.

pub mod backup;

use std::path::PathBuf;

use clap::{ArgAction, Args};

use crate::config::paths::{DefaultPaths, BACKUP_DIR_ENV, SCAN_DIR_ENV};
use crate::config::settings::{
    DEFAULT_BACKUP_LIMIT, DEFAULT_FILE_MATCH, DEFAULT_MAX_AGE_DAYS,
    DEFAULT_SWEEP_INTERVAL_MINUTES,
};
use crate::config::Settings;
use crate::error::SaveKeepResult;

pub use backup::{handle_command, Commands};

/// Start-up options shared by every subcommand
#[derive(Args, Debug, Clone)]
pub struct Options {
    /// Directory watched for save files [default: ~/aux/art]
    #[arg(long, env = SCAN_DIR_ENV, global = true)]
    pub scan_directory: Option<PathBuf>,

    /// Directory receiving backups [default: ~/aux/backups]
    #[arg(long, env = BACKUP_DIR_ENV, global = true)]
    pub backup_directory: Option<PathBuf>,

    /// Regex a file path must match (from its start) to be backed up
    #[arg(long, env = "SAVEKEEP_FILE_MATCH", default_value = DEFAULT_FILE_MATCH, global = true)]
    pub file_match: String,

    /// Watch subdirectories too
    #[arg(
        long,
        env = "SAVEKEEP_RECURSIVE",
        default_value_t = true,
        num_args = 0..=1,
        require_equals = true,
        default_missing_value = "true",
        action = ArgAction::Set,
        global = true
    )]
    pub recursive: bool,

    /// Maximum backups kept per source file
    #[arg(long, env = "SAVEKEEP_BACKUP_LIMIT", default_value_t = DEFAULT_BACKUP_LIMIT, global = true)]
    pub backup_limit: usize,

    /// Periodically delete backups older than --old-file-limit-days
    #[arg(
        long,
        env = "SAVEKEEP_REMOVE_BY_TIME",
        default_value_t = false,
        num_args = 0..=1,
        require_equals = true,
        default_missing_value = "true",
        action = ArgAction::Set,
        global = true
    )]
    pub remove_by_time: bool,

    /// Maximum backup age in days for the age sweep
    #[arg(long, env = "SAVEKEEP_OLD_FILE_LIMIT_DAYS", default_value_t = DEFAULT_MAX_AGE_DAYS, global = true)]
    pub old_file_limit_days: u32,

    /// Minutes between age sweeps
    #[arg(
        long,
        env = "SAVEKEEP_SWEEP_INTERVAL_MINUTES",
        default_value_t = DEFAULT_SWEEP_INTERVAL_MINUTES,
        global = true
    )]
    pub sweep_interval_minutes: u64,

    /// Log at debug level (RUST_LOG takes precedence)
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

impl Options {
    /// Build settings, filling unset directories from the defaults
    ///
    /// The result is not yet validated; call `Settings::prepare`.
    pub fn to_settings(&self) -> SaveKeepResult<Settings> {
        let (scan_dir, backup_dir) = match (&self.scan_directory, &self.backup_directory) {
            (Some(scan), Some(backup)) => (scan.clone(), backup.clone()),
            (scan, backup) => {
                let defaults = DefaultPaths::new()?;
                (
                    scan.clone().unwrap_or_else(|| defaults.scan_dir()),
                    backup.clone().unwrap_or_else(|| defaults.backup_dir()),
                )
            }
        };

        Ok(Settings::new(scan_dir, backup_dir, &self.file_match)?
            .with_recursive(self.recursive)
            .with_backup_limit(self.backup_limit)
            .with_remove_by_time(self.remove_by_time)
            .with_max_age_days(self.old_file_limit_days)
            .with_sweep_interval_minutes(self.sweep_interval_minutes))
    }
}
