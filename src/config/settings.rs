//! Runtime settings for savekeep
//!
//! Settings are built once at start-up from command line flags and passed by
//! reference to every component. Nothing is persisted.

use std::fs;
use std::path::{Path, PathBuf};

use regex::Regex;
use serde::{Serialize, Serializer};
use tracing::warn;

use super::paths::absolutize;
use crate::error::{SaveKeepError, SaveKeepResult};

/// Default pattern a path must satisfy to be backed up
pub const DEFAULT_FILE_MATCH: &str = r".*\.sai2";

/// Default number of backups kept per source file
pub const DEFAULT_BACKUP_LIMIT: usize = 6;

/// Default maximum backup age for the age sweep
pub const DEFAULT_MAX_AGE_DAYS: u32 = 7;

/// Default period between age sweeps
pub const DEFAULT_SWEEP_INTERVAL_MINUTES: u64 = 60;

/// Compiled file match pattern
///
/// The pattern is anchored at the start of the path string but may stop
/// before its end, so `.*\.sai2` also accepts `draft.sai2.bak`.
#[derive(Debug, Clone)]
pub struct FileMatch {
    pattern: String,
    regex: Regex,
}

impl FileMatch {
    /// Compile a pattern, failing with `Pattern` if it is not a valid regex
    pub fn new(pattern: &str) -> SaveKeepResult<Self> {
        // Validate unwrapped so that inputs like ")(" are not rescued by the group
        Regex::new(pattern)?;
        let regex = Regex::new(&format!("^(?:{})", pattern))?;
        Ok(Self {
            pattern: pattern.to_string(),
            regex,
        })
    }

    /// The pattern as configured
    pub fn as_str(&self) -> &str {
        &self.pattern
    }

    /// Check a path against the pattern
    pub fn is_match(&self, path: &Path) -> bool {
        self.regex.is_match(&path.to_string_lossy())
    }
}

impl Serialize for FileMatch {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.pattern)
    }
}

/// Process-wide configuration, immutable after start-up
#[derive(Debug, Clone, Serialize)]
pub struct Settings {
    /// Root watched for closed files
    pub scan_dir: PathBuf,

    /// Root receiving backups, mirroring `scan_dir`'s layout
    pub backup_dir: PathBuf,

    /// Pattern a closed file's path must satisfy
    pub file_match: FileMatch,

    /// Whether subdirectories of `scan_dir` are watched
    pub recursive: bool,

    /// Maximum backups kept per source file
    pub backup_limit: usize,

    /// Whether the periodic age sweep deletes anything
    pub remove_by_time: bool,

    /// Maximum backup age in days when `remove_by_time` is set
    pub max_age_days: u32,

    /// Minutes between age sweeps
    pub sweep_interval_minutes: u64,
}

impl Settings {
    /// Create settings with default retention values
    ///
    /// Relative directories are resolved against the current directory.
    pub fn new(
        scan_dir: impl AsRef<Path>,
        backup_dir: impl AsRef<Path>,
        file_match: &str,
    ) -> SaveKeepResult<Self> {
        Ok(Self {
            scan_dir: absolutize(scan_dir.as_ref())?,
            backup_dir: absolutize(backup_dir.as_ref())?,
            file_match: FileMatch::new(file_match)?,
            recursive: true,
            backup_limit: DEFAULT_BACKUP_LIMIT,
            remove_by_time: false,
            max_age_days: DEFAULT_MAX_AGE_DAYS,
            sweep_interval_minutes: DEFAULT_SWEEP_INTERVAL_MINUTES,
        })
    }

    pub fn with_recursive(mut self, recursive: bool) -> Self {
        self.recursive = recursive;
        self
    }

    pub fn with_backup_limit(mut self, backup_limit: usize) -> Self {
        self.backup_limit = backup_limit;
        self
    }

    pub fn with_remove_by_time(mut self, remove_by_time: bool) -> Self {
        self.remove_by_time = remove_by_time;
        self
    }

    pub fn with_max_age_days(mut self, max_age_days: u32) -> Self {
        self.max_age_days = max_age_days;
        self
    }

    pub fn with_sweep_interval_minutes(mut self, minutes: u64) -> Self {
        self.sweep_interval_minutes = minutes;
        self
    }

    /// Maximum backup age as a duration
    pub fn max_age(&self) -> chrono::Duration {
        chrono::Duration::days(i64::from(self.max_age_days))
    }

    /// Period between age sweeps
    pub fn sweep_interval(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.sweep_interval_minutes.saturating_mul(60))
    }

    /// Validate the settings and canonicalize both roots
    ///
    /// The scan directory must already exist; the backup directory is created.
    /// Fails if the roots coincide or the scan directory lives inside the
    /// backup directory, since every event would then be ignored.
    pub fn prepare(mut self) -> SaveKeepResult<Self> {
        if !self.scan_dir.is_dir() {
            return Err(SaveKeepError::Config(format!(
                "Scan directory does not exist: {}",
                self.scan_dir.display()
            )));
        }
        if self.sweep_interval_minutes == 0 {
            return Err(SaveKeepError::Config(
                "Sweep interval must be at least one minute".into(),
            ));
        }

        self.scan_dir = fs::canonicalize(&self.scan_dir).map_err(|e| {
            SaveKeepError::Config(format!(
                "Failed to resolve scan directory {}: {}",
                self.scan_dir.display(),
                e
            ))
        })?;

        fs::create_dir_all(&self.backup_dir).map_err(|e| {
            SaveKeepError::Filesystem(format!(
                "Failed to create backup directory {}: {}",
                self.backup_dir.display(),
                e
            ))
        })?;
        self.backup_dir = fs::canonicalize(&self.backup_dir).map_err(|e| {
            SaveKeepError::Config(format!(
                "Failed to resolve backup directory {}: {}",
                self.backup_dir.display(),
                e
            ))
        })?;

        if self.scan_dir == self.backup_dir {
            return Err(SaveKeepError::Config(format!(
                "Scan and backup directories must differ: {}",
                self.scan_dir.display()
            )));
        }
        if self.scan_dir.starts_with(&self.backup_dir) {
            return Err(SaveKeepError::Config(format!(
                "Scan directory {} is inside backup directory {}",
                self.scan_dir.display(),
                self.backup_dir.display()
            )));
        }
        if self.backup_dir.starts_with(&self.scan_dir) {
            warn!(
                backup_dir = %self.backup_dir.display(),
                scan_dir = %self.scan_dir.display(),
                "Backup directory is inside the scan directory; events under it are ignored"
            );
        }

        Ok(self)
    }
}
