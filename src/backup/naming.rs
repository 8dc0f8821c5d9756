//! Backup path naming
//!
//! Pure functions mapping a source file to its backup directory, backup file
//! name and retention pattern, plus parsing of the timestamp embedded in a
//! backup name. Nothing here touches the filesystem.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use regex::Regex;

use crate::config::Settings;
use crate::error::{SaveKeepError, SaveKeepResult};

/// Suffix appended to the transient copy made while restoring a source file
pub const TEMP_SUFFIX: &str = ".tmp";

/// Digit count from which a bare trailing timestamp is read as nanoseconds
const NANOS_MIN_DIGITS: usize = 19;

/// Maps source files under the scan root to backups under the backup root
#[derive(Debug, Clone)]
pub struct PathNamer {
    scan_root: PathBuf,
    backup_root: PathBuf,
}

impl PathNamer {
    /// Create a namer for the given roots
    pub fn new(scan_root: impl Into<PathBuf>, backup_root: impl Into<PathBuf>) -> Self {
        Self {
            scan_root: scan_root.into(),
            backup_root: backup_root.into(),
        }
    }

    /// Create a namer for the roots in `settings`
    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(&settings.scan_dir, &settings.backup_dir)
    }

    pub fn scan_root(&self) -> &Path {
        &self.scan_root
    }

    pub fn backup_root(&self) -> &Path {
        &self.backup_root
    }

    /// Directory holding the backups of `source`
    ///
    /// Mirrors the parent of `source` relative to the scan root.
    pub fn backup_dir_for(&self, source: &Path) -> SaveKeepResult<PathBuf> {
        let relative = source
            .strip_prefix(&self.scan_root)
            .map_err(|_| SaveKeepError::out_of_scope(source, &self.scan_root))?;
        match relative.parent() {
            Some(parent) => Ok(self.backup_root.join(parent)),
            None => Err(SaveKeepError::out_of_scope(source, &self.scan_root)),
        }
    }

    /// Full backup path of `source` taken at `timestamp_nanos`
    pub fn backup_path_for(&self, source: &Path, timestamp_nanos: i64) -> SaveKeepResult<PathBuf> {
        let dir = self.backup_dir_for(source)?;
        let (stem, extension) = self.split_name(source)?;
        Ok(dir.join(backup_file_name(&stem, timestamp_nanos, &extension)))
    }

    /// Pattern matching exactly the backup names produced for `source`
    ///
    /// The timestamp group is captured as group 1.
    pub fn retention_pattern_for(&self, source: &Path) -> SaveKeepResult<Regex> {
        let (stem, extension) = self.split_name(source)?;
        let pattern = format!(
            r"^{}\.(\d+){}$",
            regex::escape(&stem),
            regex::escape(&extension)
        );
        Ok(Regex::new(&pattern)?)
    }

    /// Check whether `path` lies under the backup root
    pub fn is_backup_path(&self, path: &Path) -> bool {
        path.starts_with(&self.backup_root)
    }

    fn split_name(&self, source: &Path) -> SaveKeepResult<(String, String)> {
        let stem = source
            .file_stem()
            .ok_or_else(|| SaveKeepError::out_of_scope(source, &self.scan_root))?
            .to_string_lossy()
            .into_owned();
        let extension = source
            .extension()
            .map(|ext| format!(".{}", ext.to_string_lossy()))
            .unwrap_or_default();
        Ok((stem, extension))
    }
}

/// Build a backup file name: `{stem}.{timestamp_nanos}{extension}`
pub fn backup_file_name(stem: &str, timestamp_nanos: i64, extension: &str) -> String {
    format!("{}.{}{}", stem, timestamp_nanos, extension)
}

/// Sibling path used for the restore copy of `backup_path`
pub fn temp_path_for(backup_path: &Path) -> PathBuf {
    let mut name = backup_path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(TEMP_SUFFIX);
    backup_path.with_file_name(name)
}

/// Parse the creation time embedded in a backup file name
///
/// Recognised forms:
/// - `draft.1700000000000000000.sai2`: nanoseconds before the final extension
/// - `draft.sai2.1700000000000000`: legacy microseconds as a trailing suffix
///
/// A bare trailing number with 19 or more digits is read as nanoseconds,
/// which covers backups of extensionless sources.
pub fn parse_backup_time(file_name: &str) -> Option<DateTime<Utc>> {
    let segments: Vec<&str> = file_name.split('.').collect();
    let count = segments.len();

    if count >= 3 {
        if let Some(nanos) = parse_digits(segments[count - 2]) {
            return Some(DateTime::from_timestamp_nanos(nanos));
        }
    }

    if count >= 2 {
        let last = segments[count - 1];
        let value = parse_digits(last)?;
        if last.len() >= NANOS_MIN_DIGITS {
            return Some(DateTime::from_timestamp_nanos(value));
        }
        return DateTime::from_timestamp_micros(value);
    }

    None
}

fn parse_digits(segment: &str) -> Option<i64> {
    if segment.is_empty() || !segment.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    segment.parse().ok()
}
