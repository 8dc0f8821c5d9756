//! Retention policy
//!
//! Count-based pruning of one source file's backups, and an age-based sweep
//! over the whole backup tree.

use std::fs::{self, Metadata};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, warn};
use walkdir::WalkDir;

use super::naming::{parse_backup_time, PathNamer};
use super::writer::remove_file_if_exists;
use crate::config::Settings;
use crate::error::{SaveKeepError, SaveKeepResult};

/// One member of a retention set
#[derive(Debug, Clone, Serialize)]
pub struct BackupEntry {
    /// Backup filename
    pub filename: String,
    /// Full path to backup
    pub path: PathBuf,
    /// Embedded timestamp, or modification time if the name has none
    pub created_at: DateTime<Utc>,
    /// Size in bytes
    pub size_bytes: u64,
}

/// Result of an age sweep
#[derive(Debug, Default, Clone, Serialize)]
pub struct AgeSweepReport {
    /// Files looked at
    pub examined: usize,
    /// Files deleted for being too old
    pub removed: Vec<PathBuf>,
    /// Entries that could not be read or deleted
    pub failures: usize,
}

impl AgeSweepReport {
    pub fn total_removed(&self) -> usize {
        self.removed.len()
    }
}

/// Decides which backups to delete
#[derive(Debug, Clone)]
pub struct RetentionPolicy {
    namer: PathNamer,
    backup_limit: usize,
    remove_by_time: bool,
    max_age: chrono::Duration,
}

impl RetentionPolicy {
    /// Count-only policy keeping `backup_limit` backups per source
    pub fn new(namer: PathNamer, backup_limit: usize) -> Self {
        Self {
            namer,
            backup_limit,
            remove_by_time: false,
            max_age: chrono::Duration::days(i64::from(
                crate::config::settings::DEFAULT_MAX_AGE_DAYS,
            )),
        }
    }

    /// Enable the age sweep with the given maximum age
    pub fn with_max_age(mut self, max_age: chrono::Duration) -> Self {
        self.remove_by_time = true;
        self.max_age = max_age;
        self
    }

    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            namer: PathNamer::from_settings(settings),
            backup_limit: settings.backup_limit,
            remove_by_time: settings.remove_by_time,
            max_age: settings.max_age(),
        }
    }

    /// Backups of `source`, oldest first
    ///
    /// Ordering uses the numeric value of the name's digit group, not the file
    /// name, so timestamps of different digit widths still sort
    /// chronologically. Ties are broken by name.
    pub fn list_retention_set(&self, source: &Path) -> SaveKeepResult<Vec<BackupEntry>> {
        let dir = self.namer.backup_dir_for(source)?;
        if !dir.is_dir() {
            return Ok(Vec::new());
        }
        let pattern = self.namer.retention_pattern_for(source)?;

        let mut entries: Vec<(u128, BackupEntry)> = Vec::new();
        for entry in fs::read_dir(&dir).map_err(|e| {
            SaveKeepError::Filesystem(format!(
                "Failed to read backup directory {}: {}",
                dir.display(),
                e
            ))
        })? {
            let entry = entry.map_err(|e| {
                SaveKeepError::Filesystem(format!("Failed to read directory entry: {}", e))
            })?;

            let filename = match entry.file_name().into_string() {
                Ok(name) => name,
                Err(_) => continue,
            };
            let Some(sequence) = pattern
                .captures(&filename)
                .and_then(|caps| caps.get(1))
                .map(|digits| digits.as_str().parse::<u128>().unwrap_or(u128::MAX))
            else {
                continue;
            };

            let path = entry.path();
            // Entries removed concurrently are simply skipped
            let metadata = match fs::metadata(&path) {
                Ok(metadata) if metadata.is_file() => metadata,
                _ => continue,
            };

            entries.push((
                sequence,
                BackupEntry {
                    created_at: derive_time(&filename, &metadata).unwrap_or_default(),
                    size_bytes: metadata.len(),
                    filename,
                    path,
                },
            ));
        }

        entries.sort_by(|(a_seq, a), (b_seq, b)| {
            a_seq.cmp(b_seq).then_with(|| a.filename.cmp(&b.filename))
        });
        Ok(entries.into_iter().map(|(_, entry)| entry).collect())
    }

    /// Delete the oldest backups of `source` beyond the backup limit
    ///
    /// Returns the deleted paths. A limit of zero deletes every backup.
    pub fn sweep_by_count(&self, source: &Path) -> SaveKeepResult<Vec<PathBuf>> {
        let entries = self.list_retention_set(source)?;
        let excess = entries.len().saturating_sub(self.backup_limit);

        let mut deleted = Vec::new();
        for entry in entries.into_iter().take(excess) {
            let removed = remove_file_if_exists(&entry.path).map_err(|e| {
                SaveKeepError::Filesystem(format!(
                    "Failed to delete old backup {}: {}",
                    entry.path.display(),
                    e
                ))
            })?;
            if removed {
                debug!(path = %entry.path.display(), "removed old backup");
                deleted.push(entry.path);
            }
        }
        Ok(deleted)
    }

    /// Delete every backup older than the maximum age
    pub fn sweep_by_age(&self) -> SaveKeepResult<AgeSweepReport> {
        self.sweep_by_age_at(Utc::now())
    }

    /// Age sweep relative to `now`
    ///
    /// No-op unless age-based removal is enabled. Unreadable entries and
    /// failed deletions are logged and counted, never fatal.
    pub fn sweep_by_age_at(&self, now: DateTime<Utc>) -> SaveKeepResult<AgeSweepReport> {
        let mut report = AgeSweepReport::default();
        let root = self.namer.backup_root();
        if !self.remove_by_time || !root.exists() {
            return Ok(report);
        }

        let cutoff = now - self.max_age;
        for entry in WalkDir::new(root) {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    warn!(error = %e, "skipping unreadable backup entry");
                    report.failures += 1;
                    continue;
                }
            };
            if !entry.file_type().is_file() {
                continue;
            }
            report.examined += 1;

            let path = entry.path();
            let created_at = match entry.metadata() {
                Ok(metadata) => {
                    derive_time(&entry.file_name().to_string_lossy(), &metadata)
                }
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "failed to read backup metadata");
                    report.failures += 1;
                    continue;
                }
            };
            let Some(created_at) = created_at else {
                continue;
            };
            if created_at >= cutoff {
                continue;
            }

            match remove_file_if_exists(path) {
                Ok(true) => {
                    debug!(path = %path.display(), "removed expired backup");
                    report.removed.push(path.to_path_buf());
                }
                Ok(false) => {}
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "failed to remove expired backup");
                    report.failures += 1;
                }
            }
        }

        Ok(report)
    }
}

fn derive_time(file_name: &str, metadata: &Metadata) -> Option<DateTime<Utc>> {
    parse_backup_time(file_name).or_else(|| metadata.modified().ok().map(DateTime::<Utc>::from))
}
