//! Backup writer
//!
//! Turns a live file into a backup with a move, then restores a copy at the
//! original location so the source path is never left missing on success.

use std::fs::{self, File};
use std::io::{self, BufReader, Read};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use filetime::FileTime;
use serde::Serialize;
use tracing::{debug, info};

use super::naming::{temp_path_for, PathNamer};
use crate::error::{SaveKeepError, SaveKeepResult};

/// Mapping emitted by a successful backup
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BackupRecord {
    /// The file that was backed up
    pub source: PathBuf,
    /// Where its pre-backup content now lives
    pub backup: PathBuf,
    /// Time embedded in the backup name
    pub created_at: DateTime<Utc>,
}

/// Performs the move-and-restore sequence
#[derive(Debug, Clone)]
pub struct BackupWriter {
    namer: PathNamer,
}

impl BackupWriter {
    pub fn new(namer: PathNamer) -> Self {
        Self { namer }
    }

    /// Back up `source` using the current time
    pub fn backup(&self, source: &Path) -> SaveKeepResult<BackupRecord> {
        self.backup_at(source, now_nanos())
    }

    /// Back up `source` under the name for `timestamp_nanos`
    ///
    /// If a backup with that name already exists the timestamp is advanced
    /// one nanosecond at a time until the name is free.
    pub fn backup_at(&self, source: &Path, timestamp_nanos: i64) -> SaveKeepResult<BackupRecord> {
        let (backup_path, timestamp_nanos) = self.free_backup_path(source, timestamp_nanos)?;

        if let Some(parent) = backup_path.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                SaveKeepError::Filesystem(format!(
                    "Failed to create backup directory {}: {}",
                    parent.display(),
                    e
                ))
            })?;
        }

        move_file(source, &backup_path).map_err(|e| {
            SaveKeepError::Filesystem(format!(
                "Failed to move {} to {}: {}",
                source.display(),
                backup_path.display(),
                e
            ))
        })?;

        // From here on a failure can leave the source missing
        restore_source(source, &backup_path).map_err(|e| SaveKeepError::Interrupted {
            source_path: source.to_path_buf(),
            backup: backup_path.clone(),
            reason: e.to_string(),
        })?;

        info!(
            source = %source.display(),
            backup = %backup_path.display(),
            "backup created"
        );

        Ok(BackupRecord {
            source: source.to_path_buf(),
            backup: backup_path,
            created_at: DateTime::from_timestamp_nanos(timestamp_nanos),
        })
    }

    fn free_backup_path(
        &self,
        source: &Path,
        mut timestamp_nanos: i64,
    ) -> SaveKeepResult<(PathBuf, i64)> {
        loop {
            let candidate = self.namer.backup_path_for(source, timestamp_nanos)?;
            if !candidate.exists() {
                return Ok((candidate, timestamp_nanos));
            }
            timestamp_nanos = timestamp_nanos.saturating_add(1);
        }
    }
}

/// Copy the backup back to `source` unless something recreated it meanwhile
fn restore_source(source: &Path, backup_path: &Path) -> io::Result<()> {
    let temp_path = temp_path_for(backup_path);
    if let Err(e) = copy_with_times(backup_path, &temp_path) {
        let _ = remove_file_if_exists(&temp_path);
        return Err(e);
    }

    if source.exists() {
        debug!(
            source = %source.display(),
            "source recreated during backup, keeping the newer file"
        );
        remove_file_if_exists(&temp_path)?;
        return Ok(());
    }

    if let Err(e) = move_file(&temp_path, source) {
        let _ = remove_file_if_exists(&temp_path);
        return Err(e);
    }
    Ok(())
}

/// Move a file, falling back to copy-and-delete when a rename is not possible
pub fn move_file(from: &Path, to: &Path) -> io::Result<()> {
    match fs::rename(from, to) {
        Ok(()) => Ok(()),
        Err(rename_err) => {
            if !from.exists() {
                return Err(rename_err);
            }
            // Cross-device moves land here
            if let Err(e) = copy_with_times(from, to) {
                let _ = remove_file_if_exists(to);
                return Err(e);
            }
            fs::remove_file(from)
        }
    }
}

/// Copy content and permissions, then carry over access and modification times
pub fn copy_with_times(from: &Path, to: &Path) -> io::Result<()> {
    fs::copy(from, to)?;
    let metadata = fs::metadata(from)?;
    filetime::set_file_times(
        to,
        FileTime::from_last_access_time(&metadata),
        FileTime::from_last_modification_time(&metadata),
    )
}

/// Whether two files have identical bytes
///
/// Any read error, including a length change mid-read, counts as a difference.
pub fn same_content(a: &Path, b: &Path) -> bool {
    compare_files(a, b).unwrap_or(false)
}

fn compare_files(a: &Path, b: &Path) -> io::Result<bool> {
    let len = fs::metadata(a)?.len();
    if fs::metadata(b)?.len() != len {
        return Ok(false);
    }

    let mut left = BufReader::new(File::open(a)?);
    let mut right = BufReader::new(File::open(b)?);
    let mut left_buf = [0u8; 8192];
    let mut right_buf = [0u8; 8192];
    let mut remaining = len;
    while remaining > 0 {
        let n = remaining.min(left_buf.len() as u64) as usize;
        left.read_exact(&mut left_buf[..n])?;
        right.read_exact(&mut right_buf[..n])?;
        if left_buf[..n] != right_buf[..n] {
            return Ok(false);
        }
        remaining -= n as u64;
    }
    Ok(true)
}

/// Delete a file, treating an already-missing file as success
///
/// Returns whether a file was actually removed.
pub fn remove_file_if_exists(path: &Path) -> io::Result<bool> {
    match fs::remove_file(path) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e),
    }
}

fn now_nanos() -> i64 {
    let now = Utc::now();
    now.timestamp_nanos_opt()
        .unwrap_or_else(|| now.timestamp_micros().saturating_mul(1_000))
}
