//! Backup engine
//!
//! Reacts to the two external triggers: a file was closed after writing, or
//! the periodic sweep timer fired. Triggers arrive over a channel and are
//! handled one at a time, so two backups of the same file never interleave.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::mpsc::Receiver;

use serde::Serialize;
use tracing::{debug, error, info, trace, warn};
use walkdir::WalkDir;

use super::naming::PathNamer;
use super::retention::{AgeSweepReport, RetentionPolicy};
use super::writer::{same_content, BackupRecord, BackupWriter};
use crate::config::Settings;
use crate::error::SaveKeepResult;

/// Inbound event delivered by the watch, schedule and signal adapters
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Trigger {
    /// A file was closed after being written
    FileClosed(PathBuf),
    /// The periodic sweep timer fired
    Tick,
    /// Stop after the current event
    Shutdown,
}

/// Why a file-closed event did not produce a backup
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IgnoreReason {
    /// Path does not satisfy the file match pattern
    NotMatched,
    /// Path lies under the backup directory
    InBackupDir,
    /// Path is gone or is not a regular file
    NotAFile,
    /// File is identical to its newest backup, e.g. the close of a restore copy
    Unchanged,
}

/// What handling a trigger did
#[derive(Debug)]
pub enum Outcome {
    Ignored(IgnoreReason),
    BackedUp {
        record: BackupRecord,
        pruned: Vec<PathBuf>,
    },
    Swept(AgeSweepReport),
    Stopped,
}

/// Result of a one-shot prune over the whole scan directory
#[derive(Debug, Default, Serialize)]
pub struct PruneReport {
    /// Matching source files whose backups were checked
    pub sources: usize,
    /// Backups removed by the count limit
    pub removed_by_count: Vec<PathBuf>,
    /// Outcome of the age sweep
    pub by_age: AgeSweepReport,
    /// Sources that could not be pruned
    pub failures: usize,
}

/// Orchestrates naming, writing and retention
pub struct BackupEngine {
    settings: Settings,
    namer: PathNamer,
    writer: BackupWriter,
    retention: RetentionPolicy,
}

impl BackupEngine {
    pub fn new(settings: Settings) -> Self {
        let namer = PathNamer::from_settings(&settings);
        Self {
            writer: BackupWriter::new(namer.clone()),
            retention: RetentionPolicy::from_settings(&settings),
            namer,
            settings,
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn retention(&self) -> &RetentionPolicy {
        &self.retention
    }

    /// Dispatch a single trigger
    pub fn handle(&self, trigger: Trigger) -> SaveKeepResult<Outcome> {
        match trigger {
            Trigger::FileClosed(path) => self.on_file_closed(&path),
            Trigger::Tick => self.on_tick(),
            Trigger::Shutdown => Ok(Outcome::Stopped),
        }
    }

    /// Back up a closed file and prune its older backups
    pub fn on_file_closed(&self, path: &Path) -> SaveKeepResult<Outcome> {
        if let Some(reason) = self.ignore_reason(path) {
            trace!(path = %path.display(), ?reason, "ignoring closed file");
            return Ok(Outcome::Ignored(reason));
        }

        let record = self.writer.backup(path)?;
        let pruned = self.retention.sweep_by_count(path)?;
        if !pruned.is_empty() {
            debug!(
                source = %path.display(),
                count = pruned.len(),
                "pruned old backups"
            );
        }
        Ok(Outcome::BackedUp { record, pruned })
    }

    /// Run the age sweep over the backup tree
    pub fn on_tick(&self) -> SaveKeepResult<Outcome> {
        let report = self.retention.sweep_by_age()?;
        if report.total_removed() > 0 || report.failures > 0 {
            info!(
                removed = report.total_removed(),
                failures = report.failures,
                "age sweep finished"
            );
        }
        Ok(Outcome::Swept(report))
    }

    fn ignore_reason(&self, path: &Path) -> Option<IgnoreReason> {
        if !self.settings.file_match.is_match(path) {
            return Some(IgnoreReason::NotMatched);
        }
        if self.namer.is_backup_path(path) {
            return Some(IgnoreReason::InBackupDir);
        }
        if !path.is_file() {
            return Some(IgnoreReason::NotAFile);
        }
        if self.matches_newest_backup(path) {
            return Some(IgnoreReason::Unchanged);
        }
        None
    }

    /// Restores carry the backup's mtime, so a restored copy matches the
    /// newest backup in mtime, size and bytes
    fn matches_newest_backup(&self, path: &Path) -> bool {
        let Ok(source) = fs::metadata(path) else {
            return false;
        };
        let newest = match self.retention.list_retention_set(path) {
            Ok(mut entries) => match entries.pop() {
                Some(entry) => entry,
                None => return false,
            },
            Err(_) => return false,
        };
        let Ok(backup) = fs::metadata(&newest.path) else {
            return false;
        };

        let same_mtime = match (source.modified(), backup.modified()) {
            (Ok(a), Ok(b)) => a == b,
            _ => false,
        };
        same_mtime && source.len() == backup.len() && same_content(path, &newest.path)
    }

    /// Consume triggers until `Shutdown` arrives or every sender is dropped
    ///
    /// Errors are logged per event and never stop the loop. Returns the
    /// number of events handled.
    pub fn run(&self, triggers: &Receiver<Trigger>) -> usize {
        let mut handled = 0;
        for trigger in triggers.iter() {
            if trigger == Trigger::Shutdown {
                info!("shutdown requested, stopping event loop");
                break;
            }
            handled += 1;
            match self.handle(trigger.clone()) {
                Ok(_) => {}
                Err(e) if e.is_interrupted() => {
                    error!(?trigger, error = %e, "backup interrupted, source may be missing");
                }
                Err(e) => error!(?trigger, error = %e, "failed to handle event"),
            }
        }
        handled
    }

    /// Apply count retention to every matching file, then the age sweep
    pub fn prune_all(&self) -> SaveKeepResult<PruneReport> {
        let mut report = PruneReport::default();
        let max_depth = if self.settings.recursive { usize::MAX } else { 1 };
        let walker = WalkDir::new(&self.settings.scan_dir)
            .max_depth(max_depth)
            .into_iter()
            .filter_entry(|entry| !self.namer.is_backup_path(entry.path()));

        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    warn!(error = %e, "skipping unreadable scan entry");
                    report.failures += 1;
                    continue;
                }
            };
            if !entry.file_type().is_file() || !self.settings.file_match.is_match(entry.path()) {
                continue;
            }

            report.sources += 1;
            match self.retention.sweep_by_count(entry.path()) {
                Ok(removed) => report.removed_by_count.extend(removed),
                Err(e) => {
                    warn!(source = %entry.path().display(), error = %e, "failed to prune backups");
                    report.failures += 1;
                }
            }
        }

        report.by_age = self.retention.sweep_by_age()?;
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::settings::DEFAULT_FILE_MATCH;
    use chrono::{Duration, Utc};
    use std::fs;
    use std::sync::mpsc;
    use tempfile::TempDir;

    fn engine_in(temp: &TempDir, backup_limit: usize) -> BackupEngine {
        let scan = temp.path().join("art");
        fs::create_dir_all(&scan).unwrap();
        let settings = Settings::new(&scan, temp.path().join("backups"), DEFAULT_FILE_MATCH)
            .unwrap()
            .with_backup_limit(backup_limit)
            .prepare()
            .unwrap();
        BackupEngine::new(settings)
    }

    fn backup_names(dir: &Path) -> Vec<String> {
        let mut names: Vec<String> = fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }

    #[test]
    fn test_three_saves_with_limit_two() {
        let temp = TempDir::new().unwrap();
        let engine = engine_in(&temp, 2);
        let source = engine.settings().scan_dir.join("draft.sai2");
        let backups = engine.settings().backup_dir.clone();

        let mut created = Vec::new();
        for content in ["one", "two", "three"] {
            fs::write(&source, content).unwrap();
            match engine.on_file_closed(&source).unwrap() {
                Outcome::BackedUp { record, .. } => created.push(record.backup),
                other => panic!("expected backup, got {:?}", other),
            }
        }

        assert!(source.exists());
        assert!(!created[0].exists());
        assert!(created[1].exists());
        assert!(created[2].exists());
        assert_eq!(fs::read_to_string(&created[1]).unwrap(), "two");
        assert_eq!(fs::read_to_string(&created[2]).unwrap(), "three");
        assert_eq!(backup_names(&backups).len(), 2);
    }

    #[test]
    fn test_unmatched_file_is_ignored() {
        let temp = TempDir::new().unwrap();
        let engine = engine_in(&temp, 6);
        let source = engine.settings().scan_dir.join("notes.txt");
        fs::write(&source, "x").unwrap();

        let outcome = engine.on_file_closed(&source).unwrap();
        assert!(matches!(outcome, Outcome::Ignored(IgnoreReason::NotMatched)));
        assert!(backup_names(&engine.settings().backup_dir).is_empty());
    }

    #[test]
    fn test_event_under_backup_dir_is_ignored() {
        let temp = TempDir::new().unwrap();
        let engine = engine_in(&temp, 6);
        let inside = engine.settings().backup_dir.join("draft.1.sai2");
        fs::write(&inside, "x").unwrap();

        let outcome = engine.on_file_closed(&inside).unwrap();
        assert!(matches!(outcome, Outcome::Ignored(IgnoreReason::InBackupDir)));
        assert_eq!(backup_names(&engine.settings().backup_dir), vec!["draft.1.sai2"]);
    }

    #[test]
    fn test_missing_file_is_ignored() {
        let temp = TempDir::new().unwrap();
        let engine = engine_in(&temp, 6);
        let gone = engine.settings().scan_dir.join("gone.sai2");

        let outcome = engine.on_file_closed(&gone).unwrap();
        assert!(matches!(outcome, Outcome::Ignored(IgnoreReason::NotAFile)));
    }

    #[test]
    fn test_tick_is_noop_without_remove_by_time() {
        let temp = TempDir::new().unwrap();
        let engine = engine_in(&temp, 6);
        let old = engine.settings().backup_dir.join("draft.1.sai2");
        fs::write(&old, "x").unwrap();

        match engine.on_tick().unwrap() {
            Outcome::Swept(report) => assert_eq!(report.total_removed(), 0),
            other => panic!("expected sweep, got {:?}", other),
        }
        assert!(old.exists());
    }

    #[test]
    fn test_tick_removes_expired_backups() {
        let temp = TempDir::new().unwrap();
        let scan = temp.path().join("art");
        fs::create_dir_all(&scan).unwrap();
        let settings = Settings::new(&scan, temp.path().join("backups"), DEFAULT_FILE_MATCH)
            .unwrap()
            .with_remove_by_time(true)
            .with_max_age_days(7)
            .prepare()
            .unwrap();
        let engine = BackupEngine::new(settings);

        let now = Utc::now();
        let name_at = |age: Duration| {
            let nanos = (now - age).timestamp_nanos_opt().unwrap();
            engine
                .settings()
                .backup_dir
                .join(format!("draft.{}.sai2", nanos))
        };
        let recent = name_at(Duration::days(3));
        let expired = name_at(Duration::days(10));
        fs::write(&recent, "r").unwrap();
        fs::write(&expired, "e").unwrap();

        engine.handle(Trigger::Tick).unwrap();

        assert!(recent.exists());
        assert!(!expired.exists());
    }

    #[test]
    fn test_run_processes_until_shutdown() {
        let temp = TempDir::new().unwrap();
        let engine = engine_in(&temp, 6);
        let source = engine.settings().scan_dir.join("draft.sai2");
        fs::write(&source, "x").unwrap();

        let (tx, rx) = mpsc::channel();
        tx.send(Trigger::FileClosed(source.clone())).unwrap();
        tx.send(Trigger::Tick).unwrap();
        tx.send(Trigger::Shutdown).unwrap();
        tx.send(Trigger::FileClosed(source.clone())).unwrap();

        let handled = engine.run(&rx);

        assert_eq!(handled, 2);
        assert_eq!(backup_names(&engine.settings().backup_dir).len(), 1);
        assert!(source.exists());
    }

    #[test]
    fn test_run_survives_failed_events() {
        let temp = TempDir::new().unwrap();
        let engine = engine_in(&temp, 6);
        let outside = temp.path().join("outside.sai2");
        fs::write(&outside, "x").unwrap();
        let source = engine.settings().scan_dir.join("draft.sai2");
        fs::write(&source, "x").unwrap();

        let (tx, rx) = mpsc::channel();
        tx.send(Trigger::FileClosed(outside.clone())).unwrap();
        tx.send(Trigger::FileClosed(source)).unwrap();
        drop(tx);

        assert_eq!(engine.run(&rx), 2);
        assert!(outside.exists());
        assert_eq!(backup_names(&engine.settings().backup_dir).len(), 1);
    }

    #[test]
    fn test_prune_all_applies_limit_to_every_source() {
        let temp = TempDir::new().unwrap();
        let engine = engine_in(&temp, 1);
        let scan = engine.settings().scan_dir.clone();
        let backups = engine.settings().backup_dir.clone();
        fs::create_dir_all(scan.join("sub")).unwrap();
        fs::create_dir_all(backups.join("sub")).unwrap();
        fs::write(scan.join("a.sai2"), "a").unwrap();
        fs::write(scan.join("sub").join("b.sai2"), "b").unwrap();
        for t in 1..=3 {
            fs::write(backups.join(format!("a.{}.sai2", t)), "a").unwrap();
            fs::write(backups.join("sub").join(format!("b.{}.sai2", t)), "b").unwrap();
        }

        let report = engine.prune_all().unwrap();

        assert_eq!(report.sources, 2);
        assert_eq!(report.removed_by_count.len(), 4);
        assert_eq!(report.failures, 0);
        assert_eq!(backup_names(&backups), vec!["a.3.sai2", "sub"]);
        assert_eq!(backup_names(&backups.join("sub")), vec!["b.3.sai2"]);
    }

    #[test]
    fn test_close_of_unchanged_file_is_ignored() {
        let temp = TempDir::new().unwrap();
        let engine = engine_in(&temp, 6);
        let source = engine.settings().scan_dir.join("draft.sai2");
        fs::write(&source, "one").unwrap();

        assert!(matches!(
            engine.on_file_closed(&source).unwrap(),
            Outcome::BackedUp { .. }
        ));
        // The restored copy closing again must not back itself up
        let outcome = engine.on_file_closed(&source).unwrap();
        assert!(matches!(outcome, Outcome::Ignored(IgnoreReason::Unchanged)));
        assert_eq!(backup_names(&engine.settings().backup_dir).len(), 1);

        // Same size, different bytes
        fs::write(&source, "two").unwrap();
        assert!(matches!(
            engine.on_file_closed(&source).unwrap(),
            Outcome::BackedUp { .. }
        ));
        assert_eq!(backup_names(&engine.settings().backup_dir).len(), 2);
    }

    #[test]
    fn test_repeated_restore_events_keep_history() {
        let temp = TempDir::new().unwrap();
        let engine = engine_in(&temp, 2);
        let source = engine.settings().scan_dir.join("draft.sai2");
        let backups = engine.settings().backup_dir.clone();
        fs::write(backups.join("draft.1.sai2"), "v1").unwrap();
        fs::write(&source, "v2").unwrap();

        let (tx, rx) = mpsc::channel();
        for _ in 0..5 {
            tx.send(Trigger::FileClosed(source.clone())).unwrap();
        }
        drop(tx);
        engine.run(&rx);

        let names = backup_names(&backups);
        assert_eq!(names.len(), 2);
        assert!(names.contains(&"draft.1.sai2".to_string()));
    }
}
