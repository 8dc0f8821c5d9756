//! Directory watcher delivering file-closed triggers
//!
//! Wraps a `notify` watcher on the scan directory. Only close-after-write
//! events are forwarded, and anything under the backup directory is dropped
//! here already so backup housekeeping never feeds back into the engine.

use std::path::{Path, PathBuf};
use std::sync::mpsc::Sender;

use notify::event::{AccessKind, AccessMode};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tracing::{debug, error, info};

use crate::backup::Trigger;
use crate::config::Settings;
use crate::error::{SaveKeepError, SaveKeepResult};

/// Keeps the underlying watcher alive; dropping it stops the watch
pub struct SaveWatcher {
    _watcher: RecommendedWatcher,
}

impl SaveWatcher {
    /// Start watching `settings.scan_dir`, sending triggers to `triggers`
    pub fn start(settings: &Settings, triggers: Sender<Trigger>) -> SaveKeepResult<Self> {
        let backup_root = settings.backup_dir.clone();

        let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| {
            match res {
                Ok(event) => {
                    for path in closed_paths(&event, &backup_root) {
                        if triggers.send(Trigger::FileClosed(path)).is_err() {
                            debug!("event loop closed, dropping file event");
                        }
                    }
                }
                Err(e) => {
                    error!(error = %e, "file watch error");
                }
            }
        })?;

        let mode = if settings.recursive {
            RecursiveMode::Recursive
        } else {
            RecursiveMode::NonRecursive
        };
        watcher.watch(&settings.scan_dir, mode).map_err(|e| {
            SaveKeepError::Watch(format!(
                "Failed to watch {}: {}",
                settings.scan_dir.display(),
                e
            ))
        })?;

        info!(
            scan_dir = %settings.scan_dir.display(),
            recursive = settings.recursive,
            "file watcher started"
        );

        Ok(Self { _watcher: watcher })
    }
}

/// Whether an event reports a file closed after writing
pub fn is_close_write(kind: &EventKind) -> bool {
    matches!(kind, EventKind::Access(AccessKind::Close(AccessMode::Write)))
}

/// Paths of a close-after-write event that lie outside `backup_root`
fn closed_paths(event: &Event, backup_root: &Path) -> Vec<PathBuf> {
    if !is_close_write(&event.kind) {
        return Vec::new();
    }
    event
        .paths
        .iter()
        .filter(|path| !path.starts_with(backup_root))
        .cloned()
        .collect()
}
