//! Long-running watch mode
//!
//! Wires the adapters to the engine: the file watcher, the sweep ticker and
//! the signal handler all send `Trigger`s into one channel, and the engine
//! consumes it on the calling thread.

mod signal;
mod ticker;
mod watcher;

use std::sync::mpsc::{self, Receiver, Sender};

use tracing::info;

use crate::backup::{BackupEngine, Trigger};
use crate::config::Settings;
use crate::error::SaveKeepResult;

pub use signal::install_shutdown_handler;
pub use ticker::Ticker;
pub use watcher::{is_close_write, SaveWatcher};

/// Run until SIGINT/SIGTERM
pub fn run(settings: Settings) -> SaveKeepResult<()> {
    let (tx, rx) = mpsc::channel();
    install_shutdown_handler(tx.clone())?;
    serve(settings, tx, &rx)?;
    Ok(())
}

/// Start the watcher and ticker and process triggers until `Shutdown`
///
/// Returns the number of events handled.
pub fn serve(
    settings: Settings,
    triggers: Sender<Trigger>,
    receiver: &Receiver<Trigger>,
) -> SaveKeepResult<usize> {
    let engine = BackupEngine::new(settings);
    let watcher = SaveWatcher::start(engine.settings(), triggers.clone())?;
    let ticker = Ticker::start(engine.settings().sweep_interval(), triggers)?;

    info!(
        backup_dir = %engine.settings().backup_dir.display(),
        backup_limit = engine.settings().backup_limit,
        remove_by_time = engine.settings().remove_by_time,
        "savekeep running"
    );

    let handled = engine.run(receiver);

    drop(watcher);
    ticker.stop();
    info!(handled, "savekeep stopped");
    Ok(handled)
}

#[cfg(all(test, target_os = "linux"))]
mod tests {
    use super::*;
    use crate::config::settings::DEFAULT_FILE_MATCH;
    use std::fs;
    use std::thread;
    use std::time::{Duration, Instant};
    use tempfile::TempDir;

    #[test]
    fn test_serve_backs_up_saved_file() {
        let temp = TempDir::new().unwrap();
        let scan = temp.path().join("art");
        fs::create_dir_all(&scan).unwrap();
        let settings = Settings::new(&scan, temp.path().join("backups"), DEFAULT_FILE_MATCH)
            .unwrap()
            .prepare()
            .unwrap();
        let source = settings.scan_dir.join("draft.sai2");
        let backup_dir = settings.backup_dir.clone();

        let (tx, rx) = mpsc::channel();
        let stopper = tx.clone();
        let writer_source = source.clone();
        let writer_backups = backup_dir.clone();
        let worker = thread::spawn(move || {
            thread::sleep(Duration::from_millis(200));
            fs::write(&writer_source, b"strokes").unwrap();

            let deadline = Instant::now() + Duration::from_secs(5);
            while Instant::now() < deadline {
                if fs::read_dir(&writer_backups).unwrap().count() > 0 {
                    break;
                }
                thread::sleep(Duration::from_millis(20));
            }
            stopper.send(Trigger::Shutdown).unwrap();
        });

        serve(settings, tx, &rx).unwrap();
        worker.join().unwrap();

        let backups: Vec<_> = fs::read_dir(&backup_dir)
            .unwrap()
            .map(|e| e.unwrap().path())
            .collect();
        assert_eq!(backups.len(), 1);
        assert_eq!(fs::read(&backups[0]).unwrap(), b"strokes");
        assert_eq!(fs::read(&source).unwrap(), b"strokes");
    }

    #[test]
    fn test_cross_filesystem_restore_does_not_retrigger() {
        use std::os::unix::fs::MetadataExt;

        let backup_temp = TempDir::new().unwrap();
        if !std::path::Path::new("/dev/shm").is_dir() {
            return;
        }
        let scan_temp = tempfile::Builder::new()
            .prefix("savekeep")
            .tempdir_in("/dev/shm")
            .unwrap();
        let scan_dev = fs::metadata(scan_temp.path()).unwrap().dev();
        if scan_dev == fs::metadata(backup_temp.path()).unwrap().dev() {
            return;
        }

        let settings = Settings::new(
            scan_temp.path(),
            backup_temp.path().join("backups"),
            DEFAULT_FILE_MATCH,
        )
        .unwrap()
        .with_backup_limit(1000)
        .prepare()
        .unwrap();
        let source = settings.scan_dir.join("draft.sai2");
        let backup_dir = settings.backup_dir.clone();

        let (tx, rx) = mpsc::channel();
        let stopper = tx.clone();
        let writer_source = source.clone();
        let worker = thread::spawn(move || {
            thread::sleep(Duration::from_millis(200));
            fs::write(&writer_source, b"strokes").unwrap();
            thread::sleep(Duration::from_secs(2));
            stopper.send(Trigger::Shutdown).unwrap();
        });

        serve(settings, tx, &rx).unwrap();
        worker.join().unwrap();

        let backups: Vec<_> = fs::read_dir(&backup_dir)
            .unwrap()
            .map(|e| e.unwrap().path())
            .collect();
        assert_eq!(backups.len(), 1);
        assert_eq!(fs::read(&backups[0]).unwrap(), b"strokes");
        assert_eq!(fs::read(&source).unwrap(), b"strokes");
    }
}
