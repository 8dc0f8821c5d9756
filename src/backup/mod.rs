//! Backup-and-rotation engine for savekeep
//!
//! Turns every closed save file into a timestamped backup while leaving a
//! copy in place, and prunes old backups by count and by age.
//!
//! # Architecture
//!
//! - `PathNamer`: maps source files to backup paths and retention patterns
//! - `BackupWriter`: moves the live file away and restores a copy
//! - `RetentionPolicy`: count sweep per source, age sweep over the tree
//! - `BackupEngine`: dispatches `Trigger`s to the above, one at a time
//!
//! # Backup Layout
//!
//! Backups mirror the scan directory's layout under the backup directory and
//! are named `{stem}.{nanoseconds since epoch}{extension}`:
//!
//! ```text
//! art/comic/page1.sai2  ->  backups/comic/page1.1700000000123456789.sai2
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! use savekeep::backup::{BackupEngine, Trigger};
//! use savekeep::config::Settings;
//!
//! let settings = Settings::new("art", "backups", r".*\.sai2")?.prepare()?;
//! let engine = BackupEngine::new(settings);
//! engine.handle(Trigger::FileClosed("art/draft.sai2".into()))?;
//! engine.handle(Trigger::Tick)?;
//! ```

mod engine;
mod naming;
mod retention;
mod writer;

pub use engine::{BackupEngine, IgnoreReason, Outcome, PruneReport, Trigger};
pub use naming::{backup_file_name, parse_backup_time, temp_path_for, PathNamer};
pub use retention::{AgeSweepReport, BackupEntry, RetentionPolicy};
pub use writer::{remove_file_if_exists, same_content, BackupRecord, BackupWriter};
