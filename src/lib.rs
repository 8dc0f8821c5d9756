//! savekeep - continuous versioning for application save files
//!
//! Watches a directory tree for save files being closed after a write, moves
//! each one into a timestamped backup while leaving a copy in place, and
//! prunes old backups by count and by age.
//!
//! # Architecture
//!
//! The crate is organized into the following modules:
//!
//! - `config`: Default paths and validated runtime settings
//! - `error`: Custom error types
//! - `backup`: Naming, writing, retention and the event engine
//! - `daemon`: File watcher, sweep ticker and signal adapters
//! - `cli`: Command line options and subcommands
//!
//! # Example
//!
//! ```rust,ignore
//! use savekeep::config::Settings;
//!
//! let settings = Settings::new("art", "backups", r".*\.sai2")?
//!     .with_backup_limit(6)
//!     .prepare()?;
//! savekeep::daemon::run(settings)?;
//! ```

pub mod backup;
pub mod cli;
pub mod config;
pub mod daemon;
pub mod error;

pub use error::SaveKeepError;
