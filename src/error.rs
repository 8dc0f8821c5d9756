//! Custom error types for savekeep
//!
//! This module defines the error hierarchy for the application using thiserror
//! for ergonomic error definitions.

use std::path::PathBuf;

use thiserror::Error;

/// The main error type for savekeep operations
#[derive(Error, Debug)]
pub enum SaveKeepError {
    /// A source path that does not live under the scan directory
    #[error("Path {} is outside the scan directory {}", path.display(), root.display())]
    OutOfScope { path: PathBuf, root: PathBuf },

    /// Move/copy/delete/list failures
    #[error("Filesystem error: {0}")]
    Filesystem(String),

    /// A backup that failed after the source was moved away.
    ///
    /// The source path may be missing; the pre-backup content is at `backup`.
    #[error(
        "Backup of {} interrupted, pre-backup content is at {}: {reason}",
        source_path.display(),
        backup.display()
    )]
    Interrupted {
        source_path: PathBuf,
        backup: PathBuf,
        reason: String,
    },

    /// Invalid file match pattern
    #[error("Invalid file match pattern: {0}")]
    Pattern(String),

    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Watch and schedule adapter errors
    #[error("Watch error: {0}")]
    Watch(String),
}

impl SaveKeepError {
    /// Create an "out of scope" error for a path outside `root`
    pub fn out_of_scope(path: impl Into<PathBuf>, root: impl Into<PathBuf>) -> Self {
        Self::OutOfScope {
            path: path.into(),
            root: root.into(),
        }
    }

    /// Check if this error left a source file possibly missing
    pub fn is_interrupted(&self) -> bool {
        matches!(self, Self::Interrupted { .. })
    }
}

// Implement From traits for common error types

impl From<std::io::Error> for SaveKeepError {
    fn from(err: std::io::Error) -> Self {
        Self::Filesystem(err.to_string())
    }
}

impl From<walkdir::Error> for SaveKeepError {
    fn from(err: walkdir::Error) -> Self {
        Self::Filesystem(err.to_string())
    }
}

impl From<regex::Error> for SaveKeepError {
    fn from(err: regex::Error) -> Self {
        Self::Pattern(err.to_string())
    }
}

impl From<notify::Error> for SaveKeepError {
    fn from(err: notify::Error) -> Self {
        Self::Watch(err.to_string())
    }
}

impl From<serde_json::Error> for SaveKeepError {
    fn from(err: serde_json::Error) -> Self {
        Self::Config(format!("Failed to serialize: {}", err))
    }
}

/// Result type alias for savekeep operations
pub type SaveKeepResult<T> = Result<T, SaveKeepError>;
