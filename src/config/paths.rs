//! Default directory resolution for savekeep
//!
//! ## Path Resolution Order
//!
//! 1. Explicit command line flag or its `SAVEKEEP_*` environment variable
//! 2. Unix (Linux/macOS): `$HOME/aux/art` and `$HOME/aux/backups`
//! 3. Windows: `%USERPROFILE%\aux\art` and `%USERPROFILE%\aux\backups`

use std::path::{Path, PathBuf};

use crate::error::{SaveKeepError, SaveKeepResult};

/// Environment variable overriding the scan directory
pub const SCAN_DIR_ENV: &str = "SAVEKEEP_SCAN_DIR";

/// Environment variable overriding the backup directory
pub const BACKUP_DIR_ENV: &str = "SAVEKEEP_BACKUP_DIR";

/// Default scan and backup roots
#[derive(Debug, Clone)]
pub struct DefaultPaths {
    base_dir: PathBuf,
}

impl DefaultPaths {
    /// Resolve defaults from the user's home directory
    ///
    /// # Errors
    ///
    /// Returns an error if the home directory cannot be determined.
    pub fn new() -> SaveKeepResult<Self> {
        Ok(Self {
            base_dir: resolve_home()?.join("aux"),
        })
    }

    /// Create DefaultPaths with a custom base directory (useful for testing)
    pub fn with_base_dir(base_dir: PathBuf) -> Self {
        Self { base_dir }
    }

    /// Directory holding both default roots
    pub fn base_dir(&self) -> &PathBuf {
        &self.base_dir
    }

    /// Default directory watched for save files
    pub fn scan_dir(&self) -> PathBuf {
        self.base_dir.join("art")
    }

    /// Default directory receiving backups
    pub fn backup_dir(&self) -> PathBuf {
        self.base_dir.join("backups")
    }
}

/// Turn a possibly relative path into an absolute one without touching the filesystem
pub fn absolutize(path: &Path) -> SaveKeepResult<PathBuf> {
    if path.is_absolute() {
        return Ok(path.to_path_buf());
    }
    let cwd = std::env::current_dir().map_err(|e| {
        SaveKeepError::Config(format!("Failed to determine current directory: {}", e))
    })?;
    Ok(cwd.join(path))
}

#[cfg(not(windows))]
fn resolve_home() -> SaveKeepResult<PathBuf> {
    std::env::var("HOME")
        .map(PathBuf::from)
        .map_err(|_| SaveKeepError::Config("HOME environment variable not set".into()))
}

#[cfg(windows)]
fn resolve_home() -> SaveKeepResult<PathBuf> {
    std::env::var("USERPROFILE")
        .map(PathBuf::from)
        .map_err(|_| SaveKeepError::Config("Could not determine USERPROFILE directory".into()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_custom_base_dir() {
        let temp_dir = TempDir::new().unwrap();
        let paths = DefaultPaths::with_base_dir(temp_dir.path().to_path_buf());

        assert_eq!(paths.base_dir(), temp_dir.path());
        assert_eq!(paths.scan_dir(), temp_dir.path().join("art"));
        assert_eq!(paths.backup_dir(), temp_dir.path().join("backups"));
    }

    #[test]
    fn test_absolutize_relative() {
        let resolved = absolutize(Path::new("saves")).unwrap();
        assert!(resolved.is_absolute());
        assert!(resolved.ends_with("saves"));
    }

    #[test]
    fn test_absolutize_keeps_absolute() {
        let temp_dir = TempDir::new().unwrap();
        assert_eq!(absolutize(temp_dir.path()).unwrap(), temp_dir.path());
    }
}
