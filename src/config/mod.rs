//! Configuration module for savekeep
//!
//! This module provides configuration management including:
//! - Default scan and backup directory resolution
//! - Validated, immutable runtime settings

pub mod paths;
pub mod settings;

pub use paths::DefaultPaths;
pub use settings::{FileMatch, Settings};
