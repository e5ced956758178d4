// src/config/validate.rs

use std::path::PathBuf;

use crate::config::model::{ConfigFile, RawConfigFile};
use crate::engine::WatchOptions;
use crate::errors::{Result, WatcherError};
use crate::fs::{FileSystem, RealFileSystem};

impl TryFrom<RawConfigFile> for ConfigFile {
    type Error = crate::errors::WatcherError;

    fn try_from(raw: RawConfigFile) -> std::result::Result<Self, Self::Error> {
        validate_with(raw, &RealFileSystem)
    }
}

/// Validate `raw` against `fs` and produce a [`ConfigFile`].
pub fn validate_with<F: FileSystem>(raw: RawConfigFile, fs: &F) -> Result<ConfigFile> {
    let RawConfigFile {
        mut watch,
        output,
        tuning,
    } = raw;

    watch.roots = validate_roots(&watch.roots, fs)?;
    validate_exclusions(&watch.exclude)?;
    validate_options(&tuning.options())?;

    Ok(ConfigFile::new_unchecked(watch, output, tuning))
}

/// Check the root list and return it absolute and de-duplicated, in order.
///
/// Symlinks are not resolved: a root is reported under the path given.
pub fn validate_roots<F: FileSystem>(roots: &[PathBuf], fs: &F) -> Result<Vec<PathBuf>> {
    if roots.is_empty() {
        return Err(WatcherError::ConfigError(
            "at least one root directory is required".to_string(),
        ));
    }

    let mut validated: Vec<PathBuf> = Vec::with_capacity(roots.len());
    for root in roots {
        let absolute = fs.absolute(root)?;
        if !fs.exists(&absolute) {
            return Err(WatcherError::RootNotFound(absolute));
        }
        if !fs.is_dir(&absolute) {
            return Err(WatcherError::NotADirectory(absolute));
        }
        if !validated.contains(&absolute) {
            validated.push(absolute);
        }
    }
    Ok(validated)
}

pub fn validate_exclusions(patterns: &[String]) -> Result<()> {
    for pattern in patterns {
        let trimmed = pattern.trim_matches('/');
        if trimmed.is_empty() {
            return Err(WatcherError::ConfigError(format!(
                "exclusion pattern {pattern:?} is empty"
            )));
        }
        if trimmed
            .split('/')
            .any(|segment| segment.is_empty() || segment == "." || segment == "..")
        {
            return Err(WatcherError::ConfigError(format!(
                "exclusion pattern {pattern:?} must be plain names separated by '/'"
            )));
        }
    }
    Ok(())
}

pub fn validate_options(options: &WatchOptions) -> Result<()> {
    if options.pairing_window.is_zero() {
        return Err(WatcherError::ConfigError(
            "[tuning].pairing_window_ms must be >= 1 (got 0)".to_string(),
        ));
    }
    if options.max_pending_moves == 0 {
        return Err(WatcherError::ConfigError(
            "[tuning].max_pending_moves must be >= 1 (got 0)".to_string(),
        ));
    }
    if options.event_buffer == 0 {
        return Err(WatcherError::ConfigError(
            "[tuning].event_buffer must be >= 1 (got 0)".to_string(),
        ));
    }
    Ok(())
}
