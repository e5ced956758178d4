#![allow(dead_code)]

use std::path::{Path, PathBuf};

use treewatch::config::{ConfigFile, RawConfigFile, validate_with};
use treewatch::fs::FileSystem;
use treewatch::types::OutputFormat;

/// Builder for `ConfigFile` to simplify test setup.
pub struct ConfigFileBuilder {
    config: RawConfigFile,
}

impl ConfigFileBuilder {
    pub fn new() -> Self {
        Self {
            config: RawConfigFile::default(),
        }
    }

    pub fn with_root(mut self, root: impl AsRef<Path>) -> Self {
        self.config.watch.roots.push(root.as_ref().to_path_buf());
        self
    }

    pub fn with_exclude(mut self, pattern: &str) -> Self {
        self.config.watch.exclude.push(pattern.to_string());
        self
    }

    pub fn with_format(mut self, format: OutputFormat) -> Self {
        self.config.output.format = format;
        self
    }

    pub fn with_pairing_window_ms(mut self, ms: u64) -> Self {
        self.config.tuning.pairing_window_ms = ms;
        self
    }

    pub fn with_max_pending_moves(mut self, max: usize) -> Self {
        self.config.tuning.max_pending_moves = max;
        self
    }

    pub fn roots(&self) -> &[PathBuf] {
        &self.config.watch.roots
    }

    pub fn raw(self) -> RawConfigFile {
        self.config
    }

    /// Validate against the real filesystem.
    pub fn build(self) -> ConfigFile {
        ConfigFile::try_from(self.config).expect("Failed to build valid config from builder")
    }

    /// Validate against a mock or simulated filesystem.
    pub fn build_with<F: FileSystem>(self, fs: &F) -> ConfigFile {
        validate_with(self.config, fs).expect("Failed to build valid config from builder")
    }
}

impl Default for ConfigFileBuilder {
    fn default() -> Self {
        Self::new()
    }
}
