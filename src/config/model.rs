// src/config/model.rs

use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

use crate::engine::{DEFAULT_EVENT_BUFFER, DEFAULT_MAX_PENDING_MOVES, WatchOptions};
use crate::types::OutputFormat;

/// Configuration as read from a TOML file, before validation.
///
/// ```toml
/// [watch]
/// roots = ["/srv/data"]
/// exclude = ["node_modules", ".git"]
///
/// [output]
/// format = "comma"
///
/// [tuning]
/// pairing_window_ms = 100
/// max_pending_moves = 4096
/// event_buffer = 1024
/// ```
///
/// All sections are optional and have reasonable defaults. Roots given on
/// the command line are appended to `watch.roots`, so a file without roots
/// is fine as long as the CLI supplies some.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawConfigFile {
    #[serde(default)]
    pub watch: WatchSection,

    #[serde(default)]
    pub output: OutputSection,

    #[serde(default)]
    pub tuning: TuningSection,
}

/// `[watch]` section.
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct WatchSection {
    /// Directories to watch recursively.
    #[serde(default)]
    pub roots: Vec<PathBuf>,

    /// Directory names (or `a/b` fragments) never watched or reported.
    #[serde(default)]
    pub exclude: Vec<String>,
}

/// `[output]` section.
#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct OutputSection {
    /// `"comma"` (default) or `"space"`.
    #[serde(default)]
    pub format: OutputFormat,
}

/// `[tuning]` section.
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct TuningSection {
    /// How long an unpaired MOVED_FROM waits for its MOVED_TO.
    #[serde(default = "default_pairing_window_ms")]
    pub pairing_window_ms: u64,

    #[serde(default = "default_max_pending_moves")]
    pub max_pending_moves: usize,

    /// Capacity of the events channel between the event loop and the
    /// consumer.
    #[serde(default = "default_event_buffer")]
    pub event_buffer: usize,
}

fn default_pairing_window_ms() -> u64 {
    100
}

fn default_max_pending_moves() -> usize {
    DEFAULT_MAX_PENDING_MOVES
}

fn default_event_buffer() -> usize {
    DEFAULT_EVENT_BUFFER
}

impl Default for TuningSection {
    fn default() -> Self {
        Self {
            pairing_window_ms: default_pairing_window_ms(),
            max_pending_moves: default_max_pending_moves(),
            event_buffer: default_event_buffer(),
        }
    }
}

impl TuningSection {
    pub fn options(&self) -> WatchOptions {
        WatchOptions {
            pairing_window: Duration::from_millis(self.pairing_window_ms),
            max_pending_moves: self.max_pending_moves,
            event_buffer: self.event_buffer,
        }
    }
}

/// Validated configuration.
///
/// Only obtainable through `TryFrom<RawConfigFile>` (or
/// [`crate::config::validate::validate_with`]): roots are absolute, exist
/// and are directories; exclusion patterns and tuning values are sane.
#[derive(Debug, Clone)]
pub struct ConfigFile {
    watch: WatchSection,
    output: OutputSection,
    tuning: TuningSection,
}

impl ConfigFile {
    pub(crate) fn new_unchecked(watch: WatchSection, output: OutputSection, tuning: TuningSection) -> Self {
        Self {
            watch,
            output,
            tuning,
        }
    }

    pub fn roots(&self) -> &[PathBuf] {
        &self.watch.roots
    }

    pub fn exclude(&self) -> &[String] {
        &self.watch.exclude
    }

    pub fn format(&self) -> OutputFormat {
        self.output.format
    }

    pub fn tuning(&self) -> &TuningSection {
        &self.tuning
    }

    pub fn options(&self) -> WatchOptions {
        self.tuning.options()
    }
}
