// src/cli.rs

//! CLI argument parsing using `clap`.

use std::path::PathBuf;

use clap::{Parser, ValueEnum};

use crate::config::model::RawConfigFile;
use crate::types::OutputFormat;

/// Command-line arguments for `treewatch`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "treewatch",
    version,
    about = "Recursively watch directory trees and print one line per change.",
    long_about = None
)]
pub struct CliArgs {
    /// Directories to watch (appended to `[watch].roots` from the config).
    #[arg(value_name = "ROOT")]
    pub roots: Vec<PathBuf>,

    /// Optional config file (TOML).
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Directory name (or `a/b` fragment) to skip. Repeatable.
    #[arg(long = "exclude", value_name = "NAME")]
    pub exclude: Vec<String>,

    /// Output line format: `comma` (CSV-quoted paths) or `space` (legacy).
    #[arg(long, value_name = "FORMAT")]
    pub format: Option<OutputFormat>,

    /// How long an unpaired MOVED_FROM waits for its MOVED_TO.
    #[arg(long, value_name = "MS")]
    pub pairing_window_ms: Option<u64>,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `TREEWATCH_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,
}

impl CliArgs {
    /// Layer the flags over a config loaded from file (or the defaults).
    pub fn apply_to(&self, raw: &mut RawConfigFile) {
        raw.watch.roots.extend(self.roots.iter().cloned());
        raw.watch.exclude.extend(self.exclude.iter().cloned());
        if let Some(format) = self.format {
            raw.output.format = format;
        }
        if let Some(ms) = self.pairing_window_ms {
            raw.tuning.pairing_window_ms = ms;
        }
    }
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}
