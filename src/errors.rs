// src/errors.rs

//! Crate-wide error aliases and helpers.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum WatcherError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Root path does not exist: {0:?}")]
    RootNotFound(PathBuf),

    #[error("Root path is not a directory: {0:?}")]
    NotADirectory(PathBuf),

    #[error("Watch limit reached while installing {path:?}; raise fs.inotify.max_user_watches")]
    WatchLimit { path: PathBuf },

    #[error("Cannot watch {path:?}: {source}")]
    Install {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Kernel event queue overflowed; events were lost")]
    QueueOverflow,

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, WatcherError>;
