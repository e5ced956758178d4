// src/watch/backend.rs

//! Pluggable kernel watch backend.
//!
//! The core talks to a `WatchBackend` instead of inotify directly. This
//! keeps path resolution, correlation and tree management testable against
//! an in-memory simulator while production uses
//! [`super::inotify_backend`].
//!
//! - `add_watch` / `remove_watch` are the watch installation primitive.
//! - `translate` turns the backend's native notification type into a
//!   [`Notification`] tagged with a [`WatchHandle`]. It runs on the event
//!   loop, so the backend can keep its descriptor map in sync with what it
//!   reports.

use std::io;
use std::path::Path;

use thiserror::Error;

use crate::types::{Notification, WatchHandle};

/// Why a single directory could not be watched.
#[derive(Error, Debug)]
pub enum InstallError {
    /// The directory disappeared (or turned into a non-directory) between
    /// discovery and installation.
    #[error("directory vanished before it could be watched")]
    Vanished,

    #[error("permission denied")]
    PermissionDenied,

    /// The per-user watch limit is exhausted.
    #[error("watch limit reached")]
    LimitReached,

    #[error(transparent)]
    Io(#[from] io::Error),
}

impl InstallError {
    /// Map an OS error from a watch syscall into the install taxonomy.
    pub fn from_os(err: io::Error) -> Self {
        match err.raw_os_error() {
            Some(libc::ENOENT) | Some(libc::ENOTDIR) => InstallError::Vanished,
            Some(libc::EACCES) | Some(libc::EPERM) => InstallError::PermissionDenied,
            Some(libc::ENOSPC) => InstallError::LimitReached,
            _ => InstallError::Io(err),
        }
    }
}

pub trait WatchBackend: Send {
    /// Native notification type read from the kernel source.
    type Raw;

    /// Install (or look up) the watch for the directory at `path`.
    ///
    /// Watching a directory that is already watched returns its existing
    /// handle.
    fn add_watch(&mut self, path: &Path) -> Result<WatchHandle, InstallError>;

    /// Release a watch whose directory still exists but left our scope.
    fn remove_watch(&mut self, handle: WatchHandle);

    /// Tag a native notification with its handle.
    fn translate(&mut self, raw: Self::Raw) -> Notification;
}
