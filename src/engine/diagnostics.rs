// src/engine/diagnostics.rs

//! Counters shared between the event loop and the `Watcher` handle.

use std::path::PathBuf;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

/// A subtree whose installation failed fatally (e.g. watch limit).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailedSubtree {
    pub path: PathBuf,
    pub error: String,
}

#[derive(Debug, Default)]
pub struct Diagnostics {
    orphans: AtomicU64,
    skipped_installs: AtomicU64,
    suppressed: AtomicU64,
    expired_moves: AtomicU64,
    watch_count: AtomicUsize,
    failed_subtrees: Mutex<Vec<FailedSubtree>>,
}

/// Point-in-time copy of [`Diagnostics`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DiagnosticsSnapshot {
    /// Notifications whose watch was no longer known.
    pub orphans: u64,
    /// Directories not watched because they vanished or were unreadable.
    pub skipped_installs: u64,
    /// Events dropped by exclusion or because their directory was mid-move.
    pub suppressed: u64,
    /// MOVED_FROMs that never paired.
    pub expired_moves: u64,
    pub watch_count: usize,
    pub failed_subtrees: Vec<FailedSubtree>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_orphan(&self) {
        self.orphans.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_skipped(&self, count: usize) {
        self.skipped_installs.fetch_add(count as u64, Ordering::Relaxed);
    }

    pub fn record_suppressed(&self) {
        self.suppressed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_expired(&self) {
        self.expired_moves.fetch_add(1, Ordering::Relaxed);
    }

    pub fn set_watch_count(&self, count: usize) {
        self.watch_count.store(count, Ordering::Relaxed);
    }

    pub fn record_failure(&self, path: PathBuf, error: String) {
        let mut failed = self
            .failed_subtrees
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        failed.push(FailedSubtree { path, error });
    }

    pub fn watch_count(&self) -> usize {
        self.watch_count.load(Ordering::Relaxed)
    }

    pub fn snapshot(&self) -> DiagnosticsSnapshot {
        let failed_subtrees = self
            .failed_subtrees
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone();
        DiagnosticsSnapshot {
            orphans: self.orphans.load(Ordering::Relaxed),
            skipped_installs: self.skipped_installs.load(Ordering::Relaxed),
            suppressed: self.suppressed.load(Ordering::Relaxed),
            expired_moves: self.expired_moves.load(Ordering::Relaxed),
            watch_count: self.watch_count(),
            failed_subtrees,
        }
    }
}
