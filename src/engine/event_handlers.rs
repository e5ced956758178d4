// src/engine/event_handlers.rs

//! Structural consequences of normalized events.
//!
//! The core emits the event first and then calls into these handlers, which
//! keep the path table and kernel watches in line with what happened on
//! disk:
//! - CREATE_DIR installs the new subtree
//! - MOVED_FROM opens a pending move
//! - MOVED_TO closes it (rebase, teardown or install)
//! - DELETE_DIR and IN_IGNORED forget the subtree

use std::path::Path;
use std::time::Instant;

use tracing::{debug, error, warn};

use crate::errors::Result;
use crate::fs::FileSystem;
use crate::types::{EventKind, NormalizedEvent, RawEvent, WatchHandle};
use crate::watch::backend::{InstallError, WatchBackend};
use crate::watch::correlate::PendingMove;
use crate::watch::tree::InstallReport;

use super::core::WatchCore;

impl<B: WatchBackend, F: FileSystem> WatchCore<B, F> {
    pub(super) fn apply(&mut self, raw: &RawEvent, event: &NormalizedEvent, now: Instant) {
        match event.kind {
            EventKind::CreateDir => self.on_dir_created(raw.handle, &event.path),
            EventKind::MovedFrom | EventKind::MovedFromDir => {
                self.on_moved_from(raw.cookie, event, now)
            }
            EventKind::MovedTo | EventKind::MovedToDir => {
                self.on_moved_to(raw.cookie, raw.handle, event)
            }
            EventKind::DeleteDir => self.on_dir_deleted(&event.path),
            _ => {}
        }
    }

    fn on_dir_created(&mut self, parent: WatchHandle, path: &Path) {
        if self.is_excluded_under(parent, path) {
            debug!(?path, "not watching excluded directory");
            return;
        }
        let result = self.tree.install_subtree(&mut self.table, path, parent);
        self.record_install(path, result);
    }

    fn on_moved_from(&mut self, cookie: u32, event: &NormalizedEvent, now: Instant) {
        let from_handle = if event.is_dir {
            self.table.lookup(&event.path)
        } else {
            None
        };
        let generation = from_handle
            .and_then(|h| self.table.get(h))
            .map(|e| e.generation())
            .unwrap_or(0);

        let evicted = self.correlator.record(PendingMove {
            cookie,
            from_path: event.path.clone(),
            from_handle,
            generation,
            is_dir: event.is_dir,
            timestamp: now,
        });
        for pending in evicted {
            self.move_out_of_scope(pending);
        }
    }

    fn on_moved_to(&mut self, cookie: u32, parent: WatchHandle, event: &NormalizedEvent) {
        let pending = self.correlator.take(cookie);
        if !event.is_dir {
            return;
        }
        let path = event.path.as_path();
        let excluded = self.is_excluded_under(parent, path);

        let watched = pending.as_ref().and_then(|p| {
            let handle = p.from_handle?;
            let current = self.table.get(handle)?.generation();
            (current == p.generation).then_some(handle)
        });

        match watched {
            Some(handle) if excluded => {
                debug!(%handle, ?path, "directory renamed to excluded name");
                self.tree.remove_subtree(&mut self.table, handle, true);
            }
            Some(handle) => {
                self.table.rebase(handle, path);
                self.confirm_rebased(handle, parent, path);
            }
            None if excluded => {}
            None => {
                match &pending {
                    Some(p) => debug!(from = ?p.from_path, to = ?path, "unwatched directory moved into view"),
                    None => debug!(?path, "directory moved in from outside"),
                }
                let result = self.tree.install_subtree(&mut self.table, path, parent);
                self.record_install(path, result);
            }
        }
    }

    /// The MOVED_FROM handle was found by name, so it belongs to whatever
    /// held that name when the event was processed. If the name was reused
    /// in the meantime the kernel hands back a different watch for `path`:
    /// drop the rebased one and watch what is really there. A destination
    /// that is already gone again is left to the events still queued.
    fn confirm_rebased(&mut self, handle: WatchHandle, parent: WatchHandle, path: &Path) {
        match self.tree.backend_mut().add_watch(path) {
            Ok(current) if current == handle => debug!(%handle, ?path, "moved directory rebased"),
            // A directory already watched never hits the limit, so both mean
            // something else now holds the name.
            Ok(_) | Err(InstallError::LimitReached) => {
                debug!(%handle, ?path, "source name reused before the move was seen; rewatching");
                self.tree.remove_subtree(&mut self.table, handle, true);
                let result = self.tree.install_subtree(&mut self.table, path, parent);
                self.record_install(path, result);
            }
            Err(err) => debug!(%handle, ?path, error = %err, "moved directory rebased; destination already gone"),
        }
    }

    fn on_dir_deleted(&mut self, path: &Path) {
        if let Some(handle) = self.table.lookup(path) {
            self.tree.remove_subtree(&mut self.table, handle, false);
        }
    }

    /// The kernel dropped a watch: the directory is gone (or we released it).
    pub(super) fn on_watch_ignored(&mut self, handle: WatchHandle) {
        let Some(entry) = self.table.get(handle) else {
            return;
        };
        if entry.parent().is_none() {
            warn!(path = ?entry.path(), "watch root removed");
        }
        self.tree.remove_subtree(&mut self.table, handle, false);
    }

    /// An unpaired MOVED_FROM: the entry left every watched root.
    pub(super) fn move_out_of_scope(&mut self, pending: PendingMove) {
        self.diagnostics.record_expired();
        let Some(handle) = pending.from_handle else {
            return;
        };
        let current = self.table.get(handle).map(|e| e.generation());
        if current != Some(pending.generation) {
            debug!(%handle, "moved-out directory was re-registered; keeping it");
            return;
        }
        debug!(%handle, path = ?pending.from_path, "directory moved out of scope");
        self.tree.remove_subtree(&mut self.table, handle, true);
    }

    fn is_excluded_under(&self, parent: WatchHandle, path: &Path) -> bool {
        self.table
            .relative_to_root(parent, path)
            .is_some_and(|rel| self.tree.filter().is_excluded(rel))
    }

    fn record_install(&mut self, path: &Path, result: Result<InstallReport>) {
        match result {
            Ok(report) => self.diagnostics.record_skipped(report.skipped),
            Err(err) => {
                error!(?path, error = %err, "failed to watch subtree");
                self.diagnostics.record_failure(path.to_path_buf(), err.to_string());
            }
        }
    }
}
