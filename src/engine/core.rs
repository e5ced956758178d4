// src/engine/core.rs

//! Pure core event loop state.
//!
//! `WatchCore` consumes backend notifications one at a time and produces the
//! normalized events to emit. It owns the path table, the watch tree and the
//! rename correlator, and applies every structural consequence (install,
//! rebase, teardown) before returning, so the next notification always
//! resolves against up-to-date paths.
//!
//! There are no channels, no Tokio types and no clocks in here: callers pass
//! `now` explicitly. The async shell lives in [`super::runtime`].

use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use tracing::{error, trace};

use crate::errors::{Result, WatcherError};
use crate::fs::FileSystem;
use crate::types::{Notification, NormalizedEvent, RawKind, WatchHandle};
use crate::watch::backend::WatchBackend;
use crate::watch::correlate::RenameCorrelator;
use crate::watch::exclude::ExclusionFilter;
use crate::watch::normalize::{Normalized, normalize};
use crate::watch::path_table::PathTable;
use crate::watch::tree::{InstallReport, WatchTree};

use super::WatchOptions;
use super::diagnostics::Diagnostics;

#[derive(Debug)]
pub struct WatchCore<B, F> {
    pub(super) table: PathTable,
    pub(super) tree: WatchTree<B, F>,
    pub(super) correlator: RenameCorrelator,
    pub(super) diagnostics: Arc<Diagnostics>,
}

impl<B: WatchBackend, F: FileSystem> WatchCore<B, F> {
    pub fn new(backend: B, fs: F, filter: ExclusionFilter, options: &WatchOptions) -> Self {
        Self {
            table: PathTable::new(),
            tree: WatchTree::new(backend, fs, filter),
            correlator: RenameCorrelator::new(options.pairing_window, options.max_pending_moves),
            diagnostics: Arc::new(Diagnostics::new()),
        }
    }

    pub fn table(&self) -> &PathTable {
        &self.table
    }

    pub fn backend(&self) -> &B {
        self.tree.backend()
    }

    pub fn backend_mut(&mut self) -> &mut B {
        self.tree.backend_mut()
    }

    pub fn diagnostics(&self) -> Arc<Diagnostics> {
        Arc::clone(&self.diagnostics)
    }

    /// Watch a root and its subtree. Fails on a root that cannot be watched
    /// or when the watch limit is hit.
    pub fn install_root(&mut self, root: &Path) -> Result<InstallReport> {
        let result = self.tree.install_root(&mut self.table, root);
        self.diagnostics.set_watch_count(self.table.len());
        let report = result?;
        self.diagnostics.record_skipped(report.skipped);
        Ok(report)
    }

    /// Translate a native backend notification and process it.
    pub fn handle(&mut self, raw: B::Raw, now: Instant) -> Result<Vec<NormalizedEvent>> {
        let notification = self.tree.backend_mut().translate(raw);
        self.step(notification, now)
    }

    /// Process one notification.
    ///
    /// Returns the events to emit, in order. Fails only on queue overflow,
    /// after which the session cannot be trusted.
    pub fn step(&mut self, notification: Notification, now: Instant) -> Result<Vec<NormalizedEvent>> {
        let raw = match notification {
            Notification::Overflow => {
                error!("kernel event queue overflowed; events were lost");
                return Err(WatcherError::QueueOverflow);
            }
            Notification::Unknown => {
                trace!("notification on unknown descriptor");
                self.diagnostics.record_orphan();
                return Ok(Vec::new());
            }
            Notification::Raw(raw) => raw,
        };
        trace!(handle = %raw.handle, kind = ?raw.kind, name = ?raw.name, cookie = raw.cookie, "raw notification");

        if raw.kind == RawKind::Ignored {
            self.on_watch_ignored(raw.handle);
            self.sync_watch_count();
            return Ok(Vec::new());
        }

        if self.inside_pending_move(raw.handle) {
            trace!(handle = %raw.handle, "suppressed: directory is mid-move");
            self.diagnostics.record_suppressed();
            return Ok(Vec::new());
        }

        let mut events = Vec::new();
        match normalize(&self.table, self.tree.filter(), &raw) {
            Normalized::Event(event) => {
                self.apply(&raw, &event, now);
                events.push(event);
            }
            Normalized::Orphan => {
                trace!(handle = %raw.handle, "orphan notification dropped");
                self.diagnostics.record_orphan();
            }
            Normalized::Excluded(path) => {
                trace!(?path, "suppressed: excluded");
                self.diagnostics.record_suppressed();
            }
            Normalized::SelfNotification | Normalized::Unclassified => {}
        }

        self.sync_watch_count();
        Ok(events)
    }

    /// Tear down moves whose pairing window elapsed. Returns how many expired.
    pub fn expire_pending(&mut self, now: Instant) -> usize {
        let expired = self.correlator.expire(now);
        let count = expired.len();
        for pending in expired {
            self.move_out_of_scope(pending);
        }
        self.sync_watch_count();
        count
    }

    /// Treat every pending move as moved out of scope (session end).
    pub fn flush_pending(&mut self) -> usize {
        let drained = self.correlator.drain();
        let count = drained.len();
        for pending in drained {
            self.move_out_of_scope(pending);
        }
        self.sync_watch_count();
        count
    }

    /// When the next pending move expires, if any.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.correlator.next_deadline()
    }

    pub fn pending_moves(&self) -> usize {
        self.correlator.len()
    }

    fn inside_pending_move(&self, handle: WatchHandle) -> bool {
        self.correlator.has_detached()
            && self
                .table
                .ancestors(handle)
                .any(|h| {
                    self.table
                        .get(h)
                        .is_some_and(|e| self.correlator.is_detached(h, e.generation()))
                })
    }

    fn sync_watch_count(&self) {
        self.diagnostics.set_watch_count(self.table.len());
    }
}
