// src/watch/correlate.rs

//! Rename correlator.
//!
//! Each MOVED_FROM opens a pending move keyed by the kernel cookie; the
//! MOVED_TO carrying the same cookie closes it. The correlator only tracks
//! state: the engine core emits MOVED_FROM immediately and decides what a
//! pairing (or the lack of one) means for the watch tree.
//!
//! Pending moves are bounded in time (`window`) and in number (`capacity`).
//! Whatever falls out of either bound is handed back to the caller as
//! "moved out of scope".

use std::collections::{HashMap, VecDeque};
use std::path::PathBuf;
use std::time::{Duration, Instant};

use tracing::{debug, trace};

use crate::types::WatchHandle;

/// A MOVED_FROM waiting for its MOVED_TO.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingMove {
    pub cookie: u32,
    pub from_path: PathBuf,
    /// The moved directory's own watch, if it had one.
    pub from_handle: Option<WatchHandle>,
    /// Path-table generation of `from_handle` when the move started.
    pub generation: u64,
    pub is_dir: bool,
    pub timestamp: Instant,
}

#[derive(Debug)]
pub struct RenameCorrelator {
    pending: HashMap<u32, PendingMove>,
    order: VecDeque<u32>,
    /// Watches of directories mid-move, with the generation they moved at.
    detached: HashMap<WatchHandle, u64>,
    window: Duration,
    capacity: usize,
}

impl RenameCorrelator {
    pub fn new(window: Duration, capacity: usize) -> Self {
        Self {
            pending: HashMap::new(),
            order: VecDeque::new(),
            detached: HashMap::new(),
            window,
            capacity: capacity.max(1),
        }
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Open a pending move. Returns moves pushed out by this one: a previous
    /// move with the same cookie, or the oldest move when over capacity.
    pub fn record(&mut self, pending: PendingMove) -> Vec<PendingMove> {
        let mut evicted = Vec::new();

        if let Some(previous) = self.remove(pending.cookie) {
            debug!(cookie = previous.cookie, "cookie reused while pending");
            evicted.push(previous);
        }

        trace!(cookie = pending.cookie, from = ?pending.from_path, "move pending");
        if let Some(handle) = pending.from_handle {
            self.detached.insert(handle, pending.generation);
        }
        self.order.push_back(pending.cookie);
        self.pending.insert(pending.cookie, pending);

        while self.pending.len() > self.capacity {
            match self.pop_oldest() {
                Some(oldest) => evicted.push(oldest),
                None => break,
            }
        }
        self.compact();
        evicted
    }

    /// Close the pending move for `cookie`, if any.
    pub fn take(&mut self, cookie: u32) -> Option<PendingMove> {
        let pending = self.remove(cookie)?;
        self.compact();
        Some(pending)
    }

    /// Moves whose window elapsed at `now`, oldest first.
    pub fn expire(&mut self, now: Instant) -> Vec<PendingMove> {
        let mut expired = Vec::new();
        while let Some(cookie) = self.order.front().copied() {
            match self.pending.get(&cookie) {
                None => {
                    self.order.pop_front();
                }
                Some(p) if now.duration_since(p.timestamp) >= self.window => {
                    self.order.pop_front();
                    if let Some(p) = self.remove(cookie) {
                        expired.push(p);
                    }
                }
                Some(_) => break,
            }
        }
        expired
    }

    /// Every pending move, oldest first. Used at session end.
    pub fn drain(&mut self) -> Vec<PendingMove> {
        let mut drained = Vec::new();
        while let Some(p) = self.pop_oldest() {
            drained.push(p);
        }
        self.order.clear();
        self.detached.clear();
        drained
    }

    /// When the oldest pending move expires.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.order
            .iter()
            .find_map(|c| self.pending.get(c))
            .map(|p| p.timestamp + self.window)
    }

    /// True when `handle`, at `generation`, is the watch of a directory
    /// whose move is pending. A watch re-registered since (the directory came
    /// back under a new cookie) has a newer generation and is live again.
    pub fn is_detached(&self, handle: WatchHandle, generation: u64) -> bool {
        self.detached.get(&handle) == Some(&generation)
    }

    pub fn has_detached(&self) -> bool {
        !self.detached.is_empty()
    }

    fn remove(&mut self, cookie: u32) -> Option<PendingMove> {
        let pending = self.pending.remove(&cookie)?;
        match pending.from_handle {
            Some(handle) if self.detached.get(&handle) == Some(&pending.generation) => {
                self.detached.remove(&handle);
            }
            _ => {}
        }
        Some(pending)
    }

    fn pop_oldest(&mut self) -> Option<PendingMove> {
        while let Some(cookie) = self.order.pop_front() {
            if let Some(p) = self.remove(cookie) {
                return Some(p);
            }
        }
        None
    }

    /// Drop queue slots of moves that were already paired.
    fn compact(&mut self) {
        if self.pending.is_empty() {
            self.order.clear();
            return;
        }
        while let Some(cookie) = self.order.front() {
            if self.pending.contains_key(cookie) {
                break;
            }
            self.order.pop_front();
        }
        if self.order.len() > self.pending.len() * 2 {
            let pending = &self.pending;
            self.order.retain(|c| pending.contains_key(c));
        }
    }
}
