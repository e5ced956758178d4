// src/engine/mod.rs

//! Event loop engine for treewatch.
//!
//! This module ties together:
//! - the path table, watch tree and rename correlator (owned by the core)
//! - the kernel notification stream
//! - the pairing timer for unpaired moves
//! - shutdown signals
//!
//! The pure core state machine lives in [`core`] (structural handlers in
//! [`event_handlers`]); the async/IO shell is implemented in [`runtime`].

use std::time::Duration;

/// Default wait for a MOVED_TO after its MOVED_FROM.
pub const DEFAULT_PAIRING_WINDOW: Duration = Duration::from_millis(100);
pub const DEFAULT_MAX_PENDING_MOVES: usize = 4096;
pub const DEFAULT_EVENT_BUFFER: usize = 1024;

/// Runtime knobs used by both the core and the async shell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WatchOptions {
    /// How long an unpaired MOVED_FROM waits before it counts as a move out
    /// of every watched root.
    pub pairing_window: Duration,
    /// Bound on outstanding unpaired moves; the oldest is expired first.
    pub max_pending_moves: usize,
    /// Capacity of the channel between the event loop and the consumer.
    pub event_buffer: usize,
}

impl Default for WatchOptions {
    fn default() -> Self {
        Self {
            pairing_window: DEFAULT_PAIRING_WINDOW,
            max_pending_moves: DEFAULT_MAX_PENDING_MOVES,
            event_buffer: DEFAULT_EVENT_BUFFER,
        }
    }
}

pub mod core;
pub mod diagnostics;
pub mod event_handlers;
pub mod runtime;

pub use core::WatchCore;
pub use diagnostics::{Diagnostics, DiagnosticsSnapshot, FailedSubtree};
pub use runtime::Runtime;
