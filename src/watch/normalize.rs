// src/watch/normalize.rs

//! Event normalizer: resolves a raw notification to an absolute path and
//! classifies it into the public taxonomy.
//!
//! This is a pure function over the path table and exclusion filter; it
//! never mutates watch state. Structural consequences (installing watches,
//! rebasing, teardown) are applied by the engine core afterwards.

use std::path::PathBuf;

use crate::types::{EventKind, NormalizedEvent, RawEvent};
use crate::watch::exclude::ExclusionFilter;
use crate::watch::path_table::PathTable;

/// Result of normalizing one raw notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Normalized {
    /// Emit this event.
    Event(NormalizedEvent),
    /// The handle is not in the path table; drop and count.
    Orphan,
    /// Lives inside an excluded directory.
    Excluded(PathBuf),
    /// Notification on a nested directory's own watch; the parent watch
    /// reports the same change by name.
    SelfNotification,
    /// No public kind (ignored, overflow, directory modify...).
    Unclassified,
}

pub fn normalize(table: &PathTable, filter: &ExclusionFilter, raw: &RawEvent) -> Normalized {
    let Some(kind) = EventKind::classify(raw.kind, raw.is_dir) else {
        return Normalized::Unclassified;
    };
    let Some(entry) = table.get(raw.handle) else {
        return Normalized::Orphan;
    };

    let path = match &raw.name {
        Some(name) => entry.path().join(name),
        None if entry.parent().is_none() => entry.path().to_path_buf(),
        None => return Normalized::SelfNotification,
    };

    if !filter.is_empty() {
        if let Some(rel) = table.relative_to_root(raw.handle, &path) {
            if filter.hides(rel) {
                return Normalized::Excluded(path);
            }
        }
    }

    Normalized::Event(NormalizedEvent::new(path, kind))
}
