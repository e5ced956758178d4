// src/watch/inotify_backend.rs

//! Linux inotify implementation of [`WatchBackend`].

use std::collections::HashMap;
use std::ffi::OsString;
use std::fmt;
use std::io;
use std::path::Path;

use inotify::{Event, EventMask, Inotify, WatchDescriptor, WatchMask, Watches};
use tracing::{debug, trace};

use crate::types::{Notification, RawEvent, RawKind, WatchHandle};
use crate::watch::backend::{InstallError, WatchBackend};

/// Events subscribed on every watched directory.
pub fn watch_mask() -> WatchMask {
    WatchMask::MODIFY
        | WatchMask::CLOSE_WRITE
        | WatchMask::MOVED_FROM
        | WatchMask::MOVED_TO
        | WatchMask::CREATE
        | WatchMask::DELETE
        | WatchMask::ATTRIB
        | WatchMask::ONLYDIR
}

/// Open an inotify instance and a backend bound to it.
///
/// The returned `Inotify` is turned into the event stream by the runtime;
/// the backend keeps a `Watches` handle on the same descriptor.
pub fn open() -> io::Result<(Inotify, InotifyBackend)> {
    let inotify = Inotify::init()?;
    let backend = InotifyBackend::new(inotify.watches());
    Ok((inotify, backend))
}

pub struct InotifyBackend {
    watches: Watches,
    by_wd: HashMap<WatchDescriptor, WatchHandle>,
    by_handle: HashMap<WatchHandle, WatchDescriptor>,
    next_id: u64,
}

impl fmt::Debug for InotifyBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InotifyBackend")
            .field("watches", &self.by_handle.len())
            .finish_non_exhaustive()
    }
}

impl InotifyBackend {
    pub fn new(watches: Watches) -> Self {
        Self {
            watches,
            by_wd: HashMap::new(),
            by_handle: HashMap::new(),
            next_id: 0,
        }
    }
}

impl WatchBackend for InotifyBackend {
    type Raw = Event<OsString>;

    fn add_watch(&mut self, path: &Path) -> Result<WatchHandle, InstallError> {
        let wd = self
            .watches
            .add(path, watch_mask())
            .map_err(InstallError::from_os)?;

        if let Some(handle) = self.by_wd.get(&wd).copied() {
            self.by_handle.entry(handle).or_insert(wd);
            return Ok(handle);
        }

        self.next_id += 1;
        let handle = WatchHandle::new(self.next_id);
        self.by_wd.insert(wd.clone(), handle);
        self.by_handle.insert(handle, wd);
        trace!(%handle, ?path, "inotify watch added");
        Ok(handle)
    }

    fn remove_watch(&mut self, handle: WatchHandle) {
        // The descriptor stays in `by_wd` until the kernel confirms with
        // IN_IGNORED, so late events still map to a (now unknown) handle.
        let Some(wd) = self.by_handle.remove(&handle) else {
            return;
        };
        if let Err(err) = self.watches.remove(wd) {
            // EINVAL: the kernel already dropped it.
            debug!(%handle, error = %err, "inotify_rm_watch failed");
        }
    }

    fn translate(&mut self, event: Event<OsString>) -> Notification {
        if event.mask.contains(EventMask::Q_OVERFLOW) {
            return Notification::Overflow;
        }
        let Some(handle) = self.by_wd.get(&event.wd).copied() else {
            return Notification::Unknown;
        };

        let kind = raw_kind(event.mask);
        if kind == RawKind::Ignored {
            self.by_wd.remove(&event.wd);
            self.by_handle.remove(&handle);
        }

        Notification::Raw(RawEvent {
            handle,
            kind,
            name: event.name,
            is_dir: event.mask.contains(EventMask::ISDIR),
            cookie: event.cookie,
        })
    }
}

fn raw_kind(mask: EventMask) -> RawKind {
    if mask.contains(EventMask::IGNORED) {
        RawKind::Ignored
    } else if mask.contains(EventMask::CREATE) {
        RawKind::Create
    } else if mask.contains(EventMask::DELETE) {
        RawKind::Delete
    } else if mask.contains(EventMask::MOVED_FROM) {
        RawKind::MovedFrom
    } else if mask.contains(EventMask::MOVED_TO) {
        RawKind::MovedTo
    } else if mask.contains(EventMask::ATTRIB) {
        RawKind::Attrib
    } else if mask.contains(EventMask::CLOSE_WRITE) {
        RawKind::CloseWrite
    } else if mask.contains(EventMask::MODIFY) {
        RawKind::Modify
    } else {
        RawKind::Other
    }
}
