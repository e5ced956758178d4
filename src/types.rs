// src/types.rs

//! Shared data types: watch handles, raw kernel notifications and the
//! normalized event taxonomy.

use std::ffi::OsString;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use serde::Deserialize;

/// Opaque identifier for an installed directory watch.
///
/// Handles are assigned by the watch backend and are never reused within a
/// session, so a stale handle can only ever miss in the path table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WatchHandle(u64);

impl WatchHandle {
    pub const fn new(id: u64) -> Self {
        WatchHandle(id)
    }

    pub const fn id(self) -> u64 {
        self.0
    }
}

impl fmt::Display for WatchHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Public event taxonomy. Flat: directory variants are separate kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Create,
    CreateDir,
    Modify,
    Attrib,
    AttribDir,
    CloseWrite,
    Delete,
    DeleteDir,
    MovedFrom,
    MovedFromDir,
    MovedTo,
    MovedToDir,
}

impl EventKind {
    pub const ALL: [EventKind; 12] = [
        EventKind::Create,
        EventKind::CreateDir,
        EventKind::Modify,
        EventKind::Attrib,
        EventKind::AttribDir,
        EventKind::CloseWrite,
        EventKind::Delete,
        EventKind::DeleteDir,
        EventKind::MovedFrom,
        EventKind::MovedFromDir,
        EventKind::MovedTo,
        EventKind::MovedToDir,
    ];

    /// Classify a raw notification. Returns `None` for kinds that never
    /// surface (ignored, overflow) and for directory MODIFY/CLOSE_WRITE,
    /// which the taxonomy has no name for.
    pub fn classify(kind: RawKind, is_dir: bool) -> Option<Self> {
        let kind = match (kind, is_dir) {
            (RawKind::Create, false) => EventKind::Create,
            (RawKind::Create, true) => EventKind::CreateDir,
            (RawKind::Modify, false) => EventKind::Modify,
            (RawKind::Attrib, false) => EventKind::Attrib,
            (RawKind::Attrib, true) => EventKind::AttribDir,
            (RawKind::CloseWrite, false) => EventKind::CloseWrite,
            (RawKind::Delete, false) => EventKind::Delete,
            (RawKind::Delete, true) => EventKind::DeleteDir,
            (RawKind::MovedFrom, false) => EventKind::MovedFrom,
            (RawKind::MovedFrom, true) => EventKind::MovedFromDir,
            (RawKind::MovedTo, false) => EventKind::MovedTo,
            (RawKind::MovedTo, true) => EventKind::MovedToDir,
            _ => return None,
        };
        Some(kind)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            EventKind::Create => "CREATE",
            EventKind::CreateDir => "CREATE_DIR",
            EventKind::Modify => "MODIFY",
            EventKind::Attrib => "ATTRIB",
            EventKind::AttribDir => "ATTRIB_DIR",
            EventKind::CloseWrite => "CLOSE_WRITE",
            EventKind::Delete => "DELETE",
            EventKind::DeleteDir => "DELETE_DIR",
            EventKind::MovedFrom => "MOVED_FROM",
            EventKind::MovedFromDir => "MOVED_FROM_DIR",
            EventKind::MovedTo => "MOVED_TO",
            EventKind::MovedToDir => "MOVED_TO_DIR",
        }
    }

    pub fn is_dir(self) -> bool {
        matches!(
            self,
            EventKind::CreateDir
                | EventKind::AttribDir
                | EventKind::DeleteDir
                | EventKind::MovedFromDir
                | EventKind::MovedToDir
        )
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        EventKind::ALL
            .into_iter()
            .find(|k| k.as_str() == s.trim())
            .ok_or_else(|| format!("unknown event kind: {s}"))
    }
}

/// A change event resolved to an absolute path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedEvent {
    pub path: PathBuf,
    pub kind: EventKind,
    pub is_dir: bool,
}

impl NormalizedEvent {
    pub fn new(path: impl Into<PathBuf>, kind: EventKind) -> Self {
        Self {
            path: path.into(),
            kind,
            is_dir: kind.is_dir(),
        }
    }
}

/// Raw notification kinds as delivered by the kernel, before path resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RawKind {
    Create,
    Modify,
    Attrib,
    CloseWrite,
    Delete,
    MovedFrom,
    MovedTo,
    /// The kernel dropped the watch (directory gone or watch released).
    Ignored,
    /// Anything else the mask reported that we do not model.
    Other,
}

/// One kernel notification tagged with the watch it arrived on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawEvent {
    pub handle: WatchHandle,
    pub kind: RawKind,
    /// Entry name relative to the watched directory; `None` when the
    /// notification concerns the watched directory itself.
    pub name: Option<OsString>,
    pub is_dir: bool,
    /// Move correlation cookie; zero when not a move.
    pub cookie: u32,
}

impl RawEvent {
    pub fn new(handle: WatchHandle, kind: RawKind, name: Option<&str>, is_dir: bool) -> Self {
        Self {
            handle,
            kind,
            name: name.map(OsString::from),
            is_dir,
            cookie: 0,
        }
    }

    pub fn with_cookie(mut self, cookie: u32) -> Self {
        self.cookie = cookie;
        self
    }
}

/// What a backend hands the core for every kernel notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notification {
    /// A notification on a watch the backend still knows about.
    Raw(RawEvent),
    /// A notification on a descriptor the backend no longer maps.
    Unknown,
    /// The kernel queue overflowed; events were lost.
    Overflow,
}

/// Serialized line variant produced by the emitter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// `<path>,<KIND>` with CSV quoting of the path.
    #[default]
    Comma,
    /// `<path> <KIND>`, unquoted (legacy).
    Space,
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "comma" | "csv" => Ok(OutputFormat::Comma),
            "space" => Ok(OutputFormat::Space),
            other => Err(format!(
                "invalid output format: {other} (expected \"comma\" or \"space\")"
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classify_splits_directory_variants() {
        assert_eq!(
            EventKind::classify(RawKind::Create, true),
            Some(EventKind::CreateDir)
        );
        assert_eq!(
            EventKind::classify(RawKind::MovedTo, false),
            Some(EventKind::MovedTo)
        );
        assert_eq!(EventKind::classify(RawKind::Modify, true), None);
        assert_eq!(EventKind::classify(RawKind::Ignored, false), None);
    }

    #[test]
    fn kind_names_parse_back() {
        for kind in EventKind::ALL {
            assert_eq!(kind.as_str().parse::<EventKind>(), Ok(kind));
        }
        assert!("OPEN".parse::<EventKind>().is_err());
    }

    #[test]
    fn output_format_from_str() {
        assert_eq!("Comma".parse::<OutputFormat>(), Ok(OutputFormat::Comma));
        assert_eq!(" space ".parse::<OutputFormat>(), Ok(OutputFormat::Space));
        assert!("tsv".parse::<OutputFormat>().is_err());
    }
}
