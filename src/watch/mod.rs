// src/watch/mod.rs

//! Directory watching and path resolution.
//!
//! This module is responsible for:
//! - Mapping kernel watch handles to absolute directory paths
//!   ([`path_table`]), including re-basing whole subtrees on rename.
//! - Deciding which directories are never watched ([`exclude`]).
//! - Installing and tearing down one watch per directory ([`tree`]).
//! - Turning raw notifications into normalized events ([`normalize`]) and
//!   pairing renames by cookie ([`correlate`]).
//! - Talking to the kernel ([`backend`], [`inotify_backend`]).
//!
//! It does **not** drive the event loop; see [`crate::engine`].

pub mod backend;
pub mod correlate;
pub mod exclude;
pub mod inotify_backend;
pub mod normalize;
pub mod path_table;
pub mod tree;

pub use backend::{InstallError, WatchBackend};
pub use correlate::{PendingMove, RenameCorrelator};
pub use exclude::ExclusionFilter;
pub use inotify_backend::InotifyBackend;
pub use normalize::{Normalized, normalize};
pub use path_table::{PathEntry, PathTable};
pub use tree::{InstallReport, WatchTree};
