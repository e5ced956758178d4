// src/watch/tree.rs

//! Watch tree manager.
//!
//! Installs one kernel watch per directory, walking subtrees depth-first
//! with an explicit stack (no recursion, so depth is bounded only by the
//! filesystem). A parent is always registered before its children are
//! listed, which means any event arriving for a child resolves against an
//! already known parent.

use std::io;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::errors::{Result, WatcherError};
use crate::fs::FileSystem;
use crate::types::WatchHandle;
use crate::watch::backend::{InstallError, WatchBackend};
use crate::watch::exclude::ExclusionFilter;
use crate::watch::path_table::PathTable;

/// Outcome of one subtree walk.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InstallReport {
    /// Handle of the walk's top directory, if it could be watched.
    pub top: Option<WatchHandle>,
    /// Watches installed (or re-registered) by this walk.
    pub installed: usize,
    /// Directories skipped because they vanished or were unreadable.
    pub skipped: usize,
}

#[derive(Debug)]
pub struct WatchTree<B, F> {
    backend: B,
    fs: F,
    filter: ExclusionFilter,
}

impl<B: WatchBackend, F: FileSystem> WatchTree<B, F> {
    pub fn new(backend: B, fs: F, filter: ExclusionFilter) -> Self {
        Self {
            backend,
            fs,
            filter,
        }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    pub fn filesystem(&self) -> &F {
        &self.fs
    }

    pub fn filter(&self) -> &ExclusionFilter {
        &self.filter
    }

    /// Watch a root directory and everything below it.
    ///
    /// Unlike nested directories, a root that cannot be watched is an error.
    pub fn install_root(&mut self, table: &mut PathTable, root: &Path) -> Result<InstallReport> {
        let handle = match self.backend.add_watch(root) {
            Ok(handle) => handle,
            Err(InstallError::LimitReached) => {
                return Err(WatcherError::WatchLimit {
                    path: root.to_path_buf(),
                });
            }
            Err(err) => {
                return Err(WatcherError::Install {
                    path: root.to_path_buf(),
                    source: install_io_error(err),
                });
            }
        };
        table.register(handle, root, None);
        debug!(%handle, ?root, "root watch installed");

        let mut report = InstallReport {
            top: Some(handle),
            installed: 1,
            skipped: 0,
        };
        self.walk_children(table, root, handle, &mut report)?;
        Ok(report)
    }

    /// Watch `dir` (a newly discovered directory under `parent`) and its
    /// descendants.
    ///
    /// Directories that vanish mid-walk are skipped. Hitting the watch limit
    /// aborts the walk with [`WatcherError::WatchLimit`]; watches installed
    /// so far stay in place.
    pub fn install_subtree(
        &mut self,
        table: &mut PathTable,
        dir: &Path,
        parent: WatchHandle,
    ) -> Result<InstallReport> {
        let mut report = InstallReport::default();
        let mut stack: Vec<(PathBuf, WatchHandle)> = vec![(dir.to_path_buf(), parent)];

        while let Some((path, parent)) = stack.pop() {
            let Some(handle) = self.install_one(table, &path, parent, &mut report)? else {
                continue;
            };
            if report.top.is_none() {
                report.top = Some(handle);
            }
            for child in self.children(table, &path, handle).into_iter().rev() {
                stack.push((child, handle));
            }
        }
        Ok(report)
    }

    /// Forget `handle` and every descendant, children first.
    ///
    /// With `release`, the kernel watches are removed too; without it the
    /// directories are assumed gone and the kernel has dropped the watches
    /// already. Returns the number of entries removed.
    pub fn remove_subtree(&mut self, table: &mut PathTable, handle: WatchHandle, release: bool) -> usize {
        let handles = table.subtree_post_order(handle);
        for h in &handles {
            if let Some(entry) = table.unregister(*h) {
                debug!(handle = %h, path = ?entry.path(), release, "watch removed");
            }
            if release {
                self.backend.remove_watch(*h);
            }
        }
        handles.len()
    }

    fn walk_children(
        &mut self,
        table: &mut PathTable,
        dir: &Path,
        handle: WatchHandle,
        report: &mut InstallReport,
    ) -> Result<()> {
        let mut stack: Vec<(PathBuf, WatchHandle)> = self
            .children(table, dir, handle)
            .into_iter()
            .rev()
            .map(|child| (child, handle))
            .collect();

        while let Some((path, parent)) = stack.pop() {
            let Some(h) = self.install_one(table, &path, parent, report)? else {
                continue;
            };
            for child in self.children(table, &path, h).into_iter().rev() {
                stack.push((child, h));
            }
        }
        Ok(())
    }

    fn install_one(
        &mut self,
        table: &mut PathTable,
        path: &Path,
        parent: WatchHandle,
        report: &mut InstallReport,
    ) -> Result<Option<WatchHandle>> {
        match self.backend.add_watch(path) {
            Ok(handle) => {
                table.register(handle, path, Some(parent));
                report.installed += 1;
                debug!(%handle, ?path, "watch installed");
                Ok(Some(handle))
            }
            Err(InstallError::LimitReached) => Err(WatcherError::WatchLimit {
                path: path.to_path_buf(),
            }),
            Err(err) => {
                warn!(?path, error = %err, "skipping directory");
                report.skipped += 1;
                Ok(None)
            }
        }
    }

    /// Non-excluded subdirectories of `dir`, sorted.
    fn children(&self, table: &PathTable, dir: &Path, handle: WatchHandle) -> Vec<PathBuf> {
        let listed = match self.fs.list_dirs(dir) {
            Ok(listed) => listed,
            Err(err) => {
                debug!(?dir, error = %err, "cannot list directory");
                return Vec::new();
            }
        };
        listed
            .into_iter()
            .filter(|child| match table.relative_to_root(handle, child) {
                Some(rel) => !self.filter.is_excluded(rel),
                None => true,
            })
            .collect()
    }
}

fn install_io_error(err: InstallError) -> io::Error {
    match err {
        InstallError::Vanished => io::Error::from(io::ErrorKind::NotFound),
        InstallError::PermissionDenied => io::Error::from(io::ErrorKind::PermissionDenied),
        InstallError::LimitReached => io::Error::other("watch limit reached"),
        InstallError::Io(err) => err,
    }
}

#[cfg(test)]
mod tests {
    use std::collections::{HashMap, HashSet};

    use super::*;
    use crate::fs::mock::MockFileSystem;
    use crate::types::Notification;

    /// Backend that records calls and can be told to fail.
    #[derive(Debug, Default)]
    struct RecordingBackend {
        by_path: HashMap<PathBuf, WatchHandle>,
        next: u64,
        removed: Vec<WatchHandle>,
        vanished: HashSet<PathBuf>,
        limit: Option<usize>,
    }

    impl WatchBackend for RecordingBackend {
        type Raw = Notification;

        fn add_watch(&mut self, path: &Path) -> std::result::Result<WatchHandle, InstallError> {
            if self.vanished.contains(path) {
                return Err(InstallError::Vanished);
            }
            if let Some(h) = self.by_path.get(path) {
                return Ok(*h);
            }
            if self.limit.is_some_and(|l| self.by_path.len() >= l) {
                return Err(InstallError::LimitReached);
            }
            self.next += 1;
            let h = WatchHandle::new(self.next);
            self.by_path.insert(path.to_path_buf(), h);
            Ok(h)
        }

        fn remove_watch(&mut self, handle: WatchHandle) {
            self.removed.push(handle);
        }

        fn translate(&mut self, raw: Notification) -> Notification {
            raw
        }
    }

    fn fs() -> MockFileSystem {
        let fs = MockFileSystem::new();
        fs.add_dir("/r/a/b/c");
        fs.add_dir("/r/node_modules/pkg");
        fs.add_dir("/r/d");
        fs.add_file("/r/a/file.txt");
        fs
    }

    fn tree(fs: MockFileSystem, exclude: &[&str]) -> WatchTree<RecordingBackend, MockFileSystem> {
        WatchTree::new(RecordingBackend::default(), fs, ExclusionFilter::new(exclude))
    }

    fn paths(table: &PathTable) -> Vec<PathBuf> {
        let mut v: Vec<_> = table.iter().map(|(_, p)| p.to_path_buf()).collect();
        v.sort();
        v
    }

    #[test]
    fn install_root_watches_every_directory_except_excluded() {
        let mut t = tree(fs(), &["node_modules"]);
        let mut table = PathTable::new();

        let report = t.install_root(&mut table, Path::new("/r")).unwrap();

        assert_eq!(report.installed, 5);
        assert_eq!(
            paths(&table),
            vec![
                PathBuf::from("/r"),
                PathBuf::from("/r/a"),
                PathBuf::from("/r/a/b"),
                PathBuf::from("/r/a/b/c"),
                PathBuf::from("/r/d"),
            ]
        );
        let c = table.lookup(Path::new("/r/a/b/c")).unwrap();
        let b = table.lookup(Path::new("/r/a/b")).unwrap();
        assert_eq!(table.get(c).unwrap().parent(), Some(b));
    }

    #[test]
    fn parents_are_installed_before_children() {
        let mut t = tree(fs(), &[]);
        let mut table = PathTable::new();
        t.install_root(&mut table, Path::new("/r")).unwrap();

        let a = table.lookup(Path::new("/r/a")).unwrap();
        let c = table.lookup(Path::new("/r/a/b/c")).unwrap();
        assert!(a.id() < c.id());
    }

    #[test]
    fn vanished_child_is_skipped() {
        let mut t = tree(fs(), &[]);
        t.backend_mut().vanished.insert(PathBuf::from("/r/a/b"));
        let mut table = PathTable::new();

        let report = t.install_root(&mut table, Path::new("/r")).unwrap();

        assert_eq!(report.skipped, 1);
        assert!(table.lookup(Path::new("/r/a/b")).is_none());
        assert!(table.lookup(Path::new("/r/a/b/c")).is_none());
        assert!(table.lookup(Path::new("/r/d")).is_some());
    }

    #[test]
    fn vanished_root_is_an_error() {
        let mut t = tree(fs(), &[]);
        t.backend_mut().vanished.insert(PathBuf::from("/r"));
        let mut table = PathTable::new();

        let err = t.install_root(&mut table, Path::new("/r")).unwrap_err();
        assert!(matches!(err, WatcherError::Install { .. }));
        assert!(table.is_empty());
    }

    #[test]
    fn watch_limit_aborts_the_subtree() {
        let mut t = tree(fs(), &[]);
        t.backend_mut().limit = Some(2);
        let mut table = PathTable::new();

        let err = t.install_root(&mut table, Path::new("/r")).unwrap_err();
        assert!(matches!(err, WatcherError::WatchLimit { .. }));
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn install_subtree_registers_under_parent() {
        let fs = MockFileSystem::new();
        fs.add_dir("/r");
        let mut t = tree(fs.clone(), &[]);
        let mut table = PathTable::new();
        let root = t.install_root(&mut table, Path::new("/r")).unwrap().top.unwrap();

        fs.add_dir("/r/new/inner");
        let report = t
            .install_subtree(&mut table, Path::new("/r/new"), root)
            .unwrap();

        assert_eq!(report.installed, 2);
        let new = report.top.unwrap();
        assert_eq!(table.get(new).unwrap().parent(), Some(root));
        assert_eq!(table.get(new).unwrap().root(), root);
    }

    #[test]
    fn installing_twice_is_idempotent() {
        let mut t = tree(fs(), &[]);
        let mut table = PathTable::new();
        let root = t.install_root(&mut table, Path::new("/r")).unwrap().top.unwrap();
        let before = table.len();

        t.install_subtree(&mut table, Path::new("/r/a"), root).unwrap();
        assert_eq!(table.len(), before);
    }

    #[test]
    fn exclusion_is_matched_relative_to_root() {
        let fs = MockFileSystem::new();
        fs.add_dir("/home/x/root/sub");
        fs.add_dir("/home/x/root/x");
        let mut t = tree(fs, &["x"]);
        let mut table = PathTable::new();

        t.install_root(&mut table, Path::new("/home/x/root")).unwrap();

        assert!(table.lookup(Path::new("/home/x/root/sub")).is_some());
        assert!(table.lookup(Path::new("/home/x/root/x")).is_none());
    }

    #[test]
    fn remove_subtree_releases_only_when_asked() {
        let mut t = tree(fs(), &[]);
        let mut table = PathTable::new();
        t.install_root(&mut table, Path::new("/r")).unwrap();
        let a = table.lookup(Path::new("/r/a")).unwrap();

        assert_eq!(t.remove_subtree(&mut table, a, false), 3);
        assert!(t.backend().removed.is_empty());
        assert!(table.lookup(Path::new("/r/a/b/c")).is_none());

        let d = table.lookup(Path::new("/r/d")).unwrap();
        assert_eq!(t.remove_subtree(&mut table, d, true), 1);
        assert_eq!(t.backend().removed, vec![d]);
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn deep_nesting_installs_one_watch_per_level() {
        let fs = MockFileSystem::new();
        let deep: PathBuf = std::iter::once("/r".to_string())
            .chain((0..60).map(|i| format!("level{i}")))
            .collect();
        fs.add_dir(&deep);
        let mut t = tree(fs, &[]);
        let mut table = PathTable::new();

        let report = t.install_root(&mut table, Path::new("/r")).unwrap();
        assert_eq!(report.installed, 61);
        assert!(table.lookup(&deep).is_some());
    }
}
