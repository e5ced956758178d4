// src/watch/path_table.rs

//! Bidirectional mapping between watch handles and absolute directory paths.
//!
//! Every entry caches its full absolute path and keeps links to its parent
//! and children, so:
//! - `resolve` is a single map lookup;
//! - `rebase` rewrites the renamed entry and then walks its children links,
//!   rebuilding each descendant path from the parent's new path plus the
//!   descendant's own file name. No string prefix surgery is involved, so a
//!   short name replacing a long one (or vice versa) cannot leave a stale
//!   suffix behind, and `a` never matches `ab`.

use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::types::WatchHandle;

/// One watched directory.
#[derive(Debug, Clone)]
pub struct PathEntry {
    path: PathBuf,
    parent: Option<WatchHandle>,
    root: WatchHandle,
    children: BTreeSet<WatchHandle>,
    generation: u64,
}

impl PathEntry {
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// `None` is the root marker.
    pub fn parent(&self) -> Option<WatchHandle> {
        self.parent
    }

    /// The watch root this directory currently lives under.
    pub fn root(&self) -> WatchHandle {
        self.root
    }

    /// Bumped every time the handle is (re-)registered.
    pub fn generation(&self) -> u64 {
        self.generation
    }
}

#[derive(Debug, Default)]
pub struct PathTable {
    entries: HashMap<WatchHandle, PathEntry>,
    by_path: HashMap<PathBuf, WatchHandle>,
    next_generation: u64,
}

impl PathTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, handle: WatchHandle) -> bool {
        self.entries.contains_key(&handle)
    }

    pub fn get(&self, handle: WatchHandle) -> Option<&PathEntry> {
        self.entries.get(&handle)
    }

    /// Register a freshly installed watch.
    ///
    /// Registering a handle that is already present (the kernel hands back
    /// the existing watch when a directory is watched twice) moves the entry
    /// and its descendants to `path` under `parent`.
    ///
    /// Returns the entry's new generation.
    pub fn register(
        &mut self,
        handle: WatchHandle,
        path: impl Into<PathBuf>,
        parent: Option<WatchHandle>,
    ) -> u64 {
        let path = path.into();
        let parent = parent.filter(|p| {
            let known = self.entries.contains_key(p) && *p != handle;
            if !known {
                warn!(%handle, parent = %p, "registering under an unknown parent; treating as root");
            }
            known
        });

        self.evict_stale_path(&path, handle);

        self.next_generation += 1;
        let generation = self.next_generation;

        if self.entries.contains_key(&handle) {
            debug!(%handle, ?path, "re-registering existing watch");
            self.relink(handle, path, parent);
            if let Some(entry) = self.entries.get_mut(&handle) {
                entry.generation = generation;
            }
            return generation;
        }

        let root = parent
            .and_then(|p| self.entries.get(&p))
            .map(|p| p.root)
            .unwrap_or(handle);
        if let Some(p) = parent.and_then(|p| self.entries.get_mut(&p)) {
            p.children.insert(handle);
        }
        self.by_path.insert(path.clone(), handle);
        self.entries.insert(
            handle,
            PathEntry {
                path,
                parent,
                root,
                children: BTreeSet::new(),
                generation,
            },
        );
        generation
    }

    pub fn resolve(&self, handle: WatchHandle) -> Option<&Path> {
        self.entries.get(&handle).map(|e| e.path.as_path())
    }

    pub fn lookup(&self, path: &Path) -> Option<WatchHandle> {
        self.by_path.get(path).copied()
    }

    /// Move `handle` to `new_path`, re-deriving every descendant's path.
    ///
    /// The new parent is whichever watched directory now lives at
    /// `new_path.parent()`; if none does, the entry becomes a root.
    /// Returns `false` when the handle is not registered.
    pub fn rebase(&mut self, handle: WatchHandle, new_path: impl Into<PathBuf>) -> bool {
        if !self.entries.contains_key(&handle) {
            return false;
        }
        let new_path = new_path.into();
        let parent = new_path
            .parent()
            .and_then(|p| self.lookup(p))
            .filter(|p| *p != handle);
        self.evict_stale_path(&new_path, handle);
        self.relink(handle, new_path, parent);
        true
    }

    /// Remove a single entry. Children, if any, become roots; callers that
    /// tear down a whole subtree should remove descendants first (see
    /// [`PathTable::subtree_post_order`]).
    pub fn unregister(&mut self, handle: WatchHandle) -> Option<PathEntry> {
        let entry = self.entries.remove(&handle)?;
        if self.by_path.get(&entry.path) == Some(&handle) {
            self.by_path.remove(&entry.path);
        }
        if let Some(p) = entry.parent.and_then(|p| self.entries.get_mut(&p)) {
            p.children.remove(&handle);
        }
        for child in entry.children.iter().copied().collect::<Vec<_>>() {
            if let Some(c) = self.entries.get_mut(&child) {
                c.parent = None;
            }
            self.set_root(child, child);
        }
        Some(entry)
    }

    /// `handle` and every descendant, deepest first, parents after children.
    pub fn subtree_post_order(&self, handle: WatchHandle) -> Vec<WatchHandle> {
        let mut out = Vec::new();
        if !self.entries.contains_key(&handle) {
            return out;
        }
        // Pre-order with children pushed in reverse, then reversed: yields a
        // valid post-order.
        let mut stack = vec![handle];
        while let Some(h) = stack.pop() {
            out.push(h);
            if let Some(entry) = self.entries.get(&h) {
                stack.extend(entry.children.iter().copied());
            }
        }
        out.reverse();
        out
    }

    /// Walk from `handle` up to its root (inclusive).
    pub fn ancestors(&self, handle: WatchHandle) -> impl Iterator<Item = WatchHandle> + '_ {
        let mut next = self.entries.contains_key(&handle).then_some(handle);
        std::iter::from_fn(move || {
            let current = next?;
            next = self.entries.get(&current).and_then(|e| e.parent);
            Some(current)
        })
    }

    /// Path of `path` relative to the root that owns `handle`.
    pub fn relative_to_root<'p>(&self, handle: WatchHandle, path: &'p Path) -> Option<&'p Path> {
        let root = self.entries.get(&handle)?.root;
        let root_path = self.resolve(root)?;
        path.strip_prefix(root_path).ok()
    }

    pub fn iter(&self) -> impl Iterator<Item = (WatchHandle, &Path)> {
        self.entries.iter().map(|(h, e)| (*h, e.path.as_path()))
    }

    fn relink(&mut self, handle: WatchHandle, new_path: PathBuf, parent: Option<WatchHandle>) {
        let Some(entry) = self.entries.get(&handle) else {
            return;
        };
        let old_parent = entry.parent;
        let old_path = entry.path.clone();

        if old_parent != parent {
            if let Some(p) = old_parent.and_then(|p| self.entries.get_mut(&p)) {
                p.children.remove(&handle);
            }
            if let Some(p) = parent.and_then(|p| self.entries.get_mut(&p)) {
                p.children.insert(handle);
            }
        }

        let root = parent
            .and_then(|p| self.entries.get(&p))
            .map(|p| p.root)
            .unwrap_or(handle);

        if let Some(entry) = self.entries.get_mut(&handle) {
            entry.parent = parent;
        }
        debug!(%handle, from = ?old_path, to = ?new_path, "rebasing watch subtree");
        self.rewrite_subtree(handle, new_path, root);
    }

    fn rewrite_subtree(&mut self, handle: WatchHandle, new_path: PathBuf, root: WatchHandle) {
        let mut stack = vec![(handle, new_path)];
        while let Some((h, path)) = stack.pop() {
            let Some(entry) = self.entries.get_mut(&h) else {
                continue;
            };
            let old = std::mem::replace(&mut entry.path, path.clone());
            entry.root = root;
            let children: Vec<WatchHandle> = entry.children.iter().copied().collect();

            if self.by_path.get(&old) == Some(&h) {
                self.by_path.remove(&old);
            }
            self.by_path.insert(path.clone(), h);

            for child in children {
                if let Some(name) = self.entries.get(&child).and_then(|c| c.path.file_name()) {
                    let child_path = path.join(name);
                    stack.push((child, child_path));
                }
            }
        }
    }

    fn set_root(&mut self, handle: WatchHandle, root: WatchHandle) {
        let mut stack = vec![handle];
        while let Some(h) = stack.pop() {
            if let Some(entry) = self.entries.get_mut(&h) {
                entry.root = root;
                stack.extend(entry.children.iter().copied());
            }
        }
    }

    /// Two live directories cannot share a path; an existing mapping for a
    /// different handle means we missed that directory's removal.
    fn evict_stale_path(&mut self, path: &Path, keep: WatchHandle) {
        let Some(stale) = self.lookup(path).filter(|h| *h != keep) else {
            return;
        };
        // Moving a directory onto one of its own descendants is impossible
        // on disk; guard anyway so the subtree walk cannot eat `keep`.
        if self.ancestors(stale).any(|h| h == keep) || self.ancestors(keep).any(|h| h == stale) {
            self.by_path.remove(path);
            return;
        }
        debug!(%stale, ?path, "evicting stale watch entry");
        for h in self.subtree_post_order(stale) {
            self.unregister(h);
        }
    }
}
