//! In-memory directory tree that behaves like a filesystem watched through
//! inotify.
//!
//! `SimTree` implements both [`FileSystem`] and [`WatchBackend`]: the core
//! lists and watches the simulated tree, and every mutation queues the
//! notifications the kernel would deliver for it. Watches are attached to
//! nodes (inodes), not paths, so a renamed directory keeps its watch exactly
//! like the real thing.
//!
//! Notifications per operation, on the watch of the affected parent:
//! - `mkdir`: CREATE|ISDIR
//! - `write_file`: CREATE (new files only), MODIFY (non-empty contents),
//!   CLOSE_WRITE
//! - `rename`: MOVED_FROM on the source parent, MOVED_TO on the destination
//!   parent, same cookie
//! - `remove_all`: DELETE / DELETE|ISDIR innermost first; each removed
//!   watched directory then gets IN_IGNORED on its own watch
//! - `chmod`: ATTRIB on the parent watch and, for watched directories, a
//!   nameless ATTRIB on the directory's own watch
//!
//! `remove_watch` queues IN_IGNORED, like `inotify_rm_watch`.

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::ffi::OsString;
use std::path::{Component, Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use anyhow::{Result, anyhow, bail};
use treewatch::fs::FileSystem;
use treewatch::types::{Notification, RawEvent, RawKind, WatchHandle};
use treewatch::watch::{InstallError, WatchBackend};

type Inode = u64;

const ROOT_INODE: Inode = 0;

#[derive(Debug)]
enum NodeKind {
    Dir {
        children: BTreeMap<OsString, Inode>,
        readable: bool,
    },
    File,
}

#[derive(Debug)]
struct Node {
    name: OsString,
    parent: Option<Inode>,
    kind: NodeKind,
}

#[derive(Debug)]
struct SimState {
    nodes: HashMap<Inode, Node>,
    next_inode: Inode,
    watch_of: HashMap<Inode, WatchHandle>,
    inode_of: HashMap<WatchHandle, Inode>,
    next_handle: u64,
    next_cookie: u32,
    queue: VecDeque<Notification>,
    watch_limit: Option<usize>,
}

impl Default for SimState {
    fn default() -> Self {
        let mut nodes = HashMap::new();
        nodes.insert(
            ROOT_INODE,
            Node {
                name: OsString::new(),
                parent: None,
                kind: NodeKind::Dir {
                    children: BTreeMap::new(),
                    readable: true,
                },
            },
        );
        Self {
            nodes,
            next_inode: ROOT_INODE + 1,
            watch_of: HashMap::new(),
            inode_of: HashMap::new(),
            next_handle: 0,
            next_cookie: 0,
            queue: VecDeque::new(),
            watch_limit: None,
        }
    }
}

impl SimState {
    fn lookup(&self, path: &Path) -> Option<Inode> {
        let mut current = ROOT_INODE;
        for component in path.components() {
            match component {
                Component::RootDir => {}
                Component::Normal(name) => {
                    let NodeKind::Dir { children, .. } = &self.nodes.get(&current)?.kind else {
                        return None;
                    };
                    current = *children.get(name)?;
                }
                _ => return None,
            }
        }
        Some(current)
    }

    fn path_of(&self, inode: Inode) -> Option<PathBuf> {
        let mut names = Vec::new();
        let mut current = inode;
        while current != ROOT_INODE {
            let node = self.nodes.get(&current)?;
            names.push(node.name.clone());
            current = node.parent?;
        }
        let mut path = PathBuf::from("/");
        path.extend(names.iter().rev());
        Some(path)
    }

    fn is_dir(&self, inode: Inode) -> bool {
        matches!(self.nodes.get(&inode).map(|n| &n.kind), Some(NodeKind::Dir { .. }))
    }

    /// Parent inode and entry name for a path whose parent must exist.
    fn split(&self, path: &Path) -> Result<(Inode, OsString)> {
        let name = path
            .file_name()
            .ok_or_else(|| anyhow!("no file name in {path:?}"))?
            .to_os_string();
        let parent_path = path.parent().ok_or_else(|| anyhow!("no parent for {path:?}"))?;
        let parent = self
            .lookup(parent_path)
            .ok_or_else(|| anyhow!("parent of {path:?} does not exist"))?;
        if !self.is_dir(parent) {
            bail!("parent of {path:?} is not a directory");
        }
        Ok((parent, name))
    }

    fn children_mut(&mut self, dir: Inode) -> Option<&mut BTreeMap<OsString, Inode>> {
        match &mut self.nodes.get_mut(&dir)?.kind {
            NodeKind::Dir { children, .. } => Some(children),
            NodeKind::File => None,
        }
    }

    fn insert(&mut self, parent: Inode, name: OsString, kind: NodeKind) -> Inode {
        let inode = self.next_inode;
        self.next_inode += 1;
        if let Some(children) = self.children_mut(parent) {
            children.insert(name.clone(), inode);
        }
        self.nodes.insert(
            inode,
            Node {
                name,
                parent: Some(parent),
                kind,
            },
        );
        inode
    }

    /// Queue a named notification on `dir`'s watch, if it has one.
    fn notify(&mut self, dir: Inode, kind: RawKind, name: &OsString, is_dir: bool, cookie: u32) {
        if let Some(handle) = self.watch_of.get(&dir).copied() {
            self.queue.push_back(Notification::Raw(RawEvent {
                handle,
                kind,
                name: Some(name.clone()),
                is_dir,
                cookie,
            }));
        }
    }

    fn notify_self(&mut self, dir: Inode, kind: RawKind) {
        if let Some(handle) = self.watch_of.get(&dir).copied() {
            self.queue.push_back(Notification::Raw(RawEvent {
                handle,
                kind,
                name: None,
                is_dir: true,
                cookie: 0,
            }));
        }
    }

    fn drop_watch(&mut self, inode: Inode) {
        if let Some(handle) = self.watch_of.remove(&inode) {
            self.inode_of.remove(&handle);
            self.queue.push_back(Notification::Raw(RawEvent::new(
                handle,
                RawKind::Ignored,
                None,
                false,
            )));
        }
    }

    fn remove_node(&mut self, inode: Inode) {
        // Children first, so DELETE_DIR comes out innermost first.
        let children: Vec<Inode> = match self.nodes.get(&inode).map(|n| &n.kind) {
            Some(NodeKind::Dir { children, .. }) => children.values().copied().collect(),
            _ => Vec::new(),
        };
        for child in children {
            self.remove_node(child);
        }

        let Some(node) = self.nodes.remove(&inode) else {
            return;
        };
        let is_dir = matches!(node.kind, NodeKind::Dir { .. });
        if let Some(parent) = node.parent {
            if let Some(siblings) = self.children_mut(parent) {
                siblings.remove(&node.name);
            }
            self.notify(parent, RawKind::Delete, &node.name, is_dir, 0);
        }
        if is_dir {
            self.drop_watch(inode);
        }
    }
}

/// Shared handle to a simulated tree. Clones see the same state.
#[derive(Debug, Clone, Default)]
pub struct SimTree {
    state: Arc<Mutex<SimState>>,
}

impl SimTree {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, SimState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Make `install` fail with the watch limit once `limit` watches exist.
    pub fn set_watch_limit(&self, limit: Option<usize>) {
        self.state().watch_limit = limit;
    }

    pub fn mkdir(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let mut s = self.state();
        if s.lookup(path).is_some() {
            bail!("{path:?} already exists");
        }
        let (parent, name) = s.split(path)?;
        s.insert(
            parent,
            name.clone(),
            NodeKind::Dir {
                children: BTreeMap::new(),
                readable: true,
            },
        );
        s.notify(parent, RawKind::Create, &name, true, 0);
        Ok(())
    }

    /// Create every missing directory along `path`, outermost first.
    pub fn mkdir_all(&self, path: impl AsRef<Path>) -> Result<()> {
        let mut current = PathBuf::new();
        for component in path.as_ref().components() {
            current.push(component);
            if matches!(component, Component::RootDir) {
                continue;
            }
            let exists = self.state().lookup(&current).is_some();
            if !exists {
                self.mkdir(&current)?;
            }
        }
        Ok(())
    }

    pub fn write_file(&self, path: impl AsRef<Path>, contents: &[u8]) -> Result<()> {
        let path = path.as_ref();
        let mut s = self.state();
        let (parent, name) = s.split(path)?;
        match s.lookup(path) {
            Some(inode) if s.is_dir(inode) => bail!("{path:?} is a directory"),
            Some(_) => {}
            None => {
                s.insert(parent, name.clone(), NodeKind::File);
                s.notify(parent, RawKind::Create, &name, false, 0);
            }
        }
        if !contents.is_empty() {
            s.notify(parent, RawKind::Modify, &name, false, 0);
        }
        s.notify(parent, RawKind::CloseWrite, &name, false, 0);
        Ok(())
    }

    /// Rename `from` to `to`. The destination must not exist.
    pub fn rename(&self, from: impl AsRef<Path>, to: impl AsRef<Path>) -> Result<()> {
        let (from, to) = (from.as_ref(), to.as_ref());
        let mut s = self.state();
        let inode = s
            .lookup(from)
            .ok_or_else(|| anyhow!("{from:?} does not exist"))?;
        if s.lookup(to).is_some() {
            bail!("{to:?} already exists");
        }
        let (to_parent, to_name) = s.split(to)?;
        if s.is_dir(inode) && to.starts_with(from) {
            bail!("cannot move {from:?} into itself");
        }
        let (from_parent, from_name) = s.split(from)?;
        let is_dir = s.is_dir(inode);

        if let Some(children) = s.children_mut(from_parent) {
            children.remove(&from_name);
        }
        if let Some(children) = s.children_mut(to_parent) {
            children.insert(to_name.clone(), inode);
        }
        if let Some(node) = s.nodes.get_mut(&inode) {
            node.name = to_name.clone();
            node.parent = Some(to_parent);
        }

        s.next_cookie += 1;
        let cookie = s.next_cookie;
        s.notify(from_parent, RawKind::MovedFrom, &from_name, is_dir, cookie);
        s.notify(to_parent, RawKind::MovedTo, &to_name, is_dir, cookie);
        Ok(())
    }

    /// Remove `path` and everything below it.
    pub fn remove_all(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let mut s = self.state();
        let inode = s
            .lookup(path)
            .ok_or_else(|| anyhow!("{path:?} does not exist"))?;
        if inode == ROOT_INODE {
            bail!("refusing to remove /");
        }
        s.remove_node(inode);
        Ok(())
    }

    /// Toggle read permission on a directory (or touch a file's mode).
    pub fn chmod(&self, path: impl AsRef<Path>, readable: bool) -> Result<()> {
        let path = path.as_ref();
        let mut s = self.state();
        let inode = s
            .lookup(path)
            .ok_or_else(|| anyhow!("{path:?} does not exist"))?;
        let (parent, name) = s.split(path)?;
        let is_dir = s.is_dir(inode);
        if let Some(Node {
            kind: NodeKind::Dir { readable: r, .. },
            ..
        }) = s.nodes.get_mut(&inode)
        {
            *r = readable;
        }
        if is_dir {
            s.notify_self(inode, RawKind::Attrib);
        }
        s.notify(parent, RawKind::Attrib, &name, is_dir, 0);
        Ok(())
    }

    /// Take every queued notification.
    pub fn drain(&self) -> Vec<Notification> {
        self.state().queue.drain(..).collect()
    }

    /// Queue an arbitrary notification (e.g. to simulate overflow).
    pub fn inject(&self, notification: Notification) {
        self.state().queue.push_back(notification);
    }

    /// Current on-disk path of the directory `handle` watches, if both
    /// still exist.
    pub fn path_of_watch(&self, handle: WatchHandle) -> Option<PathBuf> {
        let s = self.state();
        let inode = *s.inode_of.get(&handle)?;
        s.path_of(inode)
    }

    pub fn watch_count(&self) -> usize {
        self.state().inode_of.len()
    }

    /// Every directory under `root` (inclusive), sorted.
    pub fn dirs_under(&self, root: impl AsRef<Path>) -> Vec<PathBuf> {
        let s = self.state();
        let Some(start) = s.lookup(root.as_ref()) else {
            return Vec::new();
        };
        let mut out = Vec::new();
        let mut stack = vec![start];
        while let Some(inode) = stack.pop() {
            if let Some(NodeKind::Dir { children, .. }) = s.nodes.get(&inode).map(|n| &n.kind) {
                if let Some(path) = s.path_of(inode) {
                    out.push(path);
                }
                stack.extend(children.values().copied());
            }
        }
        out.sort();
        out
    }
}

impl FileSystem for SimTree {
    fn exists(&self, path: &Path) -> bool {
        self.state().lookup(path).is_some()
    }

    fn is_dir(&self, path: &Path) -> bool {
        let s = self.state();
        s.lookup(path).is_some_and(|inode| s.is_dir(inode))
    }

    fn absolute(&self, path: &Path) -> Result<PathBuf> {
        Ok(Path::new("/").join(path))
    }

    fn list_dirs(&self, path: &Path) -> Result<Vec<PathBuf>> {
        let s = self.state();
        let inode = s
            .lookup(path)
            .ok_or_else(|| anyhow!("{path:?} does not exist"))?;
        match s.nodes.get(&inode).map(|n| &n.kind) {
            Some(NodeKind::Dir {
                children,
                readable: true,
            }) => Ok(children
                .iter()
                .filter(|(_, child)| s.is_dir(**child))
                .map(|(name, _)| path.join(name))
                .collect()),
            Some(NodeKind::Dir { .. }) => bail!("permission denied: {path:?}"),
            _ => bail!("{path:?} is not a directory"),
        }
    }
}

impl WatchBackend for SimTree {
    type Raw = Notification;

    fn add_watch(&mut self, path: &Path) -> std::result::Result<WatchHandle, InstallError> {
        let mut s = self.state();
        let inode = s.lookup(path).ok_or(InstallError::Vanished)?;
        match s.nodes.get(&inode).map(|n| &n.kind) {
            Some(NodeKind::Dir { readable: true, .. }) => {}
            Some(NodeKind::Dir { .. }) => return Err(InstallError::PermissionDenied),
            _ => return Err(InstallError::Vanished),
        }
        if let Some(handle) = s.watch_of.get(&inode) {
            return Ok(*handle);
        }
        if s.watch_limit.is_some_and(|limit| s.inode_of.len() >= limit) {
            return Err(InstallError::LimitReached);
        }
        s.next_handle += 1;
        let handle = WatchHandle::new(s.next_handle);
        s.watch_of.insert(inode, handle);
        s.inode_of.insert(handle, inode);
        Ok(handle)
    }

    fn remove_watch(&mut self, handle: WatchHandle) {
        let mut s = self.state();
        if let Some(inode) = s.inode_of.get(&handle).copied() {
            s.drop_watch(inode);
        }
    }

    fn translate(&mut self, raw: Notification) -> Notification {
        raw
    }
}
