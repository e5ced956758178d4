#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use treewatch::emit::format_line;
use treewatch::engine::{WatchCore, WatchOptions};
use treewatch::types::{NormalizedEvent, OutputFormat};
use treewatch::watch::ExclusionFilter;
use treewatch::{Watcher, errors::Result};

pub use treewatch_test_utils::builders;
pub use treewatch_test_utils::{SimTree, init_tracing, make_dirs, with_timeout};

/// Comma-variant line without the trailing newline.
pub fn line(event: &NormalizedEvent) -> String {
    let bytes = format_line(event, OutputFormat::Comma);
    String::from_utf8_lossy(&bytes).trim_end_matches('\n').to_string()
}

/// `"<root>/<rel>,<KIND>"`, for building expectations against a real root.
pub fn expect(root: &Path, rel: &str, kind: &str) -> String {
    format!("{},{}", root.join(rel).display(), kind)
}

/// Read events until `count` have arrived (5s timeout).
pub async fn collect(watcher: &mut Watcher, count: usize) -> Vec<String> {
    with_timeout(async {
        let mut lines = Vec::with_capacity(count);
        while lines.len() < count {
            match watcher.next_event().await {
                Some(event) => lines.push(line(&event)),
                None => break,
            }
        }
        lines
    })
    .await
}

/// Assert nothing else arrives within `quiet`.
pub async fn assert_quiet(watcher: &mut Watcher, quiet: Duration) {
    if let Ok(Some(event)) = tokio::time::timeout(quiet, watcher.next_event()).await {
        panic!("unexpected event: {}", line(&event));
    }
}

/// A `WatchCore` driven by a simulated tree, one notification at a time.
pub struct SimHarness {
    pub sim: SimTree,
    pub core: WatchCore<SimTree, SimTree>,
    pub now: Instant,
    pub roots: Vec<PathBuf>,
}

impl SimHarness {
    pub fn new(roots: &[&str], exclude: &[&str]) -> Self {
        Self::with_options(roots, exclude, WatchOptions::default())
    }

    pub fn with_options(roots: &[&str], exclude: &[&str], options: WatchOptions) -> Self {
        let sim = SimTree::new();
        for root in roots {
            sim.mkdir_all(root).unwrap();
        }
        Self::start(sim, roots, exclude, options).unwrap()
    }

    /// Start over an already populated tree.
    pub fn start(sim: SimTree, roots: &[&str], exclude: &[&str], options: WatchOptions) -> Result<Self> {
        let mut core = WatchCore::new(sim.clone(), sim.clone(), ExclusionFilter::new(exclude), &options);
        for root in roots {
            core.install_root(Path::new(root))?;
        }
        sim.drain();
        Ok(Self {
            sim,
            core,
            now: Instant::now(),
            roots: roots.iter().map(PathBuf::from).collect(),
        })
    }

    /// Feed every queued notification through the core.
    pub fn pump(&mut self) -> Vec<String> {
        let mut lines = Vec::new();
        loop {
            let batch = self.sim.drain();
            if batch.is_empty() {
                break;
            }
            for notification in batch {
                let events = self.core.step(notification, self.now).unwrap();
                lines.extend(events.iter().map(line));
            }
        }
        lines
    }

    /// Let time pass, expiring unpaired moves.
    pub fn advance(&mut self, by: Duration) -> Vec<String> {
        self.now += by;
        self.core.expire_pending(self.now);
        self.pump()
    }

    /// Every cached path equals where the watched directory really is.
    pub fn assert_paths_consistent(&self) {
        for (handle, path) in self.core.table().iter() {
            assert_eq!(
                self.sim.path_of_watch(handle).as_deref(),
                Some(path),
                "watch {handle} cached at {path:?}"
            );
        }
    }

    /// Sorted cached paths.
    pub fn watched(&self) -> Vec<PathBuf> {
        let mut paths: Vec<PathBuf> = self.core.table().iter().map(|(_, p)| p.to_path_buf()).collect();
        paths.sort();
        paths
    }
}
