// src/watch/exclude.rs

//! Exclusion filter.
//!
//! Patterns are literal names or slash-separated path fragments. A path is
//! excluded when a run of its segments equals a pattern's segments exactly:
//! `node_modules` excludes any directory literally named `node_modules` at
//! any depth, `vendor/cache` excludes `cache` directly inside any `vendor`.
//! No globbing, no regex.
//!
//! Paths handed to the filter are relative to the watch root that owns them,
//! so the location of the root itself never matters.

use std::ffi::OsString;
use std::path::{Component, Path};

#[derive(Debug, Clone, Default)]
pub struct ExclusionFilter {
    patterns: Vec<Vec<OsString>>,
}

impl ExclusionFilter {
    pub fn new<I, S>(patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let patterns = patterns
            .into_iter()
            .map(|p| {
                p.as_ref()
                    .split('/')
                    .filter(|s| !s.is_empty())
                    .map(OsString::from)
                    .collect::<Vec<_>>()
            })
            .filter(|segments| !segments.is_empty())
            .collect();
        Self { patterns }
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    /// True when any run of segments in `path` equals a pattern.
    pub fn is_excluded(&self, path: &Path) -> bool {
        if self.patterns.is_empty() {
            return false;
        }
        let segments = segments(path);
        self.patterns
            .iter()
            .any(|pattern| segments.windows(pattern.len()).any(|w| w == pattern.as_slice()))
    }

    /// True when something strictly above the last segment of `path` is
    /// excluded, i.e. `path` lives inside an excluded directory.
    ///
    /// The entry named by an excluded pattern is itself not hidden: its own
    /// create/delete/move events are boundary events and still surface.
    pub fn hides(&self, path: &Path) -> bool {
        match path.parent() {
            Some(parent) => self.is_excluded(parent),
            None => false,
        }
    }
}

fn segments(path: &Path) -> Vec<OsString> {
    path.components()
        .filter_map(|c| match c {
            Component::Normal(s) => Some(s.to_os_string()),
            _ => None,
        })
        .collect()
}
