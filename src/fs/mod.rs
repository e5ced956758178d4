// src/fs/mod.rs

//! Directory-listing primitive used for root validation and subtree walks.

use std::fmt::Debug;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

pub mod mock;

/// Abstract filesystem interface.
pub trait FileSystem: Send + Sync + Debug {
    fn exists(&self, path: &Path) -> bool;
    fn is_dir(&self, path: &Path) -> bool;

    /// Make `path` absolute without resolving symlinks.
    fn absolute(&self, path: &Path) -> Result<PathBuf>;

    /// Return the full paths of the directories directly inside `path`.
    ///
    /// Symlinks are not followed: a link to a directory is not a directory
    /// here.
    fn list_dirs(&self, path: &Path) -> Result<Vec<PathBuf>>;
}

impl<T: FileSystem + ?Sized> FileSystem for &T {
    fn exists(&self, path: &Path) -> bool {
        (**self).exists(path)
    }

    fn is_dir(&self, path: &Path) -> bool {
        (**self).is_dir(path)
    }

    fn absolute(&self, path: &Path) -> Result<PathBuf> {
        (**self).absolute(path)
    }

    fn list_dirs(&self, path: &Path) -> Result<Vec<PathBuf>> {
        (**self).list_dirs(path)
    }
}

/// Implementation that uses `std::fs`.
#[derive(Debug, Clone, Default)]
pub struct RealFileSystem;

impl FileSystem for RealFileSystem {
    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }

    fn is_dir(&self, path: &Path) -> bool {
        path.is_dir()
    }

    fn absolute(&self, path: &Path) -> Result<PathBuf> {
        std::path::absolute(path).with_context(|| format!("resolving {:?}", path))
    }

    fn list_dirs(&self, path: &Path) -> Result<Vec<PathBuf>> {
        let mut dirs = Vec::new();
        for entry in fs::read_dir(path).with_context(|| format!("reading dir {:?}", path))? {
            let entry = entry?;
            // A child can vanish between readdir and the type lookup.
            let Ok(file_type) = entry.file_type() else {
                continue;
            };
            if file_type.is_dir() {
                dirs.push(entry.path());
            }
        }
        dirs.sort();
        Ok(dirs)
    }
}
