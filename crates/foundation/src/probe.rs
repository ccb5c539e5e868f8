//! Storage probes
//!
//! The engine never reads or writes payload data itself; it only asks
//! whether resources exist and provides directories for outputs. That
//! narrow surface is a trait so the check phase, tests and embedders
//! can swap real storage for a simulated one.

use std::collections::BTreeSet;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

/// Existence and directory queries against some storage backend
pub trait StorageProbe: Send + Sync {
    /// Does anything exist at this path?
    fn exists(&self, path: &Path) -> bool;

    /// Does this path name a directory?
    fn is_directory(&self, path: &Path) -> bool;

    /// Provide this directory and any missing ancestors.
    fn create_directory(&self, path: &Path) -> io::Result<()>;
}

/// Probe backed by the local filesystem
#[derive(Debug, Default)]
pub struct FsProbe;

impl StorageProbe for FsProbe {
    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }

    fn is_directory(&self, path: &Path) -> bool {
        path.is_dir()
    }

    fn create_directory(&self, path: &Path) -> io::Result<()> {
        std::fs::create_dir_all(path)
    }
}

/// In-memory probe for tests and dry runs
///
/// Seed it with the files and directories the script should see, then
/// inspect `creations` to learn what the engine asked for.
#[derive(Debug, Default)]
pub struct MemoryProbe {
    files: Mutex<BTreeSet<PathBuf>>,
    dirs: Mutex<BTreeSet<PathBuf>>,
    creations: Mutex<Vec<PathBuf>>,
}

impl MemoryProbe {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a file; its ancestors become directories.
    pub fn add_file(&self, path: impl Into<PathBuf>) {
        let path = path.into();
        self.register_ancestors(&path);
        lock(&self.files).insert(path);
    }

    /// Register a directory; its ancestors become directories too.
    pub fn add_directory(&self, path: impl Into<PathBuf>) {
        let path = path.into();
        self.register_ancestors(&path);
        lock(&self.dirs).insert(path);
    }

    /// Every directory the engine asked this probe to create, in order
    pub fn creations(&self) -> Vec<PathBuf> {
        lock(&self.creations).clone()
    }

    fn register_ancestors(&self, path: &Path) {
        let mut dirs = lock(&self.dirs);
        let mut current = path.parent();
        while let Some(dir) = current
            && !dir.as_os_str().is_empty()
        {
            dirs.insert(dir.to_path_buf());
            current = dir.parent();
        }
    }
}

impl StorageProbe for MemoryProbe {
    fn exists(&self, path: &Path) -> bool {
        lock(&self.files).contains(path) || lock(&self.dirs).contains(path)
    }

    fn is_directory(&self, path: &Path) -> bool {
        lock(&self.dirs).contains(path)
    }

    fn create_directory(&self, path: &Path) -> io::Result<()> {
        self.register_ancestors(path);
        lock(&self.dirs).insert(path.to_path_buf());
        lock(&self.creations).push(path.to_path_buf());
        Ok(())
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
