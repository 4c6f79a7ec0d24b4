//! Persisted "already initialized" marker.

use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

/// Storage collaborator deciding bootstrap versus normal mode.
pub trait StateStore: Send + Sync {
    /// Whether the daemon was initialized before.
    fn exists(&self) -> bool;
    fn mark_initialized(&self) -> io::Result<()>;
}

/// Marker file inside the work directory.
#[derive(Debug, Clone)]
pub struct FileStateStore {
    marker: PathBuf,
}

impl FileStateStore {
    pub const MARKER: &'static str = "hostd.state";

    pub fn new(work_dir: &Path) -> Self {
        Self {
            marker: work_dir.join(Self::MARKER),
        }
    }
}

impl StateStore for FileStateStore {
    fn exists(&self) -> bool {
        self.marker.is_file()
    }

    fn mark_initialized(&self) -> io::Result<()> {
        std::fs::write(&self.marker, concat!("initialized by hostd ", env!("CARGO_PKG_VERSION"), "\n"))?;
        tracing::debug!(marker = %self.marker.display(), "Daemon state persisted");
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct MemoryStateStore(AtomicBool);

impl MemoryStateStore {
    pub fn new(initialized: bool) -> Self {
        Self(AtomicBool::new(initialized))
    }
}

impl StateStore for MemoryStateStore {
    fn exists(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    fn mark_initialized(&self) -> io::Result<()> {
        self.0.store(true, Ordering::SeqCst);
        Ok(())
    }
}
