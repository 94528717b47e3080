pub mod git;

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tempfile::TempDir;
use tracing::{debug, warn};

use crate::config::GitConfig;
use crate::error::FetchError;

#[async_trait]
pub trait SourceFetcher: Send + Sync {
    /// Produces a fresh local working copy of `source`.
    async fn fetch(&self, source: &GitConfig) -> Result<WorkingCopy, FetchError>;
}

/// A checked-out source tree living in its own temporary directory.
///
/// The directory belongs to a single pipeline run and is removed when the copy is
/// closed or dropped.
#[derive(Debug)]
pub struct WorkingCopy {
    root: TempDir,
    path: PathBuf,
}

impl WorkingCopy {
    pub fn new(root: TempDir, path: PathBuf) -> Self {
        Self { root, path }
    }

    /// Allocates an empty, uniquely named directory for one run.
    pub fn allocate() -> Result<TempDir, FetchError> {
        tempfile::Builder::new()
            .prefix("drift-monitor-")
            .tempdir()
            .map_err(FetchError::TempDir)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn root(&self) -> &Path {
        self.root.path()
    }

    /// Removes the directory now. Failures are logged, never returned.
    pub fn close(self) {
        let root = self.root.path().to_path_buf();
        match self.root.close() {
            Ok(()) => debug!(dir = %root.display(), "deleted working copy"),
            Err(err) => warn!(dir = %root.display(), "failed deleting working copy: {err}"),
        }
    }

    /// Removes the directory on the blocking pool so large trees never stall a runtime worker.
    pub async fn discard(self) {
        if let Err(err) = tokio::task::spawn_blocking(move || self.close()).await {
            warn!("working copy cleanup task failed: {err}");
        }
    }
}
