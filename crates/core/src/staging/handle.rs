//! Handles for staged and in-flight archives.

use std::path::{Path, PathBuf};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tempfile::TempDir;
use tokio::sync::oneshot;

use crate::version::{ArchiveRef, ArchiveVersion};

use super::error::StagingError;
use super::pool::StagingStats;

/// Exclusive ownership of a fully staged archive directory.
///
/// The directory is deleted exactly once: by `release`, or on drop if the
/// handle was never released.
#[derive(Debug)]
pub struct StagingHandle {
    archive: ArchiveRef,
    path: PathBuf,
    directory: Option<TempDir>,
    bytes_copied: u64,
    stats: Arc<StagingStats>,
}

impl StagingHandle {
    pub(crate) fn new(
        archive: ArchiveRef,
        directory: TempDir,
        bytes_copied: u64,
        stats: Arc<StagingStats>,
    ) -> Self {
        Self {
            archive,
            path: directory.path().to_path_buf(),
            directory: Some(directory),
            bytes_copied,
            stats,
        }
    }

    /// Staging directory holding the archive contents.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Archive this directory was staged from.
    pub fn archive(&self) -> &ArchiveRef {
        &self.archive
    }

    pub fn version(&self) -> ArchiveVersion {
        self.archive.version
    }

    /// Size of the copied archive in bytes.
    pub fn bytes_copied(&self) -> u64 {
        self.bytes_copied
    }

    /// Deletes the staging directory and its contents.
    pub fn release(mut self) -> Result<(), StagingError> {
        self.remove()
    }

    fn remove(&mut self) -> Result<(), StagingError> {
        let Some(directory) = self.directory.take() else {
            return Ok(());
        };
        self.stats.released.fetch_add(1, Ordering::Relaxed);
        directory.close().map_err(|source| StagingError::Cleanup {
            path: self.path.clone(),
            source,
        })
    }
}

impl Drop for StagingHandle {
    fn drop(&mut self) {
        if self.directory.is_some() {
            tracing::debug!(
                version = %self.archive.version,
                "Releasing unreleased staging directory {}",
                self.path.display()
            );
            if let Err(e) = self.remove() {
                tracing::warn!("{}", e);
            }
        }
    }
}

/// A scheduled copy whose completion has not been observed yet.
///
/// Dropping it abandons the result; the worker then removes the directory
/// once the copy finishes.
#[derive(Debug)]
pub struct PendingCopy {
    archive: ArchiveRef,
    directory: PathBuf,
    completion: oneshot::Receiver<Result<StagingHandle, StagingError>>,
}

impl PendingCopy {
    pub(crate) fn new(
        archive: ArchiveRef,
        directory: PathBuf,
        completion: oneshot::Receiver<Result<StagingHandle, StagingError>>,
    ) -> Self {
        Self {
            archive,
            directory,
            completion,
        }
    }

    pub fn archive(&self) -> &ArchiveRef {
        &self.archive
    }

    /// Directory the archive is being staged into.
    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// Waits for the copy to finish.
    pub async fn wait(self) -> Result<StagingHandle, StagingError> {
        self.completion
            .await
            .map_err(|_| StagingError::WorkerStopped)?
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn handle(root: &Path, stats: &Arc<StagingStats>) -> StagingHandle {
        let dir = tempfile::Builder::new()
            .prefix("handle-test-")
            .tempdir_in(root)
            .unwrap();
        std::fs::write(dir.path().join("payload"), b"data").unwrap();
        StagingHandle::new(
            ArchiveRef::new(PathBuf::from("FoundryVTT-9.280.zip"), ArchiveVersion::new(9, 280)),
            dir,
            4,
            Arc::clone(stats),
        )
    }

    #[test]
    fn test_release_removes_directory_once() {
        let root = TempDir::new().unwrap();
        let stats = Arc::new(StagingStats::default());
        let handle = handle(root.path(), &stats);
        let path = handle.path().to_path_buf();
        assert!(path.exists());

        handle.release().unwrap();
        assert!(!path.exists());
        assert_eq!(stats.snapshot().released, 1);
    }

    #[test]
    fn test_drop_removes_unreleased_directory() {
        let root = TempDir::new().unwrap();
        let stats = Arc::new(StagingStats::default());
        let path = {
            let handle = handle(root.path(), &stats);
            handle.path().to_path_buf()
        };
        assert!(!path.exists());
        assert_eq!(stats.snapshot().released, 1);
    }

    #[tokio::test]
    async fn test_pending_copy_worker_gone() {
        let (tx, rx) = oneshot::channel();
        let pending = PendingCopy::new(
            ArchiveRef::new(PathBuf::from("FoundryVTT-9.280.zip"), ArchiveVersion::new(9, 280)),
            PathBuf::from("/tmp/unused"),
            rx,
        );
        drop(tx);
        assert!(matches!(pending.wait().await, Err(StagingError::WorkerStopped)));
    }
}
