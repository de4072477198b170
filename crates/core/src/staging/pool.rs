//! Single-worker staging pool.

use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tempfile::TempDir;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::config::StagingConfig;
use crate::version::ArchiveRef;

use super::copy::stage_archive;
use super::error::StagingError;
use super::handle::{PendingCopy, StagingHandle};

/// Requests that may wait behind the one being copied.
const QUEUE_DEPTH: usize = 1;

/// Counters for the staging pool.
#[derive(Debug, Default)]
pub struct StagingStats {
    pub(crate) scheduled: AtomicU64,
    pub(crate) completed: AtomicU64,
    pub(crate) failed: AtomicU64,
    pub(crate) released: AtomicU64,
}

/// Point-in-time copy of `StagingStats`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StagingStatsSnapshot {
    pub scheduled: u64,
    pub completed: u64,
    pub failed: u64,
    pub released: u64,
}

impl StagingStats {
    pub fn snapshot(&self) -> StagingStatsSnapshot {
        StagingStatsSnapshot {
            scheduled: self.scheduled.load(Ordering::Relaxed),
            completed: self.completed.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            released: self.released.load(Ordering::Relaxed),
        }
    }
}

impl StagingStatsSnapshot {
    /// Staging directories created and not yet removed.
    pub fn live(&self) -> u64 {
        self.scheduled - self.failed - self.released
    }
}

/// A copy request travelling to the worker together with its directory.
struct CopyRequest {
    archive: ArchiveRef,
    directory: TempDir,
    reply: oneshot::Sender<Result<StagingHandle, StagingError>>,
}

/// Copies archives to scratch storage one at a time, in submission order.
pub struct StagingPool {
    config: StagingConfig,
    scratch_root: PathBuf,
    tx: Option<mpsc::Sender<CopyRequest>>,
    worker: Option<JoinHandle<()>>,
    stats: Arc<StagingStats>,
}

impl StagingPool {
    /// Creates the pool and spawns its worker.
    ///
    /// Must be called from within a tokio runtime.
    pub fn new(config: StagingConfig) -> Result<Self, StagingError> {
        let scratch_root = config.scratch_root();
        std::fs::create_dir_all(&scratch_root).map_err(|source| StagingError::CreateDir {
            path: scratch_root.clone(),
            source,
        })?;

        let stats = Arc::new(StagingStats::default());
        let (tx, rx) = mpsc::channel(QUEUE_DEPTH);
        let worker = StagingWorker {
            rx,
            config: config.clone(),
            stats: Arc::clone(&stats),
        };
        let worker = tokio::spawn(worker.run());

        Ok(Self {
            config,
            scratch_root,
            tx: Some(tx),
            worker: Some(worker),
            stats,
        })
    }

    pub fn stats(&self) -> StagingStatsSnapshot {
        self.stats.snapshot()
    }

    /// Allocates a fresh staging directory and queues the copy of `archive` into it.
    pub async fn schedule(&self, archive: ArchiveRef) -> Result<PendingCopy, StagingError> {
        let tx = self.tx.as_ref().ok_or(StagingError::WorkerStopped)?;

        let directory = tempfile::Builder::new()
            .prefix(&self.config.dir_prefix)
            .tempdir_in(&self.scratch_root)
            .map_err(|source| StagingError::CreateDir {
                path: self.scratch_root.clone(),
                source,
            })?;
        let path = directory.path().to_path_buf();
        self.stats.scheduled.fetch_add(1, Ordering::Relaxed);

        tracing::debug!(
            version = %archive.version,
            "Scheduling copy of {} into {}",
            archive.source_path.display(),
            path.display()
        );

        let (reply, completion) = oneshot::channel();
        let request = CopyRequest {
            archive: archive.clone(),
            directory,
            reply,
        };
        if let Err(mpsc::error::SendError(request)) = tx.send(request).await {
            // The request never reached the worker; give the directory back.
            self.stats.failed.fetch_add(1, Ordering::Relaxed);
            drop(request.directory);
            return Err(StagingError::WorkerStopped);
        }

        Ok(PendingCopy::new(archive, path, completion))
    }

    /// Stops accepting requests and waits for queued copies to settle.
    ///
    /// Every directory owned by the worker has been removed or handed out
    /// when this returns.
    pub async fn shutdown(mut self) {
        self.tx.take();
        if let Some(worker) = self.worker.take() {
            if let Err(e) = worker.await {
                tracing::error!("Staging worker panicked: {}", e);
            }
        }
    }
}

impl Drop for StagingPool {
    fn drop(&mut self) {
        // Closing the queue lets the worker drain and exit on its own.
        self.tx.take();
    }
}

/// Background task serving copy requests sequentially.
struct StagingWorker {
    rx: mpsc::Receiver<CopyRequest>,
    config: StagingConfig,
    stats: Arc<StagingStats>,
}

impl StagingWorker {
    async fn run(mut self) {
        tracing::debug!("Staging worker started");

        while let Some(request) = self.rx.recv().await {
            let CopyRequest {
                archive,
                directory,
                reply,
            } = request;
            let start = Instant::now();

            let outcome = match stage_archive(&archive, directory, &self.config).await {
                Ok((directory, bytes)) => {
                    self.stats.completed.fetch_add(1, Ordering::Relaxed);
                    tracing::debug!(
                        version = %archive.version,
                        bytes,
                        duration_ms = start.elapsed().as_millis() as u64,
                        "Staged {}",
                        archive.file_name()
                    );
                    Ok(StagingHandle::new(
                        archive,
                        directory,
                        bytes,
                        Arc::clone(&self.stats),
                    ))
                }
                Err(e) => {
                    self.stats.failed.fetch_add(1, Ordering::Relaxed);
                    tracing::debug!(version = %archive.version, "Staging failed: {}", e);
                    Err(e)
                }
            };

            if let Err(Ok(handle)) = reply.send(outcome) {
                tracing::debug!(
                    version = %handle.version(),
                    "Nobody is waiting for the staged copy, releasing it"
                );
                if let Err(e) = release_handle(handle).await {
                    tracing::warn!("{}", e);
                }
            }
        }

        tracing::debug!("Staging worker shutting down");
    }
}

/// Releases a handle on the blocking pool.
pub(crate) async fn release_handle(handle: StagingHandle) -> Result<(), StagingError> {
    tokio::task::spawn_blocking(move || handle.release())
        .await
        .map_err(|e| StagingError::Io(std::io::Error::other(e)))?
}
