//! Stage-ahead-by-one pipeline implementation.

use futures::stream::{self, Stream};
use std::path::Path;

use crate::config::{LocatorConfig, StagingConfig};
use crate::staging::{
    PendingCopy, StagingError, StagingHandle, StagingPool, StagingStatsSnapshot,
};
use crate::version::{ArchiveRef, LocatorError, VersionLocator};

use super::error::PipelineError;
use super::traits::StageConsumer;

/// Scans `source_dir` on the blocking pool.
async fn locate_archives(
    source_dir: &Path,
    config: &LocatorConfig,
) -> Result<Vec<ArchiveRef>, LocatorError> {
    let locator = VersionLocator::new(config)?;
    let directory = source_dir.to_path_buf();
    tokio::task::spawn_blocking(move || locator.locate(&directory))
        .await
        .map_err(|e| LocatorError::ReadDir {
            path: source_dir.to_path_buf(),
            source: std::io::Error::other(e),
        })?
}

/// Outcome of `PrefetchPipeline::drive`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DriveReport {
    /// Versions handed to the consumer.
    pub consumed: usize,
    /// The consumer asked to stop before the worklist was exhausted.
    pub stopped_early: bool,
    /// Staging directories that could not be removed.
    pub release_failures: usize,
}

/// Lazy, version-ordered sequence of staged archives with one-ahead prefetch.
///
/// State is explicit: the ordered worklist, the index of the next archive
/// to schedule and the single pending copy. Each `next` call waits for the
/// pending copy, schedules the following archive, then hands the staged
/// directory out. Callers of the pull API must `release` a handle before
/// asking for the next one to keep at most two directories alive.
pub struct PrefetchPipeline {
    archives: Vec<ArchiveRef>,
    next_index: usize,
    pending: Option<PendingCopy>,
    deferred: Option<PipelineError>,
    yielded: usize,
    pool: StagingPool,
}

impl PrefetchPipeline {
    /// Scans `source_dir` and starts staging the lowest version.
    pub async fn open(
        source_dir: &Path,
        locator: &LocatorConfig,
        staging: StagingConfig,
    ) -> Result<Self, PipelineError> {
        let archives = locate_archives(source_dir, locator).await?;
        let pool = StagingPool::new(staging).map_err(PipelineError::Pool)?;

        tracing::info!(
            "Found {} archive(s) in {}",
            archives.len(),
            source_dir.display()
        );

        let mut pipeline = Self {
            archives,
            next_index: 0,
            pending: None,
            deferred: None,
            yielded: 0,
            pool,
        };
        pipeline.schedule_next().await?;
        Ok(pipeline)
    }

    /// The ordered worklist.
    pub fn archives(&self) -> &[ArchiveRef] {
        &self.archives
    }

    pub fn len(&self) -> usize {
        self.archives.len()
    }

    pub fn is_empty(&self) -> bool {
        self.archives.is_empty()
    }

    /// Number of handles yielded so far.
    pub fn yielded(&self) -> usize {
        self.yielded
    }

    pub fn stats(&self) -> StagingStatsSnapshot {
        self.pool.stats()
    }

    async fn schedule_next(&mut self) -> Result<(), PipelineError> {
        let Some(archive) = self.archives.get(self.next_index).cloned() else {
            return Ok(());
        };
        self.next_index += 1;
        let pending = self
            .pool
            .schedule(archive.clone())
            .await
            .map_err(|source| PipelineError::staging(&archive, source))?;
        self.pending = Some(pending);
        Ok(())
    }

    fn exhaust(&mut self) {
        self.next_index = self.archives.len();
        self.pending = None;
    }

    /// Waits for the next staged version.
    ///
    /// Returns `None` once every archive has been yielded or after an error
    /// has been returned.
    pub async fn next(&mut self) -> Option<Result<StagingHandle, PipelineError>> {
        if let Some(err) = self.deferred.take() {
            self.exhaust();
            return Some(Err(err));
        }

        let pending = self.pending.take()?;
        let archive = pending.archive().clone();
        let handle = match pending.wait().await {
            Ok(handle) => handle,
            Err(source) => {
                tracing::error!(version = %archive.version, "Staging failed: {}", source);
                self.exhaust();
                return Some(Err(PipelineError::staging(&archive, source)));
            }
        };

        // Prefetch the following version while this one is being consumed.
        // A scheduling failure is reported after the current handle.
        if let Err(err) = self.schedule_next().await {
            self.deferred = Some(err);
        }

        self.yielded += 1;
        tracing::debug!(
            version = %handle.version(),
            "Staged version ready at {}",
            handle.path().display()
        );
        Some(Ok(handle))
    }

    /// Deletes a handle's staging directory.
    pub async fn release(&self, handle: StagingHandle) -> Result<(), StagingError> {
        crate::staging::release_handle(handle).await
    }

    /// Hands every staged version to `consumer`, releasing each directory
    /// after `consume` returns, then closes the pipeline.
    pub async fn drive<C>(mut self, consumer: &mut C) -> Result<DriveReport, PipelineError>
    where
        C: StageConsumer + ?Sized,
    {
        let mut report = DriveReport::default();

        let result = loop {
            let handle = match self.next().await {
                None => break Ok(()),
                Some(Err(err)) => break Err(err),
                Some(Ok(handle)) => handle,
            };

            let flow = consumer.consume(&handle).await;
            report.consumed += 1;

            let version = handle.version();
            if let Err(e) = self.release(handle).await {
                tracing::warn!(%version, "{}", e);
                report.release_failures += 1;
            }

            if flow.is_break() {
                report.stopped_early = self.pending.is_some() || self.deferred.is_some();
                tracing::info!(%version, "Consumer stopped the pipeline");
                break Ok(());
            }
        };

        self.close().await;
        result.map(|()| report)
    }

    /// Abandons any in-flight copy and waits for the staging worker to settle.
    ///
    /// No staging directory created by this pipeline remains afterwards,
    /// except handles the caller still holds.
    pub async fn close(mut self) {
        self.exhaust();
        self.pool.shutdown().await;
    }

    /// Converts the pipeline into a stream of staged versions.
    ///
    /// The pool is shut down when the stream is exhausted. Dropping the
    /// stream early lets the worker finish and clean up in the background.
    pub fn into_stream(self) -> impl Stream<Item = Result<StagingHandle, PipelineError>> {
        stream::unfold(Some(self), |state| async move {
            let mut pipeline = state?;
            match pipeline.next().await {
                Some(item) => Some((item, Some(pipeline))),
                None => {
                    pipeline.close().await;
                    None
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::fixtures;
    use futures::StreamExt;
    use std::ops::ControlFlow;
    use std::path::PathBuf;
    use tempfile::TempDir;

    struct Recorder {
        versions: Vec<String>,
        paths: Vec<PathBuf>,
        stop_after: Option<usize>,
    }

    #[async_trait::async_trait]
    impl StageConsumer for Recorder {
        async fn consume(&mut self, handle: &StagingHandle) -> ControlFlow<()> {
            assert!(handle.path().join(fixtures::PAYLOAD_DIR).is_dir());
            self.versions.push(handle.version().to_string());
            self.paths.push(handle.path().to_path_buf());
            match self.stop_after {
                Some(n) if self.versions.len() >= n => ControlFlow::Break(()),
                _ => ControlFlow::Continue(()),
            }
        }
    }

    fn staging(scratch: &Path) -> StagingConfig {
        StagingConfig::default().with_scratch_dir(scratch.to_path_buf())
    }

    fn scratch_entries(scratch: &Path) -> usize {
        std::fs::read_dir(scratch).unwrap().count()
    }

    #[tokio::test]
    async fn test_empty_directory_yields_nothing() {
        let source = TempDir::new().unwrap();
        let scratch = TempDir::new().unwrap();

        let mut pipeline =
            PrefetchPipeline::open(source.path(), &LocatorConfig::default(), staging(scratch.path()))
                .await
                .unwrap();
        assert!(pipeline.is_empty());
        assert!(pipeline.next().await.is_none());
        pipeline.close().await;
        assert_eq!(scratch_entries(scratch.path()), 0);
    }

    #[tokio::test]
    async fn test_pull_api_yields_in_version_order() {
        let source = TempDir::new().unwrap();
        let scratch = TempDir::new().unwrap();
        fixtures::write_release_set(source.path(), &["10.290", "9.280", "11.300"]);

        let mut pipeline =
            PrefetchPipeline::open(source.path(), &LocatorConfig::default(), staging(scratch.path()))
                .await
                .unwrap();

        let mut seen = Vec::new();
        while let Some(item) = pipeline.next().await {
            let handle = item.unwrap();
            assert!(scratch_entries(scratch.path()) <= 2);
            seen.push(handle.version().to_string());
            pipeline.release(handle).await.unwrap();
        }
        assert_eq!(seen, vec!["9.280", "10.290", "11.300"]);
        assert_eq!(pipeline.yielded(), 3);

        pipeline.close().await;
        assert_eq!(scratch_entries(scratch.path()), 0);
    }

    #[tokio::test]
    async fn test_drive_releases_every_directory() {
        let source = TempDir::new().unwrap();
        let scratch = TempDir::new().unwrap();
        fixtures::write_release_set(source.path(), &["1.9", "1.10", "1.2"]);

        let pipeline =
            PrefetchPipeline::open(source.path(), &LocatorConfig::default(), staging(scratch.path()))
                .await
                .unwrap();
        let mut recorder = Recorder {
            versions: vec![],
            paths: vec![],
            stop_after: None,
        };
        let report = pipeline.drive(&mut recorder).await.unwrap();

        assert_eq!(report.consumed, 3);
        assert!(!report.stopped_early);
        assert_eq!(report.release_failures, 0);
        assert_eq!(recorder.versions, vec!["1.2", "1.9", "1.10"]);
        assert!(recorder.paths.iter().all(|p| !p.exists()));
        assert_eq!(scratch_entries(scratch.path()), 0);
    }

    #[tokio::test]
    async fn test_early_stop_cleans_up_prefetched_copy() {
        let source = TempDir::new().unwrap();
        let scratch = TempDir::new().unwrap();
        fixtures::write_release_set(source.path(), &["9.280", "10.290", "11.300", "12.331"]);

        let pipeline =
            PrefetchPipeline::open(source.path(), &LocatorConfig::default(), staging(scratch.path()))
                .await
                .unwrap();
        let mut recorder = Recorder {
            versions: vec![],
            paths: vec![],
            stop_after: Some(1),
        };
        let report = pipeline.drive(&mut recorder).await.unwrap();

        assert_eq!(report.consumed, 1);
        assert!(report.stopped_early);
        assert_eq!(scratch_entries(scratch.path()), 0);
    }

    #[tokio::test]
    async fn test_staging_failure_stops_after_earlier_versions() {
        let source = TempDir::new().unwrap();
        let scratch = TempDir::new().unwrap();
        fixtures::write_release_set(source.path(), &["9.280", "11.300"]);
        fixtures::write_corrupt_archive(source.path(), "FoundryVTT-10.290.zip");

        let mut pipeline =
            PrefetchPipeline::open(source.path(), &LocatorConfig::default(), staging(scratch.path()))
                .await
                .unwrap();

        let first = pipeline.next().await.unwrap().unwrap();
        assert_eq!(first.version().to_string(), "9.280");
        pipeline.release(first).await.unwrap();

        let err = pipeline.next().await.unwrap().unwrap_err();
        assert_eq!(err.version().map(|v| v.to_string()), Some("10.290".to_string()));
        assert!(pipeline.next().await.is_none());

        let stats = pipeline.stats();
        assert_eq!(stats.scheduled, 2, "11.300 must never be staged");
        pipeline.close().await;
        assert_eq!(scratch_entries(scratch.path()), 0);
    }

    #[tokio::test]
    async fn test_stream_adapter() {
        let source = TempDir::new().unwrap();
        let scratch = TempDir::new().unwrap();
        fixtures::write_release_set(source.path(), &["2.1", "2.0"]);

        let pipeline =
            PrefetchPipeline::open(source.path(), &LocatorConfig::default(), staging(scratch.path()))
                .await
                .unwrap();
        let versions: Vec<String> = pipeline
            .into_stream()
            .map(|item| {
                let handle = item.unwrap();
                let version = handle.version().to_string();
                handle.release().unwrap();
                version
            })
            .collect()
            .await;

        assert_eq!(versions, vec!["2.0", "2.1"]);
        assert_eq!(scratch_entries(scratch.path()), 0);
    }

    #[tokio::test]
    async fn test_malformed_name_fails_open() {
        let source = TempDir::new().unwrap();
        let scratch = TempDir::new().unwrap();
        fixtures::write_release_set(source.path(), &["9.280"]);
        std::fs::write(source.path().join("FoundryVTT-nightly.zip"), b"x").unwrap();

        let result =
            PrefetchPipeline::open(source.path(), &LocatorConfig::default(), staging(scratch.path()))
                .await;
        assert!(matches!(result, Err(PipelineError::Locate(_))));
        assert_eq!(scratch_entries(scratch.path()), 0);
    }
}
