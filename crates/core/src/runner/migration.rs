//! Migration runner implementation.

use async_trait::async_trait;
use chrono::Utc;
use std::ops::ControlFlow;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tokio::sync::mpsc;

use crate::config::Config;
use crate::pipeline::{PrefetchPipeline, StageConsumer};
use crate::procedure::UpdateProcedure;
use crate::staging::StagingHandle;

use super::error::{MigrationError, PayloadError};
use super::types::{MigrationProgress, MigrationSummary, VersionOutcome, VersionReport};

/// Finds the single top-level entry of a staging directory.
pub async fn locate_payload(dir: &Path) -> Result<PathBuf, PayloadError> {
    let io_err = |source: std::io::Error| PayloadError::Io {
        dir: dir.to_path_buf(),
        source,
    };

    let mut entries = tokio::fs::read_dir(dir).await.map_err(io_err)?;
    let mut found = Vec::new();
    while let Some(entry) = entries.next_entry().await.map_err(io_err)? {
        found.push(entry.path());
    }

    match found.len() {
        0 => Err(PayloadError::Empty {
            dir: dir.to_path_buf(),
        }),
        1 => Ok(found.remove(0)),
        _ => {
            let mut names: Vec<String> = found
                .iter()
                .filter_map(|p| p.file_name())
                .map(|n| n.to_string_lossy().to_string())
                .collect();
            names.sort();
            Err(PayloadError::Multiple {
                dir: dir.to_path_buf(),
                entries: names,
            })
        }
    }
}

/// Runs an update procedure over every archived version, oldest first.
pub struct MigrationRunner<P: UpdateProcedure> {
    procedure: P,
    progress_tx: Option<mpsc::Sender<MigrationProgress>>,
}

impl<P: UpdateProcedure> MigrationRunner<P> {
    pub fn new(procedure: P) -> Self {
        Self {
            procedure,
            progress_tx: None,
        }
    }

    /// Sends progress updates to `progress_tx`.
    ///
    /// If the receiver is dropped the run continues without reporting.
    pub fn with_progress(mut self, progress_tx: mpsc::Sender<MigrationProgress>) -> Self {
        self.progress_tx = Some(progress_tx);
        self
    }

    /// Migrates every archive found in `source_dir`.
    pub async fn run(
        &self,
        source_dir: &Path,
        config: &Config,
    ) -> Result<MigrationSummary, MigrationError> {
        self.procedure
            .validate()
            .await
            .map_err(MigrationError::Procedure)?;

        let mut summary = MigrationSummary::new(source_dir.to_path_buf(), self.procedure.name());

        let pipeline =
            match PrefetchPipeline::open(source_dir, &config.locator, config.staging.clone()).await
            {
                Ok(pipeline) => pipeline,
                Err(source) => {
                    tracing::error!("{}", source);
                    summary.finished_at = Some(Utc::now());
                    return Err(MigrationError::Aborted {
                        source,
                        summary: Box::new(summary),
                    });
                }
            };
        summary.total = pipeline.len();

        emit(
            self.progress_tx.as_ref(),
            MigrationProgress::Started {
                source_dir: source_dir.to_path_buf(),
                procedure: self.procedure.name().to_string(),
                total: summary.total,
            },
        )
        .await;

        let mut processor = VersionProcessor {
            procedure: &self.procedure,
            progress_tx: self.progress_tx.as_ref(),
            reports: Vec::with_capacity(summary.total),
        };
        let result = pipeline.drive(&mut processor).await;

        summary.reports = processor.reports;
        summary.finished_at = Some(Utc::now());

        match result {
            Ok(report) => {
                if report.release_failures > 0 {
                    tracing::warn!(
                        count = report.release_failures,
                        "Some staging directories could not be removed"
                    );
                }
                tracing::info!(
                    versions = report.consumed,
                    succeeded = summary.succeeded(),
                    failed = summary.failed(),
                    skipped = summary.skipped(),
                    "Migration complete"
                );
                emit(
                    self.progress_tx.as_ref(),
                    MigrationProgress::Completed {
                        summary: summary.clone(),
                    },
                )
                .await;
                Ok(summary)
            }
            Err(source) => {
                tracing::error!(
                    processed = summary.reports.len(),
                    "Migration aborted: {}",
                    source
                );
                Err(MigrationError::Aborted {
                    source,
                    summary: Box::new(summary),
                })
            }
        }
    }
}

async fn emit(progress_tx: Option<&mpsc::Sender<MigrationProgress>>, progress: MigrationProgress) {
    if let Some(tx) = progress_tx {
        let _ = tx.send(progress).await;
    }
}

/// Per-version step handed to the pipeline.
struct VersionProcessor<'a, P: UpdateProcedure> {
    procedure: &'a P,
    progress_tx: Option<&'a mpsc::Sender<MigrationProgress>>,
    reports: Vec<VersionReport>,
}

impl<'a, P: UpdateProcedure> VersionProcessor<'a, P> {
    async fn process(&self, handle: &StagingHandle) -> (Option<PathBuf>, VersionOutcome) {
        let version = handle.version();

        let payload = match locate_payload(handle.path()).await {
            Ok(payload) => payload,
            Err(e) => {
                tracing::warn!(%version, "Skipping version: {}", e);
                return (
                    None,
                    VersionOutcome::Skipped {
                        reason: e.to_string(),
                    },
                );
            }
        };

        emit(
            self.progress_tx,
            MigrationProgress::Processing {
                version,
                payload: payload.clone(),
            },
        )
        .await;
        tracing::info!(
            %version,
            procedure = self.procedure.name(),
            "Running update procedure on {}",
            payload.display()
        );

        let outcome = match self.procedure.invoke(&payload).await {
            Ok(output) if output.success => VersionOutcome::Succeeded { output },
            Ok(output) => {
                let reason = match output.exit_code {
                    Some(code) => format!("exited with code {}", code),
                    None => "terminated by signal".to_string(),
                };
                tracing::warn!(
                    %version,
                    stderr = output.summary_line().unwrap_or_default(),
                    "Update procedure {}",
                    reason
                );
                VersionOutcome::ProcedureFailed {
                    reason,
                    output: Some(output),
                }
            }
            Err(e) => {
                tracing::warn!(%version, "Update procedure failed: {}", e);
                VersionOutcome::ProcedureFailed {
                    reason: e.to_string(),
                    output: None,
                }
            }
        };

        (Some(payload), outcome)
    }
}

#[async_trait]
impl<'a, P: UpdateProcedure> StageConsumer for VersionProcessor<'a, P> {
    async fn consume(&mut self, handle: &StagingHandle) -> ControlFlow<()> {
        let start = Instant::now();
        emit(
            self.progress_tx,
            MigrationProgress::Staged {
                version: handle.version(),
                staging_dir: handle.path().to_path_buf(),
            },
        )
        .await;

        let (payload, outcome) = self.process(handle).await;
        let report = VersionReport {
            version: handle.version(),
            archive: handle.archive().source_path.clone(),
            payload,
            outcome,
            duration_ms: start.elapsed().as_millis() as u64,
        };

        emit(
            self.progress_tx,
            MigrationProgress::Finished {
                report: report.clone(),
            },
        )
        .await;
        self.reports.push(report);

        ControlFlow::Continue(())
    }
}
