//! Types for the runner module.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::PathBuf;

use crate::procedure::ProcedureOutput;
use crate::version::ArchiveVersion;

/// What happened to one version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum VersionOutcome {
    /// The procedure ran and exited successfully.
    Succeeded { output: ProcedureOutput },
    /// The procedure exited unsuccessfully or could not be run.
    ProcedureFailed {
        reason: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        output: Option<ProcedureOutput>,
    },
    /// The staged contents were not usable; the procedure was not run.
    Skipped { reason: String },
}

impl VersionOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Succeeded { .. })
    }

    /// Short label for progress output.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Succeeded { .. } => "ok",
            Self::ProcedureFailed { .. } => "failed",
            Self::Skipped { .. } => "skipped",
        }
    }
}

/// Report for one processed version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VersionReport {
    pub version: ArchiveVersion,
    pub archive: PathBuf,
    /// Payload the procedure was invoked with.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload: Option<PathBuf>,
    pub outcome: VersionOutcome,
    pub duration_ms: u64,
}

/// Result of a migration run.
#[derive(Debug, Clone, Serialize)]
pub struct MigrationSummary {
    pub source_dir: PathBuf,
    pub procedure: String,
    pub started_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
    /// Number of archives found.
    pub total: usize,
    pub reports: Vec<VersionReport>,
}

impl MigrationSummary {
    pub fn new(source_dir: PathBuf, procedure: impl Into<String>) -> Self {
        Self {
            source_dir,
            procedure: procedure.into(),
            started_at: Utc::now(),
            finished_at: None,
            total: 0,
            reports: Vec::new(),
        }
    }

    pub fn succeeded(&self) -> usize {
        self.count(|o| matches!(o, VersionOutcome::Succeeded { .. }))
    }

    pub fn failed(&self) -> usize {
        self.count(|o| matches!(o, VersionOutcome::ProcedureFailed { .. }))
    }

    pub fn skipped(&self) -> usize {
        self.count(|o| matches!(o, VersionOutcome::Skipped { .. }))
    }

    /// Every found archive was processed successfully.
    pub fn is_clean(&self) -> bool {
        self.reports.len() == self.total && self.reports.iter().all(|r| r.outcome.is_success())
    }

    fn count(&self, pred: impl Fn(&VersionOutcome) -> bool) -> usize {
        self.reports.iter().filter(|r| pred(&r.outcome)).count()
    }
}

/// Progress updates emitted during a run.
#[derive(Debug, Clone)]
pub enum MigrationProgress {
    /// The source directory has been scanned.
    Started {
        source_dir: PathBuf,
        procedure: String,
        total: usize,
    },
    /// A version is staged and about to be processed.
    Staged {
        version: ArchiveVersion,
        staging_dir: PathBuf,
    },
    /// The procedure is being invoked.
    Processing {
        version: ArchiveVersion,
        payload: PathBuf,
    },
    /// A version is done.
    Finished { report: VersionReport },
    /// The run completed without aborting.
    Completed { summary: MigrationSummary },
}
