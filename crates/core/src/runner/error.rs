//! Error types for the runner module.

use std::path::PathBuf;
use thiserror::Error;

use crate::pipeline::PipelineError;
use crate::procedure::ProcedureError;
use crate::version::ArchiveVersion;

use super::types::MigrationSummary;

/// A staging directory that does not hold exactly one payload entry.
#[derive(Debug, Error)]
pub enum PayloadError {
    #[error("Staging directory {dir} is empty")]
    Empty { dir: PathBuf },

    #[error("Staging directory {dir} holds {} entries, expected one: {}", .entries.len(), .entries.join(", "))]
    Multiple { dir: PathBuf, entries: Vec<String> },

    #[error("Failed to list staging directory {dir}")]
    Io {
        dir: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Errors that abort a migration run.
#[derive(Debug, Error)]
pub enum MigrationError {
    /// The update procedure cannot be invoked at all.
    #[error("Update procedure unavailable: {0}")]
    Procedure(#[source] ProcedureError),

    /// The pipeline failed; versions processed before the failure are in `summary`.
    #[error("Migration aborted: {source}")]
    Aborted {
        #[source]
        source: PipelineError,
        summary: Box<MigrationSummary>,
    },
}

impl MigrationError {
    /// Version the failure relates to, if any.
    pub fn version(&self) -> Option<ArchiveVersion> {
        match self {
            Self::Aborted { source, .. } => source.version(),
            Self::Procedure(_) => None,
        }
    }

    /// Summary of the versions processed before the abort.
    pub fn partial_summary(&self) -> Option<&MigrationSummary> {
        match self {
            Self::Aborted { summary, .. } => Some(summary),
            Self::Procedure(_) => None,
        }
    }
}
