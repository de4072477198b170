//! Error types for the pipeline module.

use std::path::PathBuf;
use thiserror::Error;

use crate::staging::StagingError;
use crate::version::{ArchiveRef, ArchiveVersion, LocatorError};

/// Fatal pipeline errors. The pipeline yields nothing after one of these.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// The source directory could not be scanned.
    #[error(transparent)]
    Locate(#[from] LocatorError),

    /// The staging pool could not be started.
    #[error("Failed to start staging pool: {0}")]
    Pool(#[source] StagingError),

    /// Staging a specific version failed.
    #[error("Failed to stage version {version} from {archive}: {source}")]
    Staging {
        version: ArchiveVersion,
        archive: PathBuf,
        #[source]
        source: StagingError,
    },
}

impl PipelineError {
    pub(crate) fn staging(archive: &ArchiveRef, source: StagingError) -> Self {
        Self::Staging {
            version: archive.version,
            archive: archive.source_path.clone(),
            source,
        }
    }

    /// Version the error relates to, if any.
    pub fn version(&self) -> Option<ArchiveVersion> {
        match self {
            Self::Staging { version, .. } => Some(*version),
            Self::Locate(_) | Self::Pool(_) => None,
        }
    }
}
