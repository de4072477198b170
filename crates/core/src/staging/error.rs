//! Error types for the staging module.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while staging an archive.
#[derive(Debug, Error)]
pub enum StagingError {
    /// Failed to create the scratch root or a staging directory.
    #[error("Failed to create staging directory in {path}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Source archive not found.
    #[error("Source archive not found: {path}")]
    SourceNotFound { path: PathBuf },

    /// Failed to copy the archive.
    #[error("Failed to copy {from} to {to}")]
    CopyFailed {
        from: PathBuf,
        to: PathBuf,
        #[source]
        error: std::io::Error,
    },

    /// Staged copy does not match the source.
    #[error("Checksum mismatch for {path}: expected {expected}, got {actual}")]
    ChecksumMismatch {
        path: PathBuf,
        expected: String,
        actual: String,
    },

    /// Archive could not be decoded or unpacked.
    #[error("Failed to unpack {archive} during {step}: {reason}")]
    Extract {
        archive: PathBuf,
        step: &'static str,
        reason: String,
    },

    /// Archive entry would escape the staging directory.
    #[error("Refusing unsafe entry {entry:?} in {archive}")]
    UnsafeEntry { archive: PathBuf, entry: String },

    /// Failed to remove a staging directory.
    #[error("Failed to remove staging directory {path}")]
    Cleanup {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The staging worker is no longer running.
    #[error("Staging worker stopped before completing the copy")]
    WorkerStopped,

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl StagingError {
    /// Creates a copy failed error.
    pub fn copy_failed(from: PathBuf, to: PathBuf, error: std::io::Error) -> Self {
        Self::CopyFailed { from, to, error }
    }

    /// Creates an extraction error for a given step.
    pub fn extract(archive: PathBuf, step: &'static str, reason: impl ToString) -> Self {
        Self::Extract {
            archive,
            step,
            reason: reason.to_string(),
        }
    }

    /// Whether the failure came from the filesystem rather than the archive contents.
    pub fn is_io(&self) -> bool {
        matches!(
            self,
            Self::CreateDir { .. }
                | Self::SourceNotFound { .. }
                | Self::CopyFailed { .. }
                | Self::Cleanup { .. }
                | Self::Io(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_classification() {
        let io = StagingError::copy_failed(
            PathBuf::from("/slow/a.zip"),
            PathBuf::from("/fast/a.zip"),
            std::io::Error::new(std::io::ErrorKind::StorageFull, "disk full"),
        );
        assert!(io.is_io());

        let corrupt = StagingError::extract(PathBuf::from("/fast/a.zip"), "decode", "bad header");
        assert!(!corrupt.is_io());
        assert!(corrupt.to_string().contains("decode"));
    }
}
