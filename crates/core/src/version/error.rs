//! Error types for the version module.

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while locating archives.
///
/// All of them mean the source directory is not in the expected shape and
/// abort the run.
#[derive(Debug, Error)]
pub enum LocatorError {
    /// Source directory could not be listed.
    #[error("Failed to read source directory {path}")]
    ReadDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A file looks like an archive but its version cannot be parsed.
    #[error("Malformed archive name {file_name:?} in {directory}: expected {expected}")]
    MalformedName {
        directory: PathBuf,
        file_name: String,
        expected: String,
    },

    /// The naming pattern could not be built from the configuration.
    #[error("Invalid archive naming pattern: {reason}")]
    InvalidPattern { reason: String },
}
