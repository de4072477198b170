//! Error types for the procedure module.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that prevent the procedure from producing an exit status.
///
/// A procedure that runs and exits non-zero is not an error; see
/// `ProcedureOutput::success`.
#[derive(Debug, Error)]
pub enum ProcedureError {
    /// Executable not found.
    #[error("Update procedure not found at path: {path}")]
    NotFound { path: PathBuf },

    /// Executable exists but could not be started.
    #[error("Failed to start update procedure {path}")]
    Spawn {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Invocation timed out.
    #[error("Update procedure timed out after {timeout_secs} seconds")]
    Timeout { timeout_secs: u64 },

    /// I/O error while waiting for the procedure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
