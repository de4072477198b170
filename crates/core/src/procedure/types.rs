//! Types for the procedure module.

use serde::{Deserialize, Serialize};

/// Captured result of one procedure invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcedureOutput {
    /// Exit code, `None` when terminated by a signal.
    pub exit_code: Option<i32>,
    pub success: bool,
    pub stdout: String,
    pub stderr: String,
    pub duration_ms: u64,
}

impl ProcedureOutput {
    /// A successful invocation with no output.
    pub fn succeeded() -> Self {
        Self {
            exit_code: Some(0),
            success: true,
            stdout: String::new(),
            stderr: String::new(),
            duration_ms: 0,
        }
    }

    /// A failed invocation with the given exit code and stderr.
    pub fn failed(exit_code: i32, stderr: impl Into<String>) -> Self {
        Self {
            exit_code: Some(exit_code),
            success: false,
            stdout: String::new(),
            stderr: stderr.into(),
            duration_ms: 0,
        }
    }

    /// Last non-empty line of stderr, falling back to stdout.
    pub fn summary_line(&self) -> Option<&str> {
        [&self.stderr, &self.stdout]
            .into_iter()
            .find_map(|s| s.lines().rev().map(str::trim).find(|l| !l.is_empty()))
    }
}
