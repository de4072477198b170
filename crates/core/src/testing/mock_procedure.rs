//! Mock update procedure for testing.

use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

use crate::procedure::{ProcedureError, ProcedureOutput, UpdateProcedure};

use super::fixtures;

/// A recorded invocation for test assertions.
#[derive(Debug, Clone)]
pub struct RecordedInvocation {
    /// Payload path the procedure was invoked with.
    pub payload: PathBuf,
    /// Version read from the payload at invocation time.
    pub staged_version: Option<String>,
    /// Entries of the observed scratch directory at invocation time.
    pub scratch_entries: Option<usize>,
    /// Whether the invocation was reported as successful.
    pub success: bool,
}

/// Mock implementation of the UpdateProcedure trait.
///
/// Provides controllable behavior for testing:
/// - Track invocations and what the payload contained at the time
/// - Fail selected calls with an exit code
/// - Simulate slow procedures
/// - Observe how many staging directories exist during each call
#[derive(Debug, Clone, Default)]
pub struct MockProcedure {
    invocations: Arc<RwLock<Vec<RecordedInvocation>>>,
    /// Call index -> exit code.
    failures: Arc<RwLock<HashMap<usize, i32>>>,
    delay: Arc<RwLock<Duration>>,
    observed_dir: Arc<RwLock<Option<PathBuf>>>,
    unavailable: Arc<RwLock<bool>>,
}

impl MockProcedure {
    /// Create a new mock procedure that succeeds on every call.
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes the zero-based `call` exit with `exit_code`.
    pub async fn fail_call(&self, call: usize, exit_code: i32) {
        self.failures.write().await.insert(call, exit_code);
    }

    /// Sleeps for `delay` in every call.
    pub async fn set_delay(&self, delay: Duration) {
        *self.delay.write().await = delay;
    }

    /// Counts the entries of `dir` on every call.
    pub async fn observe_dir(&self, dir: impl Into<PathBuf>) {
        *self.observed_dir.write().await = Some(dir.into());
    }

    /// Makes `validate` fail as if the executable were missing.
    pub async fn set_unavailable(&self, unavailable: bool) {
        *self.unavailable.write().await = unavailable;
    }

    /// Get all recorded invocations.
    pub async fn invocations(&self) -> Vec<RecordedInvocation> {
        self.invocations.read().await.clone()
    }
}

#[async_trait]
impl UpdateProcedure for MockProcedure {
    fn name(&self) -> &str {
        "mock"
    }

    async fn invoke(&self, payload: &Path) -> Result<ProcedureOutput, ProcedureError> {
        let delay = *self.delay.read().await;
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        let scratch_entries = match self.observed_dir.read().await.as_ref() {
            Some(dir) => Some(std::fs::read_dir(dir)?.count()),
            None => None,
        };

        let mut invocations = self.invocations.write().await;
        let call = invocations.len();
        let output = match self.failures.read().await.get(&call) {
            Some(&code) => ProcedureOutput::failed(code, format!("mock failure on call {call}")),
            None => ProcedureOutput::succeeded(),
        };

        invocations.push(RecordedInvocation {
            payload: payload.to_path_buf(),
            staged_version: fixtures::read_payload_version(payload),
            scratch_entries,
            success: output.success,
        });

        Ok(output)
    }

    async fn validate(&self) -> Result<(), ProcedureError> {
        if *self.unavailable.read().await {
            return Err(ProcedureError::NotFound {
                path: PathBuf::from("mock"),
            });
        }
        Ok(())
    }
}
