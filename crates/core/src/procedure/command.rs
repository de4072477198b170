//! Procedure backed by an external executable.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Instant;
use tokio::process::Command;
use tokio::time::{timeout, Duration};

use crate::config::ProcedureConfig;

use super::error::ProcedureError;
use super::traits::UpdateProcedure;
use super::types::ProcedureOutput;

/// Runs `<executable> <payload>` and captures its output.
#[derive(Debug, Clone)]
pub struct CommandProcedure {
    executable: PathBuf,
    name: String,
    config: ProcedureConfig,
}

impl CommandProcedure {
    /// Creates a procedure for the given executable.
    pub fn new(executable: impl Into<PathBuf>, config: ProcedureConfig) -> Self {
        let executable = executable.into();
        let name = executable
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| executable.display().to_string());
        Self {
            executable,
            name,
            config,
        }
    }

    /// Creates a procedure with default configuration.
    pub fn with_defaults(executable: impl Into<PathBuf>) -> Self {
        Self::new(executable, ProcedureConfig::default())
    }
}

#[async_trait]
impl UpdateProcedure for CommandProcedure {
    fn name(&self) -> &str {
        &self.name
    }

    async fn invoke(&self, payload: &Path) -> Result<ProcedureOutput, ProcedureError> {
        let start = Instant::now();

        let child = Command::new(&self.executable)
            .arg(payload)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(self.config.kill_on_timeout)
            .spawn()
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    ProcedureError::NotFound {
                        path: self.executable.clone(),
                    }
                } else {
                    ProcedureError::Spawn {
                        path: self.executable.clone(),
                        source: e,
                    }
                }
            })?;

        // A timed-out wait drops the child, which kills it when kill_on_drop is set.
        let output = match self.config.timeout_secs {
            Some(timeout_secs) => timeout(
                Duration::from_secs(timeout_secs),
                child.wait_with_output(),
            )
            .await
            .map_err(|_| ProcedureError::Timeout { timeout_secs })??,
            None => child.wait_with_output().await?,
        };

        let result = ProcedureOutput {
            exit_code: output.status.code(),
            success: output.status.success(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            duration_ms: start.elapsed().as_millis() as u64,
        };

        tracing::debug!(
            procedure = %self.name,
            exit_code = ?result.exit_code,
            duration_ms = result.duration_ms,
            "Update procedure finished for {}",
            payload.display()
        );

        Ok(result)
    }

    async fn validate(&self) -> Result<(), ProcedureError> {
        let metadata = tokio::fs::metadata(&self.executable).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ProcedureError::NotFound {
                    path: self.executable.clone(),
                }
            } else {
                ProcedureError::Io(e)
            }
        })?;
        if !metadata.is_file() {
            return Err(ProcedureError::NotFound {
                path: self.executable.clone(),
            });
        }
        Ok(())
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::os::unix::fs::PermissionsExt;
    use tempfile::TempDir;

    fn script(dir: &Path, name: &str, body: &str) -> PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    #[tokio::test]
    async fn test_invoke_captures_output() {
        let temp = TempDir::new().unwrap();
        let path = script(temp.path(), "update.sh", r#"echo "updating $1""#);

        let procedure = CommandProcedure::with_defaults(&path);
        assert_eq!(procedure.name(), "update.sh");
        procedure.validate().await.unwrap();

        let output = procedure.invoke(Path::new("/staged/foundryvtt")).await.unwrap();
        assert!(output.success);
        assert_eq!(output.exit_code, Some(0));
        assert_eq!(output.stdout.trim(), "updating /staged/foundryvtt");
    }

    #[tokio::test]
    async fn test_invoke_non_zero_exit_is_not_an_error() {
        let temp = TempDir::new().unwrap();
        let path = script(temp.path(), "fail.sh", "echo broken >&2\nexit 3");

        let output = CommandProcedure::with_defaults(&path)
            .invoke(Path::new("/staged/foundryvtt"))
            .await
            .unwrap();
        assert!(!output.success);
        assert_eq!(output.exit_code, Some(3));
        assert_eq!(output.summary_line(), Some("broken"));
    }

    #[tokio::test]
    async fn test_invoke_missing_executable() {
        let procedure = CommandProcedure::with_defaults("/nonexistent/update.sh");
        let result = procedure.invoke(Path::new("/staged")).await;
        assert!(matches!(result, Err(ProcedureError::NotFound { .. })));
        assert!(matches!(
            procedure.validate().await,
            Err(ProcedureError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_invoke_timeout() {
        let temp = TempDir::new().unwrap();
        let path = script(temp.path(), "slow.sh", "sleep 5");
        let config = ProcedureConfig {
            timeout_secs: Some(1),
            kill_on_timeout: true,
        };

        let result = CommandProcedure::new(&path, config)
            .invoke(Path::new("/staged"))
            .await;
        assert!(matches!(
            result,
            Err(ProcedureError::Timeout { timeout_secs: 1 })
        ));
    }
}
