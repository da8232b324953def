//! Process execution
//!
//! The [`Executor`] trait is the only place where external processes are
//! spawned. Tests substitute [`MockExecutor`](super::mock::MockExecutor).

use super::CommandLine;
use crate::BuildError;
use async_trait::async_trait;
use tracing::debug;

/// Result of an executed command
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExitOutput {
    /// Exit code, `None` if terminated by a signal
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl ExitOutput {
    pub fn success() -> Self {
        Self {
            code: Some(0),
            ..Default::default()
        }
    }

    pub fn failure(code: i32, stderr: impl Into<String>) -> Self {
        Self {
            code: Some(code),
            stderr: stderr.into(),
            ..Default::default()
        }
    }

    pub fn is_success(&self) -> bool {
        self.code == Some(0)
    }

    /// Human-readable exit status
    pub fn status(&self) -> String {
        match self.code {
            Some(code) => format!("exit status {code}"),
            None => "termination by signal".to_string(),
        }
    }
}

/// Spawns external commands
#[async_trait]
pub trait Executor: Send + Sync {
    /// Run a command to completion
    ///
    /// A non-zero exit is reported through [`ExitOutput`], not as an error.
    /// Errors are reserved for failing to spawn the process at all.
    async fn execute(&self, command: &CommandLine) -> Result<ExitOutput, BuildError>;
}

/// Executor backed by `tokio::process`
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessExecutor;

#[async_trait]
impl Executor for ProcessExecutor {
    async fn execute(&self, command: &CommandLine) -> Result<ExitOutput, BuildError> {
        let output = tokio::process::Command::new(&command.program)
            .args(&command.args)
            .output()
            .await
            .map_err(|e| {
                BuildError::command(command.to_string(), "spawn failure", e.to_string())
            })?;

        if !output.stdout.is_empty() {
            debug!("stdout: {}", String::from_utf8_lossy(&output.stdout).trim_end());
        }

        Ok(ExitOutput {
            code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_output_status() {
        assert!(ExitOutput::success().is_success());
        assert_eq!(ExitOutput::failure(2, "x").status(), "exit status 2");
        assert_eq!(ExitOutput::default().status(), "termination by signal");
    }

    #[tokio::test]
    async fn test_process_executor_reports_exit_codes() {
        let ok = ProcessExecutor
            .execute(&CommandLine::host("sh").args(["-c", "echo hi"]))
            .await
            .unwrap();
        assert!(ok.is_success());
        assert_eq!(ok.stdout, "hi\n");

        let failed = ProcessExecutor
            .execute(&CommandLine::host("sh").args(["-c", "echo oops >&2; exit 3"]))
            .await
            .unwrap();
        assert_eq!(failed.code, Some(3));
        assert_eq!(failed.stderr, "oops\n");
    }

    #[tokio::test]
    async fn test_process_executor_spawn_failure() {
        let err = ProcessExecutor
            .execute(&CommandLine::host("/nonexistent/binary"))
            .await
            .unwrap_err();
        assert!(matches!(err, BuildError::ExternalCommand { .. }));
    }
}
