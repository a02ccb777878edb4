//! Subprocess execution of job commands.

use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use thiserror::Error;
use tokio::process::Command;
use tokio::time::timeout;
use tracing::debug;

/// Errors that can occur while running a job command.
#[derive(Debug, Error)]
pub enum ExecutorError {
    /// The command could not be spawned.
    #[error("Failed to spawn `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    /// The command did not finish within the deadline.
    #[error("Command `{command}` timed out after {timeout_secs} seconds")]
    Timeout { command: String, timeout_secs: u64 },

    /// I/O error while waiting for the command.
    #[error("I/O error running `{command}`: {source}")]
    Io {
        command: String,
        #[source]
        source: std::io::Error,
    },
}

/// Result of a finished command.
#[derive(Debug, Clone)]
pub struct ExecutionReport {
    /// Exit code, `None` if killed by a signal.
    pub exit_code: Option<i32>,
    /// Full captured standard output.
    pub stdout: String,
}

impl ExecutionReport {
    /// Whether the command finished with exit code zero.
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }
}

/// Runs one job command as a subprocess in the scratch directory.
///
/// The scratch directory is appended to `PATH` and `LD_LIBRARY_PATH` so a job
/// can invoke its own downloaded binaries by bare name.
#[derive(Debug, Clone)]
pub struct CommandExecutor {
    timeout: Duration,
}

impl CommandExecutor {
    pub fn new(timeout_secs: u64) -> Self {
        Self {
            timeout: Duration::from_secs(timeout_secs),
        }
    }

    /// Spawn `command` (a path relative to `work_dir`), capture its standard
    /// output, and wait for it to exit.
    ///
    /// The exit code is reported, not judged: policy on non-zero exits lives
    /// with the caller.
    pub async fn execute(
        &self,
        command: &str,
        work_dir: &Path,
    ) -> Result<ExecutionReport, ExecutorError> {
        let program = work_dir.join(command);
        debug!(command = %program.display(), "Spawning job command");

        let child = Command::new(&program)
            .current_dir(work_dir)
            .env("PATH", augmented_path("PATH", work_dir))
            .env("LD_LIBRARY_PATH", augmented_path("LD_LIBRARY_PATH", work_dir))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| ExecutorError::Spawn {
                command: command.to_string(),
                source,
            })?;

        let timeout_secs = self.timeout.as_secs();
        let output = timeout(self.timeout, child.wait_with_output())
            .await
            .map_err(|_| ExecutorError::Timeout {
                command: command.to_string(),
                timeout_secs,
            })?
            .map_err(|source| ExecutorError::Io {
                command: command.to_string(),
                source,
            })?;

        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        let exit_code = output.status.code();
        debug!(command, ?exit_code, "Job command finished");
        if !stdout.is_empty() {
            debug!(command, "Command output:\n{}", stdout);
        }

        Ok(ExecutionReport { exit_code, stdout })
    }
}

/// Append `dir` to an inherited search-path variable.
fn augmented_path(var: &str, dir: &Path) -> String {
    match std::env::var(var) {
        Ok(existing) if !existing.is_empty() => {
            format!("{}:{}", existing, dir.display())
        }
        _ => dir.display().to_string(),
    }
}
