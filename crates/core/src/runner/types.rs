//! Outcome types for batch execution.

use std::time::Duration;

use serde::Serialize;
use thiserror::Error;

use crate::stream::StreamError;

use super::executor::ExecutorError;
use super::transfer::TransferError;

/// Why a job failed.
#[derive(Debug, Error)]
pub enum JobError {
    /// An artifact the job depends on could not be fetched, or an output
    /// could not be uploaded.
    #[error(transparent)]
    Transfer(#[from] TransferError),

    /// The command could not be spawned or waited on.
    #[error(transparent)]
    Execution(#[from] ExecutorError),

    /// A shared artifact this job depends on failed to download in another
    /// task's fetch.
    #[error("Required artifact `{filename}` unavailable: {reason}")]
    MissingArtifact { filename: String, reason: String },

    /// The command ran but exited non-zero.
    #[error("Command exited with code {0}")]
    NonZeroExit(i32),

    /// The command was killed by a signal.
    #[error("Command terminated by signal")]
    Signaled,

    /// The acknowledgment could not be published.
    #[error("Acknowledgment failed: {0}")]
    Ack(#[from] StreamError),

    /// The scratch directory could not be prepared.
    #[error("Scratch directory setup failed: {0}")]
    Scratch(std::io::Error),

    /// A worker task failed outside the job's own pipeline (e.g. panicked).
    #[error("Internal task failure: {0}")]
    Internal(String),
}

/// Final status of one job within a batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// Download, execute, and upload all succeeded.
    Completed,
    /// Some phase failed; see the outcome's error.
    Failed,
    /// The pipeline succeeded but the acknowledgment could not be published.
    AckFailed,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
            JobStatus::AckFailed => "ack_failed",
        }
    }
}

/// Per-job result reported by the runner.
#[derive(Debug)]
pub struct JobOutcome {
    pub job_id: String,
    pub job_name: String,
    pub workflow: String,
    pub status: JobStatus,
    /// First error the job hit, if any.
    pub error: Option<JobError>,
    /// Exit code of the command, when it ran to completion.
    pub exit_code: Option<i32>,
    /// Whether an acknowledgment was published for this job.
    pub acked: bool,
}

impl JobOutcome {
    pub(crate) fn pending(job_id: &str, job_name: &str, workflow: &str) -> Self {
        Self {
            job_id: job_id.to_string(),
            job_name: job_name.to_string(),
            workflow: workflow.to_string(),
            status: JobStatus::Completed,
            error: None,
            exit_code: None,
            acked: false,
        }
    }

    pub(crate) fn fail(&mut self, error: JobError) {
        // Keep the first failure; later phases only add noise.
        if self.error.is_none() {
            self.error = Some(error);
        }
        self.status = JobStatus::Failed;
    }

    pub fn is_failed(&self) -> bool {
        self.status == JobStatus::Failed
    }
}

/// Aggregated result of one batch invocation.
#[derive(Debug, Default)]
pub struct BatchReport {
    pub outcomes: Vec<JobOutcome>,
    /// Distinct artifacts actually fetched from storage.
    pub artifacts_fetched: usize,
    /// Output files successfully uploaded.
    pub outputs_uploaded: usize,
    pub duration: Duration,
}

impl BatchReport {
    pub fn completed(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| o.status == JobStatus::Completed)
            .count()
    }

    pub fn failed(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_failed()).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outcome_keeps_first_error() {
        let mut outcome = JobOutcome::pending("j1", "job one", "wf");
        outcome.fail(JobError::NonZeroExit(2));
        outcome.fail(JobError::Signaled);

        assert!(matches!(outcome.error, Some(JobError::NonZeroExit(2))));
        assert_eq!(outcome.status, JobStatus::Failed);
    }

    #[test]
    fn test_report_counts() {
        let mut ok = JobOutcome::pending("j1", "", "wf");
        ok.acked = true;
        let mut bad = JobOutcome::pending("j2", "", "wf");
        bad.fail(JobError::NonZeroExit(1));

        let report = BatchReport {
            outcomes: vec![ok, bad],
            ..Default::default()
        };
        assert_eq!(report.completed(), 1);
        assert_eq!(report.failed(), 1);
    }

    #[test]
    fn test_status_as_str() {
        assert_eq!(JobStatus::Completed.as_str(), "completed");
        assert_eq!(JobStatus::Failed.as_str(), "failed");
        assert_eq!(JobStatus::AckFailed.as_str(), "ack_failed");
    }
}
