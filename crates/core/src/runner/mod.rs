//! Batch execution runner.
//!
//! Drives a batch of jobs through four barrier-separated phases:
//! - Download: fan-out per distinct artifact, deduplicated by the cache
//! - Execute: fan-out per job, subprocess per command
//! - Upload: fan-out per declared output file
//! - Acknowledge: fan-out per job id
//!
//! Failures are per-job: no task aborts its siblings or the batch.

mod ack;
mod batch;
mod cache;
mod config;
mod executor;
mod transfer;
mod types;

pub use ack::acknowledge;
pub use batch::BatchRunner;
pub use cache::{ArtifactCache, ArtifactState, Claim, FetchClaim};
pub use config::{AckPolicy, RunnerConfig};
pub use executor::{CommandExecutor, ExecutionReport, ExecutorError};
pub use transfer::{download, upload, ArtifactKind, BatchContext, TransferError};
pub use types::{BatchReport, JobError, JobOutcome, JobStatus};
