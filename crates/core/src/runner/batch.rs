//! The batch runner: barrier-synchronized fan-out across phases.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::Semaphore;
use tokio::time::timeout;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::descriptor::{Batch, JobDescriptor};
use crate::metrics::{BATCHES, BATCH_DURATION, JOBS};
use crate::storage::ObjectStore;
use crate::stream::{StreamError, StreamPublisher};

use super::ack::acknowledge;
use super::cache::ArtifactCache;
use super::config::{AckPolicy, RunnerConfig};
use super::executor::CommandExecutor;
use super::transfer::{download, upload, ArtifactKind, BatchContext, TransferError};
use super::types::{BatchReport, JobError, JobOutcome, JobStatus};

/// Drives one batch invocation through download, execute, upload, and
/// acknowledge phases.
///
/// Each phase is a strict barrier: its entire fan-out joins before the next
/// phase launches. Failures are per-job and never abort sibling tasks or the
/// batch; the scratch directory is removed unconditionally at the end.
pub struct BatchRunner {
    config: RunnerConfig,
    store: Arc<dyn ObjectStore>,
    publisher: Arc<dyn StreamPublisher>,
}

/// Transfer counters accumulated by the serial path.
struct JobStats {
    fetched: usize,
    uploaded: usize,
}

impl BatchRunner {
    pub fn new(
        config: RunnerConfig,
        store: Arc<dyn ObjectStore>,
        publisher: Arc<dyn StreamPublisher>,
    ) -> Self {
        Self {
            config,
            store,
            publisher,
        }
    }

    /// Run a batch with per-phase fan-out.
    ///
    /// Shared artifacts are downloaded once for the whole batch (binaries
    /// form a shared pool keyed by filename; any job may invoke any of them),
    /// so all jobs of the batch must share one bucket and prefix.
    pub async fn run_batch(&self, batch: Batch) -> BatchReport {
        let start = Instant::now();
        let mut outcomes: Vec<JobOutcome> = batch
            .jobs
            .iter()
            .map(|j| JobOutcome::pending(&j.id, &j.name, &j.workflow))
            .collect();

        if batch.is_empty() {
            return BatchReport::default();
        }
        info!(jobs = batch.len(), "Starting parallel batch");

        let scratch_dir = match self.create_scratch().await {
            Ok(dir) => dir,
            Err(e) => {
                error!("Failed to create scratch directory: {}", e);
                fail_all(&mut outcomes, &e);
                return self.finish_report(outcomes, 0, 0, start, "parallel");
            }
        };

        let first = &batch.jobs[0];
        if batch
            .jobs
            .iter()
            .any(|j| j.bucket != first.bucket || j.prefix != first.prefix)
        {
            warn!(
                bucket = %first.bucket,
                prefix = %first.prefix,
                "Batch mixes buckets or prefixes; shared artifacts use the first job's"
            );
        }
        let ctx = Arc::new(BatchContext {
            bucket: first.bucket.clone(),
            prefix: first.prefix.clone(),
            scratch_dir: scratch_dir.clone(),
        });
        let cache = Arc::new(ArtifactCache::new());

        // Download phase: one task per distinct filename across the batch.
        let bin_files = batch.bin_files();
        let targets: Vec<(ArtifactKind, String)> = bin_files
            .iter()
            .cloned()
            .map(|f| (ArtifactKind::Binary, f))
            .chain(
                batch
                    .in_files()
                    .into_iter()
                    .map(|f| (ArtifactKind::Input, f)),
            )
            .collect();
        let (artifacts_fetched, failed_files) = self.download_phase(&targets, &ctx, &cache).await;

        // A job whose artifacts did not all arrive never executes.
        for (idx, job) in batch.jobs.iter().enumerate() {
            let missing = job
                .bin_files
                .iter()
                .chain(job.in_files.iter())
                .find(|f| failed_files.contains_key(f.as_str()));
            if let Some(filename) = missing {
                outcomes[idx].fail(JobError::MissingArtifact {
                    filename: filename.clone(),
                    reason: failed_files[filename.as_str()].clone(),
                });
            }
        }

        // Prepare phase: mark every fetched binary executable.
        for filename in &bin_files {
            if failed_files.contains_key(filename.as_str()) {
                continue;
            }
            if let Err(e) = set_executable(&ctx.local_path(filename)).await {
                warn!(filename = %filename, "Failed to set executable bit: {}", e);
            }
        }

        self.execute_phase(&batch, &ctx, &mut outcomes).await;
        let outputs_uploaded = self.upload_phase(&batch, &ctx, &cache, &mut outcomes).await;
        self.ack_phase(&batch, &mut outcomes).await;

        self.remove_scratch(&scratch_dir).await;
        self.finish_report(outcomes, artifacts_fetched, outputs_uploaded, start, "parallel")
    }

    /// Run a batch one job at a time, each job end-to-end.
    ///
    /// Used when ordering across jobs must be preserved. The scratch
    /// directory and artifact cache are still shared across the whole
    /// invocation.
    pub async fn run_serial(&self, batch: Batch) -> BatchReport {
        let start = Instant::now();
        let mut outcomes: Vec<JobOutcome> = batch
            .jobs
            .iter()
            .map(|j| JobOutcome::pending(&j.id, &j.name, &j.workflow))
            .collect();

        if batch.is_empty() {
            return BatchReport::default();
        }
        info!(jobs = batch.len(), "Starting serial batch");

        let scratch_dir = match self.create_scratch().await {
            Ok(dir) => dir,
            Err(e) => {
                error!("Failed to create scratch directory: {}", e);
                fail_all(&mut outcomes, &e);
                return self.finish_report(outcomes, 0, 0, start, "serial");
            }
        };

        let cache = ArtifactCache::new();
        let executor = CommandExecutor::new(self.config.execute_timeout_secs);
        let mut artifacts_fetched = 0;
        let mut outputs_uploaded = 0;

        for (idx, job) in batch.jobs.iter().enumerate() {
            info!(job_id = %job.id, job_name = %job.name, "Processing job");
            let ctx = BatchContext {
                bucket: job.bucket.clone(),
                prefix: job.prefix.clone(),
                scratch_dir: scratch_dir.clone(),
            };

            match self.process_job(job, &ctx, &cache, &executor).await {
                Ok(stats) => {
                    artifacts_fetched += stats.fetched;
                    outputs_uploaded += stats.uploaded;
                    outcomes[idx].exit_code = Some(0);
                }
                Err(e) => {
                    error!(job_id = %job.id, "Job failed: {}", e);
                    if let JobError::NonZeroExit(code) = e {
                        outcomes[idx].exit_code = Some(code);
                    }
                    outcomes[idx].fail(e);
                }
            }

            if self.should_ack(&outcomes[idx]) {
                let result = timeout(
                    Duration::from_secs(self.config.ack_timeout_secs),
                    acknowledge(self.publisher.as_ref(), &job.workflow, &job.id),
                )
                .await
                .unwrap_or(Err(StreamError::Timeout));
                record_ack(&mut outcomes[idx], result);
            }
        }

        self.remove_scratch(&scratch_dir).await;
        self.finish_report(outcomes, artifacts_fetched, outputs_uploaded, start, "serial")
    }

    /// One job end-to-end: download its artifacts, run it, upload outputs.
    async fn process_job(
        &self,
        job: &JobDescriptor,
        ctx: &BatchContext,
        cache: &ArtifactCache,
        executor: &CommandExecutor,
    ) -> Result<JobStats, JobError> {
        let mut fetched = 0;
        for filename in &job.bin_files {
            if self
                .timed_download(cache, ctx, ArtifactKind::Binary, filename)
                .await?
            {
                fetched += 1;
            }
            set_executable(&ctx.local_path(filename))
                .await
                .map_err(JobError::Scratch)?;
        }
        for filename in &job.in_files {
            if self
                .timed_download(cache, ctx, ArtifactKind::Input, filename)
                .await?
            {
                fetched += 1;
            }
        }

        let report = executor.execute(&job.command, &ctx.scratch_dir).await?;
        match report.exit_code {
            Some(0) => {}
            Some(code) => return Err(JobError::NonZeroExit(code)),
            None => return Err(JobError::Signaled),
        }

        let mut uploaded = 0;
        let timeout_secs = self.config.upload_timeout_secs;
        for filename in &job.out_files {
            timeout(
                Duration::from_secs(timeout_secs),
                upload(self.store.as_ref(), cache, ctx, filename),
            )
            .await
            .unwrap_or_else(|_| {
                Err(TransferError::Timeout {
                    filename: filename.clone(),
                    timeout_secs,
                })
            })?;
            uploaded += 1;
        }

        Ok(JobStats { fetched, uploaded })
    }

    async fn timed_download(
        &self,
        cache: &ArtifactCache,
        ctx: &BatchContext,
        kind: ArtifactKind,
        filename: &str,
    ) -> Result<bool, JobError> {
        let timeout_secs = self.config.download_timeout_secs;
        timeout(
            Duration::from_secs(timeout_secs),
            download(self.store.as_ref(), cache, ctx, kind, filename),
        )
        .await
        .unwrap_or_else(|_| {
            Err(TransferError::Timeout {
                filename: filename.to_string(),
                timeout_secs,
            })
        })
        .map_err(JobError::from)
    }

    /// Fan out downloads over distinct artifacts; join all before returning.
    ///
    /// Returns the number of artifacts actually fetched and, per failed
    /// filename, the failure reason.
    async fn download_phase(
        &self,
        targets: &[(ArtifactKind, String)],
        ctx: &BatchContext,
        cache: &ArtifactCache,
    ) -> (usize, HashMap<String, String>) {
        let sem = Semaphore::new(self.config.max_concurrent_transfers);
        let timeout_secs = self.config.download_timeout_secs;

        let tasks = targets.iter().map(|(kind, filename)| {
            let sem = &sem;
            async move {
                let _permit = sem.acquire().await.map_err(|e| TransferError::Io {
                    filename: filename.clone(),
                    source: std::io::Error::other(e.to_string()),
                })?;
                timeout(
                    Duration::from_secs(timeout_secs),
                    download(self.store.as_ref(), cache, ctx, *kind, filename),
                )
                .await
                .unwrap_or_else(|_| {
                    Err(TransferError::Timeout {
                        filename: filename.clone(),
                        timeout_secs,
                    })
                })
            }
        });
        let results = futures::future::join_all(tasks).await;

        let mut fetched = 0;
        let mut failed = HashMap::new();
        for ((_, filename), result) in targets.iter().zip(results) {
            match result {
                Ok(true) => fetched += 1,
                Ok(false) => {}
                Err(e) => {
                    error!(filename = %filename, "Download failed: {}", e);
                    failed.insert(filename.clone(), e.to_string());
                }
            }
        }
        (fetched, failed)
    }

    /// Fan out one subprocess per surviving job; join all before returning.
    async fn execute_phase(
        &self,
        batch: &Batch,
        ctx: &Arc<BatchContext>,
        outcomes: &mut [JobOutcome],
    ) {
        let executor = CommandExecutor::new(self.config.execute_timeout_secs);
        let sem = Arc::new(Semaphore::new(self.config.max_concurrent_jobs));

        let mut handles = Vec::new();
        for (idx, job) in batch.jobs.iter().enumerate() {
            if outcomes[idx].is_failed() {
                continue;
            }
            info!(job_id = %job.id, job_name = %job.name, "Executing job");
            let executor = executor.clone();
            let command = job.command.clone();
            let work_dir = ctx.scratch_dir.clone();
            let sem = Arc::clone(&sem);
            handles.push((
                idx,
                tokio::spawn(async move {
                    let _permit =
                        sem.acquire_owned()
                            .await
                            .map_err(|e| super::executor::ExecutorError::Io {
                                command: command.clone(),
                                source: std::io::Error::other(e.to_string()),
                            })?;
                    executor.execute(&command, &work_dir).await
                }),
            ));
        }

        for (idx, handle) in handles {
            match handle.await {
                Ok(Ok(report)) => {
                    outcomes[idx].exit_code = report.exit_code;
                    match report.exit_code {
                        Some(0) => {}
                        Some(code) => outcomes[idx].fail(JobError::NonZeroExit(code)),
                        None => outcomes[idx].fail(JobError::Signaled),
                    }
                }
                Ok(Err(e)) => {
                    error!(job_id = %outcomes[idx].job_id, "Execution failed: {}", e);
                    outcomes[idx].fail(JobError::Execution(e));
                }
                Err(e) => {
                    error!(job_id = %outcomes[idx].job_id, "Execution task failed: {}", e);
                    outcomes[idx].fail(JobError::Internal(e.to_string()));
                }
            }
        }
    }

    /// Fan out one upload per declared output of every surviving job.
    ///
    /// Not deduplicated: the same output filename declared by two jobs is
    /// uploaded twice.
    async fn upload_phase(
        &self,
        batch: &Batch,
        ctx: &Arc<BatchContext>,
        cache: &Arc<ArtifactCache>,
        outcomes: &mut [JobOutcome],
    ) -> usize {
        let sem = Semaphore::new(self.config.max_concurrent_transfers);
        let timeout_secs = self.config.upload_timeout_secs;

        let mut targets: Vec<(usize, String)> = Vec::new();
        for (idx, job) in batch.jobs.iter().enumerate() {
            if outcomes[idx].is_failed() {
                continue;
            }
            for filename in &job.out_files {
                targets.push((idx, filename.clone()));
            }
        }

        let tasks = targets.iter().map(|(_, filename)| {
            let sem = &sem;
            async move {
                let _permit = sem.acquire().await.map_err(|e| TransferError::Io {
                    filename: filename.clone(),
                    source: std::io::Error::other(e.to_string()),
                })?;
                timeout(
                    Duration::from_secs(timeout_secs),
                    upload(self.store.as_ref(), cache, ctx, filename),
                )
                .await
                .unwrap_or_else(|_| {
                    Err(TransferError::Timeout {
                        filename: filename.clone(),
                        timeout_secs,
                    })
                })
            }
        });
        let results = futures::future::join_all(tasks).await;

        let mut uploaded = 0;
        for ((idx, _), result) in targets.iter().zip(results) {
            match result {
                Ok(()) => uploaded += 1,
                Err(e) => {
                    error!(job_id = %outcomes[*idx].job_id, "Upload failed: {}", e);
                    outcomes[*idx].fail(JobError::Transfer(e));
                }
            }
        }
        uploaded
    }

    /// Fan out one acknowledgment per job the policy selects.
    async fn ack_phase(&self, batch: &Batch, outcomes: &mut [JobOutcome]) {
        let timeout_secs = self.config.ack_timeout_secs;

        let mut targets: Vec<usize> = Vec::new();
        for (idx, job) in batch.jobs.iter().enumerate() {
            if !self.should_ack(&outcomes[idx]) {
                debug!(job_id = %job.id, "Skipping acknowledgment for failed job");
                continue;
            }
            targets.push(idx);
        }

        let tasks = targets.iter().map(|idx| {
            let job = &batch.jobs[*idx];
            async move {
                timeout(
                    Duration::from_secs(timeout_secs),
                    acknowledge(self.publisher.as_ref(), &job.workflow, &job.id),
                )
                .await
                .unwrap_or(Err(StreamError::Timeout))
            }
        });
        let results = futures::future::join_all(tasks).await;

        for (idx, result) in targets.iter().zip(results) {
            record_ack(&mut outcomes[*idx], result);
        }
    }

    fn should_ack(&self, outcome: &JobOutcome) -> bool {
        match self.config.ack_policy {
            AckPolicy::Always => true,
            AckPolicy::OnSuccess => !outcome.is_failed(),
        }
    }

    async fn create_scratch(&self) -> std::io::Result<PathBuf> {
        let dir = self.config.scratch_root.join(Uuid::new_v4().to_string());
        tokio::fs::create_dir_all(&dir).await?;
        debug!(scratch_dir = %dir.display(), "Created scratch directory");
        Ok(dir)
    }

    async fn remove_scratch(&self, dir: &Path) {
        if let Err(e) = tokio::fs::remove_dir_all(dir).await {
            warn!(scratch_dir = %dir.display(), "Failed to remove scratch directory: {}", e);
        } else {
            debug!(scratch_dir = %dir.display(), "Removed scratch directory");
        }
    }

    fn finish_report(
        &self,
        outcomes: Vec<JobOutcome>,
        artifacts_fetched: usize,
        outputs_uploaded: usize,
        start: Instant,
        mode: &str,
    ) -> BatchReport {
        for outcome in &outcomes {
            JOBS.with_label_values(&[outcome.status.as_str()]).inc();
        }
        let duration = start.elapsed();
        BATCHES.with_label_values(&[mode]).inc();
        BATCH_DURATION
            .with_label_values(&[mode])
            .observe(duration.as_secs_f64());

        let report = BatchReport {
            outcomes,
            artifacts_fetched,
            outputs_uploaded,
            duration,
        };
        info!(
            mode,
            completed = report.completed(),
            failed = report.failed(),
            duration_ms = duration.as_millis() as u64,
            "Batch finished"
        );
        report
    }
}

fn record_ack(outcome: &mut JobOutcome, result: Result<(), StreamError>) {
    match result {
        Ok(()) => outcome.acked = true,
        Err(e) => {
            error!(job_id = %outcome.job_id, "Acknowledgment failed: {}", e);
            if !outcome.is_failed() {
                outcome.status = JobStatus::AckFailed;
                outcome.error = Some(JobError::Ack(e));
            }
        }
    }
}

fn fail_all(outcomes: &mut [JobOutcome], cause: &std::io::Error) {
    for outcome in outcomes {
        outcome.fail(JobError::Scratch(std::io::Error::new(
            cause.kind(),
            cause.to_string(),
        )));
    }
}

/// Equivalent of `chmod +x` on a fetched binary.
async fn set_executable(path: &Path) -> std::io::Result<()> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        tokio::fs::set_permissions(path, std::fs::Permissions::from_mode(0o755)).await
    }
    #[cfg(not(unix))]
    {
        let _ = path;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::fixtures::job_descriptor;
    use crate::testing::{MockObjectStore, MockStreamPublisher};

    struct Harness {
        runner: BatchRunner,
        store: Arc<MockObjectStore>,
        publisher: Arc<MockStreamPublisher>,
        _scratch_root: tempfile::TempDir,
    }

    fn harness(ack_policy: AckPolicy) -> Harness {
        let scratch_root = tempfile::tempdir().unwrap();
        let config = RunnerConfig {
            scratch_root: scratch_root.path().to_path_buf(),
            execute_timeout_secs: 30,
            download_timeout_secs: 30,
            upload_timeout_secs: 30,
            ack_timeout_secs: 10,
            ack_policy,
            ..RunnerConfig::default()
        };
        let store = Arc::new(MockObjectStore::new());
        let publisher = Arc::new(MockStreamPublisher::new());
        let runner = BatchRunner::new(
            config,
            Arc::clone(&store) as Arc<dyn ObjectStore>,
            Arc::clone(&publisher) as Arc<dyn StreamPublisher>,
        );
        Harness {
            runner,
            store,
            publisher,
            _scratch_root: scratch_root,
        }
    }

    fn script(body: &str) -> Vec<u8> {
        format!("#!/bin/sh\n{}\n", body).into_bytes()
    }

    /// The §-two-jobs scenario: shared binary, distinct inputs and outputs.
    fn shared_binary_batch() -> Batch {
        let mut job1 = job_descriptor("job-1");
        job1.command = "run.sh".to_string();
        job1.bin_files = vec!["run.sh".to_string()];
        job1.in_files = vec!["a.txt".to_string()];
        job1.out_files = vec!["out1.txt".to_string()];

        let mut job2 = job_descriptor("job-2");
        job2.command = "run.sh".to_string();
        job2.bin_files = vec!["run.sh".to_string()];
        job2.in_files = vec!["b.txt".to_string()];
        job2.out_files = vec!["out2.txt".to_string()];

        Batch::new(vec![job1, job2])
    }

    async fn seed_shared_binary(store: &MockObjectStore) {
        store
            .insert_object(
                "bucket",
                "wf/run-1/bin/run.sh",
                script("cat a.txt > out1.txt 2>/dev/null; cat b.txt > out2.txt 2>/dev/null; exit 0"),
            )
            .await;
        store
            .insert_object("bucket", "wf/run-1/workdir/a.txt", b"alpha".to_vec())
            .await;
        store
            .insert_object("bucket", "wf/run-1/workdir/b.txt", b"beta".to_vec())
            .await;
    }

    #[tokio::test]
    async fn test_shared_binary_fetched_once() {
        let h = harness(AckPolicy::OnSuccess);
        seed_shared_binary(&h.store).await;

        let report = h.runner.run_batch(shared_binary_batch()).await;

        assert_eq!(report.completed(), 2);
        // One fetch for the shared binary, one per distinct input.
        assert_eq!(h.store.get_count("wf/run-1/bin/run.sh").await, 1);
        assert_eq!(h.store.get_count("wf/run-1/workdir/a.txt").await, 1);
        assert_eq!(h.store.get_count("wf/run-1/workdir/b.txt").await, 1);
        assert_eq!(report.artifacts_fetched, 3);
        // Two uploads, one per job's declared output.
        assert_eq!(report.outputs_uploaded, 2);
        let puts = h.store.recorded_puts().await;
        let mut keys: Vec<_> = puts.iter().map(|p| p.key.as_str()).collect();
        keys.sort_unstable();
        assert_eq!(keys, vec!["wf/run-1/workdir/out1.txt", "wf/run-1/workdir/out2.txt"]);
        // Two acknowledgments, one per job id.
        let acks = h.publisher.published().await;
        assert_eq!(acks.len(), 2);
        let mut ids: Vec<_> = acks.iter().map(|a| a.data.clone()).collect();
        ids.sort_unstable();
        assert_eq!(ids, vec![b"job-1".to_vec(), b"job-2".to_vec()]);
    }

    #[tokio::test]
    async fn test_cache_is_invocation_scoped() {
        let h = harness(AckPolicy::OnSuccess);
        seed_shared_binary(&h.store).await;

        h.runner.run_batch(shared_binary_batch()).await;
        h.runner.run_batch(shared_binary_batch()).await;

        // No caching across invocations: everything fetched again.
        assert_eq!(h.store.get_count("wf/run-1/bin/run.sh").await, 2);
        assert_eq!(h.store.get_count("wf/run-1/workdir/a.txt").await, 2);
    }

    #[tokio::test]
    async fn test_scratch_dir_removed_after_batch() {
        let h = harness(AckPolicy::OnSuccess);
        seed_shared_binary(&h.store).await;
        let root = h.runner.config.scratch_root.clone();

        h.runner.run_batch(shared_binary_batch()).await;

        let entries: Vec<_> = std::fs::read_dir(&root).unwrap().collect();
        assert!(entries.is_empty(), "scratch root should be empty");
    }

    #[tokio::test]
    async fn test_scratch_dir_removed_when_job_fails() {
        let h = harness(AckPolicy::OnSuccess);
        let mut job = job_descriptor("job-1");
        job.command = "missing.sh".to_string();
        job.bin_files = vec![];
        job.in_files = vec![];
        job.out_files = vec![];
        let root = h.runner.config.scratch_root.clone();

        let report = h.runner.run_batch(Batch::new(vec![job])).await;

        assert_eq!(report.failed(), 1);
        let entries: Vec<_> = std::fs::read_dir(&root).unwrap().collect();
        assert!(entries.is_empty(), "scratch root should be empty");
    }

    #[tokio::test]
    async fn test_nonzero_exit_not_acked_on_success_policy() {
        let h = harness(AckPolicy::OnSuccess);
        h.store
            .insert_object("bucket", "wf/run-1/bin/fail.sh", script("exit 7"))
            .await;

        let mut job = job_descriptor("job-1");
        job.command = "fail.sh".to_string();
        job.bin_files = vec!["fail.sh".to_string()];
        job.in_files = vec![];
        job.out_files = vec![];

        let report = h.runner.run_batch(Batch::new(vec![job])).await;

        let outcome = &report.outcomes[0];
        assert_eq!(outcome.status, JobStatus::Failed);
        assert_eq!(outcome.exit_code, Some(7));
        assert!(!outcome.acked);
        assert!(h.publisher.published().await.is_empty());
    }

    #[tokio::test]
    async fn test_nonzero_exit_acked_under_always_policy() {
        let h = harness(AckPolicy::Always);
        h.store
            .insert_object("bucket", "wf/run-1/bin/fail.sh", script("exit 7"))
            .await;

        let mut job = job_descriptor("job-1");
        job.command = "fail.sh".to_string();
        job.bin_files = vec!["fail.sh".to_string()];
        job.in_files = vec![];
        job.out_files = vec![];

        let report = h.runner.run_batch(Batch::new(vec![job])).await;

        let outcome = &report.outcomes[0];
        assert_eq!(outcome.status, JobStatus::Failed);
        assert!(outcome.acked);
        assert_eq!(h.publisher.published().await.len(), 1);
    }

    #[tokio::test]
    async fn test_missing_artifact_fails_job_but_not_siblings() {
        let h = harness(AckPolicy::OnSuccess);
        h.store
            .insert_object("bucket", "wf/run-1/bin/ok.sh", script("exit 0"))
            .await;
        // job-2's input is never inserted.

        let mut job1 = job_descriptor("job-1");
        job1.command = "ok.sh".to_string();
        job1.bin_files = vec!["ok.sh".to_string()];
        job1.in_files = vec![];
        job1.out_files = vec![];

        let mut job2 = job_descriptor("job-2");
        job2.command = "ok.sh".to_string();
        job2.bin_files = vec!["ok.sh".to_string()];
        job2.in_files = vec!["nope.txt".to_string()];
        job2.out_files = vec![];

        let report = h.runner.run_batch(Batch::new(vec![job1, job2])).await;

        assert_eq!(report.outcomes[0].status, JobStatus::Completed);
        assert!(report.outcomes[0].acked);
        assert_eq!(report.outcomes[1].status, JobStatus::Failed);
        assert!(matches!(
            report.outcomes[1].error,
            Some(JobError::MissingArtifact { .. })
        ));
        let acks = h.publisher.published().await;
        assert_eq!(acks.len(), 1);
        assert_eq!(acks[0].data, b"job-1");
    }

    #[tokio::test]
    async fn test_ack_failure_marks_job_ack_failed() {
        let h = harness(AckPolicy::OnSuccess);
        h.store
            .insert_object("bucket", "wf/run-1/bin/ok.sh", script("exit 0"))
            .await;
        h.publisher.fail_stream("wf").await;

        let mut job = job_descriptor("job-1");
        job.command = "ok.sh".to_string();
        job.bin_files = vec!["ok.sh".to_string()];
        job.in_files = vec![];
        job.out_files = vec![];

        let report = h.runner.run_batch(Batch::new(vec![job])).await;

        let outcome = &report.outcomes[0];
        assert_eq!(outcome.status, JobStatus::AckFailed);
        assert!(!outcome.acked);
        assert!(matches!(outcome.error, Some(JobError::Ack(_))));
    }

    #[tokio::test]
    async fn test_download_barrier_holds_under_slow_store() {
        let h = harness(AckPolicy::OnSuccess);
        seed_shared_binary(&h.store).await;
        h.store.set_get_delay(Duration::from_millis(100)).await;

        let report = h.runner.run_batch(shared_binary_batch()).await;

        // Every execution saw all artifacts in place despite slow fetches.
        assert_eq!(report.completed(), 2);
    }

    #[tokio::test]
    async fn test_empty_batch_is_a_no_op() {
        let h = harness(AckPolicy::OnSuccess);
        let root = h.runner.config.scratch_root.clone();

        let report = h.runner.run_batch(Batch::default()).await;

        assert!(report.outcomes.is_empty());
        assert!(std::fs::read_dir(&root).unwrap().next().is_none());
        assert!(h.publisher.published().await.is_empty());
    }

    #[tokio::test]
    async fn test_serial_mode_end_to_end() {
        let h = harness(AckPolicy::OnSuccess);
        h.store
            .insert_object(
                "bucket",
                "wf/run-1/bin/step.sh",
                script("echo done > result.txt"),
            )
            .await;

        let mut job1 = job_descriptor("job-1");
        job1.command = "step.sh".to_string();
        job1.bin_files = vec!["step.sh".to_string()];
        job1.in_files = vec![];
        job1.out_files = vec!["result.txt".to_string()];
        let mut job2 = job1.clone();
        job2.id = "job-2".to_string();

        let report = h.runner.run_serial(Batch::new(vec![job1, job2])).await;

        assert_eq!(report.completed(), 2);
        // Shared binary still fetched once: the cache spans the invocation.
        assert_eq!(h.store.get_count("wf/run-1/bin/step.sh").await, 1);
        assert_eq!(report.artifacts_fetched, 1);
        // Acks arrive in job order in serial mode.
        let acks = h.publisher.published().await;
        assert_eq!(acks[0].data, b"job-1");
        assert_eq!(acks[1].data, b"job-2");
    }

    #[tokio::test]
    async fn test_serial_mode_failed_job_does_not_stop_batch() {
        let h = harness(AckPolicy::OnSuccess);
        h.store
            .insert_object("bucket", "wf/run-1/bin/good.sh", script("exit 0"))
            .await;
        h.store
            .insert_object("bucket", "wf/run-1/bin/bad.sh", script("exit 1"))
            .await;

        let mut bad = job_descriptor("job-bad");
        bad.command = "bad.sh".to_string();
        bad.bin_files = vec!["bad.sh".to_string()];
        bad.in_files = vec![];
        bad.out_files = vec![];
        let mut good = job_descriptor("job-good");
        good.command = "good.sh".to_string();
        good.bin_files = vec!["good.sh".to_string()];
        good.in_files = vec![];
        good.out_files = vec![];

        let report = h.runner.run_serial(Batch::new(vec![bad, good])).await;

        assert_eq!(report.outcomes[0].status, JobStatus::Failed);
        assert_eq!(report.outcomes[0].exit_code, Some(1));
        assert_eq!(report.outcomes[1].status, JobStatus::Completed);
        assert!(report.outcomes[1].acked);
    }
}
