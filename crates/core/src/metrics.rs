//! Prometheus metrics for core components.
//!
//! This module provides metrics for:
//! - Artifact transfers (downloads, cache hits, uploads)
//! - Job execution and batch outcomes
//! - Acknowledgment publishing

use once_cell::sync::Lazy;
use prometheus::{HistogramOpts, HistogramVec, IntCounter, IntCounterVec, Opts};

// =============================================================================
// Artifact transfers
// =============================================================================

/// Artifact downloads by result.
pub static ARTIFACT_DOWNLOADS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "gristmill_artifact_downloads_total",
            "Total artifact downloads",
        ),
        &["result"], // "fetched", "failed"
    )
    .unwrap()
});

/// Downloads resolved from the invocation cache instead of storage.
pub static ARTIFACT_CACHE_HITS: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "gristmill_artifact_cache_hits_total",
        "Total artifact downloads served by the invocation cache",
    )
    .unwrap()
});

/// Artifact uploads by result.
pub static ARTIFACT_UPLOADS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("gristmill_artifact_uploads_total", "Total artifact uploads"),
        &["result"], // "uploaded", "failed"
    )
    .unwrap()
});

// =============================================================================
// Jobs and batches
// =============================================================================

/// Finished jobs by final status.
pub static JOBS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("gristmill_jobs_total", "Total jobs processed"),
        &["result"], // "completed", "failed", "ack_failed"
    )
    .unwrap()
});

/// Batch invocations by execution mode.
pub static BATCHES: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("gristmill_batches_total", "Total batch invocations"),
        &["mode"], // "parallel", "serial"
    )
    .unwrap()
});

/// Wall-clock duration of one batch invocation.
pub static BATCH_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "gristmill_batch_duration_seconds",
            "Duration of one batch invocation",
        )
        .buckets(vec![0.5, 1.0, 2.5, 5.0, 15.0, 30.0, 60.0, 300.0, 900.0]),
        &["mode"],
    )
    .unwrap()
});

// =============================================================================
// Acknowledgments
// =============================================================================

/// Acknowledgment publishes by result.
pub static ACKS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("gristmill_acks_total", "Total acknowledgment publishes"),
        &["result"], // "published", "failed"
    )
    .unwrap()
});

// =============================================================================
// Helper functions
// =============================================================================

/// Get all core metrics for registration in a registry.
pub fn all_metrics() -> Vec<Box<dyn prometheus::core::Collector>> {
    vec![
        Box::new(ARTIFACT_DOWNLOADS.clone()),
        Box::new(ARTIFACT_CACHE_HITS.clone()),
        Box::new(ARTIFACT_UPLOADS.clone()),
        Box::new(JOBS.clone()),
        Box::new(BATCHES.clone()),
        Box::new(BATCH_DURATION.clone()),
        Box::new(ACKS.clone()),
    ]
}
