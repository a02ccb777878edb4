//! Maintenance operations: scratch cleanup and host resource probing.

use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{info, warn};

/// Result of one scratch cleanup pass.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ScratchReport {
    /// Top-level entries removed from the scratch root.
    pub entries_removed: usize,
    /// Bytes held by the removed entries.
    pub bytes_freed: u64,
}

/// Remove every entry under the scratch root.
///
/// Entries that fail to delete are logged and skipped. A missing root is not
/// an error; there is simply nothing to clear.
pub async fn clear_scratch(root: &Path) -> std::io::Result<ScratchReport> {
    let mut report = ScratchReport::default();
    let mut entries = match tokio::fs::read_dir(root).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(report),
        Err(e) => return Err(e),
    };

    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        let size = entry_size(&path).await;
        let removed = if entry.file_type().await?.is_dir() {
            tokio::fs::remove_dir_all(&path).await
        } else {
            tokio::fs::remove_file(&path).await
        };
        match removed {
            Ok(()) => {
                report.entries_removed += 1;
                report.bytes_freed += size;
            }
            Err(e) => warn!(path = %path.display(), "Failed to remove scratch entry: {}", e),
        }
    }

    info!(
        entries = report.entries_removed,
        bytes = report.bytes_freed,
        "Cleared scratch root"
    );
    Ok(report)
}

/// Total size of a file or directory tree. Symlinks are counted, not
/// followed.
async fn entry_size(path: &Path) -> u64 {
    let mut total = 0;
    let mut stack: Vec<PathBuf> = vec![path.to_path_buf()];
    while let Some(current) = stack.pop() {
        let meta = match tokio::fs::symlink_metadata(&current).await {
            Ok(meta) => meta,
            Err(_) => continue,
        };
        if meta.is_dir() {
            if let Ok(mut entries) = tokio::fs::read_dir(&current).await {
                while let Ok(Some(entry)) = entries.next_entry().await {
                    stack.push(entry.path());
                }
            }
        } else {
            total += meta.len();
        }
    }
    total
}

/// Snapshot of the host resources available to the worker.
#[derive(Debug, Clone, Serialize)]
pub struct ResourceReport {
    pub cpu_cores: usize,
    pub mem_total_kb: Option<u64>,
    pub mem_available_kb: Option<u64>,
}

/// Probe CPU and memory capacity of the host.
///
/// Memory figures come from `/proc/meminfo` and are `None` where the file is
/// unavailable.
pub async fn probe_resources() -> ResourceReport {
    let cpu_cores = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    let meminfo = tokio::fs::read_to_string("/proc/meminfo")
        .await
        .unwrap_or_default();
    ResourceReport {
        cpu_cores,
        mem_total_kb: meminfo_field(&meminfo, "MemTotal"),
        mem_available_kb: meminfo_field(&meminfo, "MemAvailable"),
    }
}

fn meminfo_field(meminfo: &str, field: &str) -> Option<u64> {
    let label = format!("{}:", field);
    meminfo
        .lines()
        .find(|line| line.starts_with(&label))
        .and_then(|line| line.split_whitespace().nth(1))
        .and_then(|value| value.parse().ok())
}
