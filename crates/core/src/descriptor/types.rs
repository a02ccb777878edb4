//! Types for job descriptors and batches.

use serde::{Deserialize, Serialize};

/// One unit of work delivered to the worker.
///
/// File lists preserve the insertion order of the wire record and contain no
/// duplicates; order has no semantic meaning but keeps logging deterministic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobDescriptor {
    /// Name of the stream the job acknowledges completion on.
    pub workflow: String,
    /// Object storage bucket holding the job's artifacts.
    pub bucket: String,
    /// Storage key prefix shared by all artifacts of the job.
    pub prefix: String,
    /// Job identifier (the acknowledgment payload).
    pub id: String,
    /// Human-readable label.
    pub name: String,
    /// Command to run, as a path relative to the scratch directory.
    pub command: String,
    /// Executable artifacts, fetched from `{prefix}/bin/`.
    pub bin_files: Vec<String>,
    /// Input artifacts, fetched from `{prefix}/workdir/`.
    pub in_files: Vec<String>,
    /// Output artifacts, uploaded to `{prefix}/workdir/`.
    pub out_files: Vec<String>,
}

/// Wire representation of a job record.
///
/// The file lists arrive as whitespace-separated strings and are split into
/// deduplicated vectors during parsing.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct JobRecord {
    pub workflow: String,
    pub bucket: String,
    pub prefix: String,
    pub id: String,
    #[serde(default)]
    pub name: String,
    pub command: String,
    #[serde(rename = "binFiles", default)]
    pub bin_files: String,
    #[serde(rename = "inFiles", default)]
    pub in_files: String,
    #[serde(rename = "outFiles", default)]
    pub out_files: String,
}

/// An ordered sequence of job descriptors delivered in one invocation.
///
/// All descriptors of a batch are assumed to share the same bucket and prefix;
/// the workflow may differ per job.
#[derive(Debug, Clone, Default)]
pub struct Batch {
    pub jobs: Vec<JobDescriptor>,
}

impl Batch {
    pub fn new(jobs: Vec<JobDescriptor>) -> Self {
        Self { jobs }
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    /// Union of all binary filenames across jobs, first-seen order.
    pub fn bin_files(&self) -> Vec<String> {
        dedup_union(self.jobs.iter().flat_map(|j| j.bin_files.iter()))
    }

    /// Union of all input filenames across jobs, first-seen order.
    pub fn in_files(&self) -> Vec<String> {
        dedup_union(self.jobs.iter().flat_map(|j| j.in_files.iter()))
    }
}

fn dedup_union<'a>(names: impl Iterator<Item = &'a String>) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    let mut out = Vec::new();
    for name in names {
        if seen.insert(name.as_str()) {
            out.push(name.clone());
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::fixtures::job_descriptor;

    #[test]
    fn test_batch_bin_files_deduplicated_in_order() {
        let mut a = job_descriptor("j1");
        a.bin_files = vec!["run.bin".to_string(), "tool.bin".to_string()];
        let mut b = job_descriptor("j2");
        b.bin_files = vec!["run.bin".to_string(), "other.bin".to_string()];

        let batch = Batch::new(vec![a, b]);
        assert_eq!(batch.bin_files(), vec!["run.bin", "tool.bin", "other.bin"]);
    }

    #[test]
    fn test_batch_in_files_union() {
        let mut a = job_descriptor("j1");
        a.in_files = vec!["a.txt".to_string()];
        let mut b = job_descriptor("j2");
        b.in_files = vec!["b.txt".to_string(), "a.txt".to_string()];

        let batch = Batch::new(vec![a, b]);
        assert_eq!(batch.in_files(), vec!["a.txt", "b.txt"]);
    }

    #[test]
    fn test_empty_batch() {
        let batch = Batch::default();
        assert!(batch.is_empty());
        assert_eq!(batch.len(), 0);
        assert!(batch.bin_files().is_empty());
    }
}
