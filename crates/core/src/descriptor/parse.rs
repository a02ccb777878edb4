//! Parsing raw records into job descriptors.

use tracing::{debug, warn};

use super::types::{Batch, JobDescriptor, JobRecord};
use super::DescriptorError;

/// Parse one raw JSON record into a job descriptor.
pub fn parse_record(raw: &str) -> Result<JobDescriptor, DescriptorError> {
    let record: JobRecord = serde_json::from_str(raw)?;

    for (field, value) in [
        ("workflow", &record.workflow),
        ("bucket", &record.bucket),
        ("prefix", &record.prefix),
        ("id", &record.id),
        ("command", &record.command),
    ] {
        if value.trim().is_empty() {
            return Err(DescriptorError::EmptyField(field));
        }
    }

    Ok(JobDescriptor {
        workflow: record.workflow,
        bucket: record.bucket,
        prefix: record.prefix,
        id: record.id,
        name: record.name,
        command: record.command,
        bin_files: split_files(&record.bin_files),
        in_files: split_files(&record.in_files),
        out_files: split_files(&record.out_files),
    })
}

/// Parse a batch of raw records.
///
/// A malformed record drops only that job: it is logged and the rest of the
/// batch proceeds.
pub fn parse_batch<S: AsRef<str>>(records: &[S]) -> Batch {
    let mut jobs = Vec::with_capacity(records.len());
    for (idx, raw) in records.iter().enumerate() {
        match parse_record(raw.as_ref()) {
            Ok(job) => {
                debug!(job_id = %job.id, job_name = %job.name, "Parsed job record");
                jobs.push(job);
            }
            Err(e) => {
                warn!(record = idx, "Dropping malformed job record: {}", e);
            }
        }
    }
    Batch::new(jobs)
}

/// Split a whitespace-separated filename list, preserving first-seen order.
fn split_files(list: &str) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    let mut out = Vec::new();
    for name in list.split_whitespace() {
        if seen.insert(name) {
            out.push(name.to_string());
        }
    }
    out
}
