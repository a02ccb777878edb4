//! Job completion acknowledgments.

use tracing::debug;
use uuid::Uuid;

use crate::metrics::ACKS;
use crate::stream::{StreamError, StreamPublisher};

/// Publish a completion message for one job id to its workflow's stream.
///
/// The payload is the job id's raw bytes; the partition key is a fresh random
/// identifier that only spreads acknowledgments across shards.
pub async fn acknowledge(
    publisher: &dyn StreamPublisher,
    ack_stream: &str,
    job_id: &str,
) -> Result<(), StreamError> {
    let partition_key = Uuid::new_v4().to_string();
    debug!(ack_stream, job_id, %partition_key, "Acknowledging job");

    let result = publisher
        .publish(ack_stream, &partition_key, job_id.as_bytes())
        .await;

    let label = if result.is_ok() { "published" } else { "failed" };
    ACKS.with_label_values(&[label]).inc();
    result
}
