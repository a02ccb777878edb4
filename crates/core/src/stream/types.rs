//! Types for stream publishing operations.

use async_trait::async_trait;
use thiserror::Error;

/// Errors that can occur while publishing to a stream.
#[derive(Debug, Error)]
pub enum StreamError {
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Stream not found: {0}")]
    StreamNotFound(String),

    #[error("Stream API error: {0}")]
    Api(String),

    #[error("Request timeout")]
    Timeout,
}

/// Trait for stream publishing backends.
#[async_trait]
pub trait StreamPublisher: Send + Sync {
    /// Backend name for logging.
    fn name(&self) -> &str;

    /// Publish one record to the named stream.
    ///
    /// The partition key only spreads records across shards; no ordering is
    /// implied between records.
    async fn publish(
        &self,
        stream: &str,
        partition_key: &str,
        data: &[u8],
    ) -> Result<(), StreamError>;
}
