//! Mock stream publisher for testing.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashSet;
use tokio::sync::RwLock;

use crate::stream::{StreamError, StreamPublisher};

/// A recorded `publish` call for test assertions.
#[derive(Debug, Clone)]
pub struct PublishedRecord {
    pub stream: String,
    pub partition_key: String,
    pub data: Vec<u8>,
    /// When the call was made.
    pub timestamp: chrono::DateTime<Utc>,
}

/// Mock implementation of the StreamPublisher trait.
///
/// Records every published record and can be told to fail publishes to
/// specific streams.
#[derive(Debug, Default)]
pub struct MockStreamPublisher {
    records: RwLock<Vec<PublishedRecord>>,
    failing_streams: RwLock<HashSet<String>>,
}

impl MockStreamPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    /// All recorded publishes, in call order.
    pub async fn published(&self) -> Vec<PublishedRecord> {
        self.records.read().await.clone()
    }

    /// Make every subsequent publish to this stream fail.
    pub async fn fail_stream(&self, stream: &str) {
        self.failing_streams.write().await.insert(stream.to_string());
    }
}

#[async_trait]
impl StreamPublisher for MockStreamPublisher {
    fn name(&self) -> &str {
        "mock"
    }

    async fn publish(
        &self,
        stream: &str,
        partition_key: &str,
        data: &[u8],
    ) -> Result<(), StreamError> {
        if self.failing_streams.read().await.contains(stream) {
            return Err(StreamError::Api(format!(
                "mock failure for stream {}",
                stream
            )));
        }
        self.records.write().await.push(PublishedRecord {
            stream: stream.to_string(),
            partition_key: partition_key.to_string(),
            data: data.to_vec(),
            timestamp: Utc::now(),
        });
        Ok(())
    }
}
