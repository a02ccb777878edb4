//! Mock object store for testing.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::RwLock;

use crate::storage::{ObjectStore, ObjectStoreError};

/// A recorded `put_object` call for test assertions.
#[derive(Debug, Clone)]
pub struct RecordedPut {
    pub bucket: String,
    pub key: String,
    pub data: Vec<u8>,
    /// When the call was made.
    pub timestamp: chrono::DateTime<Utc>,
}

/// Mock implementation of the ObjectStore trait.
///
/// Provides controllable behavior for testing:
/// - Seed objects and count how often each key was fetched
/// - Record every upload for assertions
/// - Slow down fetches to exercise concurrent paths
#[derive(Debug, Default)]
pub struct MockObjectStore {
    objects: RwLock<HashMap<(String, String), Vec<u8>>>,
    get_counts: RwLock<HashMap<String, usize>>,
    puts: RwLock<Vec<RecordedPut>>,
    get_delay: RwLock<Option<Duration>>,
}

impl MockObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed an object so later `get_object` calls find it.
    pub async fn insert_object(&self, bucket: &str, key: &str, data: Vec<u8>) {
        self.objects
            .write()
            .await
            .insert((bucket.to_string(), key.to_string()), data);
    }

    /// How many times `get_object` was called for this key, across buckets.
    pub async fn get_count(&self, key: &str) -> usize {
        self.get_counts.read().await.get(key).copied().unwrap_or(0)
    }

    /// All recorded `put_object` calls, in call order.
    pub async fn recorded_puts(&self) -> Vec<RecordedPut> {
        self.puts.read().await.clone()
    }

    /// Delay every subsequent `get_object` by this much.
    pub async fn set_get_delay(&self, delay: Duration) {
        *self.get_delay.write().await = Some(delay);
    }
}

#[async_trait]
impl ObjectStore for MockObjectStore {
    fn name(&self) -> &str {
        "mock"
    }

    async fn get_object(&self, bucket: &str, key: &str) -> Result<Vec<u8>, ObjectStoreError> {
        let delay = *self.get_delay.read().await;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        *self
            .get_counts
            .write()
            .await
            .entry(key.to_string())
            .or_insert(0) += 1;

        self.objects
            .read()
            .await
            .get(&(bucket.to_string(), key.to_string()))
            .cloned()
            .ok_or_else(|| ObjectStoreError::NotFound(format!("{}/{}", bucket, key)))
    }

    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        data: Vec<u8>,
    ) -> Result<(), ObjectStoreError> {
        self.puts.write().await.push(RecordedPut {
            bucket: bucket.to_string(),
            key: key.to_string(),
            data,
            timestamp: Utc::now(),
        });
        Ok(())
    }
}
