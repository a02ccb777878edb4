//! Types for object storage operations.

use async_trait::async_trait;
use thiserror::Error;

/// Errors that can occur during object storage operations.
#[derive(Debug, Error)]
pub enum ObjectStoreError {
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Object not found: {0}")]
    NotFound(String),

    #[error("Access denied for {0}")]
    AccessDenied(String),

    #[error("Storage API error: {0}")]
    Api(String),

    #[error("Request timeout")]
    Timeout,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Trait for object storage backends.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Backend name for logging.
    fn name(&self) -> &str;

    /// Fetch an object's bytes.
    async fn get_object(&self, bucket: &str, key: &str) -> Result<Vec<u8>, ObjectStoreError>;

    /// Write an object.
    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        data: Vec<u8>,
    ) -> Result<(), ObjectStoreError>;
}
