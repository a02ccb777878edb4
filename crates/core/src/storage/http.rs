//! HTTP object store implementation for S3-compatible gateways.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use tracing::debug;

use crate::config::StorageConfig;

use super::{ObjectStore, ObjectStoreError};

/// Object store talking path-style HTTP to an S3-compatible gateway:
/// `GET/PUT {endpoint}/{bucket}/{key}`.
pub struct HttpObjectStore {
    client: Client,
    config: StorageConfig,
}

impl HttpObjectStore {
    /// Create a new store from configuration.
    pub fn new(config: StorageConfig) -> Result<Self, ObjectStoreError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs as u64))
            .build()
            .map_err(|e| ObjectStoreError::ConnectionFailed(e.to_string()))?;

        Ok(Self { client, config })
    }

    /// Base URL without trailing slash.
    fn base_url(&self) -> &str {
        self.config.endpoint.trim_end_matches('/')
    }

    fn object_url(&self, bucket: &str, key: &str) -> String {
        format!("{}/{}/{}", self.base_url(), bucket, key)
    }

    fn map_request_error(e: reqwest::Error) -> ObjectStoreError {
        if e.is_timeout() {
            ObjectStoreError::Timeout
        } else if e.is_connect() {
            ObjectStoreError::ConnectionFailed(e.to_string())
        } else {
            ObjectStoreError::Api(e.to_string())
        }
    }

    fn map_status(status: StatusCode, url: &str) -> Option<ObjectStoreError> {
        match status {
            StatusCode::NOT_FOUND => Some(ObjectStoreError::NotFound(url.to_string())),
            StatusCode::FORBIDDEN | StatusCode::UNAUTHORIZED => {
                Some(ObjectStoreError::AccessDenied(url.to_string()))
            }
            s if !s.is_success() => Some(ObjectStoreError::Api(format!("HTTP {} for {}", s, url))),
            _ => None,
        }
    }

    fn apply_auth(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.config.access_token {
            Some(token) => req.bearer_auth(token),
            None => req,
        }
    }
}

#[async_trait]
impl ObjectStore for HttpObjectStore {
    fn name(&self) -> &str {
        "http"
    }

    async fn get_object(&self, bucket: &str, key: &str) -> Result<Vec<u8>, ObjectStoreError> {
        let url = self.object_url(bucket, key);
        debug!(%url, "Fetching object");

        let response = self
            .apply_auth(self.client.get(&url))
            .send()
            .await
            .map_err(Self::map_request_error)?;

        if let Some(err) = Self::map_status(response.status(), &url) {
            return Err(err);
        }

        let bytes = response.bytes().await.map_err(Self::map_request_error)?;
        Ok(bytes.to_vec())
    }

    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        data: Vec<u8>,
    ) -> Result<(), ObjectStoreError> {
        let url = self.object_url(bucket, key);
        debug!(%url, bytes = data.len(), "Writing object");

        let response = self
            .apply_auth(self.client.put(&url))
            .body(data)
            .send()
            .await
            .map_err(Self::map_request_error)?;

        if let Some(err) = Self::map_status(response.status(), &url) {
            return Err(err);
        }

        Ok(())
    }
}
