//! HTTP stream publisher implementation.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use tracing::debug;

use crate::config::StreamConfig;

use super::{StreamError, StreamPublisher};

/// Publisher posting records to a REST stream endpoint:
/// `POST {endpoint}/streams/{name}/records?partitionKey={key}`.
pub struct HttpStreamPublisher {
    client: Client,
    config: StreamConfig,
}

impl HttpStreamPublisher {
    /// Create a new publisher from configuration.
    pub fn new(config: StreamConfig) -> Result<Self, StreamError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs as u64))
            .build()
            .map_err(|e| StreamError::ConnectionFailed(e.to_string()))?;

        Ok(Self { client, config })
    }

    fn base_url(&self) -> &str {
        self.config.endpoint.trim_end_matches('/')
    }

    fn record_url(&self, stream: &str) -> String {
        format!("{}/streams/{}/records", self.base_url(), stream)
    }

    fn map_request_error(e: reqwest::Error) -> StreamError {
        if e.is_timeout() {
            StreamError::Timeout
        } else if e.is_connect() {
            StreamError::ConnectionFailed(e.to_string())
        } else {
            StreamError::Api(e.to_string())
        }
    }
}

#[async_trait]
impl StreamPublisher for HttpStreamPublisher {
    fn name(&self) -> &str {
        "http"
    }

    async fn publish(
        &self,
        stream: &str,
        partition_key: &str,
        data: &[u8],
    ) -> Result<(), StreamError> {
        let url = self.record_url(stream);
        debug!(%url, partition_key, bytes = data.len(), "Publishing record");

        let response = self
            .client
            .post(&url)
            .query(&[("partitionKey", partition_key)])
            .body(data.to_vec())
            .send()
            .await
            .map_err(Self::map_request_error)?;

        match response.status() {
            StatusCode::NOT_FOUND => Err(StreamError::StreamNotFound(stream.to_string())),
            s if !s.is_success() => Err(StreamError::Api(format!("HTTP {} for {}", s, url))),
            _ => Ok(()),
        }
    }
}
