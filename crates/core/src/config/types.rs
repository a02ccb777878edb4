use serde::{Deserialize, Serialize};

use crate::runner::RunnerConfig;

/// Root configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    pub storage: StorageConfig,
    pub stream: StreamConfig,
    #[serde(default)]
    pub runner: RunnerConfig,
}

/// Object storage endpoint configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StorageConfig {
    /// Object storage HTTP endpoint (e.g., "http://localhost:9000")
    pub endpoint: String,
    /// Bearer token sent with every request, if the store requires one
    #[serde(default)]
    pub access_token: Option<String>,
    /// Request timeout in seconds (default: 30)
    #[serde(default = "default_timeout")]
    pub timeout_secs: u32,
}

/// Acknowledgment stream endpoint configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StreamConfig {
    /// Stream service HTTP endpoint (e.g., "http://localhost:7000")
    pub endpoint: String,
    /// Request timeout in seconds (default: 30)
    #[serde(default = "default_timeout")]
    pub timeout_secs: u32,
}

fn default_timeout() -> u32 {
    30
}
