//! Runner configuration.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// When to publish a job's acknowledgment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AckPolicy {
    /// Acknowledge only jobs whose download, execute, and upload phases all
    /// succeeded.
    #[default]
    OnSuccess,
    /// Acknowledge every job regardless of outcome. Matches schedulers that
    /// treat an ack as "attempted" and never retry.
    Always,
}

/// Configuration for the batch runner.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RunnerConfig {
    /// Root under which per-invocation scratch directories are created.
    #[serde(default = "default_scratch_root")]
    pub scratch_root: PathBuf,

    /// Bound on concurrent downloads and uploads.
    #[serde(default = "default_max_concurrent_transfers")]
    pub max_concurrent_transfers: usize,

    /// Bound on concurrently executing job commands.
    #[serde(default = "default_max_concurrent_jobs")]
    pub max_concurrent_jobs: usize,

    /// Per-artifact download deadline.
    #[serde(default = "default_transfer_timeout_secs")]
    pub download_timeout_secs: u64,

    /// Per-command execution deadline.
    #[serde(default = "default_execute_timeout_secs")]
    pub execute_timeout_secs: u64,

    /// Per-artifact upload deadline.
    #[serde(default = "default_transfer_timeout_secs")]
    pub upload_timeout_secs: u64,

    /// Per-acknowledgment deadline.
    #[serde(default = "default_ack_timeout_secs")]
    pub ack_timeout_secs: u64,

    /// Acknowledgment policy.
    #[serde(default)]
    pub ack_policy: AckPolicy,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            scratch_root: default_scratch_root(),
            max_concurrent_transfers: default_max_concurrent_transfers(),
            max_concurrent_jobs: default_max_concurrent_jobs(),
            download_timeout_secs: default_transfer_timeout_secs(),
            execute_timeout_secs: default_execute_timeout_secs(),
            upload_timeout_secs: default_transfer_timeout_secs(),
            ack_timeout_secs: default_ack_timeout_secs(),
            ack_policy: AckPolicy::default(),
        }
    }
}

fn default_scratch_root() -> PathBuf {
    std::env::temp_dir()
}

fn default_max_concurrent_transfers() -> usize {
    8
}

fn default_max_concurrent_jobs() -> usize {
    4
}

fn default_transfer_timeout_secs() -> u64 {
    300
}

fn default_execute_timeout_secs() -> u64 {
    900
}

fn default_ack_timeout_secs() -> u64 {
    30
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = RunnerConfig::default();
        assert_eq!(config.max_concurrent_transfers, 8);
        assert_eq!(config.max_concurrent_jobs, 4);
        assert_eq!(config.ack_policy, AckPolicy::OnSuccess);
    }

    #[test]
    fn test_ack_policy_deserializes_snake_case() {
        let config: RunnerConfig = toml::from_str("ack_policy = \"always\"").unwrap();
        assert_eq!(config.ack_policy, AckPolicy::Always);
    }

    #[test]
    fn test_partial_toml_falls_back_to_defaults() {
        let config: RunnerConfig = toml::from_str("max_concurrent_jobs = 2").unwrap();
        assert_eq!(config.max_concurrent_jobs, 2);
        assert_eq!(config.max_concurrent_transfers, 8);
    }
}
