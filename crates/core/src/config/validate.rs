use super::{types::Config, ConfigError};

/// Validate configuration
/// Currently validates:
/// - Storage and stream endpoints are present and HTTP URLs
/// - Runner concurrency bounds are nonzero
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    validate_endpoint("storage.endpoint", &config.storage.endpoint)?;
    validate_endpoint("stream.endpoint", &config.stream.endpoint)?;

    if config.runner.max_concurrent_transfers == 0 {
        return Err(ConfigError::ValidationError(
            "runner.max_concurrent_transfers cannot be 0".to_string(),
        ));
    }
    if config.runner.max_concurrent_jobs == 0 {
        return Err(ConfigError::ValidationError(
            "runner.max_concurrent_jobs cannot be 0".to_string(),
        ));
    }

    Ok(())
}

fn validate_endpoint(field: &str, endpoint: &str) -> Result<(), ConfigError> {
    if endpoint.trim().is_empty() {
        return Err(ConfigError::ValidationError(format!(
            "{} cannot be empty",
            field
        )));
    }
    if !endpoint.starts_with("http://") && !endpoint.starts_with("https://") {
        return Err(ConfigError::ValidationError(format!(
            "{} must be an http(s) URL",
            field
        )));
    }
    Ok(())
}
