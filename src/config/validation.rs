use crate::config::types::{
    CatalogConfig, Config, CrawlerConfig, OutputConfig, RetryConfig, SubjectsConfig,
    UserAgentConfig,
};
use crate::ConfigError;
use url::Url;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_catalog_config(&config.catalog)?;
    validate_crawler_config(&config.crawler)?;
    validate_retry_config(&config.retry)?;
    validate_user_agent_config(&config.user_agent)?;
    validate_output_config(&config.output)?;
    if let Some(subjects) = &config.subjects {
        validate_subjects_config(subjects)?;
    }
    Ok(())
}

fn validate_catalog_config(config: &CatalogConfig) -> Result<(), ConfigError> {
    validate_http_url("listing-url", &config.listing_url)?;

    if config.page_param.trim().is_empty() {
        return Err(ConfigError::Validation(
            "page-param cannot be empty".to_string(),
        ));
    }

    if config.page_count_fallback == Some(0) {
        return Err(ConfigError::Validation(
            "page-count-fallback must be >= 1 when set".to_string(),
        ));
    }

    Ok(())
}

fn validate_crawler_config(config: &CrawlerConfig) -> Result<(), ConfigError> {
    if config.workers < 1 || config.workers > 100 {
        return Err(ConfigError::Validation(format!(
            "workers must be between 1 and 100, got {}",
            config.workers
        )));
    }

    if config.connect_timeout_ms == 0 || config.request_timeout_ms == 0 {
        return Err(ConfigError::Validation(
            "connect-timeout-ms and request-timeout-ms must be > 0".to_string(),
        ));
    }

    Ok(())
}

fn validate_retry_config(config: &RetryConfig) -> Result<(), ConfigError> {
    if config.max_attempts < 1 {
        return Err(ConfigError::Validation(
            "max-attempts must be >= 1".to_string(),
        ));
    }

    if config.base_delay_ms > config.max_delay_ms {
        return Err(ConfigError::Validation(format!(
            "base-delay-ms ({}) cannot exceed max-delay-ms ({})",
            config.base_delay_ms, config.max_delay_ms
        )));
    }

    Ok(())
}

fn validate_user_agent_config(config: &UserAgentConfig) -> Result<(), ConfigError> {
    // Crawler name: non-empty, alphanumeric + hyphens only
    if config.crawler_name.is_empty() {
        return Err(ConfigError::Validation(
            "crawler-name cannot be empty".to_string(),
        ));
    }

    if !config
        .crawler_name
        .chars()
        .all(|c| c.is_alphanumeric() || c == '-')
    {
        return Err(ConfigError::Validation(format!(
            "crawler-name must contain only alphanumeric characters and hyphens, got '{}'",
            config.crawler_name
        )));
    }

    validate_http_url("contact-url", &config.contact_url)
}

fn validate_output_config(config: &OutputConfig) -> Result<(), ConfigError> {
    if config.store_path.is_empty() {
        return Err(ConfigError::Validation(
            "store-path cannot be empty".to_string(),
        ));
    }
    Ok(())
}

fn validate_subjects_config(config: &SubjectsConfig) -> Result<(), ConfigError> {
    if config.batch_size < 1 {
        return Err(ConfigError::Validation(
            "subjects.batch-size must be >= 1".to_string(),
        ));
    }

    if config.max_attempts < 1 {
        return Err(ConfigError::Validation(
            "subjects.max-attempts must be >= 1".to_string(),
        ));
    }

    if config.batch_dir.is_empty() || config.final_path.is_empty() {
        return Err(ConfigError::Validation(
            "subjects.batch-dir and subjects.final-path cannot be empty".to_string(),
        ));
    }

    for entry in &config.entries {
        if entry.name.trim().is_empty() {
            return Err(ConfigError::Validation(
                "subject name cannot be empty".to_string(),
            ));
        }
        if entry.pages < 1 {
            return Err(ConfigError::Validation(format!(
                "Subject '{}' must have at least one page",
                entry.name
            )));
        }
    }

    Ok(())
}

/// Checks that a configured URL parses and uses an HTTP(S) scheme
fn validate_http_url(key: &str, value: &str) -> Result<(), ConfigError> {
    let url = Url::parse(value)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid {} '{}': {}", key, value, e)))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(ConfigError::InvalidUrl(format!(
            "{} '{}' must use http or https",
            key, value
        )));
    }

    Ok(())
}
