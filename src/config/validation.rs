use crate::config::types::{Config, ConnectionConfig, OutputConfig, SearchConfig, SiteEntry};
use crate::ConfigError;
use std::collections::HashSet;
use url::Url;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_sites(&config.sites)?;
    validate_connection_config(&config.connection)?;
    validate_search_config(&config.search)?;
    validate_output_config(&config.output)?;
    Ok(())
}

/// Validates the site list: at least one entry, unique http(s) roots
fn validate_sites(sites: &[SiteEntry]) -> Result<(), ConfigError> {
    if sites.is_empty() {
        return Err(ConfigError::Validation(
            "at least one [[site]] entry is required".to_string(),
        ));
    }

    let mut roots = HashSet::new();
    for entry in sites {
        if entry.name.trim().is_empty() {
            return Err(ConfigError::Validation(format!(
                "Site '{}' must have a non-empty name",
                entry.url
            )));
        }

        let url = Url::parse(&entry.url).map_err(|e| {
            ConfigError::InvalidUrl(format!("Invalid site URL '{}': {}", entry.url, e))
        })?;

        if url.scheme() != "http" && url.scheme() != "https" {
            return Err(ConfigError::Validation(format!(
                "Site URL '{}' must use HTTP or HTTPS",
                entry.url
            )));
        }

        if url.host_str().is_none() {
            return Err(ConfigError::InvalidUrl(format!(
                "Site URL '{}' has no host",
                entry.url
            )));
        }

        let key = crate::url::site_key(&url).map_err(|e| {
            ConfigError::InvalidUrl(format!("Invalid site URL '{}': {}", entry.url, e))
        })?;
        if !roots.insert(key) {
            return Err(ConfigError::Validation(format!(
                "Site URL '{}' is listed more than once",
                entry.url
            )));
        }
    }

    Ok(())
}

/// Validates connection configuration
fn validate_connection_config(config: &ConnectionConfig) -> Result<(), ConfigError> {
    if config.user_agent.trim().is_empty() {
        return Err(ConfigError::Validation(
            "user-agent cannot be empty".to_string(),
        ));
    }

    if !config.referrer.is_empty() {
        Url::parse(&config.referrer)
            .map_err(|e| ConfigError::InvalidUrl(format!("Invalid referrer: {}", e)))?;
    }

    if config.timeout_ms < 100 {
        return Err(ConfigError::Validation(format!(
            "timeout-ms must be >= 100ms, got {}ms",
            config.timeout_ms
        )));
    }

    Ok(())
}

/// Validates query engine configuration
fn validate_search_config(config: &SearchConfig) -> Result<(), ConfigError> {
    if !(config.frequency_cutoff > 0.0 && config.frequency_cutoff <= 1.0) {
        return Err(ConfigError::Validation(format!(
            "frequency-cutoff must be in (0, 1], got {}",
            config.frequency_cutoff
        )));
    }

    if config.default_limit < 1 {
        return Err(ConfigError::Validation(format!(
            "default-limit must be >= 1, got {}",
            config.default_limit
        )));
    }

    if config.snippet_words < 5 {
        return Err(ConfigError::Validation(format!(
            "snippet-words must be >= 5, got {}",
            config.snippet_words
        )));
    }

    Ok(())
}

/// Validates output configuration
fn validate_output_config(config: &OutputConfig) -> Result<(), ConfigError> {
    if config.database_path.is_empty() {
        return Err(ConfigError::Validation(
            "database-path cannot be empty".to_string(),
        ));
    }

    Ok(())
}
