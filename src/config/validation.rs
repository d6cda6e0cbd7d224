use crate::config::types::{
    Config, CrawlConfig, ListingTarget, RenderConfig, SourcesConfig, StoreConfig,
};
use crate::ConfigError;
use url::Url;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_store_config(&config.store)?;
    validate_render_config(&config.render)?;
    validate_crawl_config(&config.crawl)?;
    validate_listing_targets(&config.listing)?;
    validate_sources_config(&config.sources)?;
    Ok(())
}

/// Validates record store configuration
fn validate_store_config(config: &StoreConfig) -> Result<(), ConfigError> {
    if config.database_path.is_empty() {
        return Err(ConfigError::Validation(
            "database_path cannot be empty".to_string(),
        ));
    }
    Ok(())
}

/// Validates render service configuration
fn validate_render_config(config: &RenderConfig) -> Result<(), ConfigError> {
    if let Some(endpoint) = &config.endpoint {
        validate_endpoint(endpoint)?;
    }

    if config.navigation_timeout_secs < 1 {
        return Err(ConfigError::Validation(format!(
            "navigation_timeout_secs must be >= 1, got {}",
            config.navigation_timeout_secs
        )));
    }

    if config.settle_millis < 100 {
        return Err(ConfigError::Validation(format!(
            "settle_millis must be >= 100ms, got {}ms",
            config.settle_millis
        )));
    }

    Ok(())
}

/// Validates crawl behavior configuration
fn validate_crawl_config(config: &CrawlConfig) -> Result<(), ConfigError> {
    // timeout_cooldown_secs of 0 is legal: continue immediately after a skip

    if let Some(days) = config.refresh_after_days {
        if days < 1 {
            return Err(ConfigError::Validation(format!(
                "refresh_after_days must be >= 1 when set, got {}",
                days
            )));
        }
    }

    Ok(())
}

/// Validates listing targets
fn validate_listing_targets(targets: &[ListingTarget]) -> Result<(), ConfigError> {
    if targets.is_empty() {
        return Err(ConfigError::Validation(
            "at least one [[listing]] target is required".to_string(),
        ));
    }

    for target in targets {
        if target.name.is_empty() {
            return Err(ConfigError::Validation(
                "listing target name cannot be empty".to_string(),
            ));
        }

        validate_http_url(&target.url, "listing URL")?;
    }

    Ok(())
}

/// Validates enrichment source configuration
fn validate_sources_config(config: &SourcesConfig) -> Result<(), ConfigError> {
    if config.storefront.is_none() && config.profile.is_none() {
        return Err(ConfigError::Validation(
            "at least one [sources.*] section is required".to_string(),
        ));
    }

    if let Some(storefront) = &config.storefront {
        validate_http_url(&storefront.base_url, "storefront base-url")?;
    }

    if let Some(profile) = &config.profile {
        validate_http_url(&profile.base_url, "profile base-url")?;

        if let Some(secs) = profile.wait_timeout_secs {
            if secs < 1 {
                return Err(ConfigError::Validation(format!(
                    "profile wait_timeout_secs must be >= 1 when set, got {}",
                    secs
                )));
            }
        }
    }

    Ok(())
}

/// Validates a remote debugging endpoint ("host:port", no scheme)
fn validate_endpoint(endpoint: &str) -> Result<(), ConfigError> {
    if endpoint.is_empty() {
        return Err(ConfigError::Validation(
            "render endpoint cannot be empty".to_string(),
        ));
    }

    if endpoint.contains("://") {
        return Err(ConfigError::Validation(format!(
            "render endpoint must be 'host:port' without a scheme, got '{}'",
            endpoint
        )));
    }

    let Some((host, port)) = endpoint.rsplit_once(':') else {
        return Err(ConfigError::Validation(format!(
            "render endpoint must be 'host:port', got '{}'",
            endpoint
        )));
    };

    if host.is_empty() {
        return Err(ConfigError::Validation(format!(
            "render endpoint has an empty host: '{}'",
            endpoint
        )));
    }

    if port.parse::<u16>().is_err() {
        return Err(ConfigError::Validation(format!(
            "render endpoint port must be a number in 1-65535, got '{}'",
            port
        )));
    }

    Ok(())
}

/// Validates that a string is an absolute http(s) URL
fn validate_http_url(value: &str, what: &str) -> Result<(), ConfigError> {
    let url = Url::parse(value)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid {} '{}': {}", what, value, e)))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(ConfigError::Validation(format!(
            "{} '{}' must use http or https",
            what, value
        )));
    }

    Ok(())
}
