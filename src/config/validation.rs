use crate::config::types::{
    BatchConfig, Config, CrawlerConfig, DetailRules, ListingRules, StorageConfig, UserAgentConfig,
};
use crate::encoder::{Dimension, Vocabularies};
use crate::ConfigError;
use regex::Regex;
use scraper::Selector;
use url::Url;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_crawler_config(&config.crawler)?;
    validate_user_agent_config(&config.user_agent)?;
    validate_storage_config(&config.storage)?;
    validate_batch_config(&config.batch)?;
    validate_vocabularies(&config.vocabulary)?;
    validate_listing_rules(&config.listing)?;
    validate_detail_rules(&config.detail)?;
    Ok(())
}

/// Compiles a CSS selector, mapping failures to a config error
pub(crate) fn compile_selector(selector: &str) -> Result<Selector, ConfigError> {
    Selector::parse(selector).map_err(|e| ConfigError::InvalidSelector {
        selector: selector.to_string(),
        message: format!("{:?}", e),
    })
}

/// Compiles a regex, mapping failures to a config error
pub(crate) fn compile_pattern(pattern: &str) -> Result<Regex, ConfigError> {
    Regex::new(pattern).map_err(|e| ConfigError::InvalidPattern {
        pattern: pattern.to_string(),
        message: e.to_string(),
    })
}

/// Validates crawler configuration
fn validate_crawler_config(config: &CrawlerConfig) -> Result<(), ConfigError> {
    Url::parse(&config.listing_url)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid listing_url: {}", e)))?;
    Url::parse(&config.site_origin)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid site_origin: {}", e)))?;

    if config.start_page < 1 {
        return Err(ConfigError::Validation(
            "start_page must be >= 1".to_string(),
        ));
    }

    if config.end_page < config.start_page {
        return Err(ConfigError::Validation(format!(
            "end_page ({}) must not be before start_page ({})",
            config.end_page, config.start_page
        )));
    }

    if config.workers < 1 || config.workers > 32 {
        return Err(ConfigError::Validation(format!(
            "workers must be between 1 and 32, got {}",
            config.workers
        )));
    }

    if config.timeout_secs < 1 {
        return Err(ConfigError::Validation(
            "timeout_secs must be >= 1".to_string(),
        ));
    }

    Ok(())
}

/// Validates user agent configuration
fn validate_user_agent_config(config: &UserAgentConfig) -> Result<(), ConfigError> {
    if config.crawler_name.is_empty() {
        return Err(ConfigError::Validation(
            "crawler_name cannot be empty".to_string(),
        ));
    }

    if !config
        .crawler_name
        .chars()
        .all(|c| c.is_alphanumeric() || c == '-')
    {
        return Err(ConfigError::Validation(format!(
            "crawler_name must contain only alphanumeric characters and hyphens, got '{}'",
            config.crawler_name
        )));
    }

    Url::parse(&config.contact_url)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid contact_url: {}", e)))?;

    validate_email(&config.contact_email)?;

    Ok(())
}

fn validate_storage_config(config: &StorageConfig) -> Result<(), ConfigError> {
    if config.database_path.is_empty() {
        return Err(ConfigError::Validation(
            "database_path cannot be empty".to_string(),
        ));
    }

    if config.cache_path.is_empty() {
        return Err(ConfigError::Validation(
            "cache_path cannot be empty".to_string(),
        ));
    }

    Ok(())
}

fn validate_batch_config(config: &BatchConfig) -> Result<(), ConfigError> {
    for (name, size) in [
        ("discovery_size", config.discovery_size),
        ("enrichment_size", config.enrichment_size),
        ("amenity_size", config.amenity_size),
    ] {
        if size < 1 {
            return Err(ConfigError::Validation(format!(
                "{} must be >= 1, got {}",
                name, size
            )));
        }
    }
    Ok(())
}

/// Every dimension needs at least one label and no zero-valued bits
fn validate_vocabularies(vocabularies: &Vocabularies) -> Result<(), ConfigError> {
    for dimension in Dimension::ALL {
        let vocabulary = vocabularies.get(dimension);
        if vocabulary.is_empty() {
            return Err(ConfigError::Validation(format!(
                "{} vocabulary cannot be empty",
                dimension
            )));
        }

        if let Some((label, _)) = vocabulary.iter().find(|(_, bit)| *bit == 0) {
            return Err(ConfigError::Validation(format!(
                "{} vocabulary label '{}' has a zero bit value",
                dimension, label
            )));
        }
    }
    Ok(())
}

fn validate_listing_rules(rules: &ListingRules) -> Result<(), ConfigError> {
    compile_selector(&rules.item_selector)?;
    compile_selector(&rules.link_selector)?;
    compile_selector(&rules.type_selector)?;
    compile_pattern(&rules.identifier_pattern)?;

    if !rules.identifier_template.contains("{1}") {
        return Err(ConfigError::Validation(
            "identifier_template must contain at least the {1} placeholder".to_string(),
        ));
    }

    Ok(())
}

fn validate_detail_rules(rules: &DetailRules) -> Result<(), ConfigError> {
    for selector in [
        &rules.root_selector,
        &rules.name_selector,
        &rules.info_item_selector,
        &rules.section_selector,
        &rules.heading_selector,
        &rules.intro_body_selector,
        &rules.schedule_table_selector,
        &rules.price_table_selector,
        &rules.gallery_selector,
    ] {
        compile_selector(selector)?;
    }
    compile_pattern(&rules.phone_hint_pattern)?;

    if rules.composite_delimiter.is_empty() {
        return Err(ConfigError::Validation(
            "composite_delimiter cannot be empty".to_string(),
        ));
    }

    Ok(())
}

/// Basic email validation
fn validate_email(email: &str) -> Result<(), ConfigError> {
    if email.is_empty() {
        return Err(ConfigError::Validation(
            "contact_email cannot be empty".to_string(),
        ));
    }

    let parts: Vec<&str> = email.split('@').collect();
    if parts.len() != 2 || parts[0].is_empty() || parts[1].is_empty() {
        return Err(ConfigError::Validation(format!(
            "Invalid email format: '{}'",
            email
        )));
    }

    if !parts[1].contains('.') {
        return Err(ConfigError::Validation(format!(
            "Invalid email domain: '{}'",
            email
        )));
    }

    Ok(())
}
