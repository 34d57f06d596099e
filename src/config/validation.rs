use crate::config::types::{
    ChunkingConfig, Config, CrawlerConfig, EscalationConfig, OutputConfig, RemoteStoreConfig,
    UserAgentConfig,
};
use crate::url::UrlFilter;
use crate::ConfigError;
use url::Url;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_crawler_config(&config.crawler)?;
    validate_user_agent_config(&config.user_agent)?;
    validate_output_config(&config.output)?;
    validate_escalation_config(&config.escalation)?;
    if let Some(remote) = &config.remote_store {
        validate_remote_store_config(remote)?;
    }
    validate_chunking_config(&config.chunking)?;
    Ok(())
}

/// Validates crawler configuration
fn validate_crawler_config(config: &CrawlerConfig) -> Result<(), ConfigError> {
    if config.allowed_domains.is_empty() {
        return Err(ConfigError::Validation(
            "allowed-domains must list at least one domain".to_string(),
        ));
    }

    for domain in &config.allowed_domains {
        validate_domain_string(domain)?;
    }

    if config.seeds.is_empty() {
        return Err(ConfigError::Validation(
            "seeds must contain at least one URL".to_string(),
        ));
    }

    // Every seed has to survive the same filter discovered links go through
    let filter = UrlFilter::new(config.allowed_domains.clone());
    for seed in &config.seeds {
        filter
            .normalize(seed)
            .map_err(|e| ConfigError::InvalidUrl(format!("Seed URL '{}': {}", seed, e)))?;
    }

    if config.max_pages < 1 {
        return Err(ConfigError::Validation(format!(
            "max-pages must be >= 1, got {}",
            config.max_pages
        )));
    }

    Ok(())
}

/// Validates the crawler identity
fn validate_user_agent_config(config: &UserAgentConfig) -> Result<(), ConfigError> {
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

    if config.crawler_version.is_empty() {
        return Err(ConfigError::Validation(
            "crawler-version cannot be empty".to_string(),
        ));
    }

    Url::parse(&config.contact_url)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid contact-url: {}", e)))?;

    Ok(())
}

/// Validates output configuration
fn validate_output_config(config: &OutputConfig) -> Result<(), ConfigError> {
    if config.corpus_path.is_empty() {
        return Err(ConfigError::Validation(
            "corpus-path cannot be empty".to_string(),
        ));
    }
    Ok(())
}

fn validate_escalation_config(config: &EscalationConfig) -> Result<(), ConfigError> {
    if config.render_timeout_secs == 0 {
        return Err(ConfigError::Validation(
            "render-timeout-secs must be >= 1".to_string(),
        ));
    }

    if config.pdf_ocr_page_limit < 1 {
        return Err(ConfigError::Validation(
            "pdf-ocr-page-limit must be >= 1".to_string(),
        ));
    }

    if config.ocr_selector.trim().is_empty() {
        return Err(ConfigError::Validation(
            "ocr-selector cannot be empty".to_string(),
        ));
    }

    if config.ocr_language.trim().is_empty() {
        return Err(ConfigError::Validation(
            "ocr-language cannot be empty".to_string(),
        ));
    }

    Ok(())
}

fn validate_remote_store_config(config: &RemoteStoreConfig) -> Result<(), ConfigError> {
    let url = Url::parse(&config.url)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid remote-store url: {}", e)))?;

    if url.scheme() != "https" && url.scheme() != "http" {
        return Err(ConfigError::InvalidUrl(format!(
            "remote-store url must be http(s), got '{}'",
            config.url
        )));
    }

    if config.table.is_empty() || config.chunk_table.is_empty() {
        return Err(ConfigError::Validation(
            "remote-store table and chunk-table cannot be empty".to_string(),
        ));
    }

    if config.service_key_env.is_empty() {
        return Err(ConfigError::Validation(
            "remote-store service-key-env cannot be empty".to_string(),
        ));
    }

    Ok(())
}

fn validate_chunking_config(config: &ChunkingConfig) -> Result<(), ConfigError> {
    if let Some(service_url) = &config.service_url {
        let url = Url::parse(service_url).map_err(|e| {
            ConfigError::InvalidUrl(format!("Invalid chunking service-url: {}", e))
        })?;
        if url.scheme() != "https" && url.scheme() != "http" {
            return Err(ConfigError::InvalidUrl(format!(
                "chunking service-url must be http(s), got '{}'",
                service_url
            )));
        }
    }

    if config.timeout_secs == 0 {
        return Err(ConfigError::Validation(
            "chunking timeout-secs must be >= 1".to_string(),
        ));
    }

    Ok(())
}

/// Validates an allow-listed domain suffix
fn validate_domain_string(domain: &str) -> Result<(), ConfigError> {
    if domain.is_empty() {
        return Err(ConfigError::InvalidDomain(
            "Domain cannot be empty".to_string(),
        ));
    }

    if !domain
        .chars()
        .all(|c| c.is_alphanumeric() || c == '.' || c == '-')
    {
        return Err(ConfigError::InvalidDomain(format!(
            "Domain '{}' contains invalid characters",
            domain
        )));
    }

    if domain.starts_with('.')
        || domain.ends_with('.')
        || domain.starts_with('-')
        || domain.ends_with('-')
    {
        return Err(ConfigError::InvalidDomain(format!(
            "Domain '{}' cannot start or end with '.' or '-'",
            domain
        )));
    }

    if domain.contains("..") {
        return Err(ConfigError::InvalidDomain(format!(
            "Domain '{}' cannot contain consecutive dots",
            domain
        )));
    }

    Ok(())
}
