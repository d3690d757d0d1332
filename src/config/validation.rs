use crate::config::types::{Config, CrawlerConfig};
use crate::parse::SelectorRules;
use crate::{ConfigError, ConfigResult};
use std::collections::HashSet;
use url::Url;

/// Validates the entire configuration
pub fn validate(config: &Config) -> ConfigResult<()> {
    validate_output(config)?;

    if config.crawlers.is_empty() {
        return Err(ConfigError::Validation(
            "config must define at least one [[crawler]]".to_string(),
        ));
    }

    let mut names = HashSet::new();
    for crawler in &config.crawlers {
        validate_crawler(crawler)?;
        if !names.insert(crawler.name.as_str()) {
            return Err(ConfigError::Validation(format!(
                "duplicate crawler name '{}': names must be unique, they are also output file names",
                crawler.name
            )));
        }
    }

    Ok(())
}

fn validate_output(config: &Config) -> ConfigResult<()> {
    if config.output.directory.is_empty() {
        return Err(ConfigError::Validation(
            "output.directory cannot be empty".to_string(),
        ));
    }
    Ok(())
}

/// Validates one crawler entry
fn validate_crawler(crawler: &CrawlerConfig) -> ConfigResult<()> {
    // Name doubles as the output file stem, so keep it filesystem-safe
    if crawler.name.is_empty() {
        return Err(ConfigError::Validation(
            "crawler name cannot be empty".to_string(),
        ));
    }
    if !crawler
        .name
        .chars()
        .all(|c| c.is_alphanumeric() || c == '-' || c == '_')
    {
        return Err(ConfigError::Validation(format!(
            "crawler name must contain only alphanumeric characters, hyphens and underscores, got '{}'",
            crawler.name
        )));
    }

    // start-url must be a syntactically valid absolute http(s) URL
    let url = Url::parse(&crawler.start_url)
        .map_err(|e| ConfigError::InvalidUrl(format!("{}: {}", crawler.start_url, e)))?;
    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(ConfigError::InvalidUrl(format!(
            "start-url must be http or https, got '{}'",
            crawler.start_url
        )));
    }

    if crawler.batch_size < 1 {
        return Err(ConfigError::Validation(format!(
            "batch-size must be >= 1 for crawler '{}'",
            crawler.name
        )));
    }

    if crawler.user_agent.is_empty() {
        return Err(ConfigError::Validation(format!(
            "user-agent cannot be empty for crawler '{}'",
            crawler.name
        )));
    }

    if crawler.render_delay_ms > 60_000 {
        return Err(ConfigError::Validation(format!(
            "render-delay-ms must be <= 60000, got {} for crawler '{}'",
            crawler.render_delay_ms, crawler.name
        )));
    }

    // Compile the selector rules now so bad selectors fail at load time, not
    // in the middle of a crawl.
    SelectorRules::from_options(&crawler.options).map_err(|e| {
        ConfigError::InvalidSelector(format!("crawler '{}': {}", crawler.name, e))
    })?;

    Ok(())
}
