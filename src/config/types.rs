use serde::Deserialize;
use std::collections::HashMap;

/// Main configuration structure for pricecrawl
///
/// One config file describes a whole crawl session: shared output settings
/// plus one `[[crawler]]` table per target shop. Loaded once at session start
/// and immutable for the duration of the run.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub output: OutputConfig,

    #[serde(default, rename = "crawler")]
    pub crawlers: Vec<CrawlerConfig>,
}

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    /// Directory receiving one `<crawler-name>.json` file per crawler
    pub directory: String,
}

/// Which fetch capability a crawler uses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FetchKind {
    /// Plain HTTP GET, no JavaScript execution
    #[default]
    Http,

    /// Headless browser rendering, for JS-driven shops
    Browser,
}

/// Per-crawler configuration
#[derive(Debug, Clone, Deserialize)]
pub struct CrawlerConfig {
    /// Crawler name; also the output file stem
    pub name: String,

    /// Absolute URL of the first listing page
    #[serde(rename = "start-url")]
    pub start_url: String,

    /// User agent sent with every request
    #[serde(rename = "user-agent", default = "default_user_agent")]
    pub user_agent: String,

    /// Records accumulated in memory before a flush to the store
    #[serde(rename = "batch-size", default = "default_batch_size")]
    pub batch_size: usize,

    /// Fetch variant for this site
    #[serde(default)]
    pub fetch: FetchKind,

    /// How long the browser fetcher waits for dynamic content (milliseconds)
    #[serde(rename = "render-delay-ms", default = "default_render_delay_ms")]
    pub render_delay_ms: u64,

    /// Drop records whose identity URL was already seen in this run
    #[serde(default)]
    pub dedup: bool,

    /// Site-specific options; the selector rules live here
    #[serde(default)]
    pub options: HashMap<String, String>,
}

fn default_user_agent() -> String {
    "PricecrawlBot/1.0".to_string()
}

fn default_batch_size() -> usize {
    10
}

fn default_render_delay_ms() -> u64 {
    2000
}
