//! Pricecrawl: a batch crawler for e-commerce product data
//!
//! This crate implements the crawler framework that collects structured
//! product records (price, title, hardware specs) from multiple shop sites.
//! Each configured crawler pairs a fetch capability with a page parser and
//! runs the shared pagination engine to completion; records are persisted as
//! per-crawler JSON arrays for downstream analytics tooling.

pub mod config;
pub mod crawler;
pub mod fetch;
pub mod model;
pub mod parse;
pub mod store;
pub mod urlutil;

use thiserror::Error;

/// Main error type for pricecrawl operations
///
/// Covers everything that can go wrong before a crawler's loop starts;
/// failures inside a running crawl are folded into
/// `model::CrawlFailure` by the engine instead of surfacing here.
#[derive(Debug, Error)]
pub enum PricecrawlError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Fetch error: {0}")]
    Fetch(#[from] fetch::FetchError),

    #[error("Store error: {0}")]
    Store(#[from] store::StoreError),

    #[error("URL parse error: {0}")]
    UrlParse(#[from] url::ParseError),

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),

    #[error("Invalid selector rule: {0}")]
    InvalidSelector(String),
}

/// Result type alias for pricecrawl operations
pub type Result<T> = std::result::Result<T, PricecrawlError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

// Re-export commonly used types
pub use config::Config;
pub use crawler::{CrawlSession, CrawlerEngine};
pub use model::{CrawlResult, CrawlStatus, Page, PaginationCursor, Record};
