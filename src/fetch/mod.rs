//! Fetch capabilities: retrieving raw page content for a URL
//!
//! Two variants exist behind one trait: a plain HTTP fetcher for static
//! shops and a headless-browser fetcher for JS-rendered ones. The engine
//! only ever sees the trait, so which variant a crawler uses is a
//! configuration choice, not a type hierarchy.

mod browser;
mod http;

pub use browser::BrowserFetcher;
pub use http::{build_http_client, HttpFetcher};

use crate::model::Page;
use async_trait::async_trait;
use thiserror::Error;
use url::Url;

/// Errors from the network/browser layer
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("Request timeout for {url}")]
    Timeout { url: String },

    #[error("Connection refused for {url}")]
    ConnectionRefused { url: String },

    #[error("HTTP {status} for {url}")]
    HttpStatus { url: String, status: u16 },

    #[error("Render error for {url}: {message}")]
    Render { url: String, message: String },
}

/// Abstraction over "retrieve raw page content for a URL"
///
/// Implementations may hold long-lived session resources (the browser
/// fetcher keeps a headless Chrome session open for the crawler's lifetime);
/// `shutdown` releases them and is called by the session on loop
/// termination regardless of success or failure.
#[async_trait]
pub trait FetchCapability: Send + Sync {
    /// Fetches the page at `url`
    async fn fetch(&self, url: &Url) -> Result<Page, FetchError>;

    /// Releases any long-lived session resources held by this capability
    async fn shutdown(&self) {}
}
