//! Plain HTTP fetcher
//!
//! Issues a GET with the configured user agent and returns the body as text.
//! No JavaScript execution; shops whose listings are server-rendered use this
//! variant.

use crate::fetch::{FetchCapability, FetchError};
use crate::model::Page;
use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;
use url::Url;

/// Builds an HTTP client with proper configuration
///
/// # Arguments
///
/// * `user_agent` - The user agent string to send with every request
pub fn build_http_client(user_agent: &str) -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(user_agent)
        .timeout(Duration::from_secs(30))
        .connect_timeout(Duration::from_secs(10))
        .gzip(true)
        .brotli(true)
        .build()
}

/// Fetch capability backed by a plain reqwest client
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    /// Creates a fetcher with a client configured for the given user agent
    pub fn new(user_agent: &str) -> Result<Self, reqwest::Error> {
        Ok(Self {
            client: build_http_client(user_agent)?,
        })
    }

    /// Creates a fetcher around an existing client
    pub fn with_client(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl FetchCapability for HttpFetcher {
    async fn fetch(&self, url: &Url) -> Result<Page, FetchError> {
        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| classify_error(e, url))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::HttpStatus {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        // The URL after redirects, so relative links resolve correctly
        let final_url = response.url().clone();

        let body = response
            .text()
            .await
            .map_err(|e| classify_error(e, url))?;

        Ok(Page::new(final_url, body))
    }
}

/// Maps a reqwest error onto the fetch error taxonomy
fn classify_error(error: reqwest::Error, url: &Url) -> FetchError {
    if error.is_timeout() {
        FetchError::Timeout {
            url: url.to_string(),
        }
    } else if error.is_connect() {
        FetchError::ConnectionRefused {
            url: url.to_string(),
        }
    } else {
        // Catch-all for transport-layer failures (decode errors, broken
        // connections mid-body)
        FetchError::Render {
            url: url.to_string(),
            message: error.to_string(),
        }
    }
}
