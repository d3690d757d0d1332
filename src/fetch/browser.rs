//! Headless-browser fetcher for JS-rendered shops
//!
//! Some targets (Alza-style listings) only materialize product data after
//! client-side rendering, so a plain GET returns an empty shell. This
//! fetcher drives a headless Chromium session via CDP, waits out a
//! configurable render delay, and hands the rendered DOM back as text.
//!
//! The browser session is a long-lived resource owned by exactly one
//! crawler; `shutdown` must run on loop termination regardless of outcome.

use crate::fetch::{FetchCapability, FetchError};
use crate::model::Page;
use async_trait::async_trait;
use chromiumoxide::error::CdpError;
use chromiumoxide::{Browser, BrowserConfig};
use futures::StreamExt;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use url::Url;

/// Fetch capability backed by a headless Chromium session
pub struct BrowserFetcher {
    browser: Mutex<Browser>,
    handler_task: JoinHandle<()>,
    user_agent: String,
    render_delay: Duration,
}

impl BrowserFetcher {
    /// Launches a headless browser session
    ///
    /// # Arguments
    ///
    /// * `user_agent` - User agent string presented to the site
    /// * `render_delay` - How long to wait for dynamic content after navigation
    pub async fn launch(user_agent: &str, render_delay: Duration) -> Result<Self, FetchError> {
        let config = BrowserConfig::builder()
            .no_sandbox()
            .arg("--disable-gpu")
            .arg("--disable-dev-shm-usage")
            .request_timeout(Duration::from_secs(30))
            .build()
            .map_err(launch_error)?;

        let (browser, mut handler) = Browser::launch(config)
            .await
            .map_err(launch_error)?;

        // Drive browser events until the session ends
        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if event.is_err() {
                    break;
                }
            }
        });

        Ok(Self {
            browser: Mutex::new(browser),
            handler_task,
            user_agent: user_agent.to_string(),
            render_delay,
        })
    }
}

#[async_trait]
impl FetchCapability for BrowserFetcher {
    async fn fetch(&self, url: &Url) -> Result<Page, FetchError> {
        let browser = self.browser.lock().await;

        let page = browser
            .new_page("about:blank")
            .await
            .map_err(|e| render_error(url, e))?;

        let result = async {
            page.set_user_agent(&self.user_agent)
                .await
                .map_err(|e| render_error(url, e))?;

            page.goto(url.as_str())
                .await
                .map_err(|e| render_error(url, e))?;
            page.wait_for_navigation()
                .await
                .map_err(|e| render_error(url, e))?;

            // Give client-side rendering time to fill in the listing
            tokio::time::sleep(self.render_delay).await;

            let body = page.content().await.map_err(|e| render_error(url, e))?;

            // Prefer the URL the browser ended up on (redirects)
            let final_url = match page.url().await {
                Ok(Some(current)) => Url::parse(&current).unwrap_or_else(|_| url.clone()),
                _ => url.clone(),
            };

            Ok(Page::new(final_url, body))
        }
        .await;

        // Close the tab whether or not the fetch succeeded
        let _ = page.close().await;

        result
    }

    async fn shutdown(&self) {
        let mut browser = self.browser.lock().await;
        if let Err(e) = browser.close().await {
            tracing::debug!("Browser close failed: {}", e);
        }
        self.handler_task.abort();
    }
}

/// Maps a CDP error onto the fetch error taxonomy
fn render_error(url: &Url, error: CdpError) -> FetchError {
    match error {
        CdpError::Timeout => FetchError::Timeout {
            url: url.to_string(),
        },
        other => FetchError::Render {
            url: url.to_string(),
            message: other.to_string(),
        },
    }
}

fn launch_error(error: impl std::fmt::Display) -> FetchError {
    FetchError::Render {
        url: "about:blank".to_string(),
        message: format!("browser launch failed: {}", error),
    }
}
