//! Crawl session - running configured crawlers to completion
//!
//! A session turns a validated configuration into one engine run per
//! crawler, executed as independent concurrent tasks. Crawlers share no
//! mutable state (each writes its own destination file), so the only
//! coupling is the shared cancellation flag. One crawler's failure never
//! aborts a sibling: every outcome, good or bad, lands in the aggregated
//! report.

use crate::config::{Config, CrawlerConfig, FetchKind};
use crate::crawler::engine::{CancelFlag, CrawlerEngine};
use crate::fetch::{BrowserFetcher, FetchCapability, HttpFetcher};
use crate::model::{CrawlFailure, CrawlResult, CrawlStatus};
use crate::parse::build_parser;
use crate::store::JsonStore;
use crate::{PricecrawlError, Result};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Coordinates one batch run of every configured crawler
pub struct CrawlSession {
    output_dir: PathBuf,
    cancel: CancelFlag,
}

impl CrawlSession {
    /// Creates a session writing into the configured output directory
    pub fn new(config: &Config) -> Self {
        Self {
            output_dir: PathBuf::from(&config.output.directory),
            cancel: CancelFlag::new(),
        }
    }

    /// A handle callers can use to stop the session between page fetches
    pub fn cancel_flag(&self) -> CancelFlag {
        self.cancel.clone()
    }

    /// Runs every crawler to completion and aggregates the results
    ///
    /// Results come back in configuration order, one per crawler,
    /// regardless of which tasks finished first or failed.
    pub async fn run(&self, configs: &[CrawlerConfig]) -> Vec<CrawlResult> {
        tracing::info!(crawlers = configs.len(), "Crawl session started");

        let mut handles = Vec::with_capacity(configs.len());
        for config in configs {
            let config = config.clone();
            let output_dir = self.output_dir.clone();
            let cancel = self.cancel.clone();
            let name = config.name.clone();
            let handle = tokio::spawn(run_crawler(config, output_dir, cancel));
            handles.push((name, handle));
        }

        let mut results = Vec::with_capacity(handles.len());
        for (name, handle) in handles {
            let result = match handle.await {
                Ok(result) => result,
                Err(e) => {
                    // A panicked crawler task is contained like any other
                    // per-crawler failure
                    tracing::error!(crawler = %name, error = %e, "Crawler task aborted");
                    CrawlResult {
                        crawler_name: name,
                        pages_visited: 0,
                        records_written: 0,
                        status: CrawlStatus::Failure,
                        error: Some(CrawlFailure::Setup(format!("crawler task aborted: {}", e))),
                    }
                }
            };
            results.push(result);
        }

        let succeeded = results.iter().filter(|r| r.is_success()).count();
        tracing::info!(
            total = results.len(),
            succeeded,
            "Crawl session finished"
        );

        results
    }
}

/// Builds the strategy pair for one crawler and binds it into an engine
async fn build_engine(
    config: &CrawlerConfig,
    output_dir: &Path,
    cancel: CancelFlag,
) -> Result<CrawlerEngine> {
    let parser = build_parser(config)?;
    let store = JsonStore::create(output_dir, &config.name)?;

    // The browser session, when used, is exclusively owned by this crawler;
    // it is never shared across concurrent crawlers.
    let fetcher: Box<dyn FetchCapability> = match config.fetch {
        FetchKind::Http => Box::new(HttpFetcher::new(&config.user_agent)?),
        FetchKind::Browser => {
            let delay = Duration::from_millis(config.render_delay_ms);
            Box::new(BrowserFetcher::launch(&config.user_agent, delay).await?)
        }
    };

    Ok(CrawlerEngine::new(config, fetcher, parser, Box::new(store), cancel)?)
}

/// Maps a setup error onto the failure cause the result carries
fn setup_cause(error: PricecrawlError) -> CrawlFailure {
    match error {
        PricecrawlError::Fetch(e) => CrawlFailure::Fetch(e),
        PricecrawlError::Store(e) => CrawlFailure::Store(e),
        other => CrawlFailure::Setup(other.to_string()),
    }
}

async fn run_crawler(config: CrawlerConfig, output_dir: PathBuf, cancel: CancelFlag) -> CrawlResult {
    match build_engine(&config, &output_dir, cancel).await {
        Ok(engine) => engine.run().await,
        Err(e) => {
            tracing::error!(crawler = %config.name, error = %e, "Crawler setup failed");
            CrawlResult {
                crawler_name: config.name,
                pages_visited: 0,
                records_written: 0,
                status: CrawlStatus::Failure,
                error: Some(setup_cause(e)),
            }
        }
    }
}
