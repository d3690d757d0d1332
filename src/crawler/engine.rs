//! Crawler engine - the shared pagination and accumulation loop
//!
//! One engine instance drives one crawler run: it threads the pagination
//! cursor through successive fetch/parse steps, accumulates records up to
//! the configured batch size, flushes them to the store, and folds every
//! failure into a terminal `CrawlResult` instead of letting it escape. The
//! loop is written exactly once here; which site it crawls is decided by the
//! injected fetch capability and parser.

use crate::config::CrawlerConfig;
use crate::fetch::FetchCapability;
use crate::model::{
    CrawlFailure, CrawlResult, CrawlStatus, PaginationCursor, Record, FETCHED_AT_FIELD,
};
use crate::parse::PageParser;
use crate::store::RecordStore;
use chrono::Utc;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use url::Url;

/// Session-level cancellation signal
///
/// Observed between pagination iterations, so a long crawl stops without
/// waiting for further page fetches and leaves the store flushed and
/// consistent rather than mid-record.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests cancellation of every engine holding this flag
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Engine loop states, in pagination order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EngineState {
    Idle,
    Fetching,
    Parsing,
    Accumulating,
    Flushing,
    Done,
    Failed,
}

/// The shared orchestration loop for one configured crawler
pub struct CrawlerEngine {
    name: String,
    start_url: Url,
    batch_size: usize,
    dedup: bool,
    fetcher: Box<dyn FetchCapability>,
    parser: Box<dyn PageParser>,
    store: Box<dyn RecordStore>,
    cancel: CancelFlag,
    state: EngineState,
}

impl CrawlerEngine {
    /// Binds a fetch capability, a parser and a store to one crawler config
    pub fn new(
        config: &CrawlerConfig,
        fetcher: Box<dyn FetchCapability>,
        parser: Box<dyn PageParser>,
        store: Box<dyn RecordStore>,
        cancel: CancelFlag,
    ) -> Result<Self, url::ParseError> {
        let start_url = Url::parse(&config.start_url)?;
        Ok(Self {
            name: config.name.clone(),
            start_url,
            batch_size: config.batch_size.max(1),
            dedup: config.dedup,
            fetcher,
            parser,
            store,
            cancel,
            state: EngineState::Idle,
        })
    }

    fn transition(&mut self, next: EngineState) {
        tracing::trace!(crawler = %self.name, from = ?self.state, to = ?next, "Engine state");
        self.state = next;
    }

    /// Runs the crawl loop to completion
    ///
    /// Never returns an error: fetch and parse failures terminate the loop
    /// with a degraded status, store failures with `Failure`. The fetch
    /// capability is shut down on every exit path.
    pub async fn run(mut self) -> CrawlResult {
        tracing::info!(crawler = %self.name, start_url = %self.start_url, "Crawl started");

        let mut cursor = Some(PaginationCursor::new(self.start_url.clone()));
        let mut visited: HashSet<String> = HashSet::new();
        let mut seen_identities: HashSet<String> = HashSet::new();
        let mut collected: Vec<Record> = Vec::new();

        let mut pages_visited = 0usize;
        let mut records_written = 0usize;
        let mut failure: Option<CrawlFailure> = None;
        let mut store_failed = false;
        let mut cancelled = false;

        'crawl: while let Some(current) = cursor.take() {
            if self.cancel.is_cancelled() {
                tracing::info!(crawler = %self.name, "Cancellation requested, stopping crawl");
                cancelled = true;
                break;
            }

            // Cycle guard: a cursor equal to the current or any previously
            // seen one terminates the loop instead of repeating it, so one
            // site's pagination bug cannot hang the whole session.
            if !visited.insert(current.guard_key()) {
                tracing::warn!(
                    crawler = %self.name,
                    cursor = %current,
                    "Pagination cursor already visited, stopping crawl"
                );
                break;
            }

            self.transition(EngineState::Fetching);
            let page = match self.fetcher.fetch(current.url()).await {
                Ok(page) => page,
                Err(e) => {
                    tracing::error!(crawler = %self.name, url = %current, error = %e, "Fetch failed");
                    failure = Some(e.into());
                    break;
                }
            };
            tracing::debug!(crawler = %self.name, url = %page.url, bytes = page.body.len(), "Page fetched");

            self.transition(EngineState::Parsing);
            let parsed = match self.parser.parse(&page) {
                Ok(parsed) => parsed,
                Err(e) => {
                    tracing::error!(crawler = %self.name, url = %page.url, error = %e, "Parse failed");
                    failure = Some(e.into());
                    break;
                }
            };
            pages_visited += 1;

            self.transition(EngineState::Accumulating);
            let fetched_at = Utc::now().to_rfc3339();
            for mut record in parsed.records {
                if self.dedup {
                    if let Some(identity) = record.identity() {
                        if !seen_identities.insert(identity.to_string()) {
                            tracing::debug!(crawler = %self.name, identity, "Duplicate record dropped");
                            continue;
                        }
                    }
                }
                // Parsers may stamp their own timestamp (mocked pages do)
                record.insert_if_absent(FETCHED_AT_FIELD, fetched_at.clone());
                collected.push(record);
            }

            // Flush full batches, keeping memory bounded by batch_size
            while collected.len() >= self.batch_size {
                self.transition(EngineState::Flushing);
                let batch: Vec<Record> = collected.drain(..self.batch_size).collect();
                if let Err(e) = self.store.append(&batch) {
                    tracing::error!(crawler = %self.name, error = %e, "Flush failed");
                    failure = Some(e.into());
                    store_failed = true;
                    break 'crawl;
                }
                records_written += batch.len();
                tracing::debug!(crawler = %self.name, flushed = batch.len(), total = records_written, "Batch flushed");
            }

            cursor = parsed.next;
        }

        // Remainder / salvage flush: on natural termination this writes what
        // is left below batch size; after a fetch or parse error it persists
        // the records collected before the failure.
        if !store_failed && !collected.is_empty() {
            self.transition(EngineState::Flushing);
            match self.store.append(&collected) {
                Ok(()) => {
                    records_written += collected.len();
                    tracing::debug!(crawler = %self.name, flushed = collected.len(), "Remainder flushed");
                }
                Err(e) => {
                    tracing::error!(crawler = %self.name, error = %e, "Remainder flush failed");
                    failure = Some(e.into());
                    store_failed = true;
                }
            }
        }

        if !store_failed {
            if let Err(e) = self.store.finalize() {
                tracing::error!(crawler = %self.name, error = %e, "Store finalize failed");
                failure = Some(e.into());
                store_failed = true;
            }
        }

        // Long-lived fetch resources are released on every exit path
        self.fetcher.shutdown().await;

        let status = if store_failed {
            // Partial or corrupt output is worse than no output
            CrawlStatus::Failure
        } else if failure.is_none() && !cancelled {
            CrawlStatus::Success
        } else if records_written > 0 {
            CrawlStatus::PartialFailure
        } else {
            CrawlStatus::Failure
        };

        self.transition(match status {
            CrawlStatus::Success => EngineState::Done,
            _ => EngineState::Failed,
        });

        tracing::info!(
            crawler = %self.name,
            pages = pages_visited,
            records = records_written,
            status = ?status,
            "Crawl finished"
        );

        CrawlResult {
            crawler_name: self.name,
            pages_visited,
            records_written,
            status,
            error: failure,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FetchKind;
    use crate::fetch::FetchError;
    use crate::model::{Page, IDENTITY_FIELD};
    use crate::parse::{ParseError, Parsed};
    use crate::store::MemoryStore;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// Fetcher serving canned bodies (or errors) keyed by URL
    struct MockFetcher {
        pages: HashMap<String, String>,
        timeouts: HashSet<String>,
        shutdowns: Arc<AtomicBool>,
    }

    impl MockFetcher {
        fn new() -> Self {
            Self {
                pages: HashMap::new(),
                timeouts: HashSet::new(),
                shutdowns: Arc::new(AtomicBool::new(false)),
            }
        }

        fn page(mut self, url: &str, body: &str) -> Self {
            self.pages.insert(url.to_string(), body.to_string());
            self
        }

        fn timeout(mut self, url: &str) -> Self {
            self.timeouts.insert(url.to_string());
            self
        }
    }

    #[async_trait]
    impl FetchCapability for MockFetcher {
        async fn fetch(&self, url: &Url) -> Result<Page, FetchError> {
            let key = url.to_string();
            if self.timeouts.contains(&key) {
                return Err(FetchError::Timeout { url: key });
            }
            match self.pages.get(&key) {
                Some(body) => Ok(Page::new(url.clone(), body.clone())),
                None => Err(FetchError::HttpStatus {
                    url: key,
                    status: 404,
                }),
            }
        }

        async fn shutdown(&self) {
            self.shutdowns.store(true, Ordering::Relaxed);
        }
    }

    /// Parser outcome scripted per page URL
    enum Outcome {
        Records { count: usize, next: Option<&'static str> },
        Fail(ParseError),
    }

    struct MockParser {
        outcomes: Mutex<HashMap<String, Outcome>>,
    }

    impl MockParser {
        fn new() -> Self {
            Self {
                outcomes: Mutex::new(HashMap::new()),
            }
        }

        fn on(self, url: &str, outcome: Outcome) -> Self {
            self.outcomes
                .lock()
                .unwrap()
                .insert(url.to_string(), outcome);
            self
        }
    }

    impl crate::parse::PageParser for MockParser {
        fn parse(&self, page: &Page) -> Result<Parsed, ParseError> {
            let mut outcomes = self.outcomes.lock().unwrap();
            match outcomes.remove(page.url.as_str()) {
                Some(Outcome::Records { count, next }) => {
                    let records = (0..count)
                        .map(|i| {
                            let mut record = Record::new();
                            record.insert(
                                IDENTITY_FIELD,
                                format!("{}#item-{}", page.url, i),
                            );
                            record.insert(FETCHED_AT_FIELD, "2024-01-01T00:00:00Z");
                            record
                        })
                        .collect();
                    Ok(Parsed {
                        records,
                        next: next.map(|u| PaginationCursor::new(Url::parse(u).unwrap())),
                    })
                }
                Some(Outcome::Fail(e)) => Err(e),
                None => Err(ParseError::StructureChanged {
                    url: page.url.to_string(),
                    detail: "unexpected page in test".to_string(),
                }),
            }
        }
    }

    /// Store handle that stays observable after the engine takes ownership
    #[derive(Clone)]
    struct SharedStore(Arc<Mutex<MemoryStore>>);

    impl SharedStore {
        fn new() -> Self {
            Self(Arc::new(Mutex::new(MemoryStore::new())))
        }

        fn flush_sizes(&self) -> Vec<usize> {
            self.0.lock().unwrap().flush_sizes().to_vec()
        }

        fn is_finalized(&self) -> bool {
            self.0.lock().unwrap().is_finalized()
        }
    }

    impl crate::store::RecordStore for SharedStore {
        fn append(&mut self, records: &[Record]) -> crate::store::StoreResult<()> {
            self.0.lock().unwrap().append(records)
        }

        fn finalize(&mut self) -> crate::store::StoreResult<()> {
            self.0.lock().unwrap().finalize()
        }
    }

    fn test_config(batch_size: usize) -> CrawlerConfig {
        CrawlerConfig {
            name: "testshop".to_string(),
            start_url: "https://shop.example/page1".to_string(),
            user_agent: "TestBot/1.0".to_string(),
            batch_size,
            fetch: FetchKind::Http,
            render_delay_ms: 0,
            dedup: false,
            options: HashMap::new(),
        }
    }

    fn engine_with(
        config: &CrawlerConfig,
        fetcher: MockFetcher,
        parser: MockParser,
        store: MemoryStore,
        cancel: CancelFlag,
    ) -> (CrawlerEngine, Arc<AtomicBool>) {
        let shutdowns = fetcher.shutdowns.clone();
        let engine = CrawlerEngine::new(
            config,
            Box::new(fetcher),
            Box::new(parser),
            Box::new(store),
            cancel,
        )
        .unwrap();
        (engine, shutdowns)
    }

    #[tokio::test]
    async fn test_two_pages_batch_flushes() {
        // page1: 3 records, batch_size 2 -> flush of 2, remainder 1
        // page2: 1 record -> flush of 2 at loop end
        let fetcher = MockFetcher::new()
            .page("https://shop.example/page1", "page one")
            .page("https://shop.example/page2", "page two");
        let parser = MockParser::new()
            .on(
                "https://shop.example/page1",
                Outcome::Records {
                    count: 3,
                    next: Some("https://shop.example/page2"),
                },
            )
            .on(
                "https://shop.example/page2",
                Outcome::Records {
                    count: 1,
                    next: None,
                },
            );

        let store = SharedStore::new();
        let shutdowns = fetcher.shutdowns.clone();
        let config = test_config(2);
        let engine = CrawlerEngine::new(
            &config,
            Box::new(fetcher),
            Box::new(parser),
            Box::new(store.clone()),
            CancelFlag::new(),
        )
        .unwrap();
        let result = engine.run().await;

        assert_eq!(result.status, CrawlStatus::Success);
        assert_eq!(result.pages_visited, 2);
        assert_eq!(result.records_written, 4);
        assert!(result.error.is_none());
        // 3 records on page 1 flush one full batch; the fourth record fills
        // the second batch at loop end. Two flushes of exactly batch size.
        assert_eq!(store.flush_sizes(), vec![2, 2]);
        assert!(store.is_finalized());
        assert!(shutdowns.load(Ordering::Relaxed));
    }

    #[tokio::test]
    async fn test_cycle_guard_terminates() {
        // The parser keeps pointing back at page1; the engine must stop
        // instead of looping forever.
        let fetcher = MockFetcher::new().page("https://shop.example/page1", "page one");
        let parser = MockParser::new().on(
            "https://shop.example/page1",
            Outcome::Records {
                count: 1,
                next: Some("https://shop.example/page1"),
            },
        );

        let config = test_config(10);
        let (engine, _) = engine_with(
            &config,
            fetcher,
            parser,
            MemoryStore::new(),
            CancelFlag::new(),
        );
        let result = engine.run().await;

        assert_eq!(result.status, CrawlStatus::Success);
        assert_eq!(result.pages_visited, 1);
        assert_eq!(result.records_written, 1);
    }

    #[tokio::test]
    async fn test_first_fetch_timeout_is_failure() {
        let fetcher = MockFetcher::new().timeout("https://shop.example/page1");
        let parser = MockParser::new();

        let config = test_config(10);
        let (engine, shutdowns) = engine_with(
            &config,
            fetcher,
            parser,
            MemoryStore::new(),
            CancelFlag::new(),
        );
        let result = engine.run().await;

        assert_eq!(result.status, CrawlStatus::Failure);
        assert_eq!(result.records_written, 0);
        assert!(matches!(
            result.error,
            Some(CrawlFailure::Fetch(FetchError::Timeout { .. }))
        ));
        // Session resources released even on failure
        assert!(shutdowns.load(Ordering::Relaxed));
    }

    #[tokio::test]
    async fn test_parse_failure_salvages_collected_records() {
        let fetcher = MockFetcher::new()
            .page("https://shop.example/page1", "page one")
            .page("https://shop.example/page2", "page two");
        let parser = MockParser::new()
            .on(
                "https://shop.example/page1",
                Outcome::Records {
                    count: 2,
                    next: Some("https://shop.example/page2"),
                },
            )
            .on(
                "https://shop.example/page2",
                Outcome::Fail(ParseError::StructureChanged {
                    url: "https://shop.example/page2".to_string(),
                    detail: "markup changed".to_string(),
                }),
            );

        let config = test_config(10);
        let (engine, _) = engine_with(
            &config,
            fetcher,
            parser,
            MemoryStore::new(),
            CancelFlag::new(),
        );
        let result = engine.run().await;

        assert_eq!(result.status, CrawlStatus::PartialFailure);
        assert_eq!(result.records_written, 2);
        assert!(matches!(
            result.error,
            Some(CrawlFailure::Parse(ParseError::StructureChanged { .. }))
        ));
    }

    #[tokio::test]
    async fn test_store_failure_is_failure_even_with_records() {
        let fetcher = MockFetcher::new().page("https://shop.example/page1", "page one");
        let parser = MockParser::new().on(
            "https://shop.example/page1",
            Outcome::Records {
                count: 3,
                next: None,
            },
        );

        let config = test_config(2);
        let (engine, _) = engine_with(
            &config,
            fetcher,
            parser,
            MemoryStore::failing(),
            CancelFlag::new(),
        );
        let result = engine.run().await;

        assert_eq!(result.status, CrawlStatus::Failure);
        assert!(matches!(result.error, Some(CrawlFailure::Store(_))));
    }

    #[tokio::test]
    async fn test_batch_size_one_flushes_every_record() {
        let fetcher = MockFetcher::new().page("https://shop.example/page1", "page one");
        let parser = MockParser::new().on(
            "https://shop.example/page1",
            Outcome::Records {
                count: 3,
                next: None,
            },
        );

        let config = test_config(1);
        let (engine, _) = engine_with(
            &config,
            fetcher,
            parser,
            MemoryStore::new(),
            CancelFlag::new(),
        );
        let result = engine.run().await;

        assert_eq!(result.status, CrawlStatus::Success);
        assert_eq!(result.records_written, 3);
    }

    #[tokio::test]
    async fn test_remainder_flushed_once_below_batch_size() {
        let fetcher = MockFetcher::new().page("https://shop.example/page1", "page one");
        let parser = MockParser::new().on(
            "https://shop.example/page1",
            Outcome::Records {
                count: 2,
                next: None,
            },
        );

        let config = test_config(10);
        let (engine, _) = engine_with(
            &config,
            fetcher,
            parser,
            MemoryStore::new(),
            CancelFlag::new(),
        );
        let result = engine.run().await;

        assert_eq!(result.status, CrawlStatus::Success);
        assert_eq!(result.records_written, 2);
    }

    #[tokio::test]
    async fn test_cancellation_before_first_fetch() {
        let fetcher = MockFetcher::new().page("https://shop.example/page1", "page one");
        let parser = MockParser::new();

        let cancel = CancelFlag::new();
        cancel.cancel();

        let config = test_config(10);
        let (engine, shutdowns) =
            engine_with(&config, fetcher, parser, MemoryStore::new(), cancel);
        let result = engine.run().await;

        assert_eq!(result.pages_visited, 0);
        assert_eq!(result.records_written, 0);
        assert_eq!(result.status, CrawlStatus::Failure);
        assert!(result.error.is_none());
        assert!(shutdowns.load(Ordering::Relaxed));
    }

    #[tokio::test]
    async fn test_cancellation_midcrawl_flushes_collected_records() {
        // The flag trips while page 1 is being handled; the engine notices
        // at the top of the next iteration with one sub-batch record still
        // in memory, which must reach the store before the run ends.
        struct CancellingParser(CancelFlag);

        impl crate::parse::PageParser for CancellingParser {
            fn parse(&self, page: &Page) -> Result<Parsed, ParseError> {
                self.0.cancel();
                let mut record = Record::new();
                record.insert(IDENTITY_FIELD, format!("{}#item", page.url));
                record.insert(FETCHED_AT_FIELD, "2024-01-01T00:00:00Z");
                Ok(Parsed {
                    records: vec![record],
                    next: Some(PaginationCursor::new(
                        Url::parse("https://shop.example/page2").unwrap(),
                    )),
                })
            }
        }

        let fetcher = MockFetcher::new().page("https://shop.example/page1", "page one");
        let cancel = CancelFlag::new();
        let store = SharedStore::new();
        let config = test_config(10);
        let engine = CrawlerEngine::new(
            &config,
            Box::new(fetcher),
            Box::new(CancellingParser(cancel.clone())),
            Box::new(store.clone()),
            cancel,
        )
        .unwrap();
        let result = engine.run().await;

        assert_eq!(result.status, CrawlStatus::PartialFailure);
        assert_eq!(result.pages_visited, 1);
        assert_eq!(result.records_written, 1);
        assert!(result.error.is_none());
        assert_eq!(store.flush_sizes(), vec![1]);
        assert!(store.is_finalized());
    }

    #[tokio::test]
    async fn test_dedup_drops_repeated_identities() {
        // Both pages list the same single item
        let fetcher = MockFetcher::new()
            .page("https://shop.example/page1", "page one")
            .page("https://shop.example/page2", "page two");

        struct SameItemParser;
        impl crate::parse::PageParser for SameItemParser {
            fn parse(&self, page: &Page) -> Result<Parsed, ParseError> {
                let mut record = Record::new();
                record.insert(IDENTITY_FIELD, "https://shop.example/pc/1");
                let next = if page.url.as_str().ends_with("page1") {
                    Some(PaginationCursor::new(
                        Url::parse("https://shop.example/page2").unwrap(),
                    ))
                } else {
                    None
                };
                Ok(Parsed {
                    records: vec![record],
                    next,
                })
            }
        }

        let mut config = test_config(10);
        config.dedup = true;
        let engine = CrawlerEngine::new(
            &config,
            Box::new(fetcher),
            Box::new(SameItemParser),
            Box::new(MemoryStore::new()),
            CancelFlag::new(),
        )
        .unwrap();
        let result = engine.run().await;

        assert_eq!(result.status, CrawlStatus::Success);
        assert_eq!(result.pages_visited, 2);
        assert_eq!(result.records_written, 1);
    }
}
