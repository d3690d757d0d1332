//! Core data types shared across the crawl pipeline
//!
//! These are the values that flow through one crawler run: a fetched `Page`
//! goes into the parser, which produces `Record`s and an optional
//! `PaginationCursor`; the engine finalizes everything into a `CrawlResult`.

use crate::fetch::FetchError;
use crate::parse::ParseError;
use crate::store::StoreError;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use thiserror::Error;
use url::Url;

/// Canonical identity field name used for de-duplication
pub const IDENTITY_FIELD: &str = "url";

/// Field carrying the RFC 3339 fetch timestamp
pub const FETCHED_AT_FIELD: &str = "fetched_at";

/// Raw fetched content plus the URL it was fetched from
///
/// Transient: exists only between one fetch and the parse that consumes it.
#[derive(Debug, Clone)]
pub struct Page {
    /// The URL the content was fetched from (after redirects)
    pub url: Url,

    /// The page body as text
    pub body: String,
}

impl Page {
    pub fn new(url: Url, body: impl Into<String>) -> Self {
        Self {
            url,
            body: body.into(),
        }
    }
}

/// Token identifying the next page of a paginated listing
///
/// Cursors are compared by their normalized URL string, which is what the
/// engine's cycle guard hashes. A parser that hands back a cursor the engine
/// has already visited terminates the loop instead of repeating it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PaginationCursor(Url);

impl PaginationCursor {
    pub fn new(url: Url) -> Self {
        Self(url)
    }

    pub fn url(&self) -> &Url {
        &self.0
    }

    /// Normalized key used by the engine's cycle guard
    pub fn guard_key(&self) -> String {
        crate::urlutil::normalize_url(&self.0)
    }
}

impl std::fmt::Display for PaginationCursor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One extracted item: a field-name to value mapping
///
/// The field set varies by site, but every record carries the canonical
/// identity field (the item URL) and a `fetched_at` timestamp. Field order is
/// stable (BTreeMap) so persisted output is deterministic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(transparent)]
pub struct Record {
    fields: BTreeMap<String, Value>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a field value, replacing any previous value
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.fields.insert(name.into(), value.into());
    }

    /// Inserts a field only if it is not already present
    pub fn insert_if_absent(&mut self, name: &str, value: impl Into<Value>) {
        if !self.fields.contains_key(name) {
            self.fields.insert(name.to_string(), value.into());
        }
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    /// The canonical identity value, if the record has one
    pub fn identity(&self) -> Option<&str> {
        self.fields.get(IDENTITY_FIELD).and_then(Value::as_str)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn fields(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.fields.iter()
    }
}

/// Terminal status of one crawler run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CrawlStatus {
    /// Pagination was exhausted and every record was persisted
    Success,

    /// The run terminated early, but some records were persisted first
    PartialFailure,

    /// The run terminated with nothing persisted, or the store itself failed
    Failure,
}

/// The error that terminated a crawler run early
#[derive(Debug, Error)]
pub enum CrawlFailure {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("Setup failed: {0}")]
    Setup(String),
}

/// Outcome of one crawler engine run
///
/// Finalized exactly once when the loop terminates; never mutated afterwards.
/// Records themselves live in the store; the result carries the counts the
/// session report needs.
#[derive(Debug)]
pub struct CrawlResult {
    /// Name of the crawler this result belongs to
    pub crawler_name: String,

    /// Number of pages fetched and parsed
    pub pages_visited: usize,

    /// Number of records flushed to the store
    pub records_written: usize,

    /// Terminal status of the run
    pub status: CrawlStatus,

    /// The error that ended the run, for non-Success statuses
    pub error: Option<CrawlFailure>,
}

impl CrawlResult {
    /// True when the run persisted everything it set out to collect
    pub fn is_success(&self) -> bool {
        self.status == CrawlStatus::Success
    }
}
