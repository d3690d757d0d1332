//! Page parsing: extracting product records and pagination cursors
//!
//! A parser owns only selector/extraction logic for one site shape; it never
//! touches pagination control or storage. That isolation is what keeps
//! adding a new shop cheap: pair a parser with a fetch capability in the
//! config and the shared engine does the rest.

mod selector;
pub mod text;

pub use selector::{SelectorParser, SelectorRules};

use crate::config::CrawlerConfig;
use crate::model::{Page, PaginationCursor, Record};
use crate::ConfigError;
use thiserror::Error;

/// Errors raised when a page's DOM does not match expectations
///
/// These never crash the engine; they terminate the crawler's run with a
/// degraded result carrying whatever was already persisted.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("Page structure changed at {url}: {detail}")]
    StructureChanged { url: String, detail: String },

    #[error("Missing required field '{field}' at {url}")]
    MissingField { url: String, field: String },
}

/// Output of parsing one page
#[derive(Debug)]
pub struct Parsed {
    /// Records extracted from the page, in document order
    pub records: Vec<Record>,

    /// Where the listing continues, or None at the end of pagination
    pub next: Option<PaginationCursor>,
}

/// Per-site logic extracting records and the next-page reference
pub trait PageParser: Send + Sync {
    fn parse(&self, page: &Page) -> Result<Parsed, ParseError>;
}

/// Builds the parser for a crawler from its site-specific options
pub fn build_parser(config: &CrawlerConfig) -> Result<Box<dyn PageParser>, ConfigError> {
    let rules = SelectorRules::from_options(&config.options)?;
    Ok(Box::new(SelectorParser::new(rules)))
}
