//! Crawler orchestration
//!
//! This module contains the shared crawl machinery:
//! - The engine loop: pagination, accumulation, batch flushing, error
//!   containment
//! - The session: concurrent per-crawler tasks with failure isolation
//!
//! Which site a crawler targets is decided entirely by the strategy pair
//! (fetch capability, page parser) injected into the engine.

mod engine;
mod session;

pub use engine::{CancelFlag, CrawlerEngine};
pub use session::CrawlSession;
