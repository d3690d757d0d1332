//! Record persistence
//!
//! Each crawler writes to its own destination, so no locking is needed
//! across concurrent crawlers. The JSON backend guarantees the persisted
//! file is always a valid array, even if the process dies mid-flush.

mod json;
mod memory;
mod traits;

pub use json::JsonStore;
pub use memory::MemoryStore;
pub use traits::{RecordStore, StoreError, StoreResult};
