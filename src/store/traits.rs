//! Record store trait and error types

use crate::model::Record;
use thiserror::Error;

/// Errors that can occur during store operations
///
/// Store errors are more severe than fetch or parse errors: a failed flush
/// surfaces as `Failure` for the crawler, since partial or corrupt output is
/// worse than no output.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Write failure: {0}")]
    Write(#[from] std::io::Error),

    #[error("Serialization failure: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type for store operations
pub type StoreResult<T> = Result<T, StoreError>;

/// Destination for a crawler's extracted records
///
/// `append` must preserve insertion order across calls. `finalize` must
/// leave the destination in a consumable state even when no records were
/// ever appended.
pub trait RecordStore: Send {
    /// Appends a batch of records to the persisted collection
    fn append(&mut self, records: &[Record]) -> StoreResult<()>;

    /// Ensures the destination is complete and valid
    fn finalize(&mut self) -> StoreResult<()>;
}
