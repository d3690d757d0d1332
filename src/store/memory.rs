//! In-memory record store
//!
//! Used by engine tests to observe flush boundaries without touching disk,
//! and able to simulate flush failures.

use crate::model::Record;
use crate::store::{RecordStore, StoreError, StoreResult};

/// Record store keeping everything in memory
#[derive(Debug, Default)]
pub struct MemoryStore {
    records: Vec<Record>,
    flush_sizes: Vec<usize>,
    finalized: bool,
    fail_appends: bool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store whose every append fails with a write error
    pub fn failing() -> Self {
        Self {
            fail_appends: true,
            ..Self::default()
        }
    }

    /// All records appended so far, in insertion order
    pub fn records(&self) -> &[Record] {
        &self.records
    }

    /// The size of each append call, in order
    pub fn flush_sizes(&self) -> &[usize] {
        &self.flush_sizes
    }

    pub fn is_finalized(&self) -> bool {
        self.finalized
    }
}

impl RecordStore for MemoryStore {
    fn append(&mut self, records: &[Record]) -> StoreResult<()> {
        if self.fail_appends {
            return Err(StoreError::Write(std::io::Error::new(
                std::io::ErrorKind::Other,
                "simulated flush failure",
            )));
        }
        if records.is_empty() {
            return Ok(());
        }
        self.flush_sizes.push(records.len());
        self.records.extend_from_slice(records);
        Ok(())
    }

    fn finalize(&mut self) -> StoreResult<()> {
        self.finalized = true;
        Ok(())
    }
}
