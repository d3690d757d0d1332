//! JSON array store
//!
//! Persists one pretty-printed JSON array per crawler, rewritten atomically
//! on every flush: the new content goes to a temp file in the same directory
//! and is renamed over the destination, so a crash mid-flush leaves the last
//! complete array on disk instead of a truncated fragment. Downstream ML
//! tooling reads these files directly and cannot use a half-written array.

use crate::model::Record;
use crate::store::{RecordStore, StoreError, StoreResult};
use std::fs;
use std::path::{Path, PathBuf};

/// Record store writing a single JSON array file
pub struct JsonStore {
    path: PathBuf,
    // Whole-run buffer: every flush rewrites the full array, so memory here
    // grows with the run instead of staying bounded by the batch size. Fine
    // for listing-sized runs; an append-based format would be needed first
    // if crawls ever reach millions of records.
    written: Vec<Record>,
}

impl JsonStore {
    /// Creates a store writing to `<directory>/<name>.json`
    ///
    /// The directory is created if needed. The destination is rewritten per
    /// run; a file left over from a previous run does not have to be read
    /// back.
    pub fn create(directory: &Path, name: &str) -> StoreResult<Self> {
        fs::create_dir_all(directory)?;
        Ok(Self {
            path: directory.join(format!("{}.json", name)),
            written: Vec::new(),
        })
    }

    /// The destination file path
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn rewrite(&self) -> StoreResult<()> {
        let content = serde_json::to_vec_pretty(&self.written)?;

        // Same-directory temp file so the rename stays on one filesystem
        let tmp_path = self.path.with_extension("json.tmp");
        fs::write(&tmp_path, content)?;
        fs::rename(&tmp_path, &self.path)?;

        Ok(())
    }
}

impl RecordStore for JsonStore {
    fn append(&mut self, records: &[Record]) -> StoreResult<()> {
        if records.is_empty() {
            return Ok(());
        }
        self.written.extend_from_slice(records);
        self.rewrite()
    }

    fn finalize(&mut self) -> StoreResult<()> {
        // Flushes already left a valid array behind; only an append-free run
        // still has to materialize the (empty) destination.
        if self.written.is_empty() {
            self.rewrite()?;
        }
        Ok(())
    }
}
