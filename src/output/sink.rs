//! Result sinks shared by all workers
//!
//! - [`MemorySink`] keeps every record until the run finishes
//! - [`BatchSink`] writes a batch file each time `batch_size` records accumulate

use crate::state::PhotoRecord;
use crate::storage::{concatenate, ParquetStore, RecordStore, StorageResult};
use std::collections::BTreeMap;
use std::mem;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};
use tokio::runtime::{Handle, RuntimeFlavor};

/// Destination for records produced by the worker pool
///
/// Implementations serialize concurrent appends internally.
pub trait ResultSink: Send + Sync {
    fn append(&self, records: Vec<PhotoRecord>) -> StorageResult<()>;
}

/// Accumulates every record of a run in memory
#[derive(Debug, Default)]
pub struct MemorySink {
    records: Mutex<Vec<PhotoRecord>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Removes and returns everything collected so far
    pub fn take_records(&self) -> Vec<PhotoRecord> {
        mem::take(&mut *self.lock())
    }

    fn lock(&self) -> MutexGuard<'_, Vec<PhotoRecord>> {
        self.records.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl ResultSink for MemorySink {
    fn append(&self, records: Vec<PhotoRecord>) -> StorageResult<()> {
        self.lock().extend(records);
        Ok(())
    }
}

#[derive(Debug, Default)]
struct BatchState {
    pending: Vec<PhotoRecord>,
    /// Last batch number handed out
    next_batch: usize,
    /// Batch files written so far, by batch number
    written: BTreeMap<usize, ParquetStore>,
}

impl BatchState {
    /// Splits off every full batch and assigns it a number
    fn take_full_batches(&mut self, batch_size: usize) -> Vec<(usize, Vec<PhotoRecord>)> {
        let mut batches = Vec::new();
        while self.pending.len() >= batch_size {
            let rest = self.pending.split_off(batch_size);
            let batch = mem::replace(&mut self.pending, rest);
            self.next_batch += 1;
            batches.push((self.next_batch, batch));
        }
        batches
    }
}

/// Flushes fixed-size batch files as records arrive
///
/// Batch files are named `photo_details_batch_<n>.parquet` (n starting at 1)
/// inside the batch directory. Files are written outside the state lock, so
/// other workers keep appending while a batch is being saved.
/// [`BatchSink::finish`] flushes the remainder and concatenates the batches
/// written by this sink into one snapshot.
#[derive(Debug)]
pub struct BatchSink {
    dir: PathBuf,
    batch_size: usize,
    state: Mutex<BatchState>,
}

impl BatchSink {
    pub fn new(dir: impl Into<PathBuf>, batch_size: usize) -> StorageResult<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        Ok(Self {
            dir,
            batch_size: batch_size.max(1),
            state: Mutex::new(BatchState::default()),
        })
    }

    /// Batch files written so far, in batch order
    pub fn batch_files(&self) -> Vec<PathBuf> {
        self.lock()
            .written
            .values()
            .map(|store| store.path().to_path_buf())
            .collect()
    }

    /// Records not yet written to a batch file
    pub fn pending(&self) -> usize {
        self.lock().pending.len()
    }

    /// Writes the remaining records and concatenates all batches into `final_path`
    ///
    /// Returns the number of records in the final snapshot.
    pub fn finish(&self, final_path: &Path) -> StorageResult<usize> {
        let rest = {
            let mut state = self.lock();
            if state.pending.is_empty() {
                None
            } else {
                state.next_batch += 1;
                Some((state.next_batch, mem::take(&mut state.pending)))
            }
        };
        if let Some(batch) = rest {
            self.write_batches(vec![batch])?;
        }

        let written: Vec<ParquetStore> = self.lock().written.values().cloned().collect();
        if written.is_empty() {
            tracing::info!("No batches were written, skipping {}", final_path.display());
            return Ok(0);
        }

        let output = ParquetStore::without_page_index(final_path);
        let total = blocking_io(|| concatenate(&written, &output))?;
        tracing::info!(
            "All {} batches concatenated into {} ({} records)",
            written.len(),
            final_path.display(),
            total
        );
        Ok(total)
    }

    /// Writes numbered batches in order
    ///
    /// On failure the records of the failed batch and of every batch after it
    /// go back to the pending records, so the next flush retries them.
    fn write_batches(&self, batches: Vec<(usize, Vec<PhotoRecord>)>) -> StorageResult<()> {
        let mut batches = batches.into_iter();

        while let Some((number, batch)) = batches.next() {
            let store = ParquetStore::without_page_index(
                self.dir.join(format!("photo_details_batch_{}.parquet", number)),
            );

            if let Err(e) = blocking_io(|| store.save(&batch)) {
                let mut restored = batch;
                restored.extend(batches.by_ref().flat_map(|(_, rest)| rest));
                let mut state = self.lock();
                restored.append(&mut state.pending);
                state.pending = restored;
                return Err(e);
            }

            tracing::info!(
                "Batch {} saved to {} ({} records)",
                number,
                store.path().display(),
                batch.len()
            );
            self.lock().written.insert(number, store);
        }
        Ok(())
    }

    fn lock(&self) -> MutexGuard<'_, BatchState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl ResultSink for BatchSink {
    fn append(&self, records: Vec<PhotoRecord>) -> StorageResult<()> {
        let batches = {
            let mut state = self.lock();
            state.pending.extend(records);
            state.take_full_batches(self.batch_size)
        };
        self.write_batches(batches)
    }
}

/// Runs blocking file I/O without stalling other tasks on a multi-threaded runtime
fn blocking_io<T>(io: impl FnOnce() -> T) -> T {
    match Handle::try_current() {
        Ok(handle) if handle.runtime_flavor() == RuntimeFlavor::MultiThread => {
            tokio::task::block_in_place(io)
        }
        _ => io(),
    }
}
