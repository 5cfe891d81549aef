//! Storage module for persisting harvested records
//!
//! This module handles:
//! - Reading and writing the Parquet snapshot
//! - Building the resume index from a prior snapshot
//! - Merging a run's records into the snapshot
//! - Concatenating batch files into one snapshot

mod resume;
mod snapshot;
mod traits;

pub use resume::{MergeReport, ResumeIndex};
pub use snapshot::{concatenate, ParquetStore};
pub use traits::{RecordStore, StorageError, StorageResult};
