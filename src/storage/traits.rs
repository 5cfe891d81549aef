//! Storage traits and error types
//!
//! This module defines the trait interface for record stores and
//! associated error types.

use crate::state::PhotoRecord;
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parquet error: {0}")]
    Parquet(#[from] parquet::errors::ParquetError),

    #[error("Arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),

    #[error("Schema mismatch: {0}")]
    Schema(String),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// A durable snapshot of photo records
///
/// The snapshot is read whole and replaced whole; there is no append path.
pub trait RecordStore {
    /// Reads every stored record
    ///
    /// Returns `Ok(None)` when no snapshot exists yet.
    fn load(&self) -> StorageResult<Option<Vec<PhotoRecord>>>;

    /// Replaces the snapshot with `records`
    fn save(&self, records: &[PhotoRecord]) -> StorageResult<()>;
}
