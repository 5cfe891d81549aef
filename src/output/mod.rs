//! Output module for run results
//!
//! This module handles:
//! - Collecting records from the worker pool ([`ResultSink`])
//! - Batched writing for the subject crawl
//! - Statistics over a stored snapshot

mod sink;
pub mod stats;

pub use sink::{BatchSink, MemorySink, ResultSink};
pub use stats::{load_statistics, print_statistics, StoreStatistics};
