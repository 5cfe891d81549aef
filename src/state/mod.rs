//! State module for crawl data and run progress
//!
//! # Components
//!
//! - `PhotoRecord`: one photo row extracted from a catalog page
//! - `CrawlJob`: a page fetch queued for the worker pool
//! - `RunStats`: in-memory progress counters for the current run

mod record;
mod run_stats;

// Re-export main types
pub use record::{non_empty, CrawlJob, PageIndex, PhotoRecord};
pub use run_stats::RunStats;
