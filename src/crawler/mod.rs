//! Crawler module for catalog page fetching and processing
//!
//! This module contains the core crawling logic, including:
//! - HTTP fetching with timeout backoff
//! - Listing page parsing
//! - The shared work queue and worker pool
//! - Overall run coordination and resumption

mod coordinator;
mod discovery;
mod fetcher;
mod parser;
mod plan;
mod queue;
mod retry;
mod worker;

pub use coordinator::{run_crawl, Coordinator, CrawlReport};
pub use discovery::discover_page_count;
pub use fetcher::{build_http_client, user_agent_string, FetchResult, PageFetcher};
pub use parser::{extract_last_page, parse_page, MIN_CELLS};
pub use plan::{catalog_jobs, page_url, subject_jobs};
pub use queue::{WorkItem, WorkQueue};
pub use retry::RetryPolicy;
pub use worker::{process_page, PageOutcome, RunContext, WorkerPool};
