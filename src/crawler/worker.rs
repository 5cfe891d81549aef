//! Worker pool draining the shared work queue
//!
//! Every worker repeats: take a job, fetch and parse the page, hand the
//! records to the sink, report progress. Per-page failures are logged and
//! skipped; cancellation stops the worker. The taken job is marked done when
//! it goes out of scope, on every exit path.

use crate::crawler::fetcher::{FetchResult, PageFetcher};
use crate::crawler::parser::parse_page;
use crate::crawler::queue::WorkQueue;
use crate::output::ResultSink;
use crate::state::{CrawlJob, PhotoRecord, RunStats};
use std::sync::Arc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

/// Everything a worker shares with the rest of the run
pub struct RunContext {
    pub queue: WorkQueue<CrawlJob>,
    pub sink: Arc<dyn ResultSink>,
    pub stats: RunStats,
    pub cancel: CancellationToken,
    /// Jobs planned for this run, for progress lines
    pub total: usize,
}

impl RunContext {
    pub fn new(jobs: Vec<CrawlJob>, sink: Arc<dyn ResultSink>, cancel: CancellationToken) -> Self {
        let total = jobs.len();
        Self {
            queue: WorkQueue::new(jobs),
            sink,
            stats: RunStats::new(),
            cancel,
            total,
        }
    }
}

/// What happened to one page
#[derive(Debug)]
pub enum PageOutcome {
    /// Page fetched and parsed (possibly into zero records)
    Collected { records: Vec<PhotoRecord>, retries: u32 },

    /// Page failed for this run; it stays absent and is retried next run
    Skipped { reason: String, retries: u32 },

    /// Run was cancelled while the page was in flight
    Cancelled,
}

/// Fetches and parses one page
pub async fn process_page(fetcher: &PageFetcher, job: &CrawlJob) -> PageOutcome {
    let result = fetcher.fetch(&job.url).await;
    let retries = result.retries();

    match result {
        FetchResult::Success { body, .. } => {
            let mut records = parse_page(&body);
            if job.tag_page {
                records = records.into_iter().map(|r| r.on_page(job.page)).collect();
            }
            PageOutcome::Collected { records, retries }
        }
        FetchResult::HttpError { status_code, .. } => PageOutcome::Skipped {
            reason: format!("Status Code: {}", status_code),
            retries,
        },
        FetchResult::TimedOut { attempts } => PageOutcome::Skipped {
            reason: format!("timed out after {} tries", attempts),
            retries,
        },
        FetchResult::NetworkError { error, .. } => PageOutcome::Skipped {
            reason: error,
            retries,
        },
    }
}

/// Fixed-size pool of workers sharing one queue
#[derive(Debug, Clone, Copy)]
pub struct WorkerPool {
    concurrency: usize,
}

impl WorkerPool {
    pub fn new(concurrency: usize) -> Self {
        Self {
            concurrency: concurrency.max(1),
        }
    }

    /// Runs workers until the queue barrier is reached or the run is cancelled
    ///
    /// Returns once every worker has exited. A panicking worker is logged and
    /// does not stop the others.
    pub async fn run(&self, ctx: Arc<RunContext>, fetcher: Arc<PageFetcher>) {
        let mut workers = JoinSet::new();
        for id in 0..self.concurrency {
            workers.spawn(run_worker(id, Arc::clone(&ctx), Arc::clone(&fetcher)));
        }

        tokio::select! {
            _ = ctx.queue.join() => {
                tracing::debug!("All queued pages are done");
            }
            _ = ctx.cancel.cancelled() => {
                tracing::warn!(
                    "Run cancelled with {} pages still queued",
                    ctx.queue.remaining()
                );
            }
        }

        while let Some(result) = workers.join_next().await {
            if let Err(e) = result {
                tracing::error!("Worker task failed: {}", e);
            }
        }
    }
}

async fn run_worker(id: usize, ctx: Arc<RunContext>, fetcher: Arc<PageFetcher>) {
    let worker = format!("W{}", id);

    loop {
        if ctx.cancel.is_cancelled() {
            break;
        }

        let Some(job) = ctx.queue.take() else {
            break;
        };

        let outcome = tokio::select! {
            _ = ctx.cancel.cancelled() => PageOutcome::Cancelled,
            outcome = process_page(&fetcher, &job) => outcome,
        };

        match outcome {
            PageOutcome::Collected { records, retries } => {
                ctx.stats.add_retries(retries);
                let count = records.len();

                if let Err(e) = ctx.sink.append(records) {
                    tracing::error!("[{}] Failed to store records of {}: {}", worker, job.label, e);
                }

                let done = ctx.stats.page_done(true, count);
                tracing::info!(
                    "[{}][{}/{}] Fetched {} ({} records)",
                    worker,
                    done,
                    ctx.total,
                    job.label,
                    count
                );
            }
            PageOutcome::Skipped { reason, retries } => {
                ctx.stats.add_retries(retries);
                let done = ctx.stats.page_done(false, 0);
                tracing::error!(
                    "[{}][{}/{}] Failed to fetch or process {} ({}): {}",
                    worker,
                    done,
                    ctx.total,
                    job.label,
                    job.url,
                    reason
                );
            }
            PageOutcome::Cancelled => {
                tracing::debug!("[{}] Cancelled while fetching {}", worker, job.label);
                break;
            }
        }
    }

    tracing::debug!("[{}] Worker exiting", worker);
}
