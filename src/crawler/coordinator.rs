//! Crawler coordinator - run orchestration
//!
//! This module drives a complete run:
//! - Loading the resume index from the prior snapshot
//! - Discovering the page count and building the crawl plan
//! - Running the worker pool over the plan
//! - Merging the collected records into the snapshot
//!
//! The subject variant reuses the same pool but writes batch files as it goes.

use crate::config::Config;
use crate::crawler::discovery::discover_page_count;
use crate::crawler::plan::{catalog_jobs, subject_jobs};
use crate::crawler::retry::RetryPolicy;
use crate::crawler::worker::{RunContext, WorkerPool};
use crate::crawler::{build_http_client, PageFetcher};
use crate::output::{BatchSink, MemorySink};
use crate::state::{PageIndex, PhotoRecord};
use crate::storage::{MergeReport, ParquetStore, RecordStore, ResumeIndex};
use crate::{ConfigError, HarvestError};
use reqwest::Client;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use url::Url;

/// Summary of a finished run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CrawlReport {
    /// Pages queued this run
    pub planned: usize,

    /// Pages processed, successfully or not
    pub completed: u64,

    /// Pages that failed this run
    pub failed: u64,

    /// Backoff retries across all pages
    pub retries: u64,

    /// Records collected this run
    pub new_records: usize,

    /// Records in the snapshot after the run
    pub stored_records: usize,

    /// Prior records replaced by fresh ones (catalog crawl only)
    pub replaced_records: usize,

    /// Whether the run was cut short by cancellation
    pub cancelled: bool,
}

/// Main crawler coordinator structure
pub struct Coordinator {
    config: Config,
    client: Client,
    cancel: CancellationToken,
}

impl Coordinator {
    /// Creates a coordinator and its shared HTTP client
    pub fn new(config: Config) -> Result<Self, HarvestError> {
        let client = build_http_client(&config.user_agent, &config.crawler)?;
        Ok(Self {
            config,
            client,
            cancel: CancellationToken::new(),
        })
    }

    /// Token that stops the run cooperatively when cancelled
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    fn fetcher(&self, policy: RetryPolicy) -> Arc<PageFetcher> {
        Arc::new(PageFetcher::new(self.client.clone(), policy))
    }

    fn listing_url(&self) -> Result<Url, HarvestError> {
        Ok(Url::parse(&self.config.catalog.listing_url)?)
    }

    /// Loads the resume index of the configured snapshot
    pub fn resume_index(&self) -> Result<ResumeIndex, HarvestError> {
        let store = ParquetStore::new(&self.config.output.store_path);
        Ok(ResumeIndex::load(&store)?)
    }

    /// Runs the resumable catalog crawl
    ///
    /// The page count is discovered from the listing first.
    pub async fn run(&self) -> Result<CrawlReport, HarvestError> {
        let store = ParquetStore::new(&self.config.output.store_path);
        let resume = ResumeIndex::load(&store)?;

        let policy = RetryPolicy::from_config(&self.config.retry);
        let fetcher = self.fetcher(policy);
        let page_count = tokio::select! {
            _ = self.cancel.cancelled() => {
                tracing::warn!("Run cancelled during page count discovery, nothing was crawled");
                return Ok(CrawlReport {
                    stored_records: resume.prior_records().len(),
                    cancelled: true,
                    ..CrawlReport::default()
                });
            }
            count = discover_page_count(&fetcher, &self.config.catalog) => count?,
        };

        self.crawl_catalog(&store, resume, page_count).await
    }

    /// Pages the next catalog run would fetch, if known without network access
    ///
    /// The page count is normally discovered from the listing, so the plan can
    /// only be computed offline from `page-count-fallback`. Returns `None`
    /// when no fallback is configured.
    pub fn offline_plan(&self, resume: &ResumeIndex) -> Option<Vec<PageIndex>> {
        self.config
            .catalog
            .page_count_fallback
            .map(|count| resume.plan(self.config.catalog.first_page, count))
    }

    /// Runs the resumable catalog crawl over a known number of pages
    pub async fn run_with_page_count(&self, page_count: u32) -> Result<CrawlReport, HarvestError> {
        let store = ParquetStore::new(&self.config.output.store_path);
        let resume = ResumeIndex::load(&store)?;
        self.crawl_catalog(&store, resume, page_count).await
    }

    async fn crawl_catalog(
        &self,
        store: &ParquetStore,
        resume: ResumeIndex,
        page_count: u32,
    ) -> Result<CrawlReport, HarvestError> {
        let start_time = Instant::now();
        let first = self.config.catalog.first_page;
        let plan: Vec<PageIndex> = resume.plan(first, page_count);

        tracing::info!(
            "Planning {} of {} pages ({} already stored in {})",
            plan.len(),
            page_count,
            resume.seen_pages().len(),
            store.path().display()
        );

        let jobs = catalog_jobs(&self.listing_url()?, &self.config.catalog.page_param, &plan);
        let sink = Arc::new(MemorySink::new());
        let ctx = Arc::new(RunContext::new(jobs, sink.clone(), self.cancel.clone()));

        let policy = RetryPolicy::from_config(&self.config.retry);
        WorkerPool::new(self.config.crawler.workers as usize)
            .run(Arc::clone(&ctx), self.fetcher(policy))
            .await;

        let fresh = sink.take_records();
        let mut report = CrawlReport {
            planned: plan.len(),
            completed: ctx.stats.completed(),
            failed: ctx.stats.failed(),
            retries: ctx.stats.retries(),
            new_records: fresh.len(),
            cancelled: self.cancel.is_cancelled(),
            ..CrawlReport::default()
        };

        let merge = persist(store, resume, fresh)?;
        report.stored_records = merge.total();
        report.replaced_records = merge.replaced;

        log_finished(&report, start_time.elapsed());
        Ok(report)
    }

    /// Runs the batched subject search crawl
    pub async fn run_subjects(&self) -> Result<CrawlReport, HarvestError> {
        let subjects = self.config.subjects.as_ref().ok_or_else(|| {
            ConfigError::Validation("no [subjects] section configured".to_string())
        })?;
        let start_time = Instant::now();

        let jobs = subject_jobs(
            &self.listing_url()?,
            &self.config.catalog.page_param,
            &subjects.entries,
        );
        let planned = jobs.len();
        tracing::info!(
            "Planning {} pages across {} subjects",
            planned,
            subjects.entries.len()
        );

        let sink = Arc::new(BatchSink::new(&subjects.batch_dir, subjects.batch_size)?);
        let ctx = Arc::new(RunContext::new(jobs, sink.clone(), self.cancel.clone()));

        let policy =
            RetryPolicy::from_config(&self.config.retry).with_max_attempts(subjects.max_attempts);
        WorkerPool::new(self.config.crawler.workers as usize)
            .run(Arc::clone(&ctx), self.fetcher(policy))
            .await;

        let stored_records = sink.finish(Path::new(&subjects.final_path))?;

        let report = CrawlReport {
            planned,
            completed: ctx.stats.completed(),
            failed: ctx.stats.failed(),
            retries: ctx.stats.retries(),
            new_records: ctx.stats.records() as usize,
            stored_records,
            replaced_records: 0,
            cancelled: self.cancel.is_cancelled(),
        };

        log_finished(&report, start_time.elapsed());
        Ok(report)
    }
}

/// Merges a run's records into the snapshot and writes it
///
/// Nothing is written when the run collected no records, which leaves the
/// prior snapshot untouched.
fn persist(
    store: &dyn RecordStore,
    resume: ResumeIndex,
    fresh: Vec<PhotoRecord>,
) -> Result<MergeReport, HarvestError> {
    if fresh.is_empty() {
        let prior = resume.prior_records().len();
        tracing::info!("No new records collected, snapshot left unchanged");
        return Ok(MergeReport {
            prior,
            added: 0,
            replaced: 0,
        });
    }

    let (merged, report) = resume.merge(fresh);
    store.save(&merged)?;
    tracing::info!(
        "Saved {} records ({} new, {} prior)",
        merged.len(),
        report.added,
        report.prior - report.replaced
    );
    Ok(report)
}

fn log_finished(report: &CrawlReport, elapsed: Duration) {
    if report.cancelled {
        tracing::warn!(
            "Run cancelled after {} of {} pages; collected records were kept",
            report.completed,
            report.planned
        );
    }

    tracing::info!(
        "Run finished: {} pages in {:.1}s, {} failed, {} retries, {} new records, {} stored",
        report.completed,
        elapsed.as_secs_f64(),
        report.failed,
        report.retries,
        report.new_records,
        report.stored_records
    );
}

/// Runs the catalog crawl described by `config`
///
/// # Example
///
/// ```no_run
/// use fotis_harvest::config::load_config;
/// use fotis_harvest::crawler::run_crawl;
/// use std::path::Path;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let config = load_config(Path::new("harvest.toml"))?;
/// let report = run_crawl(config).await?;
/// println!("{} records stored", report.stored_records);
/// # Ok(())
/// # }
/// ```
pub async fn run_crawl(config: Config) -> Result<CrawlReport, HarvestError> {
    Coordinator::new(config)?.run().await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{
        CatalogConfig, CrawlerConfig, OutputConfig, RetryConfig, UserAgentConfig,
    };
    use tempfile::TempDir;
    use wiremock::matchers::method;
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config(listing_url: &str, store_path: &Path) -> Config {
        Config {
            catalog: CatalogConfig {
                listing_url: listing_url.to_string(),
                page_param: "page".to_string(),
                first_page: 0,
                page_count_fallback: None,
            },
            crawler: CrawlerConfig {
                workers: 2,
                connect_timeout_ms: 1_000,
                request_timeout_ms: 200,
            },
            retry: RetryConfig::default(),
            user_agent: UserAgentConfig {
                crawler_name: "TestCrawler".to_string(),
                crawler_version: "1.0".to_string(),
                contact_url: "https://example.com/about".to_string(),
            },
            output: OutputConfig {
                store_path: store_path.display().to_string(),
            },
            subjects: None,
        }
    }

    fn stored_on_page(page: PageIndex) -> PhotoRecord {
        PhotoRecord::from_cells(
            [
                "Photo".to_string(),
                String::new(),
                String::new(),
                String::new(),
                format!("EFA.{}", page),
            ],
            format!("/img/{}.jpg", page),
        )
        .on_page(page)
    }

    #[test]
    fn test_offline_plan_uses_fallback_page_count() {
        let dir = TempDir::new().unwrap();
        let store_path = dir.path().join("photos.parquet");
        ParquetStore::new(&store_path)
            .save(&[stored_on_page(0), stored_on_page(2)])
            .unwrap();

        let mut config = config("https://example.com/search", &store_path);
        config.catalog.page_count_fallback = Some(5);

        let coordinator = Coordinator::new(config).unwrap();
        let resume = coordinator.resume_index().unwrap();
        assert_eq!(coordinator.offline_plan(&resume), Some(vec![1, 3, 4]));
    }

    #[test]
    fn test_offline_plan_unknown_without_fallback() {
        let dir = TempDir::new().unwrap();
        let config = config("https://example.com/search", &dir.path().join("p.parquet"));

        let coordinator = Coordinator::new(config).unwrap();
        let resume = coordinator.resume_index().unwrap();
        assert_eq!(coordinator.offline_plan(&resume), None);
    }

    #[tokio::test]
    async fn test_cancel_during_discovery_stops_run() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(5)))
            .mount(&server)
            .await;

        let dir = TempDir::new().unwrap();
        let store_path = dir.path().join("photos.parquet");
        let config = config(&format!("{}/search", server.uri()), &store_path);

        // Default retry policy: 100 attempts with up to a minute between them
        let coordinator = Coordinator::new(config).unwrap();
        let cancel = coordinator.cancellation_token();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            cancel.cancel();
        });

        let report = tokio::time::timeout(Duration::from_secs(5), coordinator.run())
            .await
            .expect("run should stop promptly after cancellation")
            .unwrap();

        assert!(report.cancelled);
        assert_eq!(report.planned, 0);
        assert_eq!(report.completed, 0);
        assert!(!store_path.exists());
    }
}
