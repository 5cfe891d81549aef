use serde::Deserialize;

/// Main configuration structure for Fotis-Harvest
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub catalog: CatalogConfig,
    pub crawler: CrawlerConfig,
    #[serde(default)]
    pub retry: RetryConfig,
    #[serde(rename = "user-agent")]
    pub user_agent: UserAgentConfig,
    pub output: OutputConfig,
    #[serde(default)]
    pub subjects: Option<SubjectsConfig>,
}

/// Paginated listing being harvested
#[derive(Debug, Clone, Deserialize)]
pub struct CatalogConfig {
    /// Listing endpoint without the page query parameter
    #[serde(rename = "listing-url")]
    pub listing_url: String,

    /// Name of the query parameter carrying the page index
    #[serde(rename = "page-param", default = "default_page_param")]
    pub page_param: String,

    /// First page index of the crawl plan
    #[serde(rename = "first-page", default)]
    pub first_page: u32,

    /// Page count used when discovery from the listing fails.
    /// Without it a failed discovery aborts the run.
    #[serde(rename = "page-count-fallback", default)]
    pub page_count_fallback: Option<u32>,
}

/// Worker pool and HTTP timeouts
#[derive(Debug, Clone, Deserialize)]
pub struct CrawlerConfig {
    /// Number of concurrent workers
    pub workers: u32,

    /// TCP connect timeout (milliseconds)
    #[serde(rename = "connect-timeout-ms")]
    pub connect_timeout_ms: u64,

    /// Whole-request timeout (milliseconds)
    #[serde(rename = "request-timeout-ms")]
    pub request_timeout_ms: u64,
}

/// Exponential backoff applied to timed out requests
#[derive(Debug, Clone, Deserialize)]
pub struct RetryConfig {
    #[serde(rename = "base-delay-ms")]
    pub base_delay_ms: u64,

    #[serde(rename = "max-delay-ms")]
    pub max_delay_ms: u64,

    /// Total attempts per page, including the first one
    #[serde(rename = "max-attempts")]
    pub max_attempts: u32,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            base_delay_ms: 1_000,
            max_delay_ms: 60_000,
            max_attempts: 100,
        }
    }
}

/// User agent identification configuration
#[derive(Debug, Clone, Deserialize)]
pub struct UserAgentConfig {
    #[serde(rename = "crawler-name")]
    pub crawler_name: String,

    #[serde(rename = "crawler-version")]
    pub crawler_version: String,

    /// URL with information about the crawler
    #[serde(rename = "contact-url")]
    pub contact_url: String,
}

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    /// Path to the Parquet snapshot of the catalog crawl
    #[serde(rename = "store-path")]
    pub store_path: String,
}

/// Batched per-subject search crawl
#[derive(Debug, Clone, Deserialize)]
pub struct SubjectsConfig {
    /// Records per batch file
    #[serde(rename = "batch-size")]
    pub batch_size: usize,

    /// Directory receiving the batch files
    #[serde(rename = "batch-dir")]
    pub batch_dir: String,

    /// Snapshot produced by concatenating all batch files
    #[serde(rename = "final-path")]
    pub final_path: String,

    /// Attempts per page for this variant (fails faster than the catalog crawl)
    #[serde(rename = "max-attempts", default = "default_subject_attempts")]
    pub max_attempts: u32,

    #[serde(default, rename = "entry")]
    pub entries: Vec<SubjectEntry>,
}

/// A search subject and the number of result pages it has
#[derive(Debug, Clone, Deserialize)]
pub struct SubjectEntry {
    pub name: String,
    pub pages: u32,
}

fn default_page_param() -> String {
    "page".to_string()
}

fn default_subject_attempts() -> u32 {
    5
}
