//! HTTP fetcher implementation
//!
//! This module handles all HTTP requests for the crawler, including:
//! - Building the shared HTTP client with the configured user agent and timeouts
//! - GET requests for catalog pages
//! - Backoff retries for timed out requests
//! - Error classification

use crate::config::{CrawlerConfig, UserAgentConfig};
use crate::crawler::retry::RetryPolicy;
use reqwest::{Client, StatusCode};
use std::time::{Duration, Instant};
use url::Url;

/// Result of a page fetch, after any retries
#[derive(Debug)]
pub enum FetchResult {
    /// The page answered with HTTP 200
    Success {
        /// Page body content
        body: String,
        /// Requests sent for this page
        attempts: u32,
    },

    /// The page answered with a status other than 200
    HttpError { status_code: u16, attempts: u32 },

    /// Every allowed attempt timed out
    TimedOut { attempts: u32 },

    /// Any other transport failure (connection reset, malformed response, ...)
    NetworkError { error: String, attempts: u32 },
}

impl FetchResult {
    /// Requests sent for this page
    pub fn attempts(&self) -> u32 {
        match self {
            Self::Success { attempts, .. }
            | Self::HttpError { attempts, .. }
            | Self::TimedOut { attempts }
            | Self::NetworkError { attempts, .. } => *attempts,
        }
    }

    /// Backoff retries performed before the final outcome
    pub fn retries(&self) -> u32 {
        self.attempts().saturating_sub(1)
    }
}

/// Outcome of a single request
enum Attempt {
    Done(Result<String, Failure>),
    Timeout,
}

enum Failure {
    Status(u16),
    Network(String),
}

/// Builds the HTTP client shared by every worker
///
/// # Example
///
/// ```no_run
/// use fotis_harvest::config::{CrawlerConfig, UserAgentConfig};
/// use fotis_harvest::crawler::build_http_client;
///
/// let agent = UserAgentConfig {
///     crawler_name: "FotisHarvest".to_string(),
///     crawler_version: "0.1.0".to_string(),
///     contact_url: "https://example.com/about".to_string(),
/// };
/// let crawler = CrawlerConfig {
///     workers: 15,
///     connect_timeout_ms: 30_000,
///     request_timeout_ms: 60_000,
/// };
///
/// let client = build_http_client(&agent, &crawler).unwrap();
/// ```
pub fn build_http_client(
    agent: &UserAgentConfig,
    crawler: &CrawlerConfig,
) -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(user_agent_string(agent))
        .connect_timeout(Duration::from_millis(crawler.connect_timeout_ms))
        .timeout(Duration::from_millis(crawler.request_timeout_ms))
        .gzip(true)
        .brotli(true)
        .build()
}

/// Format: CrawlerName/Version (+ContactURL)
pub fn user_agent_string(agent: &UserAgentConfig) -> String {
    format!(
        "{}/{} (+{})",
        agent.crawler_name, agent.crawler_version, agent.contact_url
    )
}

/// Fetches catalog pages, retrying timeouts with jittered exponential backoff
///
/// # Retry Logic
///
/// | Condition | Action |
/// |-----------|--------|
/// | HTTP 200 | Success |
/// | Any other status | Immediate → HttpError |
/// | Connect/read timeout | Backoff and retry until `max_attempts` → TimedOut |
/// | Other transport error | Immediate → NetworkError |
#[derive(Debug, Clone)]
pub struct PageFetcher {
    client: Client,
    policy: RetryPolicy,
}

impl PageFetcher {
    pub fn new(client: Client, policy: RetryPolicy) -> Self {
        Self { client, policy }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Fetches one page, sleeping between timed out attempts
    pub async fn fetch(&self, url: &Url) -> FetchResult {
        let started = Instant::now();
        let mut attempt = 1;

        loop {
            match self.fetch_once(url).await {
                Attempt::Done(Ok(body)) => {
                    return FetchResult::Success {
                        body,
                        attempts: attempt,
                    }
                }
                Attempt::Done(Err(Failure::Status(status_code))) => {
                    return FetchResult::HttpError {
                        status_code,
                        attempts: attempt,
                    }
                }
                Attempt::Done(Err(Failure::Network(error))) => {
                    return FetchResult::NetworkError {
                        error,
                        attempts: attempt,
                    }
                }
                Attempt::Timeout => {}
            }

            if !self.policy.allows_retry(attempt) {
                tracing::error!(
                    "Giving up on {} after {} tries ({:.1}s elapsed)",
                    url,
                    attempt,
                    started.elapsed().as_secs_f64()
                );
                return FetchResult::TimedOut { attempts: attempt };
            }

            let wait = self.policy.jittered_delay(attempt);
            tracing::warn!(
                "Backing off {:.1} seconds after {} tries fetching {}",
                wait.as_secs_f64(),
                attempt,
                url
            );
            tokio::time::sleep(wait).await;
            attempt += 1;
        }
    }

    async fn fetch_once(&self, url: &Url) -> Attempt {
        let response = match self.client.get(url.clone()).send().await {
            Ok(response) => response,
            Err(e) => return classify_error(e),
        };

        let status = response.status();
        if status != StatusCode::OK {
            return Attempt::Done(Err(Failure::Status(status.as_u16())));
        }

        match response.text().await {
            Ok(body) => Attempt::Done(Ok(body)),
            Err(e) => classify_error(e),
        }
    }
}

fn classify_error(error: reqwest::Error) -> Attempt {
    if error.is_timeout() {
        Attempt::Timeout
    } else {
        Attempt::Done(Err(Failure::Network(error.to_string())))
    }
}
