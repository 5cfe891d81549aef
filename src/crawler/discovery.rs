//! Page-count discovery from the listing's pagination

use crate::config::CatalogConfig;
use crate::crawler::fetcher::{FetchResult, PageFetcher};
use crate::crawler::parser::extract_last_page;
use crate::crawler::plan::page_url;
use crate::HarvestError;
use url::Url;

/// Page probed for the "last page" link
const PROBE_PAGE: u32 = 1;

/// Determines how many pages the listing has
///
/// Fetches the listing at page 1 and reads the last-page link. When the
/// request fails or the link is missing, `page-count-fallback` is used if
/// configured; otherwise the run cannot be planned and an error is returned.
pub async fn discover_page_count(
    fetcher: &PageFetcher,
    catalog: &CatalogConfig,
) -> Result<u32, HarvestError> {
    let listing = Url::parse(&catalog.listing_url)?;
    let probe = page_url(&listing, &catalog.page_param, PROBE_PAGE);

    let failure = match fetcher.fetch(&probe).await {
        FetchResult::Success { body, .. } => {
            match extract_last_page(&body, &probe, &catalog.page_param) {
                Some(count) => {
                    tracing::info!("Discovered {} pages from {}", count, probe);
                    return Ok(count);
                }
                None => "no last-page link found".to_string(),
            }
        }
        FetchResult::HttpError { status_code, .. } => format!("HTTP {}", status_code),
        FetchResult::TimedOut { attempts } => format!("timed out after {} tries", attempts),
        FetchResult::NetworkError { error, .. } => error,
    };

    match catalog.page_count_fallback {
        Some(fallback) => {
            tracing::warn!(
                "Page count discovery failed ({}), falling back to {} pages",
                failure,
                fallback
            );
            Ok(fallback)
        }
        None => Err(HarvestError::Discovery(failure)),
    }
}
