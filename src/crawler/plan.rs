//! Crawl plan construction: page URLs and queued jobs

use crate::config::SubjectEntry;
use crate::state::{CrawlJob, PageIndex};
use url::Url;

/// Builds the URL of one listing page
pub fn page_url(listing: &Url, page_param: &str, page: PageIndex) -> Url {
    let mut url = listing.clone();
    url.query_pairs_mut()
        .append_pair(page_param, &page.to_string());
    url
}

/// Jobs for the catalog crawl; records are tagged with their page
pub fn catalog_jobs(listing: &Url, page_param: &str, pages: &[PageIndex]) -> Vec<CrawlJob> {
    pages
        .iter()
        .map(|&page| CrawlJob {
            page,
            url: page_url(listing, page_param, page),
            tag_page: true,
            label: format!("page nr {}", page),
        })
        .collect()
}

/// Jobs for the subject search crawl: pages `1..=pages` of every subject
pub fn subject_jobs(listing: &Url, page_param: &str, subjects: &[SubjectEntry]) -> Vec<CrawlJob> {
    subjects
        .iter()
        .flat_map(|subject| {
            (1..=subject.pages).map(move |page| {
                let mut url = listing.clone();
                url.query_pairs_mut()
                    .append_pair("m_messages", "1")
                    .append_pair("search", &subject.name)
                    .append_pair("q", "1")
                    .append_pair(page_param, &page.to_string());
                CrawlJob {
                    page,
                    url,
                    tag_page: false,
                    label: format!("page {} for {}", page, subject.name),
                }
            })
        })
        .collect()
}
