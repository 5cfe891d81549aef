//! Photo record and crawl job definitions

use url::Url;

/// Index of one page of the paginated catalog listing
pub type PageIndex = u32;

/// One photo row extracted from a catalog page
///
/// The five content fields are `None` when the source cell was empty;
/// an extracted empty string is never stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhotoRecord {
    pub description: Option<String>,
    pub location: Option<String>,
    pub date: Option<String>,
    pub photographer: Option<String>,
    pub external_id: Option<String>,

    /// Relative link to the full-size image
    pub image_href: String,

    /// Page the row came from (catalog crawl only)
    pub page_index: Option<PageIndex>,
}

impl PhotoRecord {
    /// Builds a record from the raw text of the five content cells
    pub fn from_cells(cells: [String; 5], image_href: String) -> Self {
        let [description, location, date, photographer, external_id] = cells.map(non_empty);
        Self {
            description,
            location,
            date,
            photographer,
            external_id,
            image_href,
            page_index: None,
        }
    }

    /// Tags the record with the page it was extracted from
    pub fn on_page(mut self, page: PageIndex) -> Self {
        self.page_index = Some(page);
        self
    }
}

/// Maps an empty string to `None`
pub fn non_empty(value: String) -> Option<String> {
    if value.is_empty() {
        None
    } else {
        Some(value)
    }
}

/// A single page fetch queued for the worker pool
#[derive(Debug, Clone)]
pub struct CrawlJob {
    /// Page index within its listing
    pub page: PageIndex,

    /// Fully built page URL
    pub url: Url,

    /// Whether extracted records are tagged with `page`
    pub tag_page: bool,

    /// Human readable label used in log lines
    pub label: String,
}
