//! HTML parser for catalog listing pages
//!
//! This module extracts:
//! - Photo rows from a listing page
//! - The last page number from the pagination links

use crate::state::{PageIndex, PhotoRecord};
use scraper::{ElementRef, Html, Selector};
use url::Url;

/// Rows carrying data use alternating row classes
const ROW_SELECTOR: &str = "tr.odd, tr.even";
const CELL_SELECTOR: &str = "td";
const IMAGE_SELECTOR: &str = "a.popup_image[href]";
const LAST_PAGE_SELECTOR: &str = "li.last a[href]";

/// Minimum cells for a row to qualify; the first five are the content fields
pub const MIN_CELLS: usize = 5;

/// Extracts the photo records of one listing page
///
/// # Row Rules
///
/// A row becomes a record only if it:
/// - carries the `odd` or `even` class
/// - has at least [`MIN_CELLS`] cells
/// - contains an `a.popup_image` anchor with an `href`
///
/// Other rows (pagination, headers, broken markup) are skipped silently.
/// The first five cells map in order to description, location, date,
/// photographer and external id; empty cells become `None`.
///
/// # Example
///
/// ```
/// use fotis_harvest::crawler::parse_page;
///
/// let html = r#"<table><tr class="odd">
///     <td>Harbour</td><td>Tallinn</td><td>1936</td><td>J. Riet</td><td>EFA.1.2</td>
///     <td><a class="popup_image" href="/img/1.jpg">view</a></td>
/// </tr></table>"#;
/// let records = parse_page(html);
/// assert_eq!(records.len(), 1);
/// assert_eq!(records[0].image_href, "/img/1.jpg");
/// ```
pub fn parse_page(html: &str) -> Vec<PhotoRecord> {
    let (Ok(rows), Ok(cells), Ok(image)) = (
        Selector::parse(ROW_SELECTOR),
        Selector::parse(CELL_SELECTOR),
        Selector::parse(IMAGE_SELECTOR),
    ) else {
        return Vec::new();
    };

    let document = Html::parse_document(html);

    let records = document
        .select(&rows)
        .filter_map(|row| parse_row(row, &cells, &image))
        .collect();
    records
}

fn parse_row(row: ElementRef<'_>, cells: &Selector, image: &Selector) -> Option<PhotoRecord> {
    let tds: Vec<ElementRef<'_>> = row.select(cells).collect();
    if tds.len() < MIN_CELLS {
        return None;
    }

    let image_href = row.select(image).next()?.value().attr("href")?.to_string();

    let texts: [String; 5] = std::array::from_fn(|i| cell_text(tds[i]));
    Some(PhotoRecord::from_cells(texts, image_href))
}

/// Joins the trimmed text fragments of a cell
fn cell_text(cell: ElementRef<'_>) -> String {
    cell.text()
        .map(str::trim)
        .filter(|fragment| !fragment.is_empty())
        .collect()
}

/// Reads the highest page number from the "last page" pagination link
///
/// The link href may be relative; it is resolved against `base_url` and the
/// `page_param` query parameter is parsed as the page number.
pub fn extract_last_page(html: &str, base_url: &Url, page_param: &str) -> Option<PageIndex> {
    let selector = Selector::parse(LAST_PAGE_SELECTOR).ok()?;
    let document = Html::parse_document(html);

    let href = document.select(&selector).next()?.value().attr("href")?;
    let target = base_url.join(href.trim()).ok()?;

    target
        .query_pairs()
        .find(|(key, _)| key == page_param)
        .and_then(|(_, value)| value.parse().ok())
}
