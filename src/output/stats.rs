//! Statistics generation from a stored snapshot
//!
//! This module provides functionality for extracting and displaying
//! statistics about the harvested records.

use crate::state::{PageIndex, PhotoRecord};
use crate::storage::RecordStore;
use crate::HarvestError;
use std::collections::BTreeSet;

/// Snapshot statistics summary
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StoreStatistics {
    /// Total number of stored records
    pub total_records: usize,

    /// Number of distinct pages the records came from
    pub distinct_pages: usize,

    /// Lowest and highest stored page index
    pub page_range: Option<(PageIndex, PageIndex)>,

    /// Records carrying no page index
    pub untagged_records: usize,

    /// Missing values per content field, in column order
    pub missing: [(&'static str, usize); 5],
}

impl StoreStatistics {
    /// Computes statistics over a set of records
    pub fn from_records(records: &[PhotoRecord]) -> Self {
        let pages: BTreeSet<PageIndex> = records.iter().filter_map(|r| r.page_index).collect();

        let count = |field: fn(&PhotoRecord) -> bool| records.iter().filter(|r| field(r)).count();

        Self {
            total_records: records.len(),
            distinct_pages: pages.len(),
            page_range: pages.first().copied().zip(pages.last().copied()),
            untagged_records: count(|r| r.page_index.is_none()),
            missing: [
                ("description", count(|r| r.description.is_none())),
                ("location", count(|r| r.location.is_none())),
                ("date", count(|r| r.date.is_none())),
                ("photographer", count(|r| r.photographer.is_none())),
                ("external_id", count(|r| r.external_id.is_none())),
            ],
        }
    }
}

/// Loads statistics from a store
///
/// A store without a snapshot yields empty statistics.
pub fn load_statistics(store: &dyn RecordStore) -> Result<StoreStatistics, HarvestError> {
    let records = store.load()?.unwrap_or_default();
    Ok(StoreStatistics::from_records(&records))
}

/// Prints statistics to stdout in a formatted manner
pub fn print_statistics(stats: &StoreStatistics) {
    println!("=== Snapshot Statistics ===\n");

    println!("Overview:");
    println!("  Total records: {}", stats.total_records);
    println!("  Distinct pages: {}", stats.distinct_pages);
    if let Some((first, last)) = stats.page_range {
        println!("  Page range: {} - {}", first, last);
    }
    if stats.untagged_records > 0 {
        println!("  Records without page: {}", stats.untagged_records);
    }
    println!();

    println!("Missing Values:");
    for (field, missing) in &stats.missing {
        let percentage = if stats.total_records > 0 {
            (*missing as f64 / stats.total_records as f64) * 100.0
        } else {
            0.0
        };
        println!("  {}: {} ({:.1}%)", field, missing, percentage);
    }
}
