//! Resume index: what a previous run already collected

use crate::state::{PageIndex, PhotoRecord};
use crate::storage::traits::{RecordStore, StorageResult};
use std::collections::BTreeSet;

/// Records of earlier runs and the pages they cover
#[derive(Debug, Clone, Default)]
pub struct ResumeIndex {
    prior: Vec<PhotoRecord>,
    seen: BTreeSet<PageIndex>,
}

/// Outcome of merging a run's records into the prior snapshot
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MergeReport {
    /// Records in the prior snapshot
    pub prior: usize,

    /// Records collected this run
    pub added: usize,

    /// Prior records dropped because this run collected their page again
    pub replaced: usize,
}

impl MergeReport {
    pub fn total(&self) -> usize {
        self.prior + self.added - self.replaced
    }
}

impl ResumeIndex {
    /// Loads the prior snapshot; a missing snapshot yields an empty index
    pub fn load(store: &dyn RecordStore) -> StorageResult<Self> {
        Ok(store.load()?.map(Self::from_records).unwrap_or_default())
    }

    pub fn from_records(prior: Vec<PhotoRecord>) -> Self {
        let seen = prior.iter().filter_map(|r| r.page_index).collect();
        Self { prior, seen }
    }

    /// Pages present in the prior snapshot
    pub fn seen_pages(&self) -> &BTreeSet<PageIndex> {
        &self.seen
    }

    pub fn prior_records(&self) -> &[PhotoRecord] {
        &self.prior
    }

    /// Pages of `first .. first + count` not collected by an earlier run, ascending
    pub fn plan(&self, first: PageIndex, count: u32) -> Vec<PageIndex> {
        (first..first.saturating_add(count))
            .filter(|page| !self.seen.contains(page))
            .collect()
    }

    /// Appends `fresh` to the prior records
    ///
    /// The crawl plan never includes a seen page, so overlap is not expected.
    /// If a page does appear in both, the prior rows for that page are
    /// dropped in favour of the fresh ones and the count is reported.
    pub fn merge(self, fresh: Vec<PhotoRecord>) -> (Vec<PhotoRecord>, MergeReport) {
        let overlap: BTreeSet<PageIndex> = fresh
            .iter()
            .filter_map(|r| r.page_index)
            .filter(|page| self.seen.contains(page))
            .collect();

        let prior = self.prior.len();
        let added = fresh.len();

        let mut merged: Vec<PhotoRecord> = if overlap.is_empty() {
            self.prior
        } else {
            self.prior
                .into_iter()
                .filter(|r| !r.page_index.is_some_and(|page| overlap.contains(&page)))
                .collect()
        };
        let replaced = prior - merged.len();

        if replaced > 0 {
            tracing::warn!(
                "Pages {:?} were already stored; replaced {} prior records with fresh ones",
                overlap,
                replaced
            );
        }

        merged.extend(fresh);
        (
            merged,
            MergeReport {
                prior,
                added,
                replaced,
            },
        )
    }
}
