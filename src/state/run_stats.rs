use std::sync::atomic::{AtomicU64, Ordering};

/// Progress counters for a single run
///
/// Counters only ever increase and are never persisted.
#[derive(Debug, Default)]
pub struct RunStats {
    completed: AtomicU64,
    failed: AtomicU64,
    records: AtomicU64,
    retries: AtomicU64,
}

impl RunStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a finished page (successful or not) and returns the running count
    pub fn page_done(&self, success: bool, records: usize) -> u64 {
        if success {
            self.records.fetch_add(records as u64, Ordering::Relaxed);
        } else {
            self.failed.fetch_add(1, Ordering::Relaxed);
        }
        self.completed.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// Adds backoff retries performed for one page
    pub fn add_retries(&self, retries: u32) {
        self.retries.fetch_add(u64::from(retries), Ordering::Relaxed);
    }

    pub fn completed(&self) -> u64 {
        self.completed.load(Ordering::Relaxed)
    }

    pub fn failed(&self) -> u64 {
        self.failed.load(Ordering::Relaxed)
    }

    pub fn records(&self) -> u64 {
        self.records.load(Ordering::Relaxed)
    }

    pub fn retries(&self) -> u64 {
        self.retries.load(Ordering::Relaxed)
    }
}
