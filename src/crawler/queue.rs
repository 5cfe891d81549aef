//! Shared work queue with a completion barrier
//!
//! The queue is filled once before workers start. Workers `take` items; each
//! taken item is marked done when its [`WorkItem`] guard is dropped, whichever
//! way the worker leaves the iteration (normal end, early return, panic or
//! cancellation). [`WorkQueue::join`] resolves once the queue is drained and
//! every taken item is done.

use std::collections::VecDeque;
use std::ops::Deref;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::Notify;

struct Inner<T> {
    pending: Mutex<VecDeque<T>>,
    unfinished: AtomicUsize,
    finished: Notify,
}

impl<T> Inner<T> {
    fn mark_done(&self) {
        if self.unfinished.fetch_sub(1, Ordering::AcqRel) == 1 {
            self.finished.notify_waiters();
        }
    }
}

/// FIFO pool of pending work shared across workers
pub struct WorkQueue<T> {
    inner: Arc<Inner<T>>,
}

impl<T> Clone for WorkQueue<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> WorkQueue<T> {
    /// Creates a queue pre-populated with `items`
    pub fn new(items: impl IntoIterator<Item = T>) -> Self {
        let pending: VecDeque<T> = items.into_iter().collect();
        let unfinished = AtomicUsize::new(pending.len());

        Self {
            inner: Arc::new(Inner {
                pending: Mutex::new(pending),
                unfinished,
                finished: Notify::new(),
            }),
        }
    }

    /// Takes the next item, or `None` once the queue is empty
    pub fn take(&self) -> Option<WorkItem<T>> {
        let value = self
            .inner
            .pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front()?;

        Some(WorkItem {
            value,
            queue: Arc::clone(&self.inner),
        })
    }

    /// Items not yet taken
    pub fn remaining(&self) -> usize {
        self.inner
            .pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Items not yet taken plus items taken but not yet done
    pub fn unfinished(&self) -> usize {
        self.inner.unfinished.load(Ordering::Acquire)
    }

    /// Waits until every item has been taken and marked done
    pub async fn join(&self) {
        loop {
            let finished = self.inner.finished.notified();
            if self.unfinished() == 0 {
                return;
            }
            finished.await;
        }
    }
}

/// A taken queue item; marks itself done on drop
pub struct WorkItem<T> {
    value: T,
    queue: Arc<Inner<T>>,
}

impl<T> Deref for WorkItem<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.value
    }
}

impl<T> Drop for WorkItem<T> {
    fn drop(&mut self) {
        self.queue.mark_done();
    }
}
