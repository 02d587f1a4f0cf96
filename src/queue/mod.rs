//! Bounded inter-phase crawl queues
//!
//! The three ETL phases share nothing but these queues. Each queue is a
//! FIFO of printable strings (see [`item`] for the wire format) with one
//! twist: lifecycle sentinels bypass the capacity bound so a full pipe can
//! always be told to shut down, while regular `put`s block on backpressure
//! and fail once the run is aborting.

pub mod item;

use std::collections::VecDeque;
use std::pin::pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::{Mutex, Notify};

use crate::error::{PipelineError, PipelineResult};
pub use item::{Sentinel, append_phase, decode_item, encode_item};

/// Default queue capacity
pub const DEFAULT_QUEUE_LENGTH: usize = 5120;

/// Shared cancellation handle for a crawl run
///
/// Workers check it on every loop iteration; blocked queue producers wake
/// when it trips.
#[derive(Debug, Clone, Default)]
pub struct AbortFlag {
    inner: Arc<AbortInner>,
}

#[derive(Debug, Default)]
struct AbortInner {
    set: AtomicBool,
    notify: Notify,
}

impl AbortFlag {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Request abort; wakes every blocked producer
    pub fn set(&self) {
        self.inner.set.store(true, Ordering::SeqCst);
        self.inner.notify.notify_waiters();
    }

    #[must_use]
    pub fn is_set(&self) -> bool {
        self.inner.set.load(Ordering::SeqCst)
    }

    /// Wait until the flag trips; returns immediately if already set
    pub async fn wait(&self) {
        let mut notified = pin!(self.inner.notify.notified());
        notified.as_mut().enable();
        if self.is_set() {
            return;
        }
        notified.await;
    }
}

/// Bounded FIFO of queue-item strings joining two pipeline phases
#[derive(Debug)]
pub struct CrawlQueue {
    inner: Mutex<VecDeque<String>>,
    capacity: usize,
    not_full: Notify,
    not_empty: Notify,
    abort: AbortFlag,
}

impl CrawlQueue {
    #[must_use]
    pub fn new(capacity: usize, abort: AbortFlag) -> Self {
        Self {
            inner: Mutex::new(VecDeque::with_capacity(capacity.min(1024))),
            capacity: capacity.max(1),
            not_full: Notify::new(),
            not_empty: Notify::new(),
            abort,
        }
    }

    /// Enqueue a regular item, blocking while the queue is at capacity
    ///
    /// # Errors
    ///
    /// Returns `Aborted` once the run's abort flag is set; the item is
    /// dropped in that case.
    pub async fn put(&self, item: String) -> PipelineResult<()> {
        let mut item = Some(item);
        loop {
            if self.abort.is_set() {
                return Err(PipelineError::Aborted);
            }
            let mut notified = pin!(self.not_full.notified());
            notified.as_mut().enable();
            {
                let mut q = self.inner.lock().await;
                if q.len() < self.capacity {
                    q.push_back(item.take().unwrap_or_default());
                    drop(q);
                    self.not_empty.notify_one();
                    return Ok(());
                }
            }
            tokio::select! {
                () = notified => {}
                () = self.abort.wait() => {}
            }
        }
    }

    /// Enqueue a lifecycle sentinel
    ///
    /// Sentinels bypass the capacity bound and never fail, but they are
    /// pushed through the same lock as `put`, so they never reorder across
    /// a preceding item.
    pub async fn put_sentinel(&self, sentinel: Sentinel) {
        let mut q = self.inner.lock().await;
        q.push_back(sentinel.as_str().to_string());
        drop(q);
        self.not_empty.notify_one();
    }

    /// Dequeue the next item, blocking while the queue is empty
    ///
    /// Delivery is exactly-once across any number of consumers. Shutdown is
    /// signalled in-band: consumers interpret the sentinel items.
    pub async fn take(&self) -> String {
        loop {
            let mut notified = pin!(self.not_empty.notified());
            notified.as_mut().enable();
            {
                let mut q = self.inner.lock().await;
                if let Some(item) = q.pop_front() {
                    drop(q);
                    self.not_full.notify_one();
                    return item;
                }
            }
            notified.await;
        }
    }

    /// Number of items currently queued
    pub async fn len(&self) -> usize {
        self.inner.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.lock().await.is_empty()
    }

    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
