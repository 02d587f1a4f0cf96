//! Per-host politeness gate
//!
//! Enforces a minimum inter-request interval against each host. Requests to
//! one host serialize through that host's slot and sleep out the remainder
//! of the interval; different hosts never wait on each other.

use dashmap::DashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

#[derive(Debug)]
pub struct HostGate {
    min_interval: Duration,
    last_request: DashMap<String, Arc<Mutex<Option<Instant>>>>,
}

impl HostGate {
    #[must_use]
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            last_request: DashMap::new(),
        }
    }

    /// Wait until this host may be contacted again, then claim the slot
    pub async fn admit(&self, host: &str) {
        if self.min_interval.is_zero() {
            return;
        }
        let slot = Arc::clone(
            self.last_request
                .entry(host.to_string())
                .or_insert_with(|| Arc::new(Mutex::new(None)))
                .value(),
        );
        let mut last = slot.lock().await;
        if let Some(prev) = *last {
            let due = prev + self.min_interval;
            let now = Instant::now();
            if due > now {
                tokio::time::sleep(due - now).await;
            }
        }
        *last = Some(Instant::now());
    }

    /// Number of hosts currently tracked
    #[must_use]
    pub fn tracked_hosts(&self) -> usize {
        self.last_request.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn spaces_requests_to_one_host() {
        let gate = HostGate::new(Duration::from_millis(40));
        let started = Instant::now();
        gate.admit("example.com").await;
        gate.admit("example.com").await;
        gate.admit("example.com").await;
        assert!(started.elapsed() >= Duration::from_millis(80));
    }

    #[tokio::test]
    async fn hosts_do_not_block_each_other() {
        let gate = HostGate::new(Duration::from_millis(200));
        gate.admit("a.example.com").await;
        let started = Instant::now();
        gate.admit("b.example.com").await;
        assert!(started.elapsed() < Duration::from_millis(100));
        assert_eq!(gate.tracked_hosts(), 2);
    }

    #[tokio::test]
    async fn zero_interval_is_a_no_op() {
        let gate = HostGate::new(Duration::ZERO);
        gate.admit("example.com").await;
        gate.admit("example.com").await;
        assert_eq!(gate.tracked_hosts(), 0);
    }
}
