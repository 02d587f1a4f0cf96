//! Per-run crawl metrics
//!
//! The publisher emits each completed queue item onto a metrics tap; this
//! module decodes the phase-time segments and keeps per-phase totals. Error
//! rows arrive with a `<phase>-error` label and count against the phase
//! they failed in.

use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::sync::Arc;

use crate::queue::{CrawlQueue, Sentinel, decode_item};

/// Aggregated figures for one phase
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PhaseStats {
    pub count: u64,
    pub total_ms: u64,
    pub max_ms: u64,
    pub errors: u64,
}

/// Per-run metrics accumulator
#[derive(Debug, Default)]
pub struct CrawlMetrics {
    phases: BTreeMap<String, PhaseStats>,
    /// Most recent error items, newest last, capped for the mail body
    error_items: Vec<String>,
    items_seen: u64,
}

/// How many error items the mail body carries
const ERROR_ITEMS_KEPT: usize = 10;

impl CrawlMetrics {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one completed (or errored) queue item
    pub fn record(&mut self, item: &str) {
        let Some((_, phases)) = decode_item(item) else {
            return;
        };
        self.items_seen += 1;
        let mut had_error = false;
        for (label, millis) in phases {
            match label.strip_suffix("-error") {
                Some(phase) => {
                    self.phases.entry(phase.to_string()).or_default().errors += 1;
                    had_error = true;
                }
                None => {
                    let stats = self.phases.entry(label).or_default();
                    stats.count += 1;
                    stats.total_ms += millis;
                    stats.max_ms = stats.max_ms.max(millis);
                }
            }
        }
        if had_error {
            if self.error_items.len() == ERROR_ITEMS_KEPT {
                self.error_items.remove(0);
            }
            self.error_items.push(item.to_string());
        }
    }

    #[must_use]
    pub fn phase(&self, name: &str) -> PhaseStats {
        self.phases.get(name).copied().unwrap_or_default()
    }

    #[must_use]
    pub fn items_seen(&self) -> u64 {
        self.items_seen
    }

    #[must_use]
    pub fn total_errors(&self) -> u64 {
        self.phases.values().map(|s| s.errors).sum()
    }

    #[must_use]
    pub fn error_items(&self) -> &[String] {
        &self.error_items
    }

    /// Render the human-readable end-of-run summary
    #[must_use]
    pub fn summary(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "Crawl metrics: {} item(s)", self.items_seen);
        for (phase, stats) in &self.phases {
            let avg = if stats.count > 0 {
                stats.total_ms / stats.count
            } else {
                0
            };
            let _ = writeln!(
                out,
                "  {phase}: count={} total_ms={} avg_ms={avg} max_ms={} errors={}",
                stats.count, stats.total_ms, stats.max_ms, stats.errors
            );
        }
        out
    }
}

/// Drain the metrics tap until its terminal sentinel and return the totals
pub async fn run_tap(tap: Arc<CrawlQueue>) -> CrawlMetrics {
    let mut metrics = CrawlMetrics::new();
    loop {
        let item = tap.take().await;
        match Sentinel::parse(&item) {
            Some(Sentinel::CrawlStart) => {}
            Some(_) => return metrics,
            None => metrics.record(&item),
        }
    }
}
