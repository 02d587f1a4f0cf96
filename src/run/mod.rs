//! Run lifecycle: controller, lock file, service tracker, timer, mail

pub mod controller;
pub mod lock;
pub mod mail;
pub mod service_tracker;
pub mod timer;

use chrono::{DateTime, Utc};

pub use controller::{RunController, RunOutcome, RunStatus};
pub use lock::LockFile;
pub use mail::MailNotifier;
pub use service_tracker::ServiceTracker;
pub use timer::ServiceTimer;

/// Which kind of crawl a run performs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CrawlType {
    Full,
    Incremental,
}

impl CrawlType {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Full => "Full",
            Self::Incremental => "Incremental",
        }
    }
}

/// Per-invocation crawl context shared read-only with the phases
#[derive(Debug, Clone)]
pub struct CrawlRun {
    pub crawl_type: CrawlType,
    pub started_at: DateTime<Utc>,
    pub last_full_at: Option<DateTime<Utc>>,
    pub last_incremental_at: Option<DateTime<Utc>>,
    pub document_budget: usize,
}
