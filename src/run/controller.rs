//! Run controller
//!
//! Owns the lock file, decides full vs incremental, wires the queues, spawns
//! the three phase pools plus the metrics tap, bounds the final flush and
//! reports the outcome by mail. The controller's own state is
//! single-threaded; the worker pools are the only concurrency.
//!
//! ```text
//! Idle ─start─▶ Locking ─lockOk─▶ Loading ─cfgOk─▶ Starting ─▶ Running
//!                  │ lockBusy ─▶ Idle                             │
//!                  ▼                          finish/abort ◀──────┘
//!                 Idle                              │
//!                                Reporting ◀─ Flushing ─▶ Unlocking ─▶ Idle
//! ```

use chrono::Utc;
use log::{error, info, warn};
use std::path::PathBuf;
use std::sync::Arc;

use super::lock::LockFile;
use super::mail::{MailNotifier, MailStatus};
use super::service_tracker::ServiceTracker;
use super::timer::ServiceTimer;
use super::{CrawlRun, CrawlType};
use crate::config::ConnectorConfig;
use crate::error::{PipelineError, PipelineResult};
use crate::extract;
use crate::metrics::{self, CrawlMetrics};
use crate::publish::{self, PublishSummary, SearchIndex};
use crate::queue::{AbortFlag, CrawlQueue, Sentinel};
use crate::staging::StagingArea;
use crate::transform::{self, DocumentHandoff};
use crate::uri_matcher::UriRules;

/// How a run ended, as reported in mail and logs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    /// Clean completion
    Success,
    /// Document budget reached; committed work stands
    SuccessWithCap,
    /// Neither crawl type was due; nothing ran
    NotDue,
    /// Lock busy, fatal-init, or a failed run
    Failure,
}

/// Final outcome of one controller invocation
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub status: RunStatus,
    /// Process exit code: 0 normal, 1 fatal-init, 2 lock-busy
    pub exit_code: i32,
    pub crawl_type: Option<CrawlType>,
    pub published: u64,
    pub commits: u64,
    pub last_error: Option<String>,
    pub metrics_summary: Option<String>,
}

impl RunOutcome {
    fn failure(exit_code: i32, error: impl Into<String>) -> Self {
        Self {
            status: RunStatus::Failure,
            exit_code,
            crawl_type: None,
            published: 0,
            commits: 0,
            last_error: Some(error.into()),
            metrics_summary: None,
        }
    }
}

/// The run controller bound to a connector configuration and an index
pub struct RunController<I> {
    config: Arc<ConnectorConfig>,
    index: Arc<I>,
    notifier: MailNotifier,
}

impl<I: SearchIndex + 'static> RunController<I> {
    #[must_use]
    pub fn new(config: ConnectorConfig, index: Arc<I>) -> Self {
        let notifier = MailNotifier::new(config.mail().clone());
        Self {
            config: Arc::new(config),
            index,
            notifier,
        }
    }

    /// Execute one run: lock, load, crawl, flush, report, unlock
    ///
    /// `force` overrides the service timer; otherwise the timer decides
    /// (full wins when both are due). `abort` is the administrative abort
    /// handle; pass a fresh flag when no external abort source exists.
    pub async fn run_once(&self, force: Option<CrawlType>, abort: AbortFlag) -> RunOutcome {
        // Locking
        let lock = match LockFile::acquire(self.config.work_dir()) {
            Ok(lock) => lock,
            Err(e @ PipelineError::LockBusy(_)) => {
                warn!("{e}");
                self.notifier
                    .notify(
                        self.config.name(),
                        "Crawl",
                        MailStatus::Failure,
                        Some(&e.to_string()),
                        &[],
                    )
                    .await;
                return RunOutcome::failure(2, e.to_string());
            }
            Err(e) => {
                error!("Failed to acquire lock: {e}");
                return RunOutcome::failure(1, e.to_string());
            }
        };

        // Loading
        let loaded = self.load().await;
        let (rules, mut tracker) = match loaded {
            Ok(loaded) => loaded,
            Err(e) => {
                error!("Fatal during loading: {e}");
                self.notifier
                    .notify(
                        self.config.name(),
                        "Crawl",
                        MailStatus::Failure,
                        Some(&e.to_string()),
                        &[],
                    )
                    .await;
                lock.release();
                return RunOutcome::failure(1, e.to_string());
            }
        };

        // Starting: decide crawl type
        let now = Utc::now();
        let timer = ServiceTimer::new(
            self.config.run_full_interval(),
            self.config.run_incremental_interval(),
        );
        let crawl_type = match force.or_else(|| timer.due_crawl_type(&tracker, now)) {
            Some(crawl_type) => crawl_type,
            None => {
                info!("No service due; returning to idle");
                lock.release();
                return RunOutcome {
                    status: RunStatus::NotDue,
                    exit_code: 0,
                    crawl_type: None,
                    published: 0,
                    commits: 0,
                    last_error: None,
                    metrics_summary: None,
                };
            }
        };
        let run = CrawlRun {
            crawl_type,
            started_at: now,
            last_full_at: tracker.last_full(),
            last_incremental_at: tracker.last_incremental(),
            document_budget: self.config.publish_max(),
        };
        info!(
            "{} starting {} crawl (budget {})",
            self.config.name(),
            crawl_type.as_str(),
            run.document_budget
        );

        // Running → Flushing
        let (summary, metrics, fatal, aborted) = self.crawl(&run, Arc::new(rules), abort).await;

        // Reporting
        let status = if fatal.is_some() {
            RunStatus::Failure
        } else if summary.budget_exceeded {
            RunStatus::SuccessWithCap
        } else if aborted {
            RunStatus::Failure
        } else {
            RunStatus::Success
        };
        let summary_text = metrics.summary();
        info!("{summary_text}");
        if let Err(e) = std::fs::write(
            self.config.work_dir().join("crawl-metrics.txt"),
            &summary_text,
        ) {
            warn!("Failed to write metrics summary: {e}");
        }
        let last_error = fatal
            .as_ref()
            .map(ToString::to_string)
            .or_else(|| summary.last_error.clone());
        let mail_status = match status {
            RunStatus::Success | RunStatus::SuccessWithCap => MailStatus::Success,
            _ => MailStatus::Failure,
        };
        let budget_note = summary
            .budget_exceeded
            .then(|| PipelineError::BudgetExceeded(self.config.publish_max()).to_string());
        self.notifier
            .notify(
                self.config.name(),
                crawl_type.as_str(),
                mail_status,
                budget_note.as_deref().or(last_error.as_deref()),
                metrics.error_items(),
            )
            .await;

        // Unlocking: a clean run always advances the tracker; an aborted run
        // only when at least one commit succeeded; a fatal run never does.
        let advance = if fatal.is_some() {
            false
        } else if aborted {
            summary.commits > 0
        } else {
            true
        };
        if advance {
            match crawl_type {
                // A full crawl covers everything an incremental would, so it
                // advances both timestamps.
                CrawlType::Full => {
                    tracker.advance_full(run.started_at);
                    tracker.advance_incremental(run.started_at);
                }
                CrawlType::Incremental => tracker.advance_incremental(run.started_at),
            }
            if let Err(e) = tracker.save(self.config.work_dir()) {
                warn!("Failed to persist service tracker: {e}");
            }
        }
        lock.release();

        RunOutcome {
            status,
            exit_code: 0,
            crawl_type: Some(crawl_type),
            published: summary.published,
            commits: summary.commits,
            last_error,
            metrics_summary: Some(summary_text),
        }
    }

    async fn load(&self) -> PipelineResult<(UriRules, ServiceTracker)> {
        let rules = UriRules::load(
            self.config.crawl_start_file(),
            self.config.crawl_follow_file().map(PathBuf::as_path),
            self.config.crawl_ignore_file().map(PathBuf::as_path),
        )?;
        let client = self
            .config
            .http_client()
            .map_err(|e| PipelineError::ConfigMissing(format!("http client: {e}")))?;
        rules.validate_starts(&client).await?;
        // A missing tracker just means first run.
        let tracker = ServiceTracker::load(self.config.work_dir());
        Ok((rules, tracker))
    }

    /// Spawn the phase pools, join them, bound the residual flush
    async fn crawl(
        &self,
        run: &CrawlRun,
        rules: Arc<UriRules>,
        abort: AbortFlag,
    ) -> (
        PublishSummary,
        CrawlMetrics,
        Option<PipelineError>,
        bool,
    ) {
        let queue_len = self.config.queue_length();
        let extract_to_transform = Arc::new(CrawlQueue::new(queue_len, abort.clone()));
        let transform_to_publish = Arc::new(CrawlQueue::new(queue_len, abort.clone()));
        // The tap outlives an abort so metrics still aggregate what ran.
        let metrics_tap = Arc::new(CrawlQueue::new(queue_len, AbortFlag::new()));
        let handoff: Arc<DocumentHandoff> = Arc::new(DocumentHandoff::new());

        let staging = match StagingArea::open(self.config.staging_dir()) {
            Ok(staging) => staging,
            Err(e) => {
                return (PublishSummary::default(), CrawlMetrics::new(), Some(e), false);
            }
        };
        // Leftovers from a crashed run would republish stale bodies.
        if let Err(e) = staging.clear().await {
            warn!("Failed to clear staging area: {e}");
        }

        // Abort broadcast: once the flag trips, push CrawlAbort through both
        // queues so blocked consumers wake and drain.
        let watcher = {
            let abort = abort.clone();
            let q1 = Arc::clone(&extract_to_transform);
            let q2 = Arc::clone(&transform_to_publish);
            tokio::spawn(async move {
                abort.wait().await;
                q1.put_sentinel(Sentinel::CrawlAbort).await;
                q2.put_sentinel(Sentinel::CrawlAbort).await;
            })
        };

        let extract_task = tokio::spawn(extract::run(extract::ExtractContext {
            config: Arc::clone(&self.config),
            rules,
            staging: staging.clone(),
            out: Arc::clone(&extract_to_transform),
            metrics_tap: Arc::clone(&metrics_tap),
            abort: abort.clone(),
            last_incremental_at: match run.crawl_type {
                CrawlType::Incremental => run.last_incremental_at,
                CrawlType::Full => None,
            },
        }));
        let transform_task = tokio::spawn(transform::run(transform::TransformContext {
            config: Arc::clone(&self.config),
            staging: staging.clone(),
            input: Arc::clone(&extract_to_transform),
            out: Arc::clone(&transform_to_publish),
            metrics_tap: Arc::clone(&metrics_tap),
            handoff: Arc::clone(&handoff),
            abort: abort.clone(),
        }));
        let mut publish_task = tokio::spawn(publish::run(publish::PublishContext {
            config: Arc::clone(&self.config),
            input: Arc::clone(&transform_to_publish),
            metrics_tap: Arc::clone(&metrics_tap),
            handoff: Arc::clone(&handoff),
            index: Arc::clone(&self.index),
            abort: abort.clone(),
        }));
        let metrics_task = tokio::spawn(metrics::run_tap(Arc::clone(&metrics_tap)));

        let mut fatal: Option<PipelineError> = None;

        match extract_task.await {
            Ok(Ok(emitted)) => info!("Extractor emitted {emitted} document(s)"),
            Ok(Err(e)) => {
                error!("Extractor failed: {e}");
                fatal = Some(e);
                abort.set();
            }
            Err(e) => {
                error!("Extract task panicked: {e}");
                fatal = Some(PipelineError::Aborted);
                abort.set();
            }
        }

        if let Err(e) = transform_task.await {
            error!("Transform task panicked: {e}");
            abort.set();
        }

        // Flushing: the publisher's residual submit and final commit run
        // under a bounded deadline; hard-cancel past it.
        let flush_deadline = self.config.flush_timeout();
        let flush_result = tokio::time::timeout(flush_deadline, &mut publish_task).await;
        let summary = match flush_result {
            Ok(Ok(summary)) => summary,
            Ok(Err(e)) => {
                error!("Publish task panicked: {e}");
                metrics_tap.put_sentinel(Sentinel::CrawlAbort).await;
                PublishSummary {
                    last_error: Some(e.to_string()),
                    ..PublishSummary::default()
                }
            }
            Err(_) => {
                error!("Flush deadline of {flush_deadline:?} expired; cancelling publisher");
                abort.set();
                publish_task.abort();
                let _ = publish_task.await;
                metrics_tap.put_sentinel(Sentinel::CrawlAbort).await;
                fatal.get_or_insert(PipelineError::FlushTimeout(flush_deadline));
                PublishSummary::default()
            }
        };

        watcher.abort();
        handoff.clear();
        if abort.is_set()
            && let Err(e) = staging.clear().await
        {
            warn!("Failed to clear staging after abort: {e}");
        }

        let metrics = match metrics_task.await {
            Ok(metrics) => metrics,
            Err(e) => {
                warn!("Metrics task panicked: {e}");
                CrawlMetrics::new()
            }
        };
        let aborted = abort.is_set();
        (summary, metrics, fatal, aborted)
    }
}
