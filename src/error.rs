//! Error types for the crawl pipeline
//!
//! One sum type covers every failure the pipeline can surface, from
//! per-document faults that the run absorbs to fatal-init conditions that
//! stop the controller before it ever reaches Running.

use std::time::Duration;
use thiserror::Error;

/// Result type alias for pipeline operations
pub type PipelineResult<T> = Result<T, PipelineError>;

/// Error types for pipeline operations
#[derive(Debug, Error)]
pub enum PipelineError {
    /// A required configuration key or file is missing
    #[error("Missing configuration: {0}")]
    ConfigMissing(String),

    /// A crawl start URI could not be reached during validation
    #[error("Crawl start '{uri}' is unreachable: {cause}")]
    StartUnreachable { uri: String, cause: String },

    /// Another run already holds the lock file on this work directory
    #[error("Crawl lock is held by another run: {0}")]
    LockBusy(String),

    /// Extraction failed for a single document
    #[error("Extract failed for document {doc_id}: {cause}")]
    ExtractFailed { doc_id: String, cause: String },

    /// Transformation failed for a single document
    #[error("Transform failed for document {doc_id}: {cause}")]
    TransformFailed { doc_id: String, cause: String },

    /// Publishing failed for a batch of documents
    #[error("Publish failed for {} document(s): {cause}", doc_ids.len())]
    PublishFailed { doc_ids: Vec<String>, cause: String },

    /// The search index did not accept the request
    #[error("Search index unavailable: {0}")]
    IndexUnavailable(String),

    /// The per-run document budget was reached
    #[error("Document budget of {0} exceeded")]
    BudgetExceeded(usize),

    /// The run was aborted, administratively or by a fatal upstream error
    #[error("Crawl run aborted")]
    Aborted,

    /// The residual flush did not finish within its deadline
    #[error("Flush did not complete within {0:?}")]
    FlushTimeout(Duration),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl PipelineError {
    /// Check if error is transient and worth one more attempt
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            PipelineError::IndexUnavailable(_) | PipelineError::Io(_)
        )
    }

    /// Check if error prevents the controller from ever entering Running
    #[must_use]
    pub fn is_fatal_init(&self) -> bool {
        matches!(
            self,
            PipelineError::ConfigMissing(_) | PipelineError::StartUnreachable { .. }
        )
    }

    /// Suggested delay before retrying a transient failure
    #[must_use]
    pub fn retry_delay(&self) -> Option<Duration> {
        if self.is_transient() {
            Some(Duration::from_millis(250))
        } else {
            None
        }
    }
}

/// Retry schedule for publisher submits and commits
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Attempts beyond the first
    pub max_retries: u32,
    /// Delay before the first retry
    pub initial_delay: Duration,
    /// Added per subsequent retry (linear backoff)
    pub delay_step: Duration,
}

impl RetryPolicy {
    /// One retry, used for batch submits
    #[must_use]
    pub fn submit() -> Self {
        Self {
            max_retries: 1,
            initial_delay: Duration::from_millis(250),
            delay_step: Duration::ZERO,
        }
    }

    /// Two retries with linear backoff, used for commits
    #[must_use]
    pub fn commit() -> Self {
        Self {
            max_retries: 2,
            initial_delay: Duration::from_millis(500),
            delay_step: Duration::from_millis(500),
        }
    }

    /// Delay for a given retry number (0-based)
    #[must_use]
    pub fn delay_for(&self, retry: u32) -> Duration {
        self.initial_delay + self.delay_step * retry
    }
}
