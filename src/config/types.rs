//! Core configuration types for the connector
//!
//! `ConnectorConfig` carries everything a crawl run needs: rule file
//! locations, pool sizes, publisher thresholds, scheduling intervals and
//! the mail endpoint. Values are immutable once a run starts.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// SMTP notification endpoint; notification is skipped when unset
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MailConfig {
    pub(crate) smtp_host: Option<String>,
    pub(crate) from: Option<String>,
    pub(crate) to: Vec<String>,
}

impl MailConfig {
    /// Whether enough is configured to actually send mail
    #[must_use]
    pub fn is_configured(&self) -> bool {
        self.smtp_host.is_some() && self.from.is_some() && !self.to.is_empty()
    }

    #[must_use]
    pub fn smtp_host(&self) -> Option<&str> {
        self.smtp_host.as_deref()
    }

    #[must_use]
    pub fn from_addr(&self) -> Option<&str> {
        self.from.as_deref()
    }

    #[must_use]
    pub fn recipients(&self) -> &[String] {
        &self.to
    }
}

/// Main configuration for a connector instance
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectorConfig {
    /// Connector name; used in mail subjects and log lines
    pub(crate) name: String,
    /// Work directory holding the lock file, staging area and tracker
    pub(crate) work_dir: PathBuf,
    pub(crate) crawl_start_file: PathBuf,
    pub(crate) crawl_follow_file: Option<PathBuf>,
    pub(crate) crawl_ignore_file: Option<PathBuf>,
    pub(crate) queue_length: usize,
    /// Extract pool size; `None` derives from the start kind (1 for web,
    /// core count for file shares)
    pub(crate) extract_threads: Option<usize>,
    pub(crate) transform_threads: usize,
    pub(crate) publish_threads: usize,
    pub(crate) publish_batch: usize,
    pub(crate) publish_commit: usize,
    pub(crate) publish_max: usize,
    pub(crate) run_full_interval: String,
    pub(crate) run_incremental_interval: String,
    /// Minimum inter-request interval per host for web crawls
    pub(crate) politeness_ms: u64,
    pub(crate) max_depth: u8,
    pub(crate) user_agent: String,
    /// Named opt-in for accepting invalid TLS certificates; default off
    pub(crate) insecure_tls: bool,
    /// Also harvest absolute URLs from embedded scripts
    pub(crate) js_aware: bool,
    /// Expand CSV files into one document per data row
    pub(crate) csv_rows: bool,
    /// Field rename map applied during Transform
    pub(crate) field_map: BTreeMap<String, String>,
    /// Fields deleted during Transform
    pub(crate) field_delete: Vec<String>,
    /// Bag copies applied during Transform (source field -> new key)
    pub(crate) bag_copy: BTreeMap<String, String>,
    /// Search index endpoint; tests swap in an in-memory index instead
    pub(crate) index_url: Option<String>,
    pub(crate) flush_timeout_secs: u64,
    pub(crate) request_timeout_secs: u64,
    pub(crate) mail: MailConfig,
}

impl Default for ConnectorConfig {
    fn default() -> Self {
        Self {
            name: "connector".to_string(),
            work_dir: PathBuf::from("./work"),
            crawl_start_file: PathBuf::from("crawl_start.txt"),
            crawl_follow_file: None,
            crawl_ignore_file: None,
            queue_length: crate::queue::DEFAULT_QUEUE_LENGTH,
            extract_threads: None,
            transform_threads: 2,
            publish_threads: 1,
            publish_batch: 100,
            publish_commit: 1000,
            publish_max: 500_000,
            run_full_interval: "1d".to_string(),
            run_incremental_interval: "2h".to_string(),
            politeness_ms: 500,
            max_depth: 3,
            user_agent: concat!("nsd-connector/", env!("CARGO_PKG_VERSION")).to_string(),
            insecure_tls: false,
            js_aware: false,
            csv_rows: false,
            field_map: BTreeMap::new(),
            field_delete: Vec::new(),
            bag_copy: BTreeMap::new(),
            index_url: None,
            flush_timeout_secs: 60,
            request_timeout_secs: 30,
            mail: MailConfig::default(),
        }
    }
}

impl ConnectorConfig {
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn work_dir(&self) -> &PathBuf {
        &self.work_dir
    }

    #[must_use]
    pub fn crawl_start_file(&self) -> &PathBuf {
        &self.crawl_start_file
    }

    #[must_use]
    pub fn crawl_follow_file(&self) -> Option<&PathBuf> {
        self.crawl_follow_file.as_ref()
    }

    #[must_use]
    pub fn crawl_ignore_file(&self) -> Option<&PathBuf> {
        self.crawl_ignore_file.as_ref()
    }

    #[must_use]
    pub fn queue_length(&self) -> usize {
        self.queue_length
    }

    /// Extract pool size for the given start kind
    #[must_use]
    pub fn extract_threads(&self, web_start: bool) -> usize {
        self.extract_threads.unwrap_or(if web_start {
            1
        } else {
            num_cpus::get().min(8)
        })
    }

    #[must_use]
    pub fn transform_threads(&self) -> usize {
        self.transform_threads.max(1)
    }

    #[must_use]
    pub fn publish_threads(&self) -> usize {
        self.publish_threads.max(1)
    }

    #[must_use]
    pub fn publish_batch(&self) -> usize {
        self.publish_batch.max(1)
    }

    #[must_use]
    pub fn publish_commit(&self) -> usize {
        self.publish_commit.max(1)
    }

    #[must_use]
    pub fn publish_max(&self) -> usize {
        self.publish_max
    }

    #[must_use]
    pub fn run_full_interval(&self) -> &str {
        &self.run_full_interval
    }

    #[must_use]
    pub fn run_incremental_interval(&self) -> &str {
        &self.run_incremental_interval
    }

    #[must_use]
    pub fn politeness_ms(&self) -> u64 {
        self.politeness_ms
    }

    #[must_use]
    pub fn max_depth(&self) -> u8 {
        self.max_depth
    }

    #[must_use]
    pub fn user_agent(&self) -> &str {
        &self.user_agent
    }

    #[must_use]
    pub fn insecure_tls(&self) -> bool {
        self.insecure_tls
    }

    #[must_use]
    pub fn js_aware(&self) -> bool {
        self.js_aware
    }

    #[must_use]
    pub fn csv_rows(&self) -> bool {
        self.csv_rows
    }

    #[must_use]
    pub fn field_map(&self) -> &BTreeMap<String, String> {
        &self.field_map
    }

    #[must_use]
    pub fn field_delete(&self) -> &[String] {
        &self.field_delete
    }

    #[must_use]
    pub fn bag_copy(&self) -> &BTreeMap<String, String> {
        &self.bag_copy
    }

    #[must_use]
    pub fn index_url(&self) -> Option<&str> {
        self.index_url.as_deref()
    }

    #[must_use]
    pub fn flush_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.flush_timeout_secs)
    }

    #[must_use]
    pub fn request_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.request_timeout_secs)
    }

    #[must_use]
    pub fn mail(&self) -> &MailConfig {
        &self.mail
    }

    /// Path of the staging area under the work directory
    #[must_use]
    pub fn staging_dir(&self) -> PathBuf {
        self.work_dir.join("staging")
    }

    /// Build a reqwest client honoring user agent, timeout and the
    /// `insecure_tls` opt-in
    pub fn http_client(&self) -> reqwest::Result<reqwest::Client> {
        reqwest::Client::builder()
            .user_agent(self.user_agent.clone())
            .timeout(self.request_timeout())
            .danger_accept_invalid_certs(self.insecure_tls)
            .build()
    }
}
