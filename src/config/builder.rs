//! Fluent builder for `ConnectorConfig`

use std::collections::BTreeMap;
use std::path::PathBuf;

use super::types::{ConnectorConfig, MailConfig};

/// Builder over `ConnectorConfig` defaults
#[derive(Debug, Default)]
pub struct ConnectorConfigBuilder {
    config: ConnectorConfig,
}

impl ConnectorConfig {
    /// Create a builder seeded with the defaults
    #[must_use]
    pub fn builder() -> ConnectorConfigBuilder {
        ConnectorConfigBuilder::default()
    }
}

impl ConnectorConfigBuilder {
    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.config.name = name.into();
        self
    }

    #[must_use]
    pub fn work_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.work_dir = dir.into();
        self
    }

    #[must_use]
    pub fn crawl_start_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.crawl_start_file = path.into();
        self
    }

    #[must_use]
    pub fn crawl_follow_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.crawl_follow_file = Some(path.into());
        self
    }

    #[must_use]
    pub fn crawl_ignore_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.crawl_ignore_file = Some(path.into());
        self
    }

    #[must_use]
    pub fn queue_length(mut self, length: usize) -> Self {
        self.config.queue_length = length.max(1);
        self
    }

    #[must_use]
    pub fn extract_threads(mut self, threads: usize) -> Self {
        self.config.extract_threads = Some(threads.max(1));
        self
    }

    #[must_use]
    pub fn transform_threads(mut self, threads: usize) -> Self {
        self.config.transform_threads = threads.max(1);
        self
    }

    #[must_use]
    pub fn publish_threads(mut self, threads: usize) -> Self {
        self.config.publish_threads = threads.max(1);
        self
    }

    #[must_use]
    pub fn publish_batch(mut self, count: usize) -> Self {
        self.config.publish_batch = count.max(1);
        self
    }

    #[must_use]
    pub fn publish_commit(mut self, count: usize) -> Self {
        self.config.publish_commit = count.max(1);
        self
    }

    #[must_use]
    pub fn publish_max(mut self, count: usize) -> Self {
        self.config.publish_max = count;
        self
    }

    #[must_use]
    pub fn run_full_interval(mut self, interval: impl Into<String>) -> Self {
        self.config.run_full_interval = interval.into();
        self
    }

    #[must_use]
    pub fn run_incremental_interval(mut self, interval: impl Into<String>) -> Self {
        self.config.run_incremental_interval = interval.into();
        self
    }

    #[must_use]
    pub fn politeness_ms(mut self, millis: u64) -> Self {
        self.config.politeness_ms = millis;
        self
    }

    #[must_use]
    pub fn max_depth(mut self, depth: u8) -> Self {
        self.config.max_depth = depth;
        self
    }

    #[must_use]
    pub fn user_agent(mut self, agent: impl Into<String>) -> Self {
        self.config.user_agent = agent.into();
        self
    }

    #[must_use]
    pub fn insecure_tls(mut self, enabled: bool) -> Self {
        self.config.insecure_tls = enabled;
        self
    }

    #[must_use]
    pub fn js_aware(mut self, enabled: bool) -> Self {
        self.config.js_aware = enabled;
        self
    }

    #[must_use]
    pub fn csv_rows(mut self, enabled: bool) -> Self {
        self.config.csv_rows = enabled;
        self
    }

    #[must_use]
    pub fn field_map(mut self, map: BTreeMap<String, String>) -> Self {
        self.config.field_map = map;
        self
    }

    #[must_use]
    pub fn map_field(mut self, from: impl Into<String>, to: impl Into<String>) -> Self {
        self.config.field_map.insert(from.into(), to.into());
        self
    }

    #[must_use]
    pub fn delete_field(mut self, name: impl Into<String>) -> Self {
        self.config.field_delete.push(name.into());
        self
    }

    #[must_use]
    pub fn bag_copy(mut self, source: impl Into<String>, target: impl Into<String>) -> Self {
        self.config.bag_copy.insert(source.into(), target.into());
        self
    }

    #[must_use]
    pub fn index_url(mut self, url: impl Into<String>) -> Self {
        self.config.index_url = Some(url.into());
        self
    }

    #[must_use]
    pub fn flush_timeout_secs(mut self, secs: u64) -> Self {
        self.config.flush_timeout_secs = secs;
        self
    }

    #[must_use]
    pub fn request_timeout_secs(mut self, secs: u64) -> Self {
        self.config.request_timeout_secs = secs;
        self
    }

    #[must_use]
    pub fn mail(mut self, mail: MailConfig) -> Self {
        self.config.mail = mail;
        self
    }

    #[must_use]
    pub fn build(self) -> ConnectorConfig {
        self.config
    }
}
