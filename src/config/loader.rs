//! Properties-file configuration loading
//!
//! Lines are `key=value`; `#` and `!` start comments. Only keys under the
//! namespace prefix are consulted. Unknown keys inside the namespace are
//! logged as warnings so typos surface instead of silently missing.

use log::warn;
use std::path::Path;

use super::types::ConnectorConfig;
use crate::error::{PipelineError, PipelineResult};

fn parse_bool(key: &str, value: &str) -> bool {
    match value.to_ascii_lowercase().as_str() {
        "true" | "yes" | "1" => true,
        "false" | "no" | "0" => false,
        other => {
            warn!("Config key '{key}': unrecognized boolean '{other}', treating as false");
            false
        }
    }
}

fn parse_num<T: std::str::FromStr>(key: &str, value: &str, fallback: T) -> T {
    match value.parse() {
        Ok(parsed) => parsed,
        Err(_) => {
            warn!("Config key '{key}': unparsable number '{value}', keeping default");
            fallback
        }
    }
}

/// Load a `ConnectorConfig` from a properties file under `prefix`
///
/// # Errors
///
/// `ConfigMissing` when the file cannot be read or a required key
/// (`crawl_start_file`) is absent.
pub fn load_properties(path: &Path, prefix: &str) -> PipelineResult<ConnectorConfig> {
    let text = std::fs::read_to_string(path).map_err(|e| {
        PipelineError::ConfigMissing(format!("config file '{}': {e}", path.display()))
    })?;

    let mut config = ConnectorConfig {
        name: prefix.to_string(),
        ..ConnectorConfig::default()
    };
    let mut saw_start_file = false;
    let namespace = format!("{prefix}.");

    for raw_line in text.lines() {
        let line = raw_line.trim();
        if line.is_empty() || line.starts_with('#') || line.starts_with('!') {
            continue;
        }
        let Some((full_key, value)) = line.split_once('=') else {
            warn!("Ignoring malformed config line: {line}");
            continue;
        };
        let full_key = full_key.trim();
        let value = value.trim();
        let Some(key) = full_key.strip_prefix(&namespace) else {
            continue;
        };

        match key {
            "name" => config.name = value.to_string(),
            "work_dir" => config.work_dir = value.into(),
            "crawl_start_file" => {
                config.crawl_start_file = value.into();
                saw_start_file = true;
            }
            "crawl_follow_file" => config.crawl_follow_file = Some(value.into()),
            "crawl_ignore_file" => config.crawl_ignore_file = Some(value.into()),
            "queue_length" => {
                config.queue_length = parse_num(full_key, value, config.queue_length).max(1);
            }
            "extract_threads" => {
                config.extract_threads = Some(parse_num(full_key, value, 1usize).max(1));
            }
            "transform_threads" => {
                config.transform_threads =
                    parse_num(full_key, value, config.transform_threads).max(1);
            }
            "publish_threads" => {
                config.publish_threads = parse_num(full_key, value, config.publish_threads).max(1);
            }
            "publish_batch" => {
                config.publish_batch = parse_num(full_key, value, config.publish_batch).max(1);
            }
            "publish_commit" => {
                config.publish_commit = parse_num(full_key, value, config.publish_commit).max(1);
            }
            "publish_max" => {
                config.publish_max = parse_num(full_key, value, config.publish_max);
            }
            "run_full_interval" => config.run_full_interval = value.to_string(),
            "run_incremental_interval" => config.run_incremental_interval = value.to_string(),
            "politeness_ms" => {
                config.politeness_ms = parse_num(full_key, value, config.politeness_ms);
            }
            "max_depth" => config.max_depth = parse_num(full_key, value, config.max_depth),
            "user_agent" => config.user_agent = value.to_string(),
            "insecure_tls" => config.insecure_tls = parse_bool(full_key, value),
            "js_aware" => config.js_aware = parse_bool(full_key, value),
            "csv_rows" => config.csv_rows = parse_bool(full_key, value),
            "field_delete" => {
                config
                    .field_delete
                    .extend(value.split(',').map(|s| s.trim().to_string()));
            }
            "index_url" => config.index_url = Some(value.to_string()),
            "flush_timeout_secs" => {
                config.flush_timeout_secs = parse_num(full_key, value, config.flush_timeout_secs);
            }
            "request_timeout_secs" => {
                config.request_timeout_secs =
                    parse_num(full_key, value, config.request_timeout_secs);
            }
            "mail.smtp_host" => config.mail.smtp_host = Some(value.to_string()),
            "mail.from" => config.mail.from = Some(value.to_string()),
            "mail.to" => {
                config
                    .mail
                    .to
                    .extend(value.split(',').map(|s| s.trim().to_string()));
            }
            other if other.starts_with("field_map.") => {
                let from = &other["field_map.".len()..];
                config
                    .field_map
                    .insert(from.to_string(), value.to_string());
            }
            other if other.starts_with("bag_copy.") => {
                let source = &other["bag_copy.".len()..];
                config
                    .bag_copy
                    .insert(source.to_string(), value.to_string());
            }
            other => warn!("Unknown config key '{namespace}{other}' ignored"),
        }
    }

    if !saw_start_file {
        return Err(PipelineError::ConfigMissing(format!(
            "{namespace}crawl_start_file in '{}'",
            path.display()
        )));
    }
    Ok(config)
}
