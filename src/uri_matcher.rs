//! Start/follow/ignore URI matching
//!
//! Rule files are plain text, one rule per line, `#` starts a comment.
//! Start and follow rules are literal prefixes (a filesystem root or an
//! `http(s)` URL); ignore rules are regular expressions compiled once at
//! load. Ignore always wins, and matching is purely textual: no
//! percent-decoding is performed on either side.

use log::{debug, warn};
use regex::Regex;
use std::path::Path;

use crate::error::{PipelineError, PipelineResult};

/// Classification of a candidate URI against the loaded rules
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UriClass {
    /// Matches a crawl start prefix
    Start,
    /// Matches a follow prefix
    Follow,
    /// Matches an ignore regex
    Ignore,
    /// Matches nothing
    Unknown,
}

/// The loaded start/follow/ignore rule set, immutable for the run
#[derive(Debug, Default)]
pub struct UriRules {
    starts: Vec<String>,
    follows: Vec<String>,
    ignores: Vec<Regex>,
}

fn read_rule_lines(path: &Path) -> PipelineResult<Vec<String>> {
    let text = std::fs::read_to_string(path).map_err(|e| {
        PipelineError::ConfigMissing(format!("rule file '{}': {e}", path.display()))
    })?;
    Ok(text
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(ToString::to_string)
        .collect())
}

/// Normalize a candidate for prefix comparison: drop a leading device
/// letter colon and flip backslashes to forward slashes
#[must_use]
pub fn normalize_uri(uri: &str) -> String {
    let trimmed = uri.trim();
    let bytes = trimmed.as_bytes();
    let without_device = if bytes.len() >= 2 && bytes[1] == b':' && bytes[0].is_ascii_alphabetic() {
        &trimmed[2..]
    } else {
        trimmed
    };
    without_device.replace('\\', "/")
}

impl UriRules {
    /// Load the three rule files; follow and ignore files are optional
    pub fn load(
        start_path: &Path,
        follow_path: Option<&Path>,
        ignore_path: Option<&Path>,
    ) -> PipelineResult<Self> {
        let starts: Vec<String> = read_rule_lines(start_path)?
            .into_iter()
            .map(|line| normalize_uri(&line))
            .collect();
        if starts.is_empty() {
            return Err(PipelineError::ConfigMissing(format!(
                "no start URIs in '{}'",
                start_path.display()
            )));
        }

        let follows = match follow_path {
            Some(path) if path.exists() => read_rule_lines(path)?
                .into_iter()
                .map(|line| normalize_uri(&line))
                .collect(),
            _ => Vec::new(),
        };

        let mut ignores = Vec::new();
        if let Some(path) = ignore_path
            && path.exists()
        {
            for line in read_rule_lines(path)? {
                match Regex::new(&line) {
                    Ok(re) => ignores.push(re),
                    Err(e) => warn!("Skipping invalid ignore pattern '{line}': {e}"),
                }
            }
        }

        debug!(
            "Loaded {} start, {} follow, {} ignore rule(s)",
            starts.len(),
            follows.len(),
            ignores.len()
        );
        Ok(Self {
            starts,
            follows,
            ignores,
        })
    }

    /// Build a rule set from in-memory rule lists
    pub fn from_rules(
        starts: Vec<String>,
        follows: Vec<String>,
        ignore_patterns: &[String],
    ) -> PipelineResult<Self> {
        let mut ignores = Vec::with_capacity(ignore_patterns.len());
        for pattern in ignore_patterns {
            let re = Regex::new(pattern).map_err(|e| {
                PipelineError::ConfigMissing(format!("ignore pattern '{pattern}': {e}"))
            })?;
            ignores.push(re);
        }
        Ok(Self {
            starts: starts.iter().map(|s| normalize_uri(s)).collect(),
            follows: follows.iter().map(|s| normalize_uri(s)).collect(),
            ignores,
        })
    }

    /// Classify a candidate URI
    ///
    /// Ignore regexes are tested first and the first match wins; then start
    /// prefixes, then follow prefixes. Empty input is `Unknown`.
    #[must_use]
    pub fn classify(&self, uri: &str) -> UriClass {
        let normalized = normalize_uri(uri);
        if normalized.is_empty() {
            return UriClass::Unknown;
        }
        if self.ignores.iter().any(|re| re.is_match(&normalized)) {
            return UriClass::Ignore;
        }
        if self.starts.iter().any(|p| normalized.starts_with(p.as_str())) {
            return UriClass::Start;
        }
        if self
            .follows
            .iter()
            .any(|p| normalized.starts_with(p.as_str()))
        {
            return UriClass::Follow;
        }
        UriClass::Unknown
    }

    /// Whether a candidate may enter the frontier at all
    #[must_use]
    pub fn admits(&self, uri: &str) -> bool {
        matches!(self.classify(uri), UriClass::Start | UriClass::Follow)
    }

    #[must_use]
    pub fn starts(&self) -> &[String] {
        &self.starts
    }

    /// Validate every start entry is reachable
    ///
    /// `http(s)` starts get a HEAD request and must answer with a status in
    /// [200,206] or [300,304]; local starts must exist and be readable.
    pub async fn validate_starts(&self, client: &reqwest::Client) -> PipelineResult<()> {
        for start in &self.starts {
            if start.starts_with("http") {
                let response = client.head(start.as_str()).send().await.map_err(|e| {
                    PipelineError::StartUnreachable {
                        uri: start.clone(),
                        cause: e.to_string(),
                    }
                })?;
                let status = response.status().as_u16();
                let acceptable = (200..=206).contains(&status) || (300..=304).contains(&status);
                if !acceptable {
                    return Err(PipelineError::StartUnreachable {
                        uri: start.clone(),
                        cause: format!("status {status}"),
                    });
                }
            } else {
                let path = Path::new(start.as_str());
                std::fs::metadata(path).map_err(|e| PipelineError::StartUnreachable {
                    uri: start.clone(),
                    cause: e.to_string(),
                })?;
                std::fs::read_dir(path)
                    .map(|_| ())
                    .or_else(|_| std::fs::File::open(path).map(|_| ()))
                    .map_err(|e| PipelineError::StartUnreachable {
                        uri: start.clone(),
                        cause: format!("not readable: {e}"),
                    })?;
            }
        }
        Ok(())
    }
}
