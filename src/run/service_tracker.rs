//! Persisted service-tracker snapshot
//!
//! Two timestamps, `lastFullServiceTs` and `lastIncrementalServiceTs`,
//! stored as human-readable XML in the work directory. The file is
//! overwritten atomically (write a sibling temp file, then rename) and the
//! timestamps only ever move forward per run type.

use chrono::{DateTime, Utc};
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{PipelineError, PipelineResult};

/// File name of the tracker snapshot
pub const TRACKER_FILE_NAME: &str = "service-tracker.xml";

/// Snapshot format version
const TRACKER_VERSION: u32 = 1;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename = "serviceTracker")]
struct TrackerSnapshot {
    #[serde(rename = "@version", default)]
    version: u32,
    #[serde(rename = "lastFullServiceTs", skip_serializing_if = "Option::is_none")]
    last_full: Option<DateTime<Utc>>,
    #[serde(
        rename = "lastIncrementalServiceTs",
        skip_serializing_if = "Option::is_none"
    )]
    last_incremental: Option<DateTime<Utc>>,
}

/// Persisted `{lastFullServiceTs, lastIncrementalServiceTs}` record
#[derive(Debug, Clone, Default)]
pub struct ServiceTracker {
    last_full: Option<DateTime<Utc>>,
    last_incremental: Option<DateTime<Utc>>,
}

impl ServiceTracker {
    fn path_in(work_dir: &Path) -> PathBuf {
        work_dir.join(TRACKER_FILE_NAME)
    }

    /// Load the snapshot; a missing or unreadable file is a fresh tracker
    /// (first run), never an error
    #[must_use]
    pub fn load(work_dir: &Path) -> Self {
        let path = Self::path_in(work_dir);
        let text = match std::fs::read_to_string(&path) {
            Ok(text) => text,
            Err(e) => {
                debug!("No service tracker at {} ({e}); first run", path.display());
                return Self::default();
            }
        };
        match quick_xml::de::from_str::<TrackerSnapshot>(&text) {
            Ok(snapshot) => Self {
                last_full: snapshot.last_full,
                last_incremental: snapshot.last_incremental,
            },
            Err(e) => {
                warn!("Unreadable service tracker {}: {e}", path.display());
                Self::default()
            }
        }
    }

    /// Persist atomically: write a sibling temp file, then rename over
    pub fn save(&self, work_dir: &Path) -> PipelineResult<()> {
        let snapshot = TrackerSnapshot {
            version: TRACKER_VERSION,
            last_full: self.last_full,
            last_incremental: self.last_incremental,
        };
        let body = quick_xml::se::to_string(&snapshot)
            .map_err(|e| PipelineError::Io(std::io::Error::other(e)))?;
        let path = Self::path_in(work_dir);
        let temp = work_dir.join(format!("{TRACKER_FILE_NAME}.tmp"));
        std::fs::write(&temp, format!("{body}\n"))?;
        std::fs::rename(&temp, &path)?;
        debug!("Saved service tracker to {}", path.display());
        Ok(())
    }

    #[must_use]
    pub fn last_full(&self) -> Option<DateTime<Utc>> {
        self.last_full
    }

    #[must_use]
    pub fn last_incremental(&self) -> Option<DateTime<Utc>> {
        self.last_incremental
    }

    /// Whether no service of either type has ever completed
    #[must_use]
    pub fn is_first_run(&self) -> bool {
        self.last_full.is_none() && self.last_incremental.is_none()
    }

    /// Advance the full-service timestamp; never moves backwards
    pub fn advance_full(&mut self, to: DateTime<Utc>) {
        if self.last_full.is_none_or(|prev| to > prev) {
            self.last_full = Some(to);
        }
    }

    /// Advance the incremental-service timestamp; never moves backwards
    pub fn advance_incremental(&mut self, to: DateTime<Utc>) {
        if self.last_incremental.is_none_or(|prev| to > prev) {
            self.last_incremental = Some(to);
        }
    }
}
