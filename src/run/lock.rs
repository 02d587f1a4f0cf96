//! Crawl run lock file
//!
//! Existence-only marker `CrawlActive.lck` in the work directory. Exclusive
//! creation is the mutual-exclusion primitive: whoever creates the file owns
//! the run; everyone else gets `LockBusy`.

use log::{debug, warn};
use std::fs::OpenOptions;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use crate::error::{PipelineError, PipelineResult};

/// File name of the lock marker
pub const LOCK_FILE_NAME: &str = "CrawlActive.lck";

/// RAII lock guard; the marker is deleted on drop
#[derive(Debug)]
pub struct LockFile {
    path: PathBuf,
    released: bool,
}

impl LockFile {
    /// Try to acquire the run lock in `work_dir`
    ///
    /// # Errors
    ///
    /// `LockBusy` when the marker already exists; `Io` when the work
    /// directory cannot be created or written.
    pub fn acquire(work_dir: &Path) -> PipelineResult<Self> {
        std::fs::create_dir_all(work_dir)?;
        let path = work_dir.join(LOCK_FILE_NAME);
        match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(_) => {
                debug!("Acquired crawl lock at {}", path.display());
                Ok(Self {
                    path,
                    released: false,
                })
            }
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                Err(PipelineError::LockBusy(path.display().to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Release explicitly (also happens on drop)
    pub fn release(mut self) {
        self.release_inner();
    }

    fn release_inner(&mut self) {
        if self.released {
            return;
        }
        self.released = true;
        if let Err(e) = std::fs::remove_file(&self.path) {
            warn!("Failed to remove lock file {}: {e}", self.path.display());
        } else {
            debug!("Released crawl lock at {}", self.path.display());
        }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for LockFile {
    fn drop(&mut self) {
        self.release_inner();
    }
}
