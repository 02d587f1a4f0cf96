//! On-disk document staging between Extract and Transform
//!
//! The extractor writes each document body as JSON keyed by its NSD-Id; the
//! transformer reads-then-deletes. Nothing else touches this directory.
//! Keeping bodies out of the queues bounds queue memory to short metric
//! strings regardless of document size.

use log::warn;
use std::path::{Path, PathBuf};

use crate::document::Document;
use crate::error::{PipelineError, PipelineResult};

/// Staging directory handle shared by the Extract and Transform pools
#[derive(Debug, Clone)]
pub struct StagingArea {
    dir: PathBuf,
}

impl StagingArea {
    /// Open (and create) the staging directory
    pub fn open(dir: impl Into<PathBuf>) -> PipelineResult<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    fn path_for(&self, doc_id: &str) -> PathBuf {
        // NSD-Ids are hex, but belt-and-braces against path separators.
        let safe: String = doc_id
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
            .collect();
        self.dir.join(format!("{safe}.json"))
    }

    /// Stage a document body (extractor side)
    pub async fn write(&self, doc: &Document) -> PipelineResult<()> {
        let body = serde_json::to_vec(doc).map_err(|e| PipelineError::ExtractFailed {
            doc_id: doc.nsd_id.clone(),
            cause: format!("staging encode: {e}"),
        })?;
        tokio::fs::write(self.path_for(&doc.nsd_id), body).await?;
        Ok(())
    }

    /// Materialize and remove a staged body (transformer side)
    pub async fn take(&self, doc_id: &str) -> PipelineResult<Document> {
        let path = self.path_for(doc_id);
        let body = tokio::fs::read(&path)
            .await
            .map_err(|e| PipelineError::TransformFailed {
                doc_id: doc_id.to_string(),
                cause: format!("staged body missing: {e}"),
            })?;
        // Remove before decode: a malformed body must not survive for a
        // retry that would fail the same way.
        if let Err(e) = tokio::fs::remove_file(&path).await {
            warn!("Failed to remove staged body {}: {e}", path.display());
        }
        serde_json::from_slice(&body).map_err(|e| PipelineError::TransformFailed {
            doc_id: doc_id.to_string(),
            cause: format!("staged body malformed: {e}"),
        })
    }

    /// Drop all staged bodies (abort path)
    pub async fn clear(&self) -> PipelineResult<()> {
        let mut entries = tokio::fs::read_dir(&self.dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            if entry.path().extension().is_some_and(|ext| ext == "json")
                && let Err(e) = tokio::fs::remove_file(entry.path()).await
            {
                warn!("Failed to clear staged body {:?}: {e}", entry.path());
            }
        }
        Ok(())
    }

    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::DocumentType;

    #[tokio::test]
    async fn write_take_removes_body() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let staging = StagingArea::open(tmp.path().join("staging")).expect("open");
        let doc = Document::new("/corp/a.txt", b"hello", DocumentType::Text, "a.txt", "a");
        staging.write(&doc).await.expect("write");

        let loaded = staging.take(&doc.nsd_id).await.expect("take");
        assert_eq!(loaded, doc);

        let again = staging.take(&doc.nsd_id).await;
        assert!(again.is_err(), "second take must fail: body was deleted");
    }

    #[tokio::test]
    async fn clear_empties_the_area() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let staging = StagingArea::open(tmp.path().join("staging")).expect("open");
        for i in 0..3 {
            let doc = Document::new(
                &format!("/corp/{i}.txt"),
                b"x",
                DocumentType::Text,
                "n",
                "t",
            );
            staging.write(&doc).await.expect("write");
        }
        staging.clear().await.expect("clear");
        let count = std::fs::read_dir(staging.dir()).expect("dir").count();
        assert_eq!(count, 0);
    }
}
