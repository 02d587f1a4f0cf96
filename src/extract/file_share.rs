//! File-share extraction
//!
//! Start URIs are directory roots. Directories list into new frontier
//! candidates; files become documents with typed metadata. Incremental runs
//! skip files whose modification time predates the last incremental crawl.

use chrono::{DateTime, Utc};
use log::debug;
use std::path::Path;

use crate::document::{Document, DocumentType, Field};
use crate::error::{PipelineError, PipelineResult};

/// Outcome of visiting one file-share URI
#[derive(Debug)]
pub enum FsVisit {
    /// A directory: these entries join the frontier
    Directory(Vec<String>),
    /// A regular file turned into a document
    File(Box<Document>),
    /// Skipped (incremental, unmodified) or not a regular file
    Skipped,
}

/// Extensions whose content is carried as a text field
const TEXT_EXTENSIONS: &[&str] = &[
    "txt", "md", "csv", "html", "htm", "xml", "json", "log", "rst", "yaml", "yml",
];

fn extension_of(path: &Path) -> String {
    path.extension()
        .and_then(|e| e.to_str())
        .unwrap_or_default()
        .to_ascii_lowercase()
}

/// Extension-derived MIME type for the metadata field
#[must_use]
pub fn mime_for(path: &Path) -> &'static str {
    match extension_of(path).as_str() {
        "txt" | "log" | "rst" => "text/plain",
        "md" => "text/markdown",
        "csv" => "text/csv",
        "html" | "htm" => "text/html",
        "xml" => "application/xml",
        "json" => "application/json",
        "pdf" => "application/pdf",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        _ => "application/octet-stream",
    }
}

/// Visit a single file-share URI
///
/// `last_incremental_at` is `Some` only for incremental runs.
pub fn visit(
    uri: &str,
    last_incremental_at: Option<DateTime<Utc>>,
) -> PipelineResult<FsVisit> {
    let path = Path::new(uri);
    let metadata = std::fs::metadata(path).map_err(|e| PipelineError::ExtractFailed {
        doc_id: uri.to_string(),
        cause: e.to_string(),
    })?;

    if metadata.is_dir() {
        let mut entries = Vec::new();
        for entry in std::fs::read_dir(path).map_err(|e| PipelineError::ExtractFailed {
            doc_id: uri.to_string(),
            cause: e.to_string(),
        })? {
            let entry = entry.map_err(|e| PipelineError::ExtractFailed {
                doc_id: uri.to_string(),
                cause: e.to_string(),
            })?;
            if let Some(child) = entry.path().to_str() {
                entries.push(child.to_string());
            }
        }
        return Ok(FsVisit::Directory(entries));
    }
    if !metadata.is_file() {
        return Ok(FsVisit::Skipped);
    }

    let modified: Option<DateTime<Utc>> = metadata.modified().ok().map(DateTime::from);
    if let (Some(last), Some(mtime)) = (last_incremental_at, modified)
        && mtime <= last
    {
        debug!("Incremental skip (unmodified): {uri}");
        return Ok(FsVisit::Skipped);
    }

    let content = std::fs::read(path).map_err(|e| PipelineError::ExtractFailed {
        doc_id: uri.to_string(),
        cause: e.to_string(),
    })?;

    let name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or(uri)
        .to_string();
    let mut doc = Document::new(uri, &content, DocumentType::Unknown, name.clone(), name);
    doc.set_field(Field::text("uri", uri));
    doc.set_field(Field::integer("size", metadata.len() as i64));
    doc.set_field(Field::text("mime", mime_for(path)));
    if let Some(mtime) = modified {
        doc.set_field(Field::datetime("modified", mtime));
    }
    if let Some(author) = file_owner(path) {
        doc.set_field(Field::text("author", author));
    }
    if TEXT_EXTENSIONS.contains(&extension_of(path).as_str()) {
        doc.set_field(Field::text(
            "content",
            String::from_utf8_lossy(&content).into_owned(),
        ));
    }
    Ok(FsVisit::File(Box::new(doc)))
}

#[cfg(unix)]
fn file_owner(path: &Path) -> Option<String> {
    use std::os::unix::fs::MetadataExt;
    let uid = std::fs::metadata(path).ok()?.uid();
    Some(uid.to_string())
}

#[cfg(not(unix))]
fn file_owner(_path: &Path) -> Option<String> {
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn directory_lists_entries() {
        let tmp = tempfile::tempdir().expect("tempdir");
        std::fs::write(tmp.path().join("a.txt"), "alpha").expect("write");
        std::fs::create_dir(tmp.path().join("sub")).expect("mkdir");

        let visit = visit(tmp.path().to_str().unwrap(), None).expect("visit");
        match visit {
            FsVisit::Directory(entries) => assert_eq!(entries.len(), 2),
            other => panic!("Expected directory, got {other:?}"),
        }
    }

    #[test]
    fn file_becomes_document_with_metadata() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let path = tmp.path().join("report.txt");
        std::fs::write(&path, "quarterly numbers").expect("write");

        let visit = visit(path.to_str().unwrap(), None).expect("visit");
        let FsVisit::File(doc) = visit else {
            panic!("Expected file visit");
        };
        assert_eq!(doc.name, "report.txt");
        assert_eq!(doc.field("mime").unwrap().value.as_text(), "text/plain");
        assert_eq!(doc.field("size").unwrap().value.as_text(), "17");
        assert_eq!(
            doc.field("content").unwrap().value.as_text(),
            "quarterly numbers"
        );
        assert!(doc.field("modified").is_some());
    }

    #[test]
    fn incremental_skips_unmodified() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let path = tmp.path().join("old.txt");
        std::fs::write(&path, "stale").expect("write");

        let future = Utc::now() + Duration::hours(1);
        let visit_result = visit(path.to_str().unwrap(), Some(future)).expect("visit");
        assert!(matches!(visit_result, FsVisit::Skipped));

        let past = Utc::now() - Duration::hours(1);
        let visit_result = visit(path.to_str().unwrap(), Some(past)).expect("visit");
        assert!(matches!(visit_result, FsVisit::File(_)));
    }

    #[test]
    fn missing_path_is_extract_failed() {
        let err = visit("/definitely/not/here.txt", None).unwrap_err();
        assert!(matches!(err, PipelineError::ExtractFailed { .. }));
    }
}
