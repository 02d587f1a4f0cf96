//! CSV row expansion
//!
//! When enabled, a CSV file does not publish as one opaque document: each
//! data row becomes an independent document with columns mapped to fields
//! and the source path recorded as a parent reference.

use crate::document::{Document, DocumentType, Field};
use crate::error::{PipelineError, PipelineResult};

/// Expand CSV content into one document per data row
///
/// The first record is the header; headerless files expand to nothing.
pub fn expand(source_uri: &str, content: &[u8]) -> PipelineResult<Vec<Document>> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(content);

    let headers: Vec<String> = reader
        .headers()
        .map_err(|e| PipelineError::ExtractFailed {
            doc_id: source_uri.to_string(),
            cause: format!("csv header: {e}"),
        })?
        .iter()
        .map(ToString::to_string)
        .collect();

    let mut docs = Vec::new();
    for (row_idx, record) in reader.records().enumerate() {
        let record = record.map_err(|e| PipelineError::ExtractFailed {
            doc_id: source_uri.to_string(),
            cause: format!("csv row {}: {e}", row_idx + 1),
        })?;

        let row_uri = format!("{source_uri}#row={}", row_idx + 1);
        let joined = record.iter().collect::<Vec<_>>().join(",");
        let mut doc = Document::new(
            &row_uri,
            joined.as_bytes(),
            DocumentType::Csv,
            format!("row {}", row_idx + 1),
            row_uri.clone(),
        );
        doc.parent = Some(source_uri.to_string());
        doc.set_field(Field::text("uri", &row_uri));
        for (col, value) in headers.iter().zip(record.iter()) {
            if !col.is_empty() {
                doc.set_field(Field::text(col.clone(), value));
            }
        }
        docs.push(doc);
    }
    Ok(docs)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn each_row_becomes_a_document() {
        let csv = b"name,dept\nalice,eng\nbob,sales\n";
        let docs = expand("/corp/staff.csv", csv).expect("expand");
        assert_eq!(docs.len(), 2);
        assert_eq!(docs[0].field("name").unwrap().value.as_text(), "alice");
        assert_eq!(docs[1].field("dept").unwrap().value.as_text(), "sales");
        assert_eq!(docs[0].parent.as_deref(), Some("/corp/staff.csv"));
        assert_ne!(docs[0].nsd_id, docs[1].nsd_id);
    }

    #[test]
    fn header_only_file_expands_to_nothing() {
        let docs = expand("/corp/empty.csv", b"a,b,c\n").expect("expand");
        assert!(docs.is_empty());
    }

    #[test]
    fn ragged_rows_are_tolerated() {
        let csv = b"a,b,c\n1,2\n";
        let docs = expand("/corp/ragged.csv", csv).expect("expand");
        assert_eq!(docs.len(), 1);
        assert!(docs[0].field("c").is_none());
    }
}
