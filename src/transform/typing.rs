//! Document typing
//!
//! Derives the document type from the file extension, falling back to URL
//! heuristics for extension-less web resources. Anything unrecognized maps
//! to `Unknown`.

use crate::document::{Document, DocumentType};

fn extension_of(uri: &str) -> &str {
    let path = uri.split(['?', '#']).next().unwrap_or(uri);
    let last_segment = path.rsplit('/').next().unwrap_or(path);
    match last_segment.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => ext,
        _ => "",
    }
}

/// Derive the type for a document from its source URI
#[must_use]
pub fn derive(doc: &Document) -> DocumentType {
    let uri = doc
        .field("uri")
        .map(|f| f.value.as_text())
        .unwrap_or_else(|| doc.name.clone());

    match extension_of(&uri).to_ascii_lowercase().as_str() {
        "txt" | "md" | "log" | "rst" | "text" => DocumentType::Text,
        "html" | "htm" | "xhtml" => DocumentType::Html,
        "csv" => DocumentType::Csv,
        "pdf" => DocumentType::Pdf,
        "png" | "jpg" | "jpeg" | "gif" | "bmp" | "webp" => DocumentType::Image,
        "" if uri.starts_with("http") => DocumentType::Html,
        _ => DocumentType::Unknown,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::Field;

    fn doc_for(uri: &str) -> Document {
        let mut doc = Document::new(uri, b"", DocumentType::Unknown, "n", "t");
        doc.set_field(Field::text("uri", uri));
        doc
    }

    #[test]
    fn extensions_map_to_types() {
        assert_eq!(derive(&doc_for("/corp/a.txt")), DocumentType::Text);
        assert_eq!(derive(&doc_for("/corp/b.CSV")), DocumentType::Csv);
        assert_eq!(derive(&doc_for("/corp/c.pdf")), DocumentType::Pdf);
        assert_eq!(derive(&doc_for("/corp/d.jpeg")), DocumentType::Image);
    }

    #[test]
    fn extensionless_urls_are_html() {
        assert_eq!(derive(&doc_for("http://example.com/docs/")), DocumentType::Html);
        assert_eq!(
            derive(&doc_for("http://example.com/page.html?x=1")),
            DocumentType::Html
        );
    }

    #[test]
    fn unrecognized_is_unknown() {
        assert_eq!(derive(&doc_for("/corp/archive.zip")), DocumentType::Unknown);
        assert_eq!(derive(&doc_for("/corp/.hidden")), DocumentType::Unknown);
    }
}
