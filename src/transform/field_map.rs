//! Field renaming and deletion

use std::collections::BTreeMap;

use crate::document::Document;

/// Apply the configured rename map, then the deletion list
pub fn apply(doc: &mut Document, renames: &BTreeMap<String, String>, deletions: &[String]) {
    for (from, to) in renames {
        doc.rename_field(from, to);
    }
    for name in deletions {
        doc.remove_field(name);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{DocumentType, Field};

    #[test]
    fn renames_then_deletes() {
        let mut doc = Document::new("/x", b"", DocumentType::Text, "x", "x");
        doc.set_field(Field::text("Author", "alice"));
        doc.set_field(Field::text("tmp", "scratch"));

        let mut renames = BTreeMap::new();
        renames.insert("Author".to_string(), "author".to_string());
        apply(&mut doc, &renames, &["tmp".to_string()]);

        assert!(doc.field("Author").is_none());
        assert_eq!(doc.field("author").unwrap().value.as_text(), "alice");
        assert!(doc.field("tmp").is_none());
    }

    #[test]
    fn deletion_applies_to_renamed_name() {
        let mut doc = Document::new("/x", b"", DocumentType::Text, "x", "x");
        doc.set_field(Field::text("old", "v"));

        let mut renames = BTreeMap::new();
        renames.insert("old".to_string(), "new".to_string());
        apply(&mut doc, &renames, &["new".to_string()]);
        assert!(doc.fields.is_empty());
    }
}
