//! Bag-copy transformer
//!
//! Duplicates a named field under a new key, feature flags included, so a
//! field can feed two differently-treated index entries.

use crate::document::{Document, Field};

/// Copy `source` to `target` when present; returns whether a copy was made
pub fn apply(doc: &mut Document, source: &str, target: &str) -> bool {
    let Some(original) = doc.field(source) else {
        return false;
    };
    let copy = Field {
        name: target.to_string(),
        value: original.value.clone(),
        features: original.features.clone(),
    };
    doc.set_field(copy);
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{DocumentType, FieldValue};

    #[test]
    fn copy_preserves_value_and_features() {
        let mut doc = Document::new("/x", b"", DocumentType::Text, "x", "x");
        let mut field = Field::text("body", "hello");
        field.features.insert("isIndexed".into(), "true".into());
        field.features.insert("mvDelimiter".into(), ";".into());
        doc.set_field(field);

        assert!(apply(&mut doc, "body", "body_exact"));
        let copy = doc.field("body_exact").expect("copy exists");
        assert_eq!(copy.value, FieldValue::Text("hello".into()));
        assert_eq!(copy.features.get("isIndexed").unwrap(), "true");
        assert_eq!(copy.features.get("mvDelimiter").unwrap(), ";");
        assert!(doc.field("body").is_some(), "source stays");
    }

    #[test]
    fn missing_source_is_a_no_op() {
        let mut doc = Document::new("/x", b"", DocumentType::Text, "x", "x");
        assert!(!apply(&mut doc, "absent", "copy"));
        assert!(doc.fields.is_empty());
    }
}
