//! In-pipeline document model
//!
//! A `Document` is the unit that crosses the Extract, Transform and Publish
//! phases: a bag of named, typed fields plus named relationships to child
//! documents. Identity is the `NSD-Id`, a content-addressable hex digest, so
//! resubmitting the same content always targets the same index entry.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use xxhash_rust::xxh3::xxh3_128;

/// Typed field values carried by a document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value")]
pub enum FieldValue {
    Text(String),
    Integer(i64),
    Float(f64),
    Bool(bool),
    DateTime(DateTime<Utc>),
    /// Multi-valued field; the delimiter lives in the feature bag
    Multi(Vec<String>),
}

impl FieldValue {
    /// Render the value the way the publisher serializes it
    #[must_use]
    pub fn as_text(&self) -> String {
        match self {
            Self::Text(s) => s.clone(),
            Self::Integer(i) => i.to_string(),
            Self::Float(f) => f.to_string(),
            Self::Bool(b) => b.to_string(),
            Self::DateTime(ts) => ts.to_rfc3339(),
            Self::Multi(values) => values.join(","),
        }
    }
}

/// A single named field with its feature flags
///
/// Feature keys (`isPrimaryKey`, `isRequired`, `isIndexed`, `isHidden`,
/// `isMultiValue`, `mvDelimiter`, ...) are an opaque string map at this
/// layer; data-source-specific flags pass through untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Field {
    pub name: String,
    pub value: FieldValue,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub features: BTreeMap<String, String>,
}

impl Field {
    #[must_use]
    pub fn text(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: FieldValue::Text(value.into()),
            features: BTreeMap::new(),
        }
    }

    #[must_use]
    pub fn integer(name: impl Into<String>, value: i64) -> Self {
        Self {
            name: name.into(),
            value: FieldValue::Integer(value),
            features: BTreeMap::new(),
        }
    }

    #[must_use]
    pub fn datetime(name: impl Into<String>, value: DateTime<Utc>) -> Self {
        Self {
            name: name.into(),
            value: FieldValue::DateTime(value),
            features: BTreeMap::new(),
        }
    }
}

/// Broad content type derived from file extension or URL heuristics
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DocumentType {
    Text,
    Html,
    Csv,
    Pdf,
    Image,
    Unknown,
}

impl DocumentType {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Text => "Text",
            Self::Html => "HTML",
            Self::Csv => "CSV",
            Self::Pdf => "PDF",
            Self::Image => "Image",
            Self::Unknown => "Unknown",
        }
    }
}

/// The unit crossing the pipeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    /// Content-addressable identifier, hex encoded
    pub nsd_id: String,
    pub doc_type: DocumentType,
    pub name: String,
    pub title: String,
    pub fields: Vec<Field>,
    /// Source reference for expanded rows (e.g. the CSV path)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<String>,
    /// Named relationships to child documents
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<(String, Document)>,
}

impl Document {
    /// Create a document, deriving the NSD-Id from the source URI and content
    #[must_use]
    pub fn new(
        source_uri: &str,
        content: &[u8],
        doc_type: DocumentType,
        name: impl Into<String>,
        title: impl Into<String>,
    ) -> Self {
        Self {
            nsd_id: nsd_id(source_uri, content),
            doc_type,
            name: name.into(),
            title: title.into(),
            fields: Vec::new(),
            parent: None,
            children: Vec::new(),
        }
    }

    /// Append a field, replacing any existing field of the same name
    pub fn set_field(&mut self, field: Field) {
        if let Some(existing) = self.fields.iter_mut().find(|f| f.name == field.name) {
            *existing = field;
        } else {
            self.fields.push(field);
        }
    }

    #[must_use]
    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Remove a field by name, returning whether it was present
    pub fn remove_field(&mut self, name: &str) -> bool {
        let before = self.fields.len();
        self.fields.retain(|f| f.name != name);
        self.fields.len() != before
    }

    /// Rename a field, keeping value and features
    pub fn rename_field(&mut self, from: &str, to: &str) -> bool {
        match self.fields.iter_mut().find(|f| f.name == from) {
            Some(field) => {
                field.name = to.to_string();
                true
            }
            None => false,
        }
    }
}

/// Derive the content-addressable NSD-Id for a source URI and its content
///
/// The URI participates so that identical bodies at different locations
/// remain distinct index entries.
#[must_use]
pub fn nsd_id(source_uri: &str, content: &[u8]) -> String {
    let mut input = Vec::with_capacity(source_uri.len() + 1 + content.len());
    input.extend_from_slice(source_uri.as_bytes());
    input.push(0);
    input.extend_from_slice(content);
    hex::encode(xxh3_128(&input).to_be_bytes())
}

/// Read-only per-field description consumed by the publisher when rendering
/// a target-index schema fragment
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldSchema {
    pub name: String,
    pub field_type: String,
    pub tokenized: bool,
    pub stored: bool,
    pub indexed: bool,
    pub multi_valued: bool,
}

impl FieldSchema {
    /// Derive a schema description from a concrete field
    #[must_use]
    pub fn describe(field: &Field) -> Self {
        let truthy = |key: &str| {
            field
                .features
                .get(key)
                .is_some_and(|v| v.eq_ignore_ascii_case("true"))
        };
        let field_type = match field.value {
            FieldValue::Text(_) | FieldValue::Multi(_) => "text",
            FieldValue::Integer(_) => "long",
            FieldValue::Float(_) => "double",
            FieldValue::Bool(_) => "boolean",
            FieldValue::DateTime(_) => "date",
        };
        Self {
            name: field.name.clone(),
            field_type: field_type.to_string(),
            tokenized: matches!(field.value, FieldValue::Text(_)),
            stored: !truthy("isHidden"),
            indexed: truthy("isIndexed"),
            multi_valued: truthy("isMultiValue") || matches!(field.value, FieldValue::Multi(_)),
        }
    }
}
