//! Narrow search-index interface
//!
//! The publisher only ever needs three capabilities from the index:
//! idempotent batch upserts keyed on NSD-Id, a commit barrier, and a
//! per-field schema fragment. The HTTP implementation talks to a remote
//! index; the in-memory implementation backs the pipeline tests.

use log::debug;
use quick_xml::Writer;
use quick_xml::events::BytesStart;
use serde_json::json;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::document::{Document, FieldSchema, FieldValue};
use crate::error::{PipelineError, PipelineResult};

/// Render the per-field XML schema fragment
///
/// Shared by every implementation; the target index decides what to do
/// with it.
#[must_use]
pub fn schema_fragment(field: &FieldSchema) -> String {
    let mut writer = Writer::new(Vec::new());
    let mut element = BytesStart::new("field");
    element.push_attribute(("name", field.name.as_str()));
    element.push_attribute(("type", field.field_type.as_str()));
    element.push_attribute(("tokenized", bool_str(field.tokenized)));
    element.push_attribute(("stored", bool_str(field.stored)));
    element.push_attribute(("indexed", bool_str(field.indexed)));
    element.push_attribute(("multiValued", bool_str(field.multi_valued)));
    // An empty element cannot fail to serialize into a Vec.
    let _ = writer.write_event(quick_xml::events::Event::Empty(element));
    String::from_utf8_lossy(&writer.into_inner()).into_owned()
}

fn bool_str(value: bool) -> &'static str {
    if value { "true" } else { "false" }
}

/// The publisher-facing index capability
pub trait SearchIndex: Send + Sync {
    /// Submit a batch; equal NSD-Ids upsert
    fn upsert_batch(
        &self,
        docs: Vec<Document>,
    ) -> impl Future<Output = PipelineResult<()>> + Send + '_;

    /// Durability barrier
    fn commit(&self) -> impl Future<Output = PipelineResult<()>> + Send + '_;

    /// Per-field schema fragment for index publishing
    fn schema_fragment(&self, field: &FieldSchema) -> String {
        schema_fragment(field)
    }
}

/// JSON shape the HTTP index expects for one document
fn index_json(doc: &Document) -> serde_json::Value {
    let mut body = serde_json::Map::new();
    body.insert("NSD-Id".to_string(), json!(doc.nsd_id));
    body.insert("type".to_string(), json!(doc.doc_type.as_str()));
    body.insert("name".to_string(), json!(doc.name));
    body.insert("title".to_string(), json!(doc.title));
    for field in &doc.fields {
        let value = match &field.value {
            FieldValue::Multi(values) => json!(values),
            FieldValue::Integer(i) => json!(i),
            FieldValue::Float(f) => json!(f),
            FieldValue::Bool(b) => json!(b),
            other => json!(other.as_text()),
        };
        body.insert(field.name.clone(), value);
    }
    serde_json::Value::Object(body)
}

/// HTTP-backed search index
#[derive(Debug, Clone)]
pub struct HttpSearchIndex {
    base_url: String,
    client: reqwest::Client,
}

impl HttpSearchIndex {
    #[must_use]
    pub fn new(base_url: impl Into<String>, client: reqwest::Client) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client,
        }
    }

    async fn post(&self, path: &str, body: serde_json::Value) -> PipelineResult<()> {
        let url = format!("{}/{path}", self.base_url);
        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| PipelineError::IndexUnavailable(format!("{url}: {e}")))?;
        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        if status.is_server_error() {
            return Err(PipelineError::IndexUnavailable(format!("{url}: {status}")));
        }
        Err(PipelineError::PublishFailed {
            doc_ids: Vec::new(),
            cause: format!("{url}: {status}"),
        })
    }
}

impl SearchIndex for HttpSearchIndex {
    fn upsert_batch(
        &self,
        docs: Vec<Document>,
    ) -> impl Future<Output = PipelineResult<()>> + Send + '_ {
        async move {
            debug!("Upserting batch of {} document(s)", docs.len());
            let body = serde_json::Value::Array(docs.iter().map(index_json).collect());
            self.post("update", body).await
        }
    }

    fn commit(&self) -> impl Future<Output = PipelineResult<()>> + Send + '_ {
        async move { self.post("commit", json!({})).await }
    }
}

/// In-memory search index used by the pipeline tests
#[derive(Debug, Default)]
pub struct MemorySearchIndex {
    pending: Mutex<HashMap<String, Document>>,
    committed: Mutex<HashMap<String, Document>>,
    commit_count: AtomicUsize,
    fail_upserts: AtomicUsize,
    fail_commits: AtomicUsize,
}

impl MemorySearchIndex {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `count` upsert calls fail transiently
    pub fn fail_next_upserts(&self, count: usize) {
        self.fail_upserts.store(count, Ordering::SeqCst);
    }

    /// Make the next `count` commit calls fail transiently
    pub fn fail_next_commits(&self, count: usize) {
        self.fail_commits.store(count, Ordering::SeqCst);
    }

    /// Documents made durable so far
    #[must_use]
    pub fn committed_ids(&self) -> Vec<String> {
        let committed = self.committed.lock().unwrap_or_else(|e| e.into_inner());
        let mut ids: Vec<String> = committed.keys().cloned().collect();
        ids.sort();
        ids
    }

    #[must_use]
    pub fn committed_count(&self) -> usize {
        self.committed
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .len()
    }

    #[must_use]
    pub fn commit_calls(&self) -> usize {
        self.commit_count.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn committed_doc(&self, nsd_id: &str) -> Option<Document> {
        self.committed
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(nsd_id)
            .cloned()
    }

    fn take_failure(counter: &AtomicUsize) -> bool {
        counter
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

impl SearchIndex for MemorySearchIndex {
    fn upsert_batch(
        &self,
        docs: Vec<Document>,
    ) -> impl Future<Output = PipelineResult<()>> + Send + '_ {
        async move {
            if Self::take_failure(&self.fail_upserts) {
                return Err(PipelineError::IndexUnavailable(
                    "injected upsert failure".to_string(),
                ));
            }
            let mut pending = self.pending.lock().unwrap_or_else(|e| e.into_inner());
            for doc in docs {
                pending.insert(doc.nsd_id.clone(), doc);
            }
            Ok(())
        }
    }

    fn commit(&self) -> impl Future<Output = PipelineResult<()>> + Send + '_ {
        async move {
            if Self::take_failure(&self.fail_commits) {
                return Err(PipelineError::IndexUnavailable(
                    "injected commit failure".to_string(),
                ));
            }
            let drained: Vec<(String, Document)> = {
                let mut pending = self.pending.lock().unwrap_or_else(|e| e.into_inner());
                pending.drain().collect()
            };
            let mut committed = self.committed.lock().unwrap_or_else(|e| e.into_inner());
            committed.extend(drained);
            self.commit_count.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{DocumentType, Field};

    fn doc(uri: &str) -> Document {
        Document::new(uri, uri.as_bytes(), DocumentType::Text, uri, uri)
    }

    #[tokio::test]
    async fn upsert_is_idempotent_on_nsd_id() {
        let index = MemorySearchIndex::new();
        let d = doc("/corp/a.txt");
        index.upsert_batch(vec![d.clone()]).await.expect("upsert");
        index.upsert_batch(vec![d.clone()]).await.expect("upsert");
        index.commit().await.expect("commit");
        assert_eq!(index.committed_count(), 1);

        // Resubmitting after commit does not grow the committed set.
        index.upsert_batch(vec![d]).await.expect("upsert");
        index.commit().await.expect("commit");
        assert_eq!(index.committed_count(), 1);
    }

    #[tokio::test]
    async fn injected_failures_are_transient() {
        let index = MemorySearchIndex::new();
        index.fail_next_upserts(1);
        let err = index.upsert_batch(vec![doc("/x")]).await.unwrap_err();
        assert!(err.is_transient());
        index.upsert_batch(vec![doc("/x")]).await.expect("recovers");
    }

    #[test]
    fn schema_fragment_renders_attributes() {
        let mut field = Field::text("title", "Quarterly Report");
        field.features.insert("isIndexed".into(), "true".into());
        let fragment = schema_fragment(&FieldSchema::describe(&field));
        assert_eq!(
            fragment,
            r#"<field name="title" type="text" tokenized="true" stored="true" indexed="true" multiValued="false"/>"#
        );
    }

    #[test]
    fn index_json_flattens_fields() {
        let mut d = doc("/corp/a.txt");
        d.set_field(Field::integer("size", 42));
        d.set_field(Field::text("author", "alice"));
        let value = index_json(&d);
        assert_eq!(value["NSD-Id"], d.nsd_id.as_str());
        assert_eq!(value["size"], 42);
        assert_eq!(value["author"], "alice");
        assert_eq!(value["type"], "Text");
    }
}
