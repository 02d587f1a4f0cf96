//! Transform/publish phase protocol: sentinel handling, per-document
//! failure isolation and the batch/commit thresholds.

use std::sync::Arc;

use nsd_connector::config::ConnectorConfig;
use nsd_connector::document::{Document, DocumentType, Field};
use nsd_connector::metrics;
use nsd_connector::publish::{self, MemorySearchIndex, PublishContext};
use nsd_connector::queue::{AbortFlag, CrawlQueue, Sentinel, encode_item};
use nsd_connector::staging::StagingArea;
use nsd_connector::transform::{self, DocumentHandoff, TransformContext};

struct Rig {
    config: Arc<ConnectorConfig>,
    staging: StagingArea,
    abort: AbortFlag,
    extract_to_transform: Arc<CrawlQueue>,
    transform_to_publish: Arc<CrawlQueue>,
    metrics_tap: Arc<CrawlQueue>,
    handoff: Arc<DocumentHandoff>,
    index: Arc<MemorySearchIndex>,
    _tmp: tempfile::TempDir,
}

fn rig(config: ConnectorConfig) -> Rig {
    let tmp = tempfile::tempdir().expect("tempdir");
    let abort = AbortFlag::new();
    Rig {
        config: Arc::new(config),
        staging: StagingArea::open(tmp.path().join("staging")).expect("staging"),
        extract_to_transform: Arc::new(CrawlQueue::new(64, abort.clone())),
        transform_to_publish: Arc::new(CrawlQueue::new(64, abort.clone())),
        metrics_tap: Arc::new(CrawlQueue::new(64, AbortFlag::new())),
        handoff: Arc::new(DocumentHandoff::new()),
        index: Arc::new(MemorySearchIndex::new()),
        abort,
        _tmp: tmp,
    }
}

impl Rig {
    /// Stage `count` documents and enqueue their items behind a CrawlStart
    async fn feed(&self, count: usize) -> Vec<String> {
        self.extract_to_transform
            .put_sentinel(Sentinel::CrawlStart)
            .await;
        let mut ids = Vec::with_capacity(count);
        for i in 1..=count {
            let uri = format!("/share/doc{i}.txt");
            let mut doc = Document::new(
                &uri,
                format!("body {i}").as_bytes(),
                DocumentType::Unknown,
                format!("doc{i}.txt"),
                format!("doc{i}"),
            );
            doc.set_field(Field::text("uri", &uri));
            self.staging.write(&doc).await.expect("stage");
            self.extract_to_transform
                .put(encode_item(&doc.nsd_id, &[("extract", 1)]))
                .await
                .expect("enqueue");
            ids.push(doc.nsd_id);
        }
        self.extract_to_transform
            .put_sentinel(Sentinel::CrawlFinish)
            .await;
        ids
    }

    fn transform_ctx(&self) -> TransformContext {
        TransformContext {
            config: Arc::clone(&self.config),
            staging: self.staging.clone(),
            input: Arc::clone(&self.extract_to_transform),
            out: Arc::clone(&self.transform_to_publish),
            metrics_tap: Arc::clone(&self.metrics_tap),
            handoff: Arc::clone(&self.handoff),
            abort: self.abort.clone(),
        }
    }

    fn publish_ctx(&self) -> PublishContext<MemorySearchIndex> {
        PublishContext {
            config: Arc::clone(&self.config),
            input: Arc::clone(&self.transform_to_publish),
            metrics_tap: Arc::clone(&self.metrics_tap),
            handoff: Arc::clone(&self.handoff),
            index: Arc::clone(&self.index),
            abort: self.abort.clone(),
        }
    }
}

#[tokio::test]
async fn s4_transform_fault_drops_one_document_without_abort() {
    let rig = rig(ConnectorConfig::builder().transform_threads(2).build());
    let ids = rig.feed(10).await;

    // Fault injection: document #3 loses its staged body before the
    // transformer reaches it.
    rig.staging.take(&ids[2]).await.expect("steal staged body");

    let transform_task = tokio::spawn(transform::run(rig.transform_ctx()));
    let publish_task = tokio::spawn(publish::run(rig.publish_ctx()));
    let metrics_task = tokio::spawn(metrics::run_tap(Arc::clone(&rig.metrics_tap)));

    transform_task
        .await
        .expect("join")
        .expect("transform completes");
    let summary = publish_task.await.expect("join");
    let totals = metrics_task.await.expect("join");

    assert_eq!(summary.published, 9);
    assert_eq!(rig.index.committed_count(), 9);
    assert!(!rig.abort.is_set(), "one bad document never aborts the run");
    assert_eq!(totals.phase("transform").errors, 1);
    assert_eq!(totals.phase("publish").count, 9);
    for (i, id) in ids.iter().enumerate() {
        let committed = rig.index.committed_doc(id);
        if i == 2 {
            assert!(committed.is_none(), "faulted doc stays out of the index");
        } else {
            assert!(committed.is_some());
        }
    }
}

#[tokio::test]
async fn batch_and_commit_thresholds_drive_submissions() {
    let rig = rig(
        ConnectorConfig::builder()
            .publish_batch(3)
            .publish_commit(6)
            .build(),
    );
    rig.feed(7).await;

    let transform_task = tokio::spawn(transform::run(rig.transform_ctx()));
    let publish_task = tokio::spawn(publish::run(rig.publish_ctx()));
    let metrics_task = tokio::spawn(metrics::run_tap(Arc::clone(&rig.metrics_tap)));

    transform_task.await.expect("join").expect("transform");
    let summary = publish_task.await.expect("join");
    metrics_task.await.expect("join");

    assert_eq!(summary.published, 7);
    assert_eq!(rig.index.committed_count(), 7);
    // One commit at the 6-document threshold, one final commit at finish.
    assert_eq!(rig.index.commit_calls(), 2);
}

#[tokio::test]
async fn failed_batch_is_marked_and_the_run_continues() {
    let rig = rig(ConnectorConfig::builder().publish_batch(2).build());
    rig.feed(4).await;
    // First batch: the initial attempt and its single retry both fail.
    rig.index.fail_next_upserts(2);

    let transform_task = tokio::spawn(transform::run(rig.transform_ctx()));
    let publish_task = tokio::spawn(publish::run(rig.publish_ctx()));
    let metrics_task = tokio::spawn(metrics::run_tap(Arc::clone(&rig.metrics_tap)));

    transform_task.await.expect("join").expect("transform");
    let summary = publish_task.await.expect("join");
    let totals = metrics_task.await.expect("join");

    assert_eq!(summary.published, 2);
    assert_eq!(summary.failed, 2);
    assert!(summary.last_error.is_some());
    assert_eq!(rig.index.committed_count(), 2);
    assert_eq!(totals.phase("publish").errors, 2);
    assert!(!rig.abort.is_set());
}

#[tokio::test]
async fn typing_and_field_rules_apply_before_publish() {
    let rig = rig(
        ConnectorConfig::builder()
            .map_field("uri", "source")
            .delete_field("scratch")
            .bag_copy("source", "source_exact")
            .build(),
    );

    rig.extract_to_transform
        .put_sentinel(Sentinel::CrawlStart)
        .await;
    let uri = "/share/page.html";
    let mut doc = Document::new(uri, b"<html/>", DocumentType::Unknown, "page.html", "page");
    doc.set_field(Field::text("uri", uri));
    doc.set_field(Field::text("scratch", "temp"));
    let id = doc.nsd_id.clone();
    rig.staging.write(&doc).await.expect("stage");
    rig.extract_to_transform
        .put(encode_item(&id, &[("extract", 1)]))
        .await
        .expect("enqueue");
    rig.extract_to_transform
        .put_sentinel(Sentinel::CrawlFinish)
        .await;

    let transform_task = tokio::spawn(transform::run(rig.transform_ctx()));
    let publish_task = tokio::spawn(publish::run(rig.publish_ctx()));
    let metrics_task = tokio::spawn(metrics::run_tap(Arc::clone(&rig.metrics_tap)));
    transform_task.await.expect("join").expect("transform");
    publish_task.await.expect("join");
    metrics_task.await.expect("join");

    let committed = rig.index.committed_doc(&id).expect("committed");
    assert_eq!(committed.doc_type, DocumentType::Html);
    assert!(committed.field("uri").is_none(), "renamed away");
    assert_eq!(committed.field("source").unwrap().value.as_text(), uri);
    assert_eq!(
        committed.field("source_exact").unwrap().value.as_text(),
        uri
    );
    assert!(committed.field("scratch").is_none(), "deleted");
}
