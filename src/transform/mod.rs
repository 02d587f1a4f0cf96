//! Transform phase: materialize, type, map, stamp
//!
//! Workers dequeue items from extract→transform, read-then-delete the
//! staged body, apply typing, field mapping and bag copies in order, stamp
//! the transform leg and pass the document onward. Documents travel to the
//! publisher through an in-memory handoff keyed by NSD-Id; the queue keeps
//! carrying only the metric strings.

pub mod bag_copy;
pub mod field_map;
pub mod typing;

use dashmap::DashMap;
use log::{debug, warn};
use std::sync::Arc;
use std::time::Instant;

use crate::config::ConnectorConfig;
use crate::document::Document;
use crate::error::PipelineResult;
use crate::queue::{AbortFlag, CrawlQueue, Sentinel, append_phase, decode_item};
use crate::staging::StagingArea;

/// Transformed documents awaiting the publisher, keyed by NSD-Id
pub type DocumentHandoff = DashMap<String, Document>;

/// Everything the transform pool shares, cloned per worker
#[derive(Clone)]
pub struct TransformContext {
    pub config: Arc<ConnectorConfig>,
    pub staging: StagingArea,
    pub input: Arc<CrawlQueue>,
    pub out: Arc<CrawlQueue>,
    pub metrics_tap: Arc<CrawlQueue>,
    pub handoff: Arc<DocumentHandoff>,
    pub abort: AbortFlag,
}

/// Run the transform phase to completion
///
/// Forwards `CrawlStart` downstream before any document can pass, drains
/// the worker pool on a terminal sentinel and forwards that sentinel
/// exactly once.
pub async fn run(ctx: TransformContext) -> PipelineResult<()> {
    // The upstream phase emits CrawlStart before any item; forward it
    // before workers exist so no transformed document can overtake it.
    let first = ctx.input.take().await;
    match Sentinel::parse(&first) {
        Some(Sentinel::CrawlStart) => {
            ctx.out.put_sentinel(Sentinel::CrawlStart).await;
        }
        Some(terminal) => {
            ctx.out.put_sentinel(terminal).await;
            return Ok(());
        }
        None => {
            ctx.out.put_sentinel(Sentinel::CrawlStart).await;
            handle_item(&ctx, first).await;
        }
    }

    let mut workers = Vec::with_capacity(ctx.config.transform_threads());
    for _ in 0..ctx.config.transform_threads() {
        let ctx = ctx.clone();
        workers.push(tokio::spawn(worker(ctx)));
    }

    let mut terminal = Sentinel::CrawlFinish;
    for handle in workers {
        match handle.await {
            Ok(Sentinel::CrawlAbort) => terminal = Sentinel::CrawlAbort,
            Ok(_) => {}
            Err(e) => {
                warn!("Transform worker panicked: {e}");
                terminal = Sentinel::CrawlAbort;
            }
        }
    }
    ctx.out.put_sentinel(terminal).await;
    Ok(())
}

/// Worker loop: exits on a terminal sentinel, re-enqueueing it so sibling
/// workers see it too
async fn worker(ctx: TransformContext) -> Sentinel {
    loop {
        let item = ctx.input.take().await;
        match Sentinel::parse(&item) {
            Some(Sentinel::CrawlStart) => continue,
            Some(terminal) => {
                ctx.input.put_sentinel(terminal).await;
                return terminal;
            }
            None => handle_item(&ctx, item).await,
        }
    }
}

async fn handle_item(ctx: &TransformContext, item: String) {
    let started = Instant::now();
    let Some((doc_id, _)) = decode_item(&item) else {
        warn!("Dropping malformed queue item: {item}");
        return;
    };

    let mut doc = match ctx.staging.take(&doc_id).await {
        Ok(doc) => doc,
        Err(e) => {
            warn!("Transform failed for {doc_id}: {e}");
            let row = append_phase(&item, "transform-error", 0);
            let _ = ctx.metrics_tap.put(row).await;
            return;
        }
    };

    doc.doc_type = typing::derive(&doc);
    field_map::apply(&mut doc, ctx.config.field_map(), ctx.config.field_delete());
    for (source, target) in ctx.config.bag_copy() {
        bag_copy::apply(&mut doc, source, target);
    }

    let transform_ms = started.elapsed().as_millis() as u64;
    let stamped = append_phase(&item, "transform", transform_ms);
    debug!("Transformed {doc_id} ({:?})", doc.doc_type);

    ctx.handoff.insert(doc.nsd_id.clone(), doc);
    if ctx.out.put(stamped).await.is_err() {
        // Run is aborting; the handoff entry will never be read.
        ctx.handoff.remove(&doc_id);
    }
}
