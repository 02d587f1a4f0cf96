//! Publish phase: batch, commit, enforce the document budget
//!
//! Workers drain transform→publish, pick their documents out of the
//! in-memory handoff and feed a shared batch buffer with three thresholds:
//! batch size (submit), commit size (durability barrier) and the per-run
//! document budget (hard cap: discard further documents and broadcast
//! abort upstream). Batch submits retry once on transient errors; commits
//! retry twice with linear backoff.

pub mod index_client;

use log::{debug, info, warn};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Mutex;

use crate::config::ConnectorConfig;
use crate::document::Document;
use crate::error::{PipelineError, RetryPolicy};
use crate::queue::{AbortFlag, CrawlQueue, Sentinel, append_phase, decode_item};
use crate::transform::DocumentHandoff;

pub use index_client::{HttpSearchIndex, MemorySearchIndex, SearchIndex, schema_fragment};

/// Everything the publish pool shares
pub struct PublishContext<I> {
    pub config: Arc<ConnectorConfig>,
    pub input: Arc<CrawlQueue>,
    /// Completed items and error rows land here; the tap has its own
    /// abort-free lifetime so metrics survive an aborting run
    pub metrics_tap: Arc<CrawlQueue>,
    pub handoff: Arc<DocumentHandoff>,
    pub index: Arc<I>,
    pub abort: AbortFlag,
}

impl<I> Clone for PublishContext<I> {
    fn clone(&self) -> Self {
        Self {
            config: Arc::clone(&self.config),
            input: Arc::clone(&self.input),
            metrics_tap: Arc::clone(&self.metrics_tap),
            handoff: Arc::clone(&self.handoff),
            index: Arc::clone(&self.index),
            abort: self.abort.clone(),
        }
    }
}

/// End-of-run publisher figures for the controller and the mail body
#[derive(Debug, Clone, Default)]
pub struct PublishSummary {
    pub published: u64,
    pub failed: u64,
    pub discarded_by_budget: u64,
    pub commits: u64,
    pub budget_exceeded: bool,
    pub last_error: Option<String>,
}

#[derive(Debug)]
struct Entry {
    item: String,
    doc: Document,
    dequeued: Instant,
}

#[derive(Debug, Default)]
struct BatchState {
    buf: Vec<Entry>,
    accepted: usize,
    since_commit: usize,
    published: u64,
    failed: u64,
    discarded: u64,
    commits: u64,
    budget_hit: bool,
    completed: Vec<String>,
    last_error: Option<String>,
}

/// Run the publish phase to completion and report its summary
pub async fn run<I: SearchIndex + 'static>(ctx: PublishContext<I>) -> PublishSummary {
    ctx.metrics_tap.put_sentinel(Sentinel::CrawlStart).await;
    let state = Arc::new(Mutex::new(BatchState::default()));

    let first = ctx.input.take().await;
    let early_terminal = match Sentinel::parse(&first) {
        Some(Sentinel::CrawlStart) => None,
        Some(terminal) => Some(terminal),
        None => {
            handle_item(&ctx, &state, first).await;
            None
        }
    };

    let terminal = match early_terminal {
        Some(terminal) => terminal,
        None => {
            let mut workers = Vec::with_capacity(ctx.config.publish_threads());
            for _ in 0..ctx.config.publish_threads() {
                let ctx = ctx.clone();
                let state = Arc::clone(&state);
                workers.push(tokio::spawn(worker(ctx, state)));
            }
            let mut terminal = Sentinel::CrawlFinish;
            for handle in workers {
                match handle.await {
                    Ok(Sentinel::CrawlAbort) => terminal = Sentinel::CrawlAbort,
                    Ok(_) => {}
                    Err(e) => {
                        warn!("Publish worker panicked: {e}");
                        terminal = Sentinel::CrawlAbort;
                    }
                }
            }
            terminal
        }
    };

    if terminal == Sentinel::CrawlFinish {
        let residual = {
            let mut s = state.lock().await;
            std::mem::take(&mut s.buf)
        };
        submit_batch(&ctx, &state, residual).await;
        maybe_commit(&ctx, &state, true).await;
    } else {
        // Aborting: pending local work is discarded, committed work stands.
        let mut s = state.lock().await;
        let dropped = s.buf.len();
        s.buf.clear();
        s.discarded += dropped as u64;
        if dropped > 0 {
            debug!("Discarded {dropped} batched document(s) on abort");
        }
    }

    let summary = {
        let mut s = state.lock().await;
        for item in std::mem::take(&mut s.completed) {
            let _ = ctx.metrics_tap.put(item).await;
        }
        PublishSummary {
            published: s.published,
            failed: s.failed,
            discarded_by_budget: s.discarded,
            commits: s.commits,
            budget_exceeded: s.budget_hit,
            last_error: s.last_error.clone(),
        }
    };
    ctx.metrics_tap.put_sentinel(terminal).await;
    info!(
        "Publish finished: {} published, {} failed, {} discarded, {} commit(s)",
        summary.published, summary.failed, summary.discarded_by_budget, summary.commits
    );
    summary
}

async fn worker<I: SearchIndex>(
    ctx: PublishContext<I>,
    state: Arc<Mutex<BatchState>>,
) -> Sentinel {
    loop {
        let item = ctx.input.take().await;
        match Sentinel::parse(&item) {
            Some(Sentinel::CrawlStart) => continue,
            Some(terminal) => {
                ctx.input.put_sentinel(terminal).await;
                return terminal;
            }
            None => handle_item(&ctx, &state, item).await,
        }
    }
}

async fn handle_item<I: SearchIndex>(
    ctx: &PublishContext<I>,
    state: &Arc<Mutex<BatchState>>,
    item: String,
) {
    let Some((doc_id, _)) = decode_item(&item) else {
        warn!("Dropping malformed queue item: {item}");
        return;
    };
    let Some((_, doc)) = ctx.handoff.remove(&doc_id) else {
        warn!("No handoff document for {doc_id}");
        let mut s = state.lock().await;
        s.failed += 1;
        drop(s);
        let _ = ctx
            .metrics_tap
            .put(append_phase(&item, "publish-error", 0))
            .await;
        return;
    };

    let mut batch = None;
    let mut budget_reached = false;
    {
        let mut s = state.lock().await;
        if s.budget_hit {
            s.discarded += 1;
            return;
        }
        s.accepted += 1;
        s.buf.push(Entry {
            item,
            doc,
            dequeued: Instant::now(),
        });
        if s.accepted >= ctx.config.publish_max() {
            s.budget_hit = true;
            budget_reached = true;
            batch = Some(std::mem::take(&mut s.buf));
        } else if s.buf.len() >= ctx.config.publish_batch() {
            batch = Some(std::mem::take(&mut s.buf));
        }
    }

    if budget_reached {
        warn!(
            "Document budget of {} reached; broadcasting abort upstream",
            ctx.config.publish_max()
        );
        ctx.abort.set();
    }

    if let Some(batch) = batch {
        submit_batch(ctx, state, batch).await;
        // Make budget-capped work durable before the drain discards the rest.
        maybe_commit(ctx, state, budget_reached).await;
    }
}

async fn submit_batch<I: SearchIndex>(
    ctx: &PublishContext<I>,
    state: &Arc<Mutex<BatchState>>,
    batch: Vec<Entry>,
) {
    if batch.is_empty() {
        return;
    }
    let docs: Vec<Document> = batch.iter().map(|e| e.doc.clone()).collect();
    let policy = RetryPolicy::submit();
    let mut attempt = 0;
    let result = loop {
        match ctx.index.upsert_batch(docs.clone()).await {
            Ok(()) => break Ok(()),
            Err(e) if e.is_transient() && attempt < policy.max_retries => {
                warn!("Batch submit failed (attempt {}): {e}", attempt + 1);
                tokio::time::sleep(policy.delay_for(attempt)).await;
                attempt += 1;
            }
            Err(e) => break Err(e),
        }
    };

    match result {
        Ok(()) => {
            let mut s = state.lock().await;
            s.published += batch.len() as u64;
            s.since_commit += batch.len();
            for entry in batch {
                let publish_ms = entry.dequeued.elapsed().as_millis() as u64;
                s.completed
                    .push(append_phase(&entry.item, "publish", publish_ms));
            }
        }
        Err(e) => {
            let doc_ids: Vec<String> = batch.iter().map(|e| e.doc.nsd_id.clone()).collect();
            warn!("Batch of {} document(s) failed permanently: {e}", doc_ids.len());
            {
                let mut s = state.lock().await;
                s.failed += batch.len() as u64;
                s.last_error = Some(
                    PipelineError::PublishFailed {
                        doc_ids,
                        cause: e.to_string(),
                    }
                    .to_string(),
                );
            }
            for entry in batch {
                let _ = ctx
                    .metrics_tap
                    .put(append_phase(&entry.item, "publish-error", 0))
                    .await;
            }
        }
    }
}

async fn maybe_commit<I: SearchIndex>(
    ctx: &PublishContext<I>,
    state: &Arc<Mutex<BatchState>>,
    force: bool,
) {
    {
        let s = state.lock().await;
        if s.since_commit == 0 || (!force && s.since_commit < ctx.config.publish_commit()) {
            return;
        }
    }

    let policy = RetryPolicy::commit();
    let mut attempt = 0;
    let result = loop {
        match ctx.index.commit().await {
            Ok(()) => break Ok(()),
            Err(e) if attempt < policy.max_retries => {
                warn!("Commit failed (attempt {}): {e}", attempt + 1);
                tokio::time::sleep(policy.delay_for(attempt)).await;
                attempt += 1;
            }
            Err(e) => break Err(e),
        }
    };

    match result {
        Ok(()) => {
            let mut s = state.lock().await;
            s.commits += 1;
            s.since_commit = 0;
            debug!("Commit {} succeeded", s.commits);
        }
        Err(e) => {
            warn!("Commit failed permanently, escalating to abort: {e}");
            {
                let mut s = state.lock().await;
                s.last_error = Some(e.to_string());
            }
            ctx.abort.set();
        }
    }
}
