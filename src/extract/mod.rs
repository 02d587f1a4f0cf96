//! Extract phase: walk the content source, emit documents
//!
//! A pool of workers shares one frontier of URIs. Every worker stages the
//! documents it produces, stamps the extract leg time and enqueues the
//! queue item toward Transform. The phase brackets its output with
//! `CrawlStart` and `CrawlFinish`; fatal source unreachability turns into
//! `CrawlAbort` instead.

pub mod csv_rows;
pub mod file_share;
pub mod host_gate;
pub mod web;

use chrono::{DateTime, Utc};
use dashmap::DashSet;
use futures::StreamExt;
use futures::stream::FuturesUnordered;
use log::{debug, error, info, warn};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::config::ConnectorConfig;
use crate::document::Document;
use crate::error::{PipelineError, PipelineResult};
use crate::queue::{AbortFlag, CrawlQueue, Sentinel, encode_item};
use crate::staging::StagingArea;
use crate::uri_matcher::UriRules;

pub use host_gate::HostGate;

/// Everything the extract pool shares, cloned per worker task
#[derive(Clone)]
pub struct ExtractContext {
    pub config: Arc<ConnectorConfig>,
    pub rules: Arc<UriRules>,
    pub staging: StagingArea,
    pub out: Arc<CrawlQueue>,
    pub metrics_tap: Arc<CrawlQueue>,
    pub abort: AbortFlag,
    /// `Some` only for incremental runs
    pub last_incremental_at: Option<DateTime<Utc>>,
}

/// One frontier entry
#[derive(Debug, Clone)]
struct Pending {
    uri: String,
    depth: u8,
}

/// What one URI visit contributed
#[derive(Debug, Default)]
struct UriOutcome {
    candidates: Vec<Pending>,
    emitted: u64,
}

/// Run the extract phase to completion
///
/// Returns the number of documents emitted. Administrative abort drains
/// quietly; the `CrawlAbort` broadcast is the run controller's job.
pub async fn run(ctx: ExtractContext) -> PipelineResult<u64> {
    ctx.out.put_sentinel(Sentinel::CrawlStart).await;

    let starts = ctx.rules.starts().to_vec();
    let web_start = starts.first().is_some_and(|s| s.starts_with("http"));
    let concurrency = ctx.config.extract_threads(web_start);
    let client = if web_start {
        Some(
            ctx.config
                .http_client()
                .map_err(|e| PipelineError::ConfigMissing(format!("http client: {e}")))?,
        )
    } else {
        None
    };
    let gate = Arc::new(HostGate::new(Duration::from_millis(
        ctx.config.politeness_ms(),
    )));

    info!(
        "Extract starting: {} start URI(s), {} worker(s), {} crawl",
        starts.len(),
        concurrency,
        if ctx.last_incremental_at.is_some() {
            "incremental"
        } else {
            "full"
        }
    );

    let mut frontier: std::collections::VecDeque<Pending> = starts
        .into_iter()
        .map(|uri| Pending { uri, depth: 0 })
        .collect();
    let visited: Arc<DashSet<String>> = Arc::new(DashSet::new());
    let mut active = FuturesUnordered::new();
    let mut emitted: u64 = 0;

    loop {
        while active.len() < concurrency && !ctx.abort.is_set() {
            let Some(pending) = frontier.pop_front() else {
                break;
            };
            if !visited.insert(pending.uri.clone()) {
                continue;
            }
            let ctx = ctx.clone();
            let client = client.clone();
            let gate = Arc::clone(&gate);
            let is_start = pending.depth == 0;
            active.push(tokio::spawn(async move {
                let result = visit_uri(&ctx, client.as_ref(), &gate, &pending).await;
                (pending, is_start, result)
            }));
        }

        match active.next().await {
            Some(Ok((pending, is_start, result))) => match result {
                Ok(outcome) => {
                    emitted += outcome.emitted;
                    for candidate in outcome.candidates {
                        if !visited.contains(&candidate.uri) {
                            frontier.push_back(candidate);
                        }
                    }
                }
                Err(PipelineError::Aborted) => {
                    debug!("Extract worker stopped on abort: {}", pending.uri);
                }
                Err(e) if is_start => {
                    // A start root vanished out from under the run: the
                    // source is unreachable, not one bad document.
                    error!("Crawl start unreachable mid-run: {}: {e}", pending.uri);
                    ctx.abort.set();
                    ctx.out.put_sentinel(Sentinel::CrawlAbort).await;
                    return Err(PipelineError::StartUnreachable {
                        uri: pending.uri,
                        cause: e.to_string(),
                    });
                }
                Err(e) => {
                    warn!("Extract failed for {}: {e}", pending.uri);
                    let row = encode_item(&pending.uri, &[("extract-error", 0)]);
                    let _ = ctx.metrics_tap.put(row).await;
                }
            },
            Some(Err(join_err)) => {
                error!("Extract task panicked: {join_err}");
            }
            None => break,
        }

        if ctx.abort.is_set() && active.is_empty() {
            break;
        }
        if frontier.is_empty() && active.is_empty() {
            break;
        }
    }

    if ctx.abort.is_set() {
        info!("Extract drained after abort: {emitted} document(s) emitted");
        return Ok(emitted);
    }

    ctx.out.put_sentinel(Sentinel::CrawlFinish).await;
    info!("Extract finished: {emitted} document(s) emitted");
    Ok(emitted)
}

async fn visit_uri(
    ctx: &ExtractContext,
    client: Option<&reqwest::Client>,
    gate: &HostGate,
    pending: &Pending,
) -> PipelineResult<UriOutcome> {
    let started = Instant::now();
    if ctx.abort.is_set() {
        return Err(PipelineError::Aborted);
    }

    if pending.uri.starts_with("http") {
        let client = client.ok_or_else(|| PipelineError::ExtractFailed {
            doc_id: pending.uri.clone(),
            cause: "no http client for web start".to_string(),
        })?;
        gate.admit(&web::host_of(&pending.uri)).await;

        let collect_links = pending.depth < ctx.config.max_depth();
        let visit = web::visit(client, &pending.uri, ctx.config.js_aware(), collect_links).await?;
        emit_document(ctx, *visit.doc, started).await?;

        let candidates = visit
            .links
            .into_iter()
            .filter(|link| ctx.rules.admits(link))
            .map(|uri| Pending {
                uri,
                depth: pending.depth + 1,
            })
            .collect();
        return Ok(UriOutcome {
            candidates,
            emitted: 1,
        });
    }

    match file_share::visit(&pending.uri, ctx.last_incremental_at)? {
        file_share::FsVisit::Directory(entries) => {
            let candidates = entries
                .into_iter()
                .filter(|entry| ctx.rules.admits(entry))
                .map(|uri| Pending {
                    uri,
                    depth: pending.depth.saturating_add(1),
                })
                .collect();
            Ok(UriOutcome {
                candidates,
                emitted: 0,
            })
        }
        file_share::FsVisit::File(doc) => {
            let is_csv = doc
                .field("mime")
                .is_some_and(|f| f.value.as_text() == "text/csv");
            if ctx.config.csv_rows() && is_csv {
                let content = doc
                    .field("content")
                    .map(|f| f.value.as_text())
                    .unwrap_or_default();
                let rows = csv_rows::expand(&pending.uri, content.as_bytes())?;
                let count = rows.len() as u64;
                for row in rows {
                    emit_document(ctx, row, started).await?;
                }
                Ok(UriOutcome {
                    candidates: Vec::new(),
                    emitted: count,
                })
            } else {
                emit_document(ctx, *doc, started).await?;
                Ok(UriOutcome {
                    candidates: Vec::new(),
                    emitted: 1,
                })
            }
        }
        file_share::FsVisit::Skipped => Ok(UriOutcome::default()),
    }
}

async fn emit_document(
    ctx: &ExtractContext,
    doc: Document,
    arrived: Instant,
) -> PipelineResult<()> {
    ctx.staging.write(&doc).await?;
    let extract_ms = arrived.elapsed().as_millis() as u64;
    let item = encode_item(&doc.nsd_id, &[("extract", extract_ms)]);
    ctx.out.put(item).await
}
