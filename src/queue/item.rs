//! Queue item wire format
//!
//! Items are printable strings of the form
//! `docId '|' phase ':' millis ( '|' phase ':' millis )*` so a single pipe
//! can carry documents and lifecycle sentinels alike, and so existing
//! operational tooling can decode them with a regex. Literal `|` inside a
//! doc id is escape-prefixed as `\|`. Three reserved strings carry no doc
//! id and control phase lifecycle.

use std::fmt;

/// Reserved item: a run has started on this queue
pub const SENTINEL_CRAWL_START: &str = "NSD-CrawlStart";
/// Reserved item: the upstream phase finished normally
pub const SENTINEL_CRAWL_FINISH: &str = "NSD-CrawlFinish";
/// Reserved item: the run is aborting; discard pending local work
pub const SENTINEL_CRAWL_ABORT: &str = "NSD-CrawlAbort";

/// Lifecycle sentinel markers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sentinel {
    CrawlStart,
    CrawlFinish,
    CrawlAbort,
}

impl Sentinel {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CrawlStart => SENTINEL_CRAWL_START,
            Self::CrawlFinish => SENTINEL_CRAWL_FINISH,
            Self::CrawlAbort => SENTINEL_CRAWL_ABORT,
        }
    }

    /// Parse an item as a sentinel, if it is one of the reserved strings
    #[must_use]
    pub fn parse(item: &str) -> Option<Self> {
        match item {
            SENTINEL_CRAWL_START => Some(Self::CrawlStart),
            SENTINEL_CRAWL_FINISH => Some(Self::CrawlFinish),
            SENTINEL_CRAWL_ABORT => Some(Self::CrawlAbort),
            _ => None,
        }
    }
}

impl fmt::Display for Sentinel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn escape_doc_id(doc_id: &str) -> String {
    doc_id.replace('|', "\\|")
}

fn unescape_doc_id(escaped: &str) -> String {
    let mut out = String::with_capacity(escaped.len());
    let mut chars = escaped.chars().peekable();
    while let Some(ch) = chars.next() {
        if ch == '\\' && chars.peek() == Some(&'|') {
            chars.next();
            out.push('|');
        } else {
            out.push(ch);
        }
    }
    out
}

/// Encode a doc id with its accumulated phase-time segments
#[must_use]
pub fn encode_item(doc_id: &str, phases: &[(&str, u64)]) -> String {
    let mut item = escape_doc_id(doc_id);
    for (phase, millis) in phases {
        item.push('|');
        item.push_str(phase);
        item.push(':');
        item.push_str(&millis.to_string());
    }
    item
}

/// Append one `phase:millis` segment to an already-encoded item
#[must_use]
pub fn append_phase(item: &str, phase: &str, millis: u64) -> String {
    format!("{item}|{phase}:{millis}")
}

/// Decode an item into its doc id and phase-time pairs
///
/// Returns `None` for sentinels and for segments that do not match
/// `phase ':' digits`.
#[must_use]
pub fn decode_item(item: &str) -> Option<(String, Vec<(String, u64)>)> {
    if Sentinel::parse(item).is_some() {
        return None;
    }

    // Find segment boundaries: every '|' not preceded by a backslash.
    let bytes = item.as_bytes();
    let mut boundaries = Vec::new();
    for (idx, &b) in bytes.iter().enumerate() {
        if b == b'|' && (idx == 0 || bytes[idx - 1] != b'\\') {
            boundaries.push(idx);
        }
    }

    let id_end = boundaries.first().copied().unwrap_or(item.len());
    let doc_id = unescape_doc_id(&item[..id_end]);
    if doc_id.is_empty() {
        return None;
    }

    let mut phases = Vec::with_capacity(boundaries.len());
    for (i, &start) in boundaries.iter().enumerate() {
        let end = boundaries.get(i + 1).copied().unwrap_or(item.len());
        let segment = &item[start + 1..end];
        let (phase, millis) = segment.split_once(':')?;
        if phase.is_empty() {
            return None;
        }
        phases.push((phase.to_string(), millis.parse().ok()?));
    }
    Some((doc_id, phases))
}
