//! Web-site extraction
//!
//! Seed URLs come from the start rules. Pages are fetched over plain HTTP
//! with a configurable user agent, a per-host politeness gate and redirect
//! following; discovered links are resolved against the final URL and
//! handed back for classification. In js-aware mode absolute URLs inside
//! `<script>` bodies are harvested as well.

use log::debug;
use regex::Regex;
use scraper::{Html, Selector};
use std::sync::OnceLock;
use url::Url;

use crate::document::{Document, DocumentType, Field};
use crate::error::{PipelineError, PipelineResult};

/// A fetched page: the document plus outbound link candidates
#[derive(Debug)]
pub struct WebVisit {
    pub doc: Box<Document>,
    pub links: Vec<String>,
}

fn script_url_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"https?://[^\s"'<>\\]+"#).unwrap_or_else(|e| panic!("script url regex: {e}"))
    })
}

/// Host component of a URL, for the politeness gate
#[must_use]
pub fn host_of(url: &str) -> String {
    Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(str::to_lowercase))
        .unwrap_or_else(|| url.to_string())
}

/// Fetch one page and harvest its links
///
/// `collect_links` is false once the page sits at `max_depth`; the body is
/// still extracted.
pub async fn visit(
    client: &reqwest::Client,
    url: &str,
    js_aware: bool,
    collect_links: bool,
) -> PipelineResult<WebVisit> {
    let response = client
        .get(url)
        .send()
        .await
        .map_err(|e| PipelineError::ExtractFailed {
            doc_id: url.to_string(),
            cause: e.to_string(),
        })?;

    let status = response.status();
    if !status.is_success() {
        return Err(PipelineError::ExtractFailed {
            doc_id: url.to_string(),
            cause: format!("status {status}"),
        });
    }

    // Redirects may have moved us; resolve links against where we landed.
    let final_url = response.url().clone();
    let content_type = response
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("text/html")
        .split(';')
        .next()
        .unwrap_or("text/html")
        .trim()
        .to_string();

    let body = response
        .text()
        .await
        .map_err(|e| PipelineError::ExtractFailed {
            doc_id: url.to_string(),
            cause: format!("body read: {e}"),
        })?;

    let html = Html::parse_document(&body);
    let title = title_selector()
        .and_then(|sel| html.select(sel).next())
        .map(|el| el.text().collect::<String>().trim().to_string())
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| url.to_string());

    let mut links = Vec::new();
    if collect_links {
        if let Some(sel) = anchor_selector() {
            for anchor in html.select(sel) {
                if let Some(href) = anchor.value().attr("href")
                    && let Some(resolved) = resolve_link(&final_url, href)
                {
                    links.push(resolved);
                }
            }
        }
        if js_aware && let Some(sel) = script_selector() {
            for script in html.select(sel) {
                let text: String = script.text().collect();
                for hit in script_url_regex().find_iter(&text) {
                    links.push(hit.as_str().trim_end_matches(['.', ',']).to_string());
                }
            }
        }
        links.sort_unstable();
        links.dedup();
        debug!("Found {} link(s) on {url}", links.len());
    }

    let mut doc = Document::new(
        url,
        body.as_bytes(),
        DocumentType::Unknown,
        final_url.to_string(),
        title,
    );
    doc.set_field(Field::text("uri", url));
    doc.set_field(Field::text("mime", content_type));
    doc.set_field(Field::integer("size", body.len() as i64));
    doc.set_field(Field::text("content", body));
    Ok(WebVisit {
        doc: Box::new(doc),
        links,
    })
}

fn resolve_link(base: &Url, href: &str) -> Option<String> {
    let href = href.trim();
    if href.is_empty()
        || href.starts_with('#')
        || href.starts_with("mailto:")
        || href.starts_with("javascript:")
    {
        return None;
    }
    let mut resolved = base.join(href).ok()?;
    resolved.set_fragment(None);
    match resolved.scheme() {
        "http" | "https" => Some(resolved.to_string()),
        _ => None,
    }
}

fn title_selector() -> Option<&'static Selector> {
    static SEL: OnceLock<Option<Selector>> = OnceLock::new();
    SEL.get_or_init(|| Selector::parse("title").ok()).as_ref()
}

fn anchor_selector() -> Option<&'static Selector> {
    static SEL: OnceLock<Option<Selector>> = OnceLock::new();
    SEL.get_or_init(|| Selector::parse("a[href]").ok()).as_ref()
}

fn script_selector() -> Option<&'static Selector> {
    static SEL: OnceLock<Option<Selector>> = OnceLock::new();
    SEL.get_or_init(|| Selector::parse("script").ok()).as_ref()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hosts_extract_and_lowercase() {
        assert_eq!(host_of("http://Example.COM/docs/x"), "example.com");
        assert_eq!(host_of("https://a.b.c:8443/path"), "a.b.c");
    }

    #[test]
    fn relative_links_resolve_against_base() {
        let base = Url::parse("http://example.com/docs/index.html").expect("url");
        assert_eq!(
            resolve_link(&base, "page2.html").as_deref(),
            Some("http://example.com/docs/page2.html")
        );
        assert_eq!(
            resolve_link(&base, "/top.html").as_deref(),
            Some("http://example.com/top.html")
        );
        assert_eq!(resolve_link(&base, "#section"), None);
        assert_eq!(resolve_link(&base, "mailto:x@example.com"), None);
        assert_eq!(resolve_link(&base, "ftp://example.com/file"), None);
    }

    #[test]
    fn fragment_is_stripped() {
        let base = Url::parse("http://example.com/").expect("url");
        assert_eq!(
            resolve_link(&base, "a.html#top").as_deref(),
            Some("http://example.com/a.html")
        );
    }

    #[test]
    fn script_regex_finds_absolute_urls() {
        let re = script_url_regex();
        let text = r#"fetch("https://api.example.com/v1/items"); var u = 'http://example.com/x.html';"#;
        let hits: Vec<&str> = re.find_iter(text).map(|m| m.as_str()).collect();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0], "https://api.example.com/v1/items");
    }
}
