// src/ingest/feed.rs
//! RSS 2.0 / Atom fetching and parsing into `RawEntry`.

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use metrics::histogram;
use quick_xml::de::from_str;
use serde::Deserialize;
use std::time::Duration;

use crate::config::app::HttpConfig;
use crate::ingest::types::{FeedFetcher, RawEntry};

// --- RSS 2.0 ---

#[derive(Debug, Deserialize)]
struct Rss {
    channel: Channel,
}

#[derive(Debug, Deserialize)]
struct Channel {
    #[serde(rename = "item", default)]
    items: Vec<RssItem>,
}

#[derive(Debug, Deserialize)]
struct RssItem {
    title: Option<String>,
    link: Option<String>,
    #[serde(rename = "pubDate")]
    pub_date: Option<String>,
    author: Option<String>,
    #[serde(rename = "dc:creator")]
    creator: Option<String>,
    #[serde(rename = "category", default)]
    categories: Vec<Text>,
    #[serde(rename = "content:encoded")]
    content_encoded: Option<String>,
    description: Option<String>,
}

// --- Atom ---

#[derive(Debug, Deserialize)]
struct AtomFeed {
    #[serde(rename = "entry", default)]
    entries: Vec<AtomEntry>,
}

#[derive(Debug, Deserialize)]
struct AtomEntry {
    title: Option<Text>,
    #[serde(rename = "link", default)]
    links: Vec<AtomLink>,
    published: Option<String>,
    updated: Option<String>,
    author: Option<AtomPerson>,
    #[serde(rename = "category", default)]
    categories: Vec<AtomCategory>,
    content: Option<Text>,
    summary: Option<Text>,
}

#[derive(Debug, Deserialize)]
struct AtomLink {
    #[serde(rename = "@href")]
    href: String,
    #[serde(rename = "@rel")]
    rel: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AtomPerson {
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AtomCategory {
    #[serde(rename = "@term")]
    term: Option<String>,
}

/// Element text, ignoring attributes such as `type="html"` or `domain`.
#[derive(Debug, Default, Deserialize)]
struct Text {
    #[serde(rename = "$text", default)]
    value: String,
}

fn non_empty(s: Option<String>) -> Option<String> {
    s.filter(|v| !v.trim().is_empty())
}

/// Named HTML entities are not valid XML; replace the common ones before parsing.
fn scrub_html_entities_for_xml(s: &str) -> String {
    s.replace("&nbsp;", "&#160;")
        .replace("&ndash;", "-")
        .replace("&mdash;", "-")
        .replace("&hellip;", "...")
        .replace("&laquo;", "\"")
        .replace("&raquo;", "\"")
        .replace("&ldquo;", "\"")
        .replace("&rdquo;", "\"")
        .replace("&lsquo;", "'")
        .replace("&rsquo;", "'")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FeedKind {
    Rss,
    Atom,
}

fn detect_kind(xml: &str) -> Option<FeedKind> {
    let rss = xml.find("<rss").or_else(|| xml.find("<rdf:RDF"));
    let atom = xml.find("<feed");
    match (rss, atom) {
        (Some(r), Some(a)) => Some(if r < a { FeedKind::Rss } else { FeedKind::Atom }),
        (Some(_), None) => Some(FeedKind::Rss),
        (None, Some(_)) => Some(FeedKind::Atom),
        (None, None) => None,
    }
}

fn rss_entries(xml: &str) -> Result<Vec<RawEntry>> {
    let rss: Rss = from_str(xml).context("parsing rss xml")?;
    Ok(rss
        .channel
        .items
        .into_iter()
        .map(|it| RawEntry {
            title: it.title.unwrap_or_default().trim().to_string(),
            link: it.link.unwrap_or_default().trim().to_string(),
            published: non_empty(it.pub_date),
            author: non_empty(it.author).or_else(|| non_empty(it.creator)),
            tags: it
                .categories
                .into_iter()
                .map(|c| c.value.trim().to_string())
                .filter(|c| !c.is_empty())
                .collect(),
            category: None,
            content: non_empty(it.content_encoded),
            summary: None,
            description: non_empty(it.description),
        })
        .collect())
}

fn atom_entries(xml: &str) -> Result<Vec<RawEntry>> {
    let feed: AtomFeed = from_str(xml).context("parsing atom xml")?;
    Ok(feed
        .entries
        .into_iter()
        .map(|e| {
            let link = e
                .links
                .iter()
                .find(|l| matches!(l.rel.as_deref(), None | Some("alternate")))
                .or_else(|| e.links.first())
                .map(|l| l.href.trim().to_string())
                .unwrap_or_default();
            RawEntry {
                title: e.title.map(|t| t.value.trim().to_string()).unwrap_or_default(),
                link,
                published: non_empty(e.published).or_else(|| non_empty(e.updated)),
                author: e.author.and_then(|a| non_empty(a.name)),
                tags: e
                    .categories
                    .into_iter()
                    .filter_map(|c| non_empty(c.term))
                    .collect(),
                category: None,
                content: non_empty(e.content.map(|t| t.value)),
                summary: non_empty(e.summary.map(|t| t.value)),
                description: None,
            }
        })
        .collect())
}

/// Parse an RSS 2.0 or Atom document. Entries keep document order.
pub fn parse_feed(xml: &str) -> Result<Vec<RawEntry>> {
    let t0 = std::time::Instant::now();
    let xml_clean = scrub_html_entities_for_xml(xml);
    let out = match detect_kind(&xml_clean) {
        Some(FeedKind::Rss) => rss_entries(&xml_clean)?,
        Some(FeedKind::Atom) => atom_entries(&xml_clean)?,
        None => return Err(anyhow!("document is neither RSS nor Atom")),
    };
    histogram!("tracker_feed_parse_ms").record(t0.elapsed().as_secs_f64() * 1_000.0);
    Ok(out)
}

/// Fetches feeds over HTTP with a per-request timeout.
pub struct HttpFeedFetcher {
    client: reqwest::Client,
}

impl HttpFeedFetcher {
    pub fn new(cfg: &HttpConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(cfg.user_agent.as_str())
            .connect_timeout(Duration::from_secs(cfg.timeout_secs.max(1)))
            .timeout(Duration::from_secs(cfg.feed_timeout_secs.max(1)))
            .build()
            .context("building feed http client")?;
        Ok(Self { client })
    }

    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl FeedFetcher for HttpFeedFetcher {
    async fn fetch(&self, url: &str) -> Result<Vec<RawEntry>> {
        let resp = self
            .client
            .get(url)
            .send()
            .await
            .with_context(|| format!("feed http get {url}"))?
            .error_for_status()
            .with_context(|| format!("feed http status {url}"))?;
        let body = resp.text().await.context("feed http .text()")?;
        parse_feed(&body)
    }
}
