// src/report/export.rs
//! RSS 2.0 export of a report window.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::store::{format_ts, LeakItem, ReportKind, ReportWindow};

const RFC822_GMT: &str = "%a, %d %b %Y %H:%M:%S GMT";
const ATOM_NS: &str = "http://www.w3.org/2005/Atom";

#[derive(Debug, Serialize)]
#[serde(rename = "rss")]
struct RssDoc {
    #[serde(rename = "@version")]
    version: &'static str,
    #[serde(rename = "@xmlns:atom")]
    xmlns_atom: &'static str,
    channel: RssChannel,
}

#[derive(Debug, Serialize)]
struct RssChannel {
    title: String,
    description: String,
    link: String,
    #[serde(rename = "atom:link")]
    atom_link: AtomSelfLink,
    language: &'static str,
    #[serde(rename = "lastBuildDate")]
    last_build_date: String,
    ttl: u32,
    #[serde(rename = "item")]
    items: Vec<RssItem>,
}

#[derive(Debug, Serialize)]
struct AtomSelfLink {
    #[serde(rename = "@href")]
    href: String,
    #[serde(rename = "@rel")]
    rel: &'static str,
    #[serde(rename = "@type")]
    kind: &'static str,
}

#[derive(Debug, Serialize)]
struct RssItem {
    title: String,
    link: String,
    description: String,
    #[serde(rename = "pubDate")]
    pub_date: String,
    guid: Guid,
}

#[derive(Debug, Serialize)]
struct Guid {
    #[serde(rename = "@isPermaLink")]
    is_perma_link: &'static str,
    #[serde(rename = "$text")]
    value: String,
}

/// `daily_rss_2026-10-19.xml` / `weekly_rss_2026-10-19_2026-10-25.xml`, and the
/// matching `latest_*` name.
pub fn feed_file_names(window: &ReportWindow) -> (String, String) {
    match window.kind {
        ReportKind::Daily => (
            format!("daily_rss_{}.xml", window.first_day().format("%Y-%m-%d")),
            "latest_daily_rss.xml".to_string(),
        ),
        ReportKind::Weekly => (
            format!(
                "weekly_rss_{}_{}.xml",
                window.first_day().format("%Y-%m-%d"),
                window.last_day().format("%Y-%m-%d")
            ),
            "latest_weekly_rss.xml".to_string(),
        ),
    }
}

/// Render the RSS document. `items` are emitted in the given order.
pub fn render_feed(
    window: &ReportWindow,
    items: &[LeakItem],
    site_url: &str,
    now: DateTime<Utc>,
) -> Result<String> {
    let (file_name, _) = feed_file_names(window);
    let base = site_url.trim_end_matches('/');
    let (title, description) = match window.kind {
        ReportKind::Daily => (
            format!("Leak tracker daily RSS {}", window.label()),
            format!("Posts discovered on {}", window.label()),
        ),
        ReportKind::Weekly => (
            format!("Leak tracker weekly RSS {}", window.label()),
            format!("Posts discovered during {}", window.label()),
        ),
    };

    let doc = RssDoc {
        version: "2.0",
        xmlns_atom: ATOM_NS,
        channel: RssChannel {
            title,
            description,
            link: format!("{base}/"),
            atom_link: AtomSelfLink {
                href: format!("{base}/rss/{file_name}"),
                rel: "self",
                kind: "application/rss+xml",
            },
            language: "en",
            last_build_date: now.format(RFC822_GMT).to_string(),
            ttl: 60,
            items: items
                .iter()
                .map(|it| RssItem {
                    title: it.title.clone(),
                    link: it.link.clone(),
                    description: it.title.clone(),
                    pub_date: it.discovered_at.format(RFC822_GMT).to_string(),
                    guid: Guid {
                        is_perma_link: "false",
                        value: format!("{}_{}", it.link, format_ts(it.discovered_at)),
                    },
                })
                .collect(),
        },
    };

    let body = quick_xml::se::to_string(&doc).context("serializing rss feed")?;
    Ok(format!("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n{body}\n"))
}
