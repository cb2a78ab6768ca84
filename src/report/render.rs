// src/report/render.rs
//! Templating seam for report pages.

use anyhow::Result;
use html_escape::{encode_double_quoted_attribute as attr, encode_text as text};
use serde::Serialize;
use std::fmt::Write as _;

use super::Statistics;
use crate::store::ReportKind;

#[derive(Debug, Clone, Serialize)]
pub struct ReportEntry {
    pub title: String,
    pub link: String,
    pub discovered_at: String,
}

/// Everything a report page shows.
#[derive(Debug, Clone, Serialize)]
pub struct ReportContext {
    pub kind: ReportKind,
    pub label: String,
    pub count: i64,
    pub update_time: String,
    pub items: Vec<ReportEntry>,
    pub statistics: Statistics,
}

/// One row of the index page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IndexEntry {
    pub label: String,
    /// Relative to the output root.
    pub path: String,
    pub count: u64,
}

pub trait ReportRenderer: Send + Sync {
    fn render_report(&self, ctx: &ReportContext) -> Result<String>;
    fn render_index(&self, entries: &[IndexEntry]) -> Result<String>;
}

/// Minimal self-contained HTML pages.
#[derive(Debug, Default, Clone, Copy)]
pub struct HtmlRenderer;

const STYLE: &str = "body{font-family:sans-serif;max-width:960px;margin:0 auto;padding:20px;color:#1f2937}\
a{color:#4f46e5}li{margin:4px 0}.muted{color:#6b7280}";

fn page(title: &str, body: &str) -> String {
    format!(
        "<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n<meta charset=\"UTF-8\">\n\
         <meta name=\"viewport\" content=\"width=device-width, initial-scale=1.0\">\n\
         <title>{}</title>\n<style>{STYLE}</style>\n</head>\n<body>\n{body}</body>\n</html>\n",
        text(title)
    )
}

fn count_list(out: &mut String, heading: &str, rows: &[(String, i64)], suffix: &str) {
    let _ = writeln!(out, "<h3>{}</h3>\n<ul>", text(heading));
    for (label, n) in rows {
        let _ = writeln!(out, "<li>{}{}: {n}</li>", text(label), suffix);
    }
    out.push_str("</ul>\n");
}

impl ReportRenderer for HtmlRenderer {
    fn render_report(&self, ctx: &ReportContext) -> Result<String> {
        let title = match ctx.kind {
            ReportKind::Daily => format!("Daily report {}", ctx.label),
            ReportKind::Weekly => format!("Weekly report {}", ctx.label),
        };
        let mut body = String::new();
        let _ = writeln!(body, "<h1>{}</h1>", text(&title));
        let _ = writeln!(
            body,
            "<p>{} items collected</p>\n<p class=\"muted\">Last updated: {}</p>",
            ctx.count,
            text(&ctx.update_time)
        );

        body.push_str("<h2>Statistics</h2>\n");
        count_list(&mut body, "By source", &ctx.statistics.by_source, "");
        match ctx.kind {
            ReportKind::Daily => count_list(&mut body, "By hour", &ctx.statistics.by_bucket, ":00"),
            ReportKind::Weekly => count_list(&mut body, "By date", &ctx.statistics.by_bucket, ""),
        }

        body.push_str("<h2>Items</h2>\n<ul>\n");
        for it in &ctx.items {
            let _ = writeln!(
                body,
                "<li><a href=\"{}\" target=\"_blank\">{}</a> <span class=\"muted\">{}</span></li>",
                attr(&it.link),
                text(&it.title),
                text(&it.discovered_at)
            );
        }
        body.push_str("</ul>\n");
        Ok(page(&title, &body))
    }

    fn render_index(&self, entries: &[IndexEntry]) -> Result<String> {
        let mut body = String::from("<h1>Leak tracker reports</h1>\n");
        if entries.is_empty() {
            body.push_str("<p class=\"muted\">No reports available yet</p>\n");
        } else {
            body.push_str("<ul>\n");
            for e in entries {
                let _ = writeln!(
                    body,
                    "<li><a href=\"{}\">{}</a> <span class=\"muted\">{} items</span></li>",
                    attr(&e.path),
                    text(&e.label),
                    e.count
                );
            }
            body.push_str("</ul>\n");
        }
        Ok(page("Leak tracker reports", &body))
    }
}
