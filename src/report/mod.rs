// src/report/mod.rs
//! Daily/weekly reports: markdown + HTML archive pages, index page, RSS export.

pub mod export;
pub mod render;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs;

use crate::config::app::OutputConfig;
use crate::config::SourceGrouping;
use crate::store::{format_ts, LeakItem, LeakQuery, LeakStore, ReportKind, ReportWindow, StoreError};

pub use export::{feed_file_names, render_feed};
pub use render::{HtmlRenderer, IndexEntry, ReportContext, ReportEntry, ReportRenderer};

const ARCHIVE_DIR: &str = "archive";
const RSS_DIR: &str = "rss";
const INDEX_FILE: &str = "index.html";

static COUNT_LINE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(\d+) items collected").unwrap());

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Statistics {
    pub total_count: i64,
    pub by_source: Vec<(String, i64)>,
    /// "HH" buckets for daily windows, "YYYY-MM-DD" for weekly ones.
    pub by_bucket: Vec<(String, i64)>,
}

pub async fn compute_statistics(
    store: &LeakStore,
    window: &ReportWindow,
    grouping: SourceGrouping,
) -> Result<Statistics, StoreError> {
    let by_bucket = match window.kind {
        ReportKind::Daily => store.count_by_hour(window).await?,
        ReportKind::Weekly => store.count_by_date(window).await?,
    };
    Ok(Statistics {
        total_count: store.count_in(window).await?,
        by_source: store.count_by_source(window, grouping).await?,
        by_bucket,
    })
}

#[derive(Debug, Clone)]
pub struct GeneratedReport {
    pub window: ReportWindow,
    pub count: i64,
    pub markdown_path: PathBuf,
    /// `None` when rendering failed.
    pub html_path: Option<PathBuf>,
    /// Public URL of the HTML page, when `output.site_url` is set.
    pub page_url: Option<String>,
    /// Newest first.
    pub items: Vec<LeakItem>,
}

/// Writes reports under one output root.
pub struct ReportWriter {
    root: PathBuf,
    site_url: Option<String>,
    grouping: SourceGrouping,
    renderer: Arc<dyn ReportRenderer>,
}

fn report_paths(window: &ReportWindow) -> (String, String) {
    let first = window.first_day().format("%Y-%m-%d").to_string();
    match window.kind {
        ReportKind::Daily => (first.clone(), format!("Daily_{first}")),
        ReportKind::Weekly => {
            let last = window.last_day().format("%Y-%m-%d");
            (format!("Weekly_{first}"), format!("Weekly_{first}_{last}"))
        }
    }
}

fn markdown(window: &ReportWindow, stats: &Statistics, items: &[LeakItem], updated: &str) -> String {
    let heading = match window.kind {
        ReportKind::Daily => "Daily report",
        ReportKind::Weekly => "Weekly report",
    };
    let mut md = String::new();
    let _ = writeln!(md, "# {heading} {}\n", window.label());
    let _ = writeln!(md, "{} items collected", stats.total_count);
    let _ = writeln!(md, "Last updated: {updated}\n");
    md.push_str("## Statistics\n\n### By source\n");
    for (label, n) in &stats.by_source {
        let label = if label.is_empty() { "unknown" } else { label.as_str() };
        let _ = writeln!(md, "- {label}: {n}");
    }
    match window.kind {
        ReportKind::Daily => {
            md.push_str("\n### By hour\n");
            for (hour, n) in &stats.by_bucket {
                let _ = writeln!(md, "- {hour}:00: {n}");
            }
        }
        ReportKind::Weekly => {
            md.push_str("\n### By date\n");
            for (date, n) in &stats.by_bucket {
                let _ = writeln!(md, "- {date}: {n}");
            }
        }
    }
    md.push('\n');
    for it in items {
        let _ = writeln!(md, "## [{}]({})", it.title, it.link);
        let _ = writeln!(md, "Discovered: {}\n", format_ts(it.discovered_at));
    }
    md
}

impl ReportWriter {
    pub fn new(
        output: &OutputConfig,
        grouping: SourceGrouping,
        renderer: Arc<dyn ReportRenderer>,
    ) -> Self {
        Self {
            root: PathBuf::from(&output.dir),
            site_url: output
                .site_url
                .as_deref()
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(|s| s.trim_end_matches('/').to_string()),
            grouping,
            renderer,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Build the report for the window containing `now`. Markdown is always
    /// written; HTML and index failures are logged only.
    pub async fn generate(
        &self,
        store: &LeakStore,
        kind: ReportKind,
        now: DateTime<Utc>,
    ) -> Result<GeneratedReport> {
        let window = store.window(kind, now).await.context("computing report window")?;
        let stats = compute_statistics(store, &window, self.grouping)
            .await
            .context("computing report statistics")?;
        let mut items = store
            .query(&LeakQuery::Window(window))
            .await
            .context("loading report items")?;
        items.reverse();

        let (dir_name, stem) = report_paths(&window);
        let dir = self.root.join(ARCHIVE_DIR).join(&dir_name);
        fs::create_dir_all(&dir)
            .await
            .with_context(|| format!("creating {}", dir.display()))?;

        let updated = now.format("%Y-%m-%d %H:%M:%S UTC").to_string();
        let md_path = dir.join(format!("{stem}.md"));
        let existed = fs::try_exists(&md_path).await.unwrap_or(false);
        fs::write(&md_path, markdown(&window, &stats, &items, &updated))
            .await
            .with_context(|| format!("writing {}", md_path.display()))?;
        tracing::info!(
            path = %md_path.display(),
            count = stats.total_count,
            updated = existed,
            "markdown report written"
        );

        let ctx = ReportContext {
            kind,
            label: window.label(),
            count: stats.total_count,
            update_time: updated,
            items: items
                .iter()
                .map(|it| ReportEntry {
                    title: it.title.clone(),
                    link: it.link.clone(),
                    discovered_at: format_ts(it.discovered_at),
                })
                .collect(),
            statistics: stats.clone(),
        };

        let rel_html = format!("{ARCHIVE_DIR}/{dir_name}/{stem}.html");
        let html_path = match self.renderer.render_report(&ctx) {
            Ok(html) => {
                let p = dir.join(format!("{stem}.html"));
                match fs::write(&p, html).await {
                    Ok(()) => Some(p),
                    Err(e) => {
                        tracing::warn!(path = %p.display(), error = %e, "writing html report failed");
                        None
                    }
                }
            }
            Err(e) => {
                tracing::warn!(error = ?e, "rendering html report failed");
                None
            }
        };

        if let Err(e) = self.update_index().await {
            tracing::warn!(error = ?e, "index page not updated");
        }

        let page_url = match (&self.site_url, &html_path) {
            (Some(base), Some(_)) => Some(format!("{base}/{rel_html}")),
            _ => None,
        };

        Ok(GeneratedReport {
            window,
            count: stats.total_count,
            markdown_path: md_path,
            html_path,
            page_url,
            items,
        })
    }

    /// Write the RSS export to its dated file and the `latest_*` file.
    pub async fn export_feed(
        &self,
        window: &ReportWindow,
        items: &[LeakItem],
        now: DateTime<Utc>,
    ) -> Result<PathBuf> {
        let site = self.site_url.as_deref().unwrap_or("");
        let xml = render_feed(window, items, site, now)?;
        let dir = self.root.join(RSS_DIR);
        fs::create_dir_all(&dir)
            .await
            .with_context(|| format!("creating {}", dir.display()))?;
        let (dated, latest) = feed_file_names(window);
        let dated_path = dir.join(dated);
        fs::write(&dated_path, &xml)
            .await
            .with_context(|| format!("writing {}", dated_path.display()))?;
        fs::write(dir.join(latest), &xml)
            .await
            .context("writing latest rss feed")?;
        tracing::info!(path = %dated_path.display(), items = items.len(), "rss feed exported");
        Ok(dated_path)
    }

    /// Every archived HTML report with its markdown count, newest first.
    pub async fn scan_archive(&self) -> Result<Vec<IndexEntry>> {
        let archive = self.root.join(ARCHIVE_DIR);
        let mut out = Vec::new();
        if !fs::try_exists(&archive).await.unwrap_or(false) {
            return Ok(out);
        }
        let mut dirs = fs::read_dir(&archive).await.context("reading archive dir")?;
        while let Some(d) = dirs.next_entry().await.context("reading archive entry")? {
            if !d.file_type().await.map(|t| t.is_dir()).unwrap_or(false) {
                continue;
            }
            let dir_name = d.file_name().to_string_lossy().to_string();
            let mut files = fs::read_dir(d.path()).await?;
            while let Some(f) = files.next_entry().await? {
                let path = f.path();
                if path.extension().and_then(|e| e.to_str()) != Some("html") {
                    continue;
                }
                let Some(stem) = path.file_stem().and_then(|s| s.to_str()).map(str::to_string) else {
                    continue;
                };
                let count = match fs::read_to_string(path.with_extension("md")).await {
                    Ok(md) => COUNT_LINE
                        .captures(&md)
                        .and_then(|c| c[1].parse().ok())
                        .unwrap_or(0),
                    Err(_) => 0,
                };
                out.push(IndexEntry {
                    label: stem.replace('_', " "),
                    path: format!("{ARCHIVE_DIR}/{dir_name}/{stem}.html"),
                    count,
                });
            }
        }
        out.sort_by(|a, b| b.path.cmp(&a.path));
        Ok(out)
    }

    pub async fn update_index(&self) -> Result<PathBuf> {
        let entries = self.scan_archive().await?;
        let html = self.renderer.render_index(&entries)?;
        let path = self.root.join(INDEX_FILE);
        fs::write(&path, html)
            .await
            .with_context(|| format!("writing {}", path.display()))?;
        tracing::debug!(reports = entries.len(), "index page updated");
        Ok(path)
    }
}
