// src/extract/mod.rs
//! Content extraction: raw feed entry -> normalized post draft.

pub mod cleanup;
pub mod links;

pub use cleanup::{clean_markup, CleanupStage, CLEANUP_STAGES};
pub use links::{join_links, mine_links, LINKS_PLACEHOLDER};

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use time::format_description::well_known::{Rfc2822, Rfc3339};
use time::{OffsetDateTime, UtcOffset};

use crate::ingest::types::RawEntry;

/// Stored in `content` when the post body has (almost) no readable text.
pub const CONTENT_PLACEHOLDER: &str = "Login or registration required to view content";

/// Plain-text bodies shorter than this are replaced by the placeholder.
pub const MIN_TEXT_CHARS: usize = 10;

/// Everything a stored item has except row id, source label and discovery time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeakDraft {
    pub title: String,
    pub link: String,
    pub author: String,
    pub category: String,
    pub published_at: String,
    pub content: String,
    pub resource_links: String,
}

/// Strip tags, decode entities, collapse whitespace.
pub fn plain_text(markup: &str) -> String {
    static RE_TAGS: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]+>").unwrap());
    static RE_WS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

    let stripped = RE_TAGS.replace_all(markup, "");
    let decoded = html_escape::decode_html_entities(&stripped);
    RE_WS.replace_all(&decoded, " ").trim().to_string()
}

/// RFC 2822 / RFC 3339 timestamps become UTC RFC 3339; anything else is kept as-is.
pub fn normalize_published(raw: &str) -> String {
    let raw = raw.trim();
    OffsetDateTime::parse(raw, &Rfc2822)
        .or_else(|_| OffsetDateTime::parse(raw, &Rfc3339))
        .ok()
        .and_then(|dt| dt.to_offset(UtcOffset::UTC).format(&Rfc3339).ok())
        .unwrap_or_else(|| raw.to_string())
}

fn first_non_empty(entry: &RawEntry) -> &str {
    [&entry.content, &entry.summary, &entry.description]
        .into_iter()
        .filter_map(|v| v.as_deref())
        .find(|v| !v.trim().is_empty())
        .unwrap_or_default()
}

fn category_of(entry: &RawEntry) -> String {
    let tags: Vec<&str> = entry
        .tags
        .iter()
        .map(|t| t.trim())
        .filter(|t| !t.is_empty())
        .collect();
    if !tags.is_empty() {
        return tags.join(", ");
    }
    entry
        .category
        .as_deref()
        .map(str::trim)
        .unwrap_or_default()
        .to_string()
}

/// Returns `None` when title or link is missing; the entry is skipped.
pub fn extract(entry: &RawEntry) -> Option<LeakDraft> {
    let title = entry.title.trim();
    let link = entry.link.trim();
    if title.is_empty() || link.is_empty() {
        return None;
    }

    let body = first_non_empty(entry);
    let cleaned = clean_markup(body);
    let text = plain_text(&cleaned);

    let found = mine_links(&[&cleaned, &text]);
    let resource_links = join_links(&found);

    let content = if cleaned.trim().is_empty() || text.chars().count() < MIN_TEXT_CHARS {
        CONTENT_PLACEHOLDER.to_string()
    } else {
        cleaned
    };

    Some(LeakDraft {
        title: title.to_string(),
        link: link.to_string(),
        author: entry.author.as_deref().unwrap_or_default().trim().to_string(),
        category: category_of(entry),
        published_at: entry
            .published
            .as_deref()
            .map(normalize_published)
            .unwrap_or_default(),
        content,
        resource_links,
    })
}
