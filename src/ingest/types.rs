// src/ingest/types.rs
use anyhow::Result;

/// One feed entry as delivered by the feed collaborator.
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize, PartialEq, Eq)]
pub struct RawEntry {
    pub title: String,
    pub link: String,
    pub published: Option<String>,
    pub author: Option<String>,
    pub tags: Vec<String>,
    pub category: Option<String>,
    pub content: Option<String>,
    pub summary: Option<String>,
    pub description: Option<String>,
}

#[async_trait::async_trait]
pub trait FeedFetcher: Send + Sync {
    /// Entries in the feed's native order.
    async fn fetch(&self, url: &str) -> Result<Vec<RawEntry>>;
}
