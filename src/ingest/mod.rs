// src/ingest/mod.rs
pub mod feed;
pub mod types;

use std::sync::Arc;

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge};
use once_cell::sync::OnceCell;

use crate::clock::Clock;
use crate::config::Source;
use crate::extract::extract;
use crate::notify::{Dispatcher, Message};
use crate::store::{LeakItem, LeakStore, NewLeakItem};
use crate::ingest::types::FeedFetcher;

pub use feed::{parse_feed, HttpFeedFetcher};
pub use types::RawEntry;

/// One-time metrics registration (so series show up on /metrics).
fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("tracker_entries_total", "Feed entries received from sources.");
        describe_counter!("tracker_new_items_total", "Entries stored for the first time.");
        describe_counter!("tracker_fetch_errors_total", "Feed fetch/parse failures.");
        describe_counter!("tracker_store_errors_total", "Failed store lookups or inserts.");
        describe_counter!("tracker_push_total", "Channel deliveries by result.");
        describe_histogram!("tracker_feed_parse_ms", "Feed parse time in milliseconds.");
        describe_gauge!("tracker_pass_last_run_ts", "Unix ts when the last pass finished.");
    });
}

#[derive(Debug, Clone, Default)]
pub struct PassSummary {
    pub sources_polled: usize,
    pub sources_skipped: usize,
    pub new_items: Vec<LeakItem>,
}

/// Fetch -> extract -> dedup/persist -> notify, one source at a time.
pub struct Ingestor {
    fetcher: Arc<dyn FeedFetcher>,
    store: LeakStore,
    clock: Arc<dyn Clock>,
}

impl Ingestor {
    pub fn new(fetcher: Arc<dyn FeedFetcher>, store: LeakStore, clock: Arc<dyn Clock>) -> Self {
        ensure_metrics_described();
        Self {
            fetcher,
            store,
            clock,
        }
    }

    /// Newly stored items of one source, in feed order. Never fails: fetch and
    /// store problems are logged and counted.
    pub async fn process(
        &self,
        source: &Source,
        notify: bool,
        dispatcher: &Dispatcher,
    ) -> Vec<LeakItem> {
        if !source.enabled {
            tracing::debug!(source = %source.key, "source disabled, skipping");
            return Vec::new();
        }

        let entries = match self.fetcher.fetch(&source.feed_url).await {
            Ok(v) => v,
            Err(e) => {
                tracing::warn!(source = %source.name, url = %source.feed_url, error = ?e, "feed fetch failed");
                counter!("tracker_fetch_errors_total", "source" => source.key.clone()).increment(1);
                return Vec::new();
            }
        };
        counter!("tracker_entries_total").increment(entries.len() as u64);
        tracing::debug!(source = %source.name, entries = entries.len(), "feed fetched");

        let mut out = Vec::new();
        for entry in &entries {
            let Some(draft) = extract(entry) else {
                tracing::debug!(source = %source.name, "entry without title or link skipped");
                continue;
            };

            match self.store.exists(&draft.link).await {
                Ok(true) => continue,
                Ok(false) => {}
                Err(e) => {
                    tracing::warn!(source = %source.name, link = %draft.link, error = %e, "store lookup failed");
                    counter!("tracker_store_errors_total").increment(1);
                    continue;
                }
            }

            let new_item = NewLeakItem {
                draft,
                source_name: source.name.clone(),
                discovered_at: self.clock.now(),
            };
            match self.store.insert(&new_item).await {
                Ok(Some(item)) => {
                    counter!("tracker_new_items_total").increment(1);
                    tracing::info!(source = %source.name, title = %item.title, link = %item.link, "new post");
                    if notify {
                        dispatcher.dispatch(&Message::update(&item)).await;
                    }
                    out.push(item);
                }
                // lost a race with a concurrent insert of the same link
                Ok(None) => {}
                Err(e) => {
                    tracing::warn!(source = %source.name, link = %new_item.draft.link, error = %e, "store insert failed");
                    counter!("tracker_store_errors_total").increment(1);
                }
            }
        }
        out
    }

    pub async fn run_pass(
        &self,
        sources: &[Source],
        notify: bool,
        dispatcher: &Dispatcher,
    ) -> PassSummary {
        let mut summary = PassSummary::default();
        for source in sources {
            if !source.enabled {
                summary.sources_skipped += 1;
                continue;
            }
            summary.sources_polled += 1;
            let mut items = self.process(source, notify, dispatcher).await;
            summary.new_items.append(&mut items);
        }
        gauge!("tracker_pass_last_run_ts").set(self.clock.now().timestamp() as f64);
        tracing::info!(
            polled = summary.sources_polled,
            skipped = summary.sources_skipped,
            new_items = summary.new_items.len(),
            "ingest pass finished"
        );
        summary
    }
}
