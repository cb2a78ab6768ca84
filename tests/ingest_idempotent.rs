// tests/ingest_idempotent.rs
mod common;

use std::sync::Arc;

use chrono::{TimeZone, Utc};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use common::{entry, source, ManualClock, StaticFetcher};
use leak_tracker::{AppConfig, Dispatcher, Ingestor, LeakStore};

const FEED: &str = "https://forum.test/forums/databases.5/index.rss";

fn fetcher() -> StaticFetcher {
    StaticFetcher::new().with_feed(
        FEED,
        vec![entry(
            "Acme Corp customer database",
            "https://forum.test/threads/acme.1201/",
            "<p>Customer table, 40k rows: https://mega.nz/file/AbCdEf</p>",
        )],
    )
}

#[tokio::test]
async fn second_pass_over_same_feed_pushes_nothing() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/hook"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let mut app = AppConfig::default();
    app.push.discord.enabled = true;
    app.push.discord.webhook = Some(format!("{}/hook", server.uri()));

    let clock = Arc::new(ManualClock::new(Utc.with_ymd_and_hms(2026, 10, 19, 10, 0, 0).unwrap()));
    let store = LeakStore::in_memory().await.unwrap();
    let dispatcher = Dispatcher::from_config(&app, clock.clone());
    let ingestor = Ingestor::new(Arc::new(fetcher()), store.clone(), clock);
    let sources = vec![source("bf", "BreachForum", FEED)];

    let first = ingestor.run_pass(&sources, true, &dispatcher).await;
    let second = ingestor.run_pass(&sources, true, &dispatcher).await;

    assert_eq!(first.new_items.len(), 1);
    assert_eq!(first.new_items[0].source_name, "BreachForum");
    assert_eq!(first.new_items[0].resource_links, "https://mega.nz/file/AbCdEf");
    assert!(second.new_items.is_empty());
    assert_eq!(store.count_all().await.unwrap(), 1);
    // MockServer verifies `expect(1)` on drop
}

#[tokio::test]
async fn failing_source_does_not_stop_the_pass() {
    let clock = Arc::new(ManualClock::new(Utc.with_ymd_and_hms(2026, 10, 19, 10, 0, 0).unwrap()));
    let store = LeakStore::in_memory().await.unwrap();
    let fetcher = Arc::new(fetcher());
    let ingestor = Ingestor::new(fetcher.clone(), store.clone(), clock);

    let mut disabled = source("old", "Old board", "https://old.test/rss");
    disabled.enabled = false;
    let sources = vec![
        source("down", "Down board", "https://down.test/rss"),
        disabled,
        source("bf", "BreachForum", FEED),
    ];

    let summary = ingestor.run_pass(&sources, false, &Dispatcher::silent()).await;
    assert_eq!(summary.sources_polled, 2);
    assert_eq!(summary.sources_skipped, 1);
    assert_eq!(summary.new_items.len(), 1);

    let urls: Vec<String> = fetcher.calls().into_iter().map(|(u, _)| u).collect();
    assert_eq!(urls, vec!["https://down.test/rss".to_string(), FEED.to_string()]);
}
