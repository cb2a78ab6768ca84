// tests/cycle_resilience.rs
mod common;

use std::sync::Arc;

use chrono::{TimeZone, Utc};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use common::{entry, write_config, ManualClock, StaticFetcher};
use leak_tracker::{ConfigLoader, LeakStore, RunMode, Tracker};

const FEED: &str = "https://forum.test/index.rss";

#[tokio::test]
async fn unusable_proxy_still_ingests_and_notifies() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/hook"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let toml = format!(
        r#"
[push.discord]
enabled = true
webhook = "{}/hook"
send_updates = true
send_weekly_report = false

[proxy]
enabled = true
https = "http://[::1"

[quiet_hours]
enabled = false

[output]
dir = '{}'
"#,
        server.uri(),
        dir.path().display()
    );
    let (cfg, src) = write_config(dir.path(), &toml, FEED);

    // Monday 18:00 at +08:00
    let clock = Arc::new(ManualClock::new(Utc.with_ymd_and_hms(2026, 10, 19, 10, 0, 0).unwrap()));
    let fetcher = Arc::new(StaticFetcher::new().with_feed(
        FEED,
        vec![entry("Acme dump", "https://forum.test/t/1", "<p>40k customer rows</p>")],
    ));
    let store = LeakStore::in_memory().await.unwrap();
    let mut tracker = Tracker::new(
        ConfigLoader::new(cfg, src).without_env(),
        store.clone(),
        fetcher.clone(),
        clock.clone(),
    );

    let outcome = tracker.run_cycle(RunMode::Once).await.unwrap();

    assert_eq!(fetcher.calls().len(), 1);
    assert_eq!(outcome.pass.new_items.len(), 1);
    assert!(store.exists("https://forum.test/t/1").await.unwrap());
}
