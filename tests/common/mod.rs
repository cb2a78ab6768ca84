// tests/common/mod.rs
#![allow(dead_code)]

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use leak_tracker::ingest::types::FeedFetcher;
use leak_tracker::{Clock, RawEntry, Source};

/// Serves canned entries per URL and records when each fetch happened.
pub struct StaticFetcher {
    feeds: HashMap<String, Vec<RawEntry>>,
    clock: Option<Arc<dyn Clock>>,
    calls: Mutex<Vec<(String, Option<DateTime<Utc>>)>>,
}

impl StaticFetcher {
    pub fn new() -> Self {
        Self {
            feeds: HashMap::new(),
            clock: None,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn with_feed(mut self, url: &str, entries: Vec<RawEntry>) -> Self {
        self.feeds.insert(url.to_string(), entries);
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn calls(&self) -> Vec<(String, Option<DateTime<Utc>>)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl FeedFetcher for StaticFetcher {
    async fn fetch(&self, url: &str) -> Result<Vec<RawEntry>> {
        let at = self.clock.as_ref().map(|c| c.now());
        self.calls.lock().unwrap().push((url.to_string(), at));
        self.feeds
            .get(url)
            .cloned()
            .ok_or_else(|| anyhow!("no feed at {url}"))
    }
}

pub fn entry(title: &str, link: &str, body: &str) -> RawEntry {
    RawEntry {
        title: title.into(),
        link: link.into(),
        description: Some(body.into()),
        ..Default::default()
    }
}

pub fn source(key: &str, name: &str, feed_url: &str) -> Source {
    Source {
        key: key.into(),
        name: name.into(),
        feed_url: feed_url.into(),
        enabled: true,
    }
}

/// Write `tracker.toml` and a one-source `sources.toml` into `dir`.
pub fn write_config(dir: &Path, tracker_toml: &str, feed_url: &str) -> (std::path::PathBuf, std::path::PathBuf) {
    let cfg = dir.join("tracker.toml");
    let src = dir.join("sources.toml");
    std::fs::write(&cfg, tracker_toml).unwrap();
    std::fs::write(
        &src,
        format!("[[source]]\nkey = \"bf\"\nname = \"BreachForum\"\nfeed_url = \"{feed_url}\"\n"),
    )
    .unwrap();
    (cfg, src)
}

/// Sleeps return at once and move `now` forward; every sleep is recorded.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
    sleeps: Mutex<Vec<Duration>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(start),
            sleeps: Mutex::new(Vec::new()),
        }
    }

    pub fn set(&self, at: DateTime<Utc>) {
        *self.now.lock().unwrap() = at;
    }

    pub fn advance(&self, dur: Duration) {
        let mut now = self.now.lock().unwrap();
        *now = *now + chrono::Duration::from_std(dur).unwrap();
    }

    pub fn sleeps(&self) -> Vec<Duration> {
        self.sleeps.lock().unwrap().clone()
    }
}

#[async_trait]
impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap()
    }

    async fn sleep(&self, dur: Duration) {
        self.sleeps.lock().unwrap().push(dur);
        self.advance(dur);
    }
}
