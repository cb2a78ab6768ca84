// src/notify/mod.rs
//! Fan-out of messages to the enabled chat channels.

pub mod dingtalk;
pub mod discord;
pub mod feishu;
pub mod http;
pub mod retry;
pub mod telegram;

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use metrics::counter;

use crate::clock::Clock;
use crate::config::AppConfig;
use crate::store::LeakItem;

pub use http::HttpClients;
pub use retry::{AttemptOutcome, DispatchAttempt, RetryFailure, RetryPolicy, RetryReport};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageKind {
    Update,
    Startup,
    DailyReport,
    WeeklyReport,
}

/// Structured payload; each channel renders it in its own format.
#[derive(Debug, Clone, PartialEq)]
pub enum MessageDetail {
    None,
    Item {
        title: String,
        link: String,
        pushed_at: DateTime<Utc>,
    },
    Report {
        count: i64,
        page_url: Option<String>,
    },
    Startup {
        channels: Vec<&'static str>,
        mode: String,
        version: String,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    pub kind: MessageKind,
    pub title: String,
    pub body: String,
    pub detail: MessageDetail,
}

impl Message {
    pub fn update(item: &LeakItem) -> Self {
        Self {
            kind: MessageKind::Update,
            title: format!("[{}] new post", item.source_name),
            body: format!(
                "Title: {}\nLink: {}\nPushed at: {}",
                item.title,
                item.link,
                item.discovered_at.format("%Y-%m-%d %H:%M:%S UTC")
            ),
            detail: MessageDetail::Item {
                title: item.title.clone(),
                link: item.link.clone(),
                pushed_at: item.discovered_at,
            },
        }
    }

    pub fn startup(channels: Vec<&'static str>, mode: &str) -> Self {
        let listed = if channels.is_empty() {
            "none".to_string()
        } else {
            channels.join(", ")
        };
        Self {
            kind: MessageKind::Startup,
            title: "Leak tracker started".into(),
            body: format!("Mode: {mode}\nChannels: {listed}"),
            detail: MessageDetail::Startup {
                channels,
                mode: mode.to_string(),
                version: env!("CARGO_PKG_VERSION").to_string(),
            },
        }
    }

    pub fn daily_report(label: &str, count: i64) -> Self {
        Self {
            kind: MessageKind::DailyReport,
            title: format!("Daily report {label}"),
            body: format!("{count} items collected"),
            detail: MessageDetail::Report {
                count,
                page_url: None,
            },
        }
    }

    pub fn weekly_report(label: &str, count: i64, page_url: Option<String>) -> Self {
        let mut body = format!("{count} items collected");
        if let Some(url) = &page_url {
            body.push_str(&format!("\nReport: {url}"));
        }
        Self {
            kind: MessageKind::WeeklyReport,
            title: format!("Weekly report {label}"),
            body,
            detail: MessageDetail::Report { count, page_url },
        }
    }

    /// "title\nbody", the text form used by DingTalk, Feishu and Telegram.
    pub fn plain(&self) -> String {
        format!("{}\n{}", self.title, self.body)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("{0} not configured")]
    NotConfigured(String),
    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("unexpected status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("channel api error: {0}")]
    Api(String),
    #[error("gave up after {attempts} attempts: {last}")]
    Exhausted { attempts: u32, last: String },
}

impl From<crate::config::ConfigError> for NotifyError {
    fn from(e: crate::config::ConfigError) -> Self {
        NotifyError::NotConfigured(e.to_string())
    }
}

#[async_trait]
pub trait Channel: Send + Sync {
    fn name(&self) -> &'static str;
    /// The on/off switch.
    fn enabled(&self) -> bool;
    fn accepts(&self, kind: MessageKind) -> bool;
    /// Credentials present and not placeholders.
    fn readiness(&self) -> Result<(), NotifyError>;
    async fn deliver(&self, msg: &Message) -> Result<(), NotifyError>;
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchSummary {
    pub delivered: usize,
    pub failed: usize,
    pub skipped: usize,
}

/// Sends every message to every channel that wants it; never fails.
pub struct Dispatcher {
    channels: Vec<Box<dyn Channel>>,
}

impl Dispatcher {
    pub fn new(channels: Vec<Box<dyn Channel>>) -> Self {
        Self { channels }
    }

    /// No channels at all (report-only runs, tests).
    pub fn silent() -> Self {
        Self::new(Vec::new())
    }

    /// Never fails: without usable HTTP clients nothing is sent this cycle.
    pub fn from_config(cfg: &AppConfig, clock: Arc<dyn Clock>) -> Self {
        let clients = match HttpClients::from_config(&cfg.http, &cfg.proxy) {
            Ok(c) => c,
            Err(e) => {
                tracing::error!(error = ?e, "channel http clients unavailable, pushes disabled");
                return Self::silent();
            }
        };
        let push = &cfg.push;
        let channels: Vec<Box<dyn Channel>> = vec![
            Box::new(dingtalk::DingTalkChannel::new(
                push.dingtalk.clone(),
                clients.for_proxied(true),
                clock.clone(),
            )),
            Box::new(feishu::FeishuChannel::new(push.feishu.clone(), clients.for_proxied(false))),
            Box::new(telegram::TelegramChannel::new(
                push.telegram.clone(),
                clients.for_proxied(true),
                RetryPolicy::from(push.telegram.retry),
                clock.clone(),
            )),
            Box::new(discord::DiscordChannel::new(
                push.discord.clone(),
                clients.for_proxied(true),
                clock,
            )),
        ];
        Self::new(channels)
    }

    pub fn channel_names(&self) -> Vec<&'static str> {
        self.channels.iter().map(|c| c.name()).collect()
    }

    pub async fn dispatch(&self, msg: &Message) -> DispatchSummary {
        let mut summary = DispatchSummary::default();

        if msg.kind == MessageKind::DailyReport {
            tracing::info!(title = %msg.title, "daily report is stored only, not pushed");
            summary.skipped = self.channels.len();
            return summary;
        }

        for ch in &self.channels {
            if !ch.enabled() || !ch.accepts(msg.kind) {
                summary.skipped += 1;
                continue;
            }
            if let Err(e) = ch.readiness() {
                tracing::info!(channel = ch.name(), reason = %e, "channel skipped");
                summary.skipped += 1;
                continue;
            }
            match ch.deliver(msg).await {
                Ok(()) => {
                    tracing::info!(channel = ch.name(), title = %msg.title, "message delivered");
                    counter!("tracker_push_total", "channel" => ch.name(), "result" => "ok").increment(1);
                    summary.delivered += 1;
                }
                Err(e) => {
                    tracing::warn!(channel = ch.name(), title = %msg.title, error = %e, "message delivery failed");
                    counter!("tracker_push_total", "channel" => ch.name(), "result" => "error").increment(1);
                    summary.failed += 1;
                }
            }
        }
        summary
    }
}
