// src/notify/discord.rs
use async_trait::async_trait;
use rand::Rng;
use reqwest::Client;
use serde::Serialize;
use std::sync::Arc;

use super::http::post_json;
use super::retry::RetryPolicy;
use super::{Channel, Message, MessageDetail, MessageKind, NotifyError};
use crate::clock::Clock;
use crate::config::app::DiscordConfig;

const COLOR_STARTUP: u32 = 0x57F287;
const COLOR_WEEKLY: u32 = 0x9C27B0;
const FOOTER: &str = "leak-tracker";

pub struct DiscordChannel {
    cfg: DiscordConfig,
    client: Client,
    policy: RetryPolicy,
    clock: Arc<dyn Clock>,
}

impl DiscordChannel {
    pub fn new(cfg: DiscordConfig, client: Client, clock: Arc<dyn Clock>) -> Self {
        let policy = RetryPolicy::from(cfg.retry);
        Self {
            cfg,
            client,
            policy,
            clock,
        }
    }

    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }
}

#[derive(Debug, Serialize)]
struct EmbedField {
    name: String,
    value: String,
    inline: bool,
}

impl EmbedField {
    fn new(name: &str, value: impl Into<String>, inline: bool) -> Self {
        Self {
            name: name.to_string(),
            value: value.into(),
            inline,
        }
    }
}

#[derive(Debug, Serialize)]
struct EmbedFooter {
    text: String,
}

#[derive(Debug, Serialize)]
struct DiscordEmbed {
    title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    description: Option<String>,
    color: u32,
    fields: Vec<EmbedField>,
    footer: EmbedFooter,
    timestamp: String,
}

#[derive(Debug, Serialize)]
struct DiscordWebhookPayload {
    embeds: Vec<DiscordEmbed>,
}

impl DiscordWebhookPayload {
    fn from_message(msg: &Message, now_iso: String) -> Self {
        let (description, color, fields) = match &msg.detail {
            MessageDetail::Startup {
                channels,
                mode,
                version,
            } => (
                Some(msg.body.clone()),
                COLOR_STARTUP,
                vec![
                    EmbedField::new("Version", version.clone(), true),
                    EmbedField::new(
                        "Channels",
                        if channels.is_empty() {
                            "none".to_string()
                        } else {
                            channels.join(", ")
                        },
                        true,
                    ),
                    EmbedField::new("Mode", mode.clone(), true),
                ],
            ),
            MessageDetail::Report { count, page_url } => {
                let mut fields = Vec::new();
                if let Some(url) = page_url {
                    fields.push(EmbedField::new("Report", format!("[Weekly report]({url})"), false));
                }
                (Some(format!("{count} items collected")), COLOR_WEEKLY, fields)
            }
            MessageDetail::Item {
                title,
                link,
                pushed_at,
            } => (
                None,
                rand::rng().random_range(0..=0xFFFFFF),
                vec![
                    EmbedField::new("Title", title.clone(), false),
                    EmbedField::new("Link", format!("[Open]({link})"), false),
                    EmbedField::new(
                        "Pushed at",
                        pushed_at.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
                        true,
                    ),
                ],
            ),
            MessageDetail::None => (Some(msg.body.clone()), COLOR_STARTUP, Vec::new()),
        };

        Self {
            embeds: vec![DiscordEmbed {
                title: msg.title.clone(),
                description,
                color,
                fields,
                footer: EmbedFooter {
                    text: FOOTER.to_string(),
                },
                timestamp: now_iso,
            }],
        }
    }
}

#[async_trait]
impl Channel for DiscordChannel {
    fn name(&self) -> &'static str {
        "discord"
    }

    fn enabled(&self) -> bool {
        self.cfg.enabled
    }

    fn accepts(&self, kind: MessageKind) -> bool {
        match kind {
            MessageKind::Update | MessageKind::Startup => self.cfg.send_updates,
            MessageKind::WeeklyReport => self.cfg.send_weekly_report,
            MessageKind::DailyReport => false,
        }
    }

    fn readiness(&self) -> Result<(), NotifyError> {
        self.cfg.webhook()?;
        Ok(())
    }

    async fn deliver(&self, msg: &Message) -> Result<(), NotifyError> {
        let url = self.cfg.webhook()?;
        let payload = DiscordWebhookPayload::from_message(msg, self.clock.now().to_rfc3339());

        let (res, report) = self
            .policy
            .run(self.clock.as_ref(), self.name(), |_| post_json(&self.client, url, &payload))
            .await;
        tracing::debug!(channel = "discord", attempts = report.attempts.len(), "discord delivery finished");
        res.map(|_| ()).map_err(NotifyError::from)
    }
}
