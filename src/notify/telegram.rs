// src/notify/telegram.rs
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::http::post_json;
use super::retry::{AttemptOutcome, RetryPolicy};
use super::{Channel, Message, MessageKind, NotifyError};
use crate::clock::Clock;
use crate::config::app::TelegramConfig;

pub struct TelegramChannel {
    cfg: TelegramConfig,
    client: Client,
    policy: RetryPolicy,
    clock: Arc<dyn Clock>,
}

#[derive(Debug, Serialize)]
struct SendMessage<'a> {
    chat_id: &'a str,
    text: String,
    disable_web_page_preview: bool,
}

#[derive(Debug, Deserialize)]
struct ApiReply {
    ok: bool,
    #[serde(default)]
    description: Option<String>,
}

impl TelegramChannel {
    pub fn new(cfg: TelegramConfig, client: Client, policy: RetryPolicy, clock: Arc<dyn Clock>) -> Self {
        Self {
            cfg,
            client,
            policy,
            clock,
        }
    }

    fn endpoint(&self, token: &str) -> String {
        format!("{}/bot{}/sendMessage", self.cfg.api_base.trim_end_matches('/'), token)
    }

    async fn send_once(&self, url: &str, body: &SendMessage<'_>) -> AttemptOutcome<()> {
        match post_json(&self.client, url, body).await {
            AttemptOutcome::Success(text) => match serde_json::from_str::<ApiReply>(&text) {
                Ok(r) if !r.ok => AttemptOutcome::Fatal(NotifyError::Api(
                    r.description.unwrap_or_else(|| "telegram replied ok=false".into()),
                )),
                _ => AttemptOutcome::Success(()),
            },
            AttemptOutcome::RateLimited { hint } => AttemptOutcome::RateLimited { hint },
            AttemptOutcome::Transient(r) => AttemptOutcome::Transient(r),
            AttemptOutcome::Fatal(e) => AttemptOutcome::Fatal(e),
        }
    }
}

#[async_trait]
impl Channel for TelegramChannel {
    fn name(&self) -> &'static str {
        "telegram"
    }

    fn enabled(&self) -> bool {
        self.cfg.enabled
    }

    fn accepts(&self, kind: MessageKind) -> bool {
        matches!(kind, MessageKind::Update | MessageKind::Startup)
    }

    fn readiness(&self) -> Result<(), NotifyError> {
        self.cfg.credentials()?;
        Ok(())
    }

    async fn deliver(&self, msg: &Message) -> Result<(), NotifyError> {
        let (token, chat_id) = self.cfg.credentials()?;
        let url = self.endpoint(token);
        let body = SendMessage {
            chat_id,
            text: msg.plain(),
            disable_web_page_preview: true,
        };
        let (res, _) = self
            .policy
            .run(self.clock.as_ref(), self.name(), |_| self.send_once(&url, &body))
            .await;
        res.map_err(NotifyError::from)
    }
}
