// src/notify/feishu.rs
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;

use super::http::post_json_once;
use super::{Channel, Message, MessageKind, NotifyError};
use crate::config::app::FeishuConfig;

/// Feishu custom bot. Always sent on the direct client.
pub struct FeishuChannel {
    cfg: FeishuConfig,
    client: Client,
}

#[derive(Debug, Deserialize)]
struct FeishuReply {
    #[serde(default)]
    code: i64,
    #[serde(default)]
    msg: String,
}

impl FeishuChannel {
    pub fn new(cfg: FeishuConfig, client: Client) -> Self {
        Self { cfg, client }
    }
}

#[async_trait]
impl Channel for FeishuChannel {
    fn name(&self) -> &'static str {
        "feishu"
    }

    fn enabled(&self) -> bool {
        self.cfg.enabled
    }

    fn accepts(&self, kind: MessageKind) -> bool {
        matches!(kind, MessageKind::Update | MessageKind::Startup)
    }

    fn readiness(&self) -> Result<(), NotifyError> {
        self.cfg.webhook()?;
        Ok(())
    }

    async fn deliver(&self, msg: &Message) -> Result<(), NotifyError> {
        let url = self.cfg.webhook()?;
        let body = serde_json::json!({
            "msg_type": "text",
            "content": { "text": msg.plain() },
        });
        let text = post_json_once(&self.client, url, &body).await?;
        if let Ok(reply) = serde_json::from_str::<FeishuReply>(&text) {
            if reply.code != 0 {
                return Err(NotifyError::Api(format!("feishu code {}: {}", reply.code, reply.msg)));
            }
        }
        Ok(())
    }
}
