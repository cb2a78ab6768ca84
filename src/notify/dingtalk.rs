// src/notify/dingtalk.rs
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use hmac::{Hmac, Mac};
use reqwest::{Client, Url};
use serde::Deserialize;
use sha2::Sha256;
use std::sync::Arc;

use super::http::post_json_once;
use super::{Channel, Message, MessageKind, NotifyError};
use crate::clock::Clock;
use crate::config::app::DingTalkConfig;

type HmacSha256 = Hmac<Sha256>;

/// DingTalk custom robot with "additional signature" security.
pub struct DingTalkChannel {
    cfg: DingTalkConfig,
    client: Client,
    clock: Arc<dyn Clock>,
}

#[derive(Debug, Deserialize)]
struct DingTalkReply {
    #[serde(default)]
    errcode: i64,
    #[serde(default)]
    errmsg: String,
}

/// base64(HMAC-SHA256(secret, "{timestamp_ms}\n{secret}"))
pub fn sign(timestamp_ms: i64, secret: &str) -> Result<String, NotifyError> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| NotifyError::Api(format!("dingtalk secret: {e}")))?;
    mac.update(format!("{timestamp_ms}\n{secret}").as_bytes());
    Ok(STANDARD.encode(mac.finalize().into_bytes()))
}

/// Webhook with `timestamp` and `sign` appended (query-encoded).
pub fn signed_url(webhook: &str, secret: &str, timestamp_ms: i64) -> Result<Url, NotifyError> {
    let mut url = Url::parse(webhook)
        .map_err(|e| NotifyError::NotConfigured(format!("dingtalk webhook ({e})")))?;
    let signature = sign(timestamp_ms, secret)?;
    url.query_pairs_mut()
        .append_pair("timestamp", &timestamp_ms.to_string())
        .append_pair("sign", &signature);
    Ok(url)
}

impl DingTalkChannel {
    pub fn new(cfg: DingTalkConfig, client: Client, clock: Arc<dyn Clock>) -> Self {
        Self { cfg, client, clock }
    }
}

#[async_trait]
impl Channel for DingTalkChannel {
    fn name(&self) -> &'static str {
        "dingtalk"
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
        let (webhook, secret) = self.cfg.credentials()?;
        let url = signed_url(webhook, secret, self.clock.now().timestamp_millis())?;
        let body = serde_json::json!({
            "msgtype": "text",
            "text": { "content": format!("{}\r\n{}", msg.title, msg.body) },
            "at": { "isAtAll": false },
        });
        let text = post_json_once(&self.client, url.as_str(), &body).await?;
        let reply: DingTalkReply = serde_json::from_str(&text)
            .map_err(|e| NotifyError::Api(format!("dingtalk reply not json: {e}")))?;
        if reply.errcode != 0 {
            return Err(NotifyError::Api(format!(
                "dingtalk errcode {}: {}",
                reply.errcode, reply.errmsg
            )));
        }
        Ok(())
    }
}
