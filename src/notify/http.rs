// src/notify/http.rs
//! Shared reqwest clients for the channels and the response classifier.

use anyhow::{Context, Result};
use reqwest::{header::RETRY_AFTER, Client, NoProxy, Proxy, StatusCode};
use serde::Serialize;
use std::time::Duration;

use super::retry::{parse_retry_hint, AttemptOutcome};
use super::NotifyError;
use crate::config::app::{configured, HttpConfig, ProxyConfig};

/// One client that honours the proxy settings and one that never does.
#[derive(Clone)]
pub struct HttpClients {
    direct: Client,
    proxied: Client,
}

fn builder(http: &HttpConfig) -> reqwest::ClientBuilder {
    Client::builder()
        .user_agent(http.user_agent.as_str())
        .timeout(Duration::from_secs(http.timeout_secs.max(1)))
}

fn proxied_client(http: &HttpConfig, proxy: &ProxyConfig) -> Result<Client> {
    let mut pb = builder(http);
    if proxy.enabled {
        let no_proxy = configured(&proxy.no_proxy, &[]).and_then(NoProxy::from_string);
        if let Some(url) = configured(&proxy.http, &[]) {
            let p = Proxy::http(url).with_context(|| format!("http proxy {url}"))?;
            pb = pb.proxy(p.no_proxy(no_proxy.clone()));
        }
        if let Some(url) = configured(&proxy.https, &[]) {
            let p = Proxy::https(url).with_context(|| format!("https proxy {url}"))?;
            pb = pb.proxy(p.no_proxy(no_proxy));
        }
    } else {
        pb = pb.no_proxy();
    }
    pb.build().context("building proxied channel http client")
}

impl HttpClients {
    /// Unusable proxy settings are logged and the proxied channels go direct.
    pub fn from_config(http: &HttpConfig, proxy: &ProxyConfig) -> Result<Self> {
        let direct = builder(http)
            .no_proxy()
            .build()
            .context("building channel http client")?;

        let proxied = match proxied_client(http, proxy) {
            Ok(c) => c,
            Err(e) => {
                tracing::warn!(error = ?e, "proxy settings unusable, sending proxied channels direct");
                direct.clone()
            }
        };

        Ok(Self { direct, proxied })
    }

    /// Both clients without any proxy (tests).
    pub fn direct_only(http: &HttpConfig) -> Result<Self> {
        let direct = builder(http).no_proxy().build().context("building channel http client")?;
        Ok(Self {
            proxied: direct.clone(),
            direct,
        })
    }

    pub fn for_proxied(&self, use_proxy: bool) -> Client {
        if use_proxy {
            self.proxied.clone()
        } else {
            self.direct.clone()
        }
    }
}

/// POST a JSON body once and classify the response for the retry policy.
/// Success carries the response body text.
pub async fn post_json<B: Serialize + ?Sized>(
    client: &Client,
    url: &str,
    body: &B,
) -> AttemptOutcome<String> {
    let resp = match client.post(url).json(body).send().await {
        Ok(r) => r,
        Err(e) if e.is_timeout() || e.is_connect() => {
            return AttemptOutcome::Transient(format!("request error: {e}"));
        }
        Err(e) => return AttemptOutcome::Fatal(NotifyError::Http(e)),
    };

    let status = resp.status();
    if status == StatusCode::TOO_MANY_REQUESTS {
        let hint = resp
            .headers()
            .get(RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(parse_retry_hint);
        return AttemptOutcome::RateLimited { hint };
    }

    let text = resp.text().await.unwrap_or_default();
    if !status.is_success() {
        return AttemptOutcome::Fatal(NotifyError::Status {
            status: status.as_u16(),
            body: text,
        });
    }
    AttemptOutcome::Success(text)
}

/// Single-attempt variant for channels without retry.
pub async fn post_json_once<B: Serialize + ?Sized>(
    client: &Client,
    url: &str,
    body: &B,
) -> Result<String, NotifyError> {
    match post_json(client, url, body).await {
        AttemptOutcome::Success(text) => Ok(text),
        AttemptOutcome::Fatal(e) => Err(e),
        AttemptOutcome::RateLimited { .. } => Err(NotifyError::Status {
            status: StatusCode::TOO_MANY_REQUESTS.as_u16(),
            body: "rate limited".into(),
        }),
        AttemptOutcome::Transient(reason) => Err(NotifyError::Api(reason)),
    }
}
