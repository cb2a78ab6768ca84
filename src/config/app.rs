// src/config/app.rs
use anyhow::{Context, Result};
use chrono::{FixedOffset, NaiveTime};
use serde::{Deserialize, Serialize};
use std::{fs, path::Path};

use super::ConfigError;

pub const DEFAULT_CONFIG_PATH: &str = "config/tracker.toml";
pub const DEFAULT_DATABASE_URL: &str = "sqlite://data_leaks.db";

// Values shipped in the sample config; treated as "not configured".
const DINGTALK_PLACEHOLDERS: &[&str] = &[
    "https://oapi.dingtalk.com/robot/send?access_token=YOUR_TOKEN",
    "YOUR_SECRET",
];
const FEISHU_PLACEHOLDERS: &[&str] = &["https://open.feishu.cn/open-apis/bot/v2/hook/YOUR_HOOK"];
const TELEGRAM_PLACEHOLDERS: &[&str] = &["YOUR_BOT_TOKEN", "YOUR_CHAT_ID"];
const DISCORD_PLACEHOLDERS: &[&str] = &["https://discord.com/api/webhooks/YOUR_WEBHOOK"];

/// Returns the value only when it is non-empty and not one of the known placeholders.
pub fn configured<'a>(value: &'a Option<String>, placeholders: &[&str]) -> Option<&'a str> {
    let v = value.as_deref()?.trim();
    if v.is_empty() || placeholders.iter().any(|p| p.eq_ignore_ascii_case(v)) {
        return None;
    }
    Some(v)
}

/// Parse an on/off switch as written in env vars ("ON", "off", "1", "true", ...).
pub fn parse_switch(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "on" | "1" | "true" | "yes" => Some(true),
        "off" | "0" | "false" | "no" => Some(false),
        _ => None,
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub push: PushConfig,
    pub proxy: ProxyConfig,
    pub quiet_hours: QuietHoursConfig,
    pub daily_report: DailyReportConfig,
    pub weekly_report: WeeklyReportConfig,
    pub schedule: ScheduleConfig,
    pub http: HttpConfig,
    pub output: OutputConfig,
    pub storage: StorageConfig,
    pub statistics: StatisticsConfig,
    pub metrics: MetricsConfig,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PushConfig {
    pub dingtalk: DingTalkConfig,
    pub feishu: FeishuConfig,
    pub telegram: TelegramConfig,
    pub discord: DiscordConfig,
}

impl PushConfig {
    /// Labels of the channels whose switch is on (used by the startup message).
    pub fn enabled_channels(&self) -> Vec<&'static str> {
        let mut out = Vec::new();
        if self.dingtalk.enabled {
            out.push("DingTalk");
        }
        if self.feishu.enabled {
            out.push("Feishu");
        }
        if self.telegram.enabled {
            out.push("Telegram");
        }
        if self.discord.enabled {
            out.push("Discord");
        }
        out
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DingTalkConfig {
    pub enabled: bool,
    pub webhook: Option<String>,
    pub secret: Option<String>,
}

impl DingTalkConfig {
    pub fn credentials(&self) -> Result<(&str, &str), ConfigError> {
        let webhook = configured(&self.webhook, DINGTALK_PLACEHOLDERS)
            .ok_or(ConfigError::NotConfigured("dingtalk webhook"))?;
        let secret = configured(&self.secret, DINGTALK_PLACEHOLDERS)
            .ok_or(ConfigError::NotConfigured("dingtalk secret"))?;
        Ok((webhook, secret))
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FeishuConfig {
    pub enabled: bool,
    pub webhook: Option<String>,
}

impl FeishuConfig {
    pub fn webhook(&self) -> Result<&str, ConfigError> {
        configured(&self.webhook, FEISHU_PLACEHOLDERS)
            .ok_or(ConfigError::NotConfigured("feishu webhook"))
    }
}

fn default_telegram_api() -> String {
    "https://api.telegram.org".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TelegramConfig {
    pub enabled: bool,
    pub token: Option<String>,
    pub chat_id: Option<String>,
    #[serde(default = "default_telegram_api")]
    pub api_base: String,
    pub retry: RetrySettings,
}

impl Default for TelegramConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            token: None,
            chat_id: None,
            api_base: default_telegram_api(),
            retry: RetrySettings::default(),
        }
    }
}

impl TelegramConfig {
    pub fn credentials(&self) -> Result<(&str, &str), ConfigError> {
        let token = configured(&self.token, TELEGRAM_PLACEHOLDERS)
            .ok_or(ConfigError::NotConfigured("telegram token"))?;
        let chat = configured(&self.chat_id, TELEGRAM_PLACEHOLDERS)
            .ok_or(ConfigError::NotConfigured("telegram chat_id"))?;
        Ok((token, chat))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DiscordConfig {
    pub enabled: bool,
    pub webhook: Option<String>,
    pub send_updates: bool,
    pub send_weekly_report: bool,
    pub retry: RetrySettings,
}

impl Default for DiscordConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            webhook: None,
            send_updates: true,
            send_weekly_report: true,
            retry: RetrySettings::default(),
        }
    }
}

impl DiscordConfig {
    pub fn webhook(&self) -> Result<&str, ConfigError> {
        let url = configured(&self.webhook, DISCORD_PLACEHOLDERS)
            .ok_or(ConfigError::NotConfigured("discord webhook"))?;
        if !url.starts_with("http") {
            return Err(ConfigError::Invalid(
                "discord webhook must start with http:// or https://".into(),
            ));
        }
        Ok(url)
    }
}

/// Bounded retry knobs for rate-limited channels.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrySettings {
    pub max_attempts: u32,
    pub base_delay_secs: f64,
    pub max_delay_secs: f64,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay_secs: 1.0,
            max_delay_secs: 60.0,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ProxyConfig {
    pub enabled: bool,
    pub http: Option<String>,
    pub https: Option<String>,
    pub no_proxy: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QuietHoursConfig {
    pub enabled: bool,
    /// "HH:MM", inclusive
    pub start: String,
    /// "HH:MM", exclusive
    pub end: String,
    pub utc_offset_hours: i32,
}

impl Default for QuietHoursConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            start: "00:00".into(),
            end: "07:00".into(),
            utc_offset_hours: 8,
        }
    }
}

impl QuietHoursConfig {
    pub fn offset(&self) -> Result<FixedOffset, ConfigError> {
        FixedOffset::east_opt(self.utc_offset_hours * 3600).ok_or_else(|| {
            ConfigError::Invalid(format!("utc_offset_hours {} out of range", self.utc_offset_hours))
        })
    }

    pub fn bounds(&self) -> Result<(NaiveTime, NaiveTime), ConfigError> {
        let parse = |s: &str| {
            NaiveTime::parse_from_str(s.trim(), "%H:%M")
                .map_err(|e| ConfigError::Invalid(format!("quiet hours time {s:?}: {e}")))
        };
        Ok((parse(&self.start)?, parse(&self.end)?))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DailyReportConfig {
    pub enabled: bool,
}

impl Default for DailyReportConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WeeklyReportConfig {
    pub enabled: bool,
    pub push: bool,
}

impl Default for WeeklyReportConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            push: true,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct ScheduleConfig {
    pub interval_secs: u64,
    pub error_cooldown_secs: u64,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            interval_secs: 2 * 3600,
            error_cooldown_secs: 60,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub timeout_secs: u64,
    pub feed_timeout_secs: u64,
    pub user_agent: String,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 10,
            feed_timeout_secs: 30,
            user_agent: concat!("leak-tracker/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Root for `archive/`, `rss/` and `index.html`.
    pub dir: String,
    /// Public base URL of the published site, used for report links.
    pub site_url: Option<String>,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: ".".into(),
            site_url: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub database_url: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_url: DEFAULT_DATABASE_URL.into(),
        }
    }
}

/// How the "by source" statistics bucket items.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceGrouping {
    /// The feed label captured at ingestion.
    #[default]
    SourceName,
    /// First whitespace-delimited word of the title.
    TitlePrefix,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StatisticsConfig {
    pub group_by: SourceGrouping,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    /// e.g. "127.0.0.1:9187"; exporter disabled when unset.
    pub listen: Option<String>,
}

impl AppConfig {
    pub fn from_toml_str(s: &str) -> Result<Self> {
        toml::from_str(s).context("parsing tracker config toml")
    }

    /// Missing file means defaults; unreadable or malformed file is an error.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::info!(path = %path.display(), "config file not found, using defaults + env");
            return Ok(Self::default());
        }
        let content = fs::read_to_string(path)
            .with_context(|| format!("reading config from {}", path.display()))?;
        Self::from_toml_str(&content)
    }

    /// Environment overrides win over file values.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let text = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let switch = |key: &str, target: &mut bool| {
            if let Some(v) = lookup(key).as_deref().and_then(parse_switch) {
                *target = v;
            }
        };

        let p = &mut self.push;
        if let Some(v) = text("DINGTALK_WEBHOOK") {
            p.dingtalk.webhook = Some(v);
        }
        if let Some(v) = text("DINGTALK_SECRET") {
            p.dingtalk.secret = Some(v);
        }
        switch("DINGTALK_SWITCH", &mut p.dingtalk.enabled);

        if let Some(v) = text("FEISHU_WEBHOOK") {
            p.feishu.webhook = Some(v);
        }
        switch("FEISHU_SWITCH", &mut p.feishu.enabled);

        if let Some(v) = text("TELEGRAM_TOKEN") {
            p.telegram.token = Some(v);
        }
        if let Some(v) = text("TELEGRAM_CHAT_ID") {
            p.telegram.chat_id = Some(v);
        }
        switch("TELEGRAM_SWITCH", &mut p.telegram.enabled);

        if let Some(v) = text("DISCORD_WEBHOOK") {
            p.discord.webhook = Some(v);
        }
        switch("DISCORD_SWITCH", &mut p.discord.enabled);
        switch("DISCORD_SEND_UPDATES", &mut p.discord.send_updates);
        switch("DISCORD_SEND_WEEKLY_REPORT", &mut p.discord.send_weekly_report);

        switch("QUIET_HOURS_SWITCH", &mut self.quiet_hours.enabled);
        switch("DAILY_REPORT_SWITCH", &mut self.daily_report.enabled);
        switch("WEEKLY_REPORT_SWITCH", &mut self.weekly_report.enabled);
        switch("WEEKLY_REPORT_PUSH_SWITCH", &mut self.weekly_report.push);

        switch("PROXY_ENABLE", &mut self.proxy.enabled);
        if let Some(v) = text("HTTP_PROXY") {
            self.proxy.http = Some(v);
        }
        if let Some(v) = text("HTTPS_PROXY") {
            self.proxy.https = Some(v);
        }
        if let Some(v) = text("NO_PROXY") {
            self.proxy.no_proxy = Some(v);
        }

        if let Some(v) = text("DATABASE_URL") {
            self.storage.database_url = v;
        }
        if let Some(v) = text("METRICS_LISTEN") {
            self.metrics.listen = Some(v);
        }
    }
}
