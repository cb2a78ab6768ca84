// src/scheduler.rs
//! Run modes, quiet hours and the per-cycle wiring of ingest, reports and pushes.

use anyhow::{Context, Result};
use chrono::{DateTime, Datelike, FixedOffset, NaiveTime, Timelike, Utc, Weekday};
use std::sync::Arc;
use std::time::Duration;

use crate::clock::Clock;
use crate::config::app::QuietHoursConfig;
use crate::config::{ConfigError, ConfigLoader, CycleConfig};
use crate::ingest::types::FeedFetcher;
use crate::ingest::{Ingestor, PassSummary};
use crate::notify::{Dispatcher, Message};
use crate::report::{GeneratedReport, HtmlRenderer, ReportRenderer, ReportWriter};
use crate::store::{LeakStore, ReportKind};

/// Daily no-work interval `[start, end)` in a fixed offset; may wrap midnight.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuietHours {
    pub enabled: bool,
    pub start: NaiveTime,
    pub end: NaiveTime,
    pub offset: FixedOffset,
}

impl QuietHours {
    pub fn from_config(cfg: &QuietHoursConfig) -> Result<Self, ConfigError> {
        let (start, end) = cfg.bounds()?;
        Ok(Self {
            enabled: cfg.enabled,
            start,
            end,
            offset: cfg.offset()?,
        })
    }

    /// Time left until the quiet interval ends, or `None` outside it.
    pub fn remaining(&self, now: DateTime<Utc>) -> Option<Duration> {
        if !self.enabled || self.start == self.end {
            return None;
        }
        let secs = |t: NaiveTime| i64::from(t.num_seconds_from_midnight());
        let t = secs(now.with_timezone(&self.offset).time());
        let (s, e) = (secs(self.start), secs(self.end));
        let left = if s < e {
            (s <= t && t < e).then(|| e - t)
        } else if t >= s {
            Some(86_400 - t + e)
        } else if t < e {
            Some(e - t)
        } else {
            None
        };
        left.map(|secs| Duration::from_secs(secs.max(1) as u64))
    }
}

pub fn is_friday(now: DateTime<Utc>, offset: FixedOffset) -> bool {
    now.with_timezone(&offset).weekday() == Weekday::Fri
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    /// Poll forever with quiet hours and a fixed interval.
    Continuous,
    /// One pass plus the report checks.
    Once,
    /// One silent pass, then the daily report.
    ReportOnly,
}

impl RunMode {
    pub fn label(self) -> &'static str {
        match self {
            RunMode::Continuous => "continuous",
            RunMode::Once => "once",
            RunMode::ReportOnly => "report-only",
        }
    }
}

#[derive(Debug, Default)]
pub struct CycleOutcome {
    pub pass: PassSummary,
    pub daily: Option<GeneratedReport>,
    pub weekly: Option<GeneratedReport>,
}

pub struct Tracker {
    loader: ConfigLoader,
    store: LeakStore,
    fetcher: Arc<dyn FeedFetcher>,
    clock: Arc<dyn Clock>,
    renderer: Arc<dyn ReportRenderer>,
    last_config: Option<CycleConfig>,
}

impl Tracker {
    pub fn new(
        loader: ConfigLoader,
        store: LeakStore,
        fetcher: Arc<dyn FeedFetcher>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            loader,
            store,
            fetcher,
            clock,
            renderer: Arc::new(HtmlRenderer),
            last_config: None,
        }
    }

    pub fn with_renderer(mut self, renderer: Arc<dyn ReportRenderer>) -> Self {
        self.renderer = renderer;
        self
    }

    /// Fresh config each cycle; a failed reload falls back to the last good one.
    fn reload(&mut self) -> Result<CycleConfig> {
        match self.loader.load() {
            Ok(cfg) => {
                self.last_config = Some(cfg.clone());
                Ok(cfg)
            }
            Err(e) => match &self.last_config {
                Some(prev) => {
                    tracing::warn!(error = ?e, "config reload failed, keeping previous config");
                    Ok(prev.clone())
                }
                None => Err(e),
            },
        }
    }

    /// Startup message, then the mode's work. Only startup problems are errors
    /// in continuous mode.
    pub async fn run(&mut self, mode: RunMode) -> Result<()> {
        let cfg = self.reload().context("loading configuration")?;
        let channels = cfg.app.push.enabled_channels();
        tracing::info!(
            mode = mode.label(),
            sources = cfg.enabled_sources().count(),
            channels = ?channels,
            "tracker starting"
        );

        if mode != RunMode::ReportOnly && !channels.is_empty() {
            let dispatcher = Dispatcher::from_config(&cfg.app, self.clock.clone());
            dispatcher
                .dispatch(&Message::startup(channels, mode.label()))
                .await;
        }

        match mode {
            RunMode::Continuous => self.run_forever().await,
            RunMode::Once | RunMode::ReportOnly => self.run_cycle(mode).await.map(|_| ()),
        }
    }

    /// True when it had to sleep.
    async fn wait_out_quiet_hours(&self, quiet: &QuietHours) -> bool {
        let mut slept = false;
        while let Some(left) = quiet.remaining(self.clock.now()) {
            tracing::info!(sleep_secs = left.as_secs(), "quiet hours, sleeping");
            self.clock.sleep(left).await;
            slept = true;
        }
        slept
    }

    pub async fn run_cycle(&mut self, mode: RunMode) -> Result<CycleOutcome> {
        let mut cfg = self.reload()?;

        if mode == RunMode::Continuous {
            let quiet = QuietHours::from_config(&cfg.app.quiet_hours)?;
            if self.wait_out_quiet_hours(&quiet).await {
                // pick up edits made while sleeping
                cfg = self.reload()?;
            }
        }
        let app = &cfg.app;

        let dispatcher = Dispatcher::from_config(app, self.clock.clone());
        let ingestor = Ingestor::new(self.fetcher.clone(), self.store.clone(), self.clock.clone());
        let notify = mode != RunMode::ReportOnly;
        let pass = ingestor.run_pass(&cfg.sources, notify, &dispatcher).await;

        let writer = ReportWriter::new(&app.output, app.statistics.group_by, self.renderer.clone());
        let now = self.clock.now();
        let mut outcome = CycleOutcome {
            pass,
            ..Default::default()
        };

        if mode == RunMode::ReportOnly || app.daily_report.enabled {
            let report = writer.generate(&self.store, ReportKind::Daily, now).await?;
            writer.export_feed(&report.window, &report.items, now).await?;
            dispatcher
                .dispatch(&Message::daily_report(&report.window.label(), report.count))
                .await;
            outcome.daily = Some(report);
        }

        let offset = app.quiet_hours.offset()?;
        if mode != RunMode::ReportOnly && app.weekly_report.enabled && is_friday(now, offset) {
            let report = writer.generate(&self.store, ReportKind::Weekly, now).await?;
            writer.export_feed(&report.window, &report.items, now).await?;
            if app.weekly_report.push {
                let msg = Message::weekly_report(
                    &report.window.label(),
                    report.count,
                    report.page_url.clone(),
                );
                dispatcher.dispatch(&msg).await;
            }
            outcome.weekly = Some(report);
        }

        Ok(outcome)
    }

    pub async fn run_forever(&mut self) -> Result<()> {
        loop {
            let pause = match self.run_cycle(RunMode::Continuous).await {
                Ok(outcome) => {
                    tracing::info!(new_items = outcome.pass.new_items.len(), "cycle finished");
                    self.schedule_secs(|s| s.interval_secs)
                }
                Err(e) => {
                    tracing::error!(error = ?e, "cycle failed");
                    self.schedule_secs(|s| s.error_cooldown_secs)
                }
            };
            self.clock.sleep(Duration::from_secs(pause)).await;
        }
    }

    fn schedule_secs(&self, pick: impl Fn(&crate::config::app::ScheduleConfig) -> u64) -> u64 {
        let defaults = crate::config::app::ScheduleConfig::default();
        let sched = self
            .last_config
            .as_ref()
            .map(|c| &c.app.schedule)
            .unwrap_or(&defaults);
        pick(sched).max(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn quiet() -> QuietHours {
        QuietHours::from_config(&QuietHoursConfig::default()).unwrap()
    }

    #[test]
    fn default_window_in_utc_plus_8() {
        let q = quiet();
        // 19:00 UTC == 03:00 +08:00
        let now = Utc.with_ymd_and_hms(2026, 10, 18, 19, 0, 0).unwrap();
        assert_eq!(q.remaining(now), Some(Duration::from_secs(4 * 3600)));
        // 23:00 UTC == 07:00 +08:00, end is exclusive
        let now = Utc.with_ymd_and_hms(2026, 10, 18, 23, 0, 0).unwrap();
        assert_eq!(q.remaining(now), None);
        // 16:00 UTC == 00:00 +08:00, start is inclusive
        let now = Utc.with_ymd_and_hms(2026, 10, 18, 16, 0, 0).unwrap();
        assert_eq!(q.remaining(now), Some(Duration::from_secs(7 * 3600)));
    }

    #[test]
    fn wrapping_window_and_disabled() {
        let cfg = QuietHoursConfig {
            enabled: true,
            start: "22:00".into(),
            end: "06:00".into(),
            utc_offset_hours: 0,
        };
        let q = QuietHours::from_config(&cfg).unwrap();
        let at = |h| Utc.with_ymd_and_hms(2026, 10, 19, h, 0, 0).unwrap();
        assert_eq!(q.remaining(at(23)), Some(Duration::from_secs(7 * 3600)));
        assert_eq!(q.remaining(at(5)), Some(Duration::from_secs(3600)));
        assert_eq!(q.remaining(at(12)), None);

        let off = QuietHours {
            enabled: false,
            ..q
        };
        assert_eq!(off.remaining(at(23)), None);
    }

    #[test]
    fn friday_follows_configured_offset() {
        let plus8 = FixedOffset::east_opt(8 * 3600).unwrap();
        // Thursday 20:00 UTC is already Friday 04:00 in +08:00
        let thu = Utc.with_ymd_and_hms(2026, 10, 22, 20, 0, 0).unwrap();
        assert!(is_friday(thu, plus8));
        assert!(!is_friday(thu, FixedOffset::east_opt(0).unwrap()));
    }
}
