// src/notify/retry.rs
//! Bounded, rate-limit-aware retry shared by the HTTP channels.

use std::future::Future;
use std::time::Duration;

use rand::Rng;

use super::NotifyError;
use crate::clock::Clock;
use crate::config::app::RetrySettings;

/// Retry-After values above this are milliseconds, not seconds.
const RETRY_AFTER_MS_THRESHOLD: f64 = 1000.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetrySettings::default().into()
    }
}

impl From<RetrySettings> for RetryPolicy {
    fn from(s: RetrySettings) -> Self {
        let secs = |v: f64| {
            if v.is_finite() {
                secs_saturating(v.max(0.0))
            } else if v > 0.0 {
                Duration::MAX
            } else {
                Duration::ZERO
            }
        };
        Self {
            max_attempts: s.max_attempts.max(1),
            base_delay: secs(s.base_delay_secs),
            max_delay: secs(s.max_delay_secs),
        }
    }
}

/// Result of one try, as classified by the channel.
#[derive(Debug)]
pub enum AttemptOutcome<T> {
    Success(T),
    /// 429; `hint` comes from the Retry-After header when present and parseable.
    RateLimited { hint: Option<Duration> },
    /// Timeout or connection failure.
    Transient(String),
    Fatal(NotifyError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptKind {
    Success,
    RateLimited,
    TransientError,
    FatalError,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DispatchAttempt {
    /// 1-based
    pub attempt: u32,
    /// Slept after this attempt; `None` when no retry followed.
    pub delay: Option<Duration>,
    pub outcome: AttemptKind,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RetryReport {
    pub attempts: Vec<DispatchAttempt>,
}

impl RetryReport {
    pub fn delays(&self) -> Vec<Duration> {
        self.attempts.iter().filter_map(|a| a.delay).collect()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RetryFailure {
    #[error(transparent)]
    Fatal(NotifyError),
    #[error("gave up after {attempts} attempts: {last}")]
    Exhausted { attempts: u32, last: String },
}

impl From<RetryFailure> for NotifyError {
    fn from(f: RetryFailure) -> Self {
        match f {
            RetryFailure::Fatal(e) => e,
            RetryFailure::Exhausted { attempts, last } => NotifyError::Exhausted { attempts, last },
        }
    }
}

/// Parse a Retry-After header value given in (fractional) seconds or milliseconds.
pub fn parse_retry_hint(raw: &str) -> Option<Duration> {
    let v: f64 = raw.trim().parse().ok()?;
    if !v.is_finite() || v < 0.0 {
        return None;
    }
    let secs = if v > RETRY_AFTER_MS_THRESHOLD { v / 1000.0 } else { v };
    Some(secs_saturating(secs))
}

/// Non-negative finite seconds to a `Duration`, saturating at `Duration::MAX`.
fn secs_saturating(secs: f64) -> Duration {
    Duration::try_from_secs_f64(secs).unwrap_or(Duration::MAX)
}

impl RetryPolicy {
    /// `base * 2^(attempt-1) + jitter` seconds, clamped to `max_delay`.
    pub fn backoff_delay(&self, attempt: u32, jitter: f64) -> Duration {
        let exp = 2f64.powi(attempt.saturating_sub(1).min(30) as i32);
        let secs = self.base_delay.as_secs_f64() * exp + jitter.clamp(0.0, 1.0);
        self.clamp(secs_saturating(secs))
    }

    fn clamp(&self, d: Duration) -> Duration {
        d.min(self.max_delay)
    }

    fn delay_for(&self, attempt: u32, hint: Option<Duration>) -> Duration {
        match hint {
            Some(h) => self.clamp(h),
            None => self.backoff_delay(attempt, rand::rng().random_range(0.0..1.0)),
        }
    }

    /// Drive `op` until success, a fatal outcome, or the attempt budget runs out.
    /// There is no sleep after the final attempt.
    pub async fn run<T, F, Fut>(
        &self,
        clock: &dyn Clock,
        label: &str,
        mut op: F,
    ) -> (Result<T, RetryFailure>, RetryReport)
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = AttemptOutcome<T>>,
    {
        let mut report = RetryReport::default();
        let mut last = String::new();

        for attempt in 1..=self.max_attempts {
            let (kind, hint) = match op(attempt).await {
                AttemptOutcome::Success(v) => {
                    report.attempts.push(DispatchAttempt {
                        attempt,
                        delay: None,
                        outcome: AttemptKind::Success,
                    });
                    return (Ok(v), report);
                }
                AttemptOutcome::Fatal(e) => {
                    tracing::warn!(channel = label, attempt, error = %e, "delivery failed, not retrying");
                    report.attempts.push(DispatchAttempt {
                        attempt,
                        delay: None,
                        outcome: AttemptKind::FatalError,
                    });
                    return (Err(RetryFailure::Fatal(e)), report);
                }
                AttemptOutcome::RateLimited { hint } => {
                    last = "rate limited (429)".to_string();
                    (AttemptKind::RateLimited, hint)
                }
                AttemptOutcome::Transient(reason) => {
                    last = reason;
                    (AttemptKind::TransientError, None)
                }
            };

            if attempt == self.max_attempts {
                report.attempts.push(DispatchAttempt {
                    attempt,
                    delay: None,
                    outcome: kind,
                });
                break;
            }

            let delay = self.delay_for(attempt, hint);
            tracing::info!(
                channel = label,
                attempt,
                max_attempts = self.max_attempts,
                delay_ms = delay.as_millis() as u64,
                reason = %last,
                "retrying delivery"
            );
            report.attempts.push(DispatchAttempt {
                attempt,
                delay: Some(delay),
                outcome: kind,
            });
            clock.sleep(delay).await;
        }

        tracing::warn!(channel = label, attempts = self.max_attempts, "retry budget exhausted");
        (
            Err(RetryFailure::Exhausted {
                attempts: self.max_attempts,
                last,
            }),
            report,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use chrono::{TimeZone, Utc};
    use std::sync::atomic::{AtomicU32, Ordering};

    fn clock() -> ManualClock {
        ManualClock::new(Utc.with_ymd_and_hms(2026, 10, 19, 12, 0, 0).unwrap())
    }

    #[test]
    fn retry_hint_units() {
        assert_eq!(parse_retry_hint("2"), Some(Duration::from_secs(2)));
        assert_eq!(parse_retry_hint("0.5"), Some(Duration::from_millis(500)));
        assert_eq!(parse_retry_hint("2500"), Some(Duration::from_millis(2500)));
        assert_eq!(parse_retry_hint("soon"), None);
        assert_eq!(parse_retry_hint("-1"), None);
    }

    #[test]
    fn oversized_values_saturate() {
        assert_eq!(parse_retry_hint("1e30"), Some(Duration::MAX));
        assert_eq!(
            parse_retry_hint("99999999999999999999999999"),
            Some(Duration::MAX)
        );
        assert_eq!(parse_retry_hint("inf"), None);

        let p = RetryPolicy::from(RetrySettings {
            max_attempts: 3,
            base_delay_secs: 1e300,
            max_delay_secs: f64::INFINITY,
        });
        assert_eq!(p.max_delay, Duration::MAX);
        assert_eq!(p.backoff_delay(2, 0.5), Duration::MAX);

        let p = RetryPolicy::default();
        assert_eq!(p.delay_for(1, parse_retry_hint("1e30")), Duration::from_secs(60));
    }

    #[test]
    fn backoff_grows_and_clamps() {
        let p = RetryPolicy::default();
        assert_eq!(p.backoff_delay(1, 0.0), Duration::from_secs(1));
        assert_eq!(p.backoff_delay(3, 0.5), Duration::from_secs_f64(4.5));
        assert_eq!(p.backoff_delay(10, 0.0), Duration::from_secs(60));
    }

    #[tokio::test]
    async fn success_after_rate_limit_uses_hint() {
        let c = clock();
        let p = RetryPolicy::default();
        let (res, report) = p
            .run(&c, "test", |n| async move {
                if n == 1 {
                    AttemptOutcome::RateLimited {
                        hint: Some(Duration::from_secs(3)),
                    }
                } else {
                    AttemptOutcome::Success(n)
                }
            })
            .await;
        assert_eq!(res.unwrap(), 2);
        assert_eq!(c.sleeps(), vec![Duration::from_secs(3)]);
        assert_eq!(report.attempts.len(), 2);
        assert_eq!(report.attempts[0].outcome, AttemptKind::RateLimited);
    }

    #[tokio::test]
    async fn exhausted_without_trailing_sleep() {
        let c = clock();
        let p = RetryPolicy {
            max_attempts: 3,
            ..RetryPolicy::default()
        };
        let calls = AtomicU32::new(0);
        let (res, report) = p
            .run(&c, "test", |_| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { AttemptOutcome::<()>::Transient("timeout".into()) }
            })
            .await;
        assert!(matches!(res, Err(RetryFailure::Exhausted { attempts: 3, .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(c.sleeps().len(), 2);
        assert_eq!(report.attempts[2].delay, None);
    }

    #[tokio::test]
    async fn fatal_stops_immediately() {
        let c = clock();
        let (res, report) = RetryPolicy::default()
            .run(&c, "test", |_| async {
                AttemptOutcome::<()>::Fatal(NotifyError::Api("bad token".into()))
            })
            .await;
        assert!(matches!(res, Err(RetryFailure::Fatal(_))));
        assert_eq!(report.attempts.len(), 1);
        assert!(c.sleeps().is_empty());
    }
}
