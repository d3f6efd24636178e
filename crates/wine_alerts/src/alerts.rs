//! Rolling-window alert detection, ported from `core/alerting.py`'s three
//! checks: Stage 3 failing often, LLM spend running hot, and the overall
//! error rate climbing. Counters are process-local (the teacher's own
//! comment calls out that a multi-instance deployment would want Redis
//! instead; this crate doesn't attempt that).

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::window::{is_stale, WindowKey};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertKind {
    Stage3FailureHigh,
    LlmCostHigh,
    ErrorRateHigh,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Warning,
    Error,
}

#[derive(Debug, Clone, Serialize)]
pub struct AlertEvent {
    pub kind: AlertKind,
    pub severity: Severity,
    pub message: String,
    pub correlation_id: Option<String>,
    pub fields: serde_json::Value,
}

/// Delivery seam standing in for `admin_notifications.enqueue_admin_notification`.
/// Swapped for a real sink (Telegram, webhook, queue) in production; tests use
/// a recording fake.
pub trait AlertSink: Send + Sync {
    fn notify(&self, event: &AlertEvent);
}

/// Matches the Python fallback when `admin_notifications` isn't wired up:
/// log the alert and move on.
pub struct LoggingAlertSink;

impl AlertSink for LoggingAlertSink {
    fn notify(&self, event: &AlertEvent) {
        tracing::warn!(
            kind = ?event.kind,
            correlation_id = event.correlation_id.as_deref().unwrap_or(""),
            "{}",
            event.message
        );
    }
}

#[derive(Debug, Clone, Copy)]
pub struct AlertThresholds {
    pub stage3_failure_count: u32,
    pub stage3_window_minutes: i64,
    pub llm_cost_eur: f64,
    pub llm_cost_window_minutes: i64,
    pub error_count: u32,
    pub error_window_minutes: i64,
    pub max_age_minutes: i64,
}

impl Default for AlertThresholds {
    fn default() -> Self {
        AlertThresholds {
            stage3_failure_count: 5,
            stage3_window_minutes: 60,
            llm_cost_eur: 0.50,
            llm_cost_window_minutes: 60,
            error_count: 10,
            error_window_minutes: 60,
            max_age_minutes: 120,
        }
    }
}

#[derive(Default)]
struct Counters {
    stage3_failures: HashMap<WindowKey, u32>,
    error_count: HashMap<WindowKey, u32>,
    llm_cost: HashMap<WindowKey, f64>,
    sent: HashSet<(AlertKind, WindowKey)>,
}

pub struct AlertCenter {
    thresholds: AlertThresholds,
    sink: Box<dyn AlertSink>,
    counters: Mutex<Counters>,
}

impl AlertCenter {
    pub fn new(thresholds: AlertThresholds, sink: Box<dyn AlertSink>) -> Self {
        AlertCenter {
            thresholds,
            sink,
            counters: Mutex::new(Counters::default()),
        }
    }

    pub fn with_logging_sink(thresholds: AlertThresholds) -> Self {
        Self::new(thresholds, Box::new(LoggingAlertSink))
    }

    fn cleanup(counters: &mut Counters, now: DateTime<Utc>, max_age_minutes: i64) {
        counters
            .stage3_failures
            .retain(|k, _| !is_stale(k, now, max_age_minutes));
        counters
            .error_count
            .retain(|k, _| !is_stale(k, now, max_age_minutes));
        counters.llm_cost.retain(|k, _| !is_stale(k, now, max_age_minutes));
        counters
            .sent
            .retain(|(_, k)| !is_stale(k, now, max_age_minutes));
    }

    /// Record one Stage 3 failure and emit an alert if the window just
    /// crossed the configured threshold (fired at most once per window).
    pub fn record_stage3_failure(
        &self,
        now: DateTime<Utc>,
        correlation_id: Option<&str>,
    ) -> Option<AlertEvent> {
        let window = WindowKey::for_instant(now, self.thresholds.stage3_window_minutes);
        let mut counters = self.counters.lock().unwrap();
        Self::cleanup(&mut counters, now, self.thresholds.max_age_minutes);

        let count = counters.stage3_failures.entry(window).or_insert(0);
        *count += 1;
        let failures_in_window = *count;

        if failures_in_window < self.thresholds.stage3_failure_count {
            return None;
        }
        if !counters.sent.insert((AlertKind::Stage3FailureHigh, window)) {
            return None;
        }

        let event = AlertEvent {
            kind: AlertKind::Stage3FailureHigh,
            severity: Severity::Warning,
            message: format!(
                "Stage 3 failed {} times in the last {} minutes",
                failures_in_window, self.thresholds.stage3_window_minutes
            ),
            correlation_id: correlation_id.map(str::to_owned),
            fields: serde_json::json!({
                "threshold": self.thresholds.stage3_failure_count,
                "failures_count": failures_in_window,
                "window_minutes": self.thresholds.stage3_window_minutes,
            }),
        };
        self.sink.notify(&event);
        Some(event)
    }

    /// Add `estimated_cost` to the current LLM-spend window and emit an
    /// alert if the running total just crossed the threshold.
    pub fn record_llm_cost(
        &self,
        now: DateTime<Utc>,
        estimated_cost: f64,
        correlation_id: Option<&str>,
    ) -> Option<AlertEvent> {
        let window = WindowKey::for_instant(now, self.thresholds.llm_cost_window_minutes);
        let mut counters = self.counters.lock().unwrap();
        Self::cleanup(&mut counters, now, self.thresholds.max_age_minutes);

        let total = counters.llm_cost.entry(window).or_insert(0.0);
        *total += estimated_cost;
        let total_cost = *total;

        if total_cost < self.thresholds.llm_cost_eur {
            return None;
        }
        if !counters.sent.insert((AlertKind::LlmCostHigh, window)) {
            return None;
        }

        let event = AlertEvent {
            kind: AlertKind::LlmCostHigh,
            severity: Severity::Warning,
            message: format!(
                "Estimated LLM cost {:.2} EUR in the last {} minutes (threshold {:.2})",
                total_cost, self.thresholds.llm_cost_window_minutes, self.thresholds.llm_cost_eur
            ),
            correlation_id: correlation_id.map(str::to_owned),
            fields: serde_json::json!({
                "estimated_cost": (total_cost * 100.0).round() / 100.0,
                "threshold": self.thresholds.llm_cost_eur,
                "window_minutes": self.thresholds.llm_cost_window_minutes,
            }),
        };
        self.sink.notify(&event);
        Some(event)
    }

    /// Record one error and emit an alert if the window just crossed the
    /// configured threshold.
    pub fn record_error(
        &self,
        now: DateTime<Utc>,
        correlation_id: Option<&str>,
    ) -> Option<AlertEvent> {
        let window = WindowKey::for_instant(now, self.thresholds.error_window_minutes);
        let mut counters = self.counters.lock().unwrap();
        Self::cleanup(&mut counters, now, self.thresholds.max_age_minutes);

        let count = counters.error_count.entry(window).or_insert(0);
        *count += 1;
        let errors_in_window = *count;

        if errors_in_window < self.thresholds.error_count {
            return None;
        }
        if !counters.sent.insert((AlertKind::ErrorRateHigh, window)) {
            return None;
        }

        let event = AlertEvent {
            kind: AlertKind::ErrorRateHigh,
            severity: Severity::Error,
            message: format!(
                "{} errors in the last {} minutes (threshold {})",
                errors_in_window, self.thresholds.error_window_minutes, self.thresholds.error_count
            ),
            correlation_id: correlation_id.map(str::to_owned),
            fields: serde_json::json!({
                "error_count": errors_in_window,
                "threshold": self.thresholds.error_count,
                "window_minutes": self.thresholds.error_window_minutes,
            }),
        };
        self.sink.notify(&event);
        Some(event)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use chrono::TimeZone;

    struct RecordingSink(Arc<AtomicUsize>);
    impl AlertSink for RecordingSink {
        fn notify(&self, _event: &AlertEvent) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 7, 28, 10, 0, 0).unwrap()
    }

    #[test]
    fn stage3_alert_fires_once_threshold_crossed() {
        let fired = Arc::new(AtomicUsize::new(0));
        let center = AlertCenter::new(
            AlertThresholds {
                stage3_failure_count: 3,
                ..Default::default()
            },
            Box::new(RecordingSink(fired.clone())),
        );

        assert!(center.record_stage3_failure(now(), None).is_none());
        assert!(center.record_stage3_failure(now(), None).is_none());
        let alert = center.record_stage3_failure(now(), None);
        assert!(alert.is_some());
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn stage3_alert_is_deduplicated_within_window() {
        let fired = Arc::new(AtomicUsize::new(0));
        let center = AlertCenter::new(
            AlertThresholds {
                stage3_failure_count: 1,
                ..Default::default()
            },
            Box::new(RecordingSink(fired.clone())),
        );

        center.record_stage3_failure(now(), None);
        center.record_stage3_failure(now(), None);
        center.record_stage3_failure(now(), None);
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn llm_cost_alert_accumulates_before_firing() {
        let fired = Arc::new(AtomicUsize::new(0));
        let center = AlertCenter::new(
            AlertThresholds {
                llm_cost_eur: 1.0,
                ..Default::default()
            },
            Box::new(RecordingSink(fired.clone())),
        );

        assert!(center.record_llm_cost(now(), 0.4, None).is_none());
        assert!(center.record_llm_cost(now(), 0.4, None).is_none());
        assert!(center.record_llm_cost(now(), 0.4, None).is_some());
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn error_rate_alert_fires_at_threshold() {
        let fired = Arc::new(AtomicUsize::new(0));
        let center = AlertCenter::new(
            AlertThresholds {
                error_count: 2,
                ..Default::default()
            },
            Box::new(RecordingSink(fired.clone())),
        );

        assert!(center.record_error(now(), None).is_none());
        assert!(center.record_error(now(), None).is_some());
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }
}
