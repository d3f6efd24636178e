//! Daily-report scheduling loop, ported from
//! `core/scheduler.py::setup_daily_reports_scheduler` /
//! `send_daily_reports_to_all_users`. APScheduler's `CronTrigger(hour=10,
//! minute=0, timezone=Europe/Rome)` plus `max_instances=1` and
//! `misfire_grace_time=3600` become a once-a-minute `tokio::time::interval`
//! tick that checks "is it past today's fire time, have we not fired yet
//! today, and are we still inside the grace window" — no scheduler crate
//! exists anywhere in the example pack, so this hand-rolled check is the
//! idiom actually attested there.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::{Duration as ChronoDuration, NaiveDate, NaiveTime, TimeZone, Utc};
use tokio::sync::Mutex;
use tokio::time::{interval, Duration};
use tracing::{info, warn};

use wine_db::DbPool;
use wine_protocol::REPORT_TIMEZONE;
use wine_store::TenantRegistry;

use crate::report::generate_daily_report;

/// Delivery seam standing in for `telegram_notifier.send_telegram_message`.
pub trait ReportSink: Send + Sync {
    fn deliver(&self, tenant_user_id: i64, business_name: &str, report: &str);
}

/// Matches the Python's behavior when no real notifier is reachable: log
/// and move on.
pub struct LoggingReportSink;

impl ReportSink for LoggingReportSink {
    fn deliver(&self, tenant_user_id: i64, business_name: &str, report: &str) {
        info!(tenant_user_id, business_name, "{}", report);
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ScheduleConfig {
    pub fire_hour: u32,
    pub fire_minute: u32,
    pub grace_minutes: i64,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        ScheduleConfig {
            fire_hour: 10,
            fire_minute: 0,
            grace_minutes: 60,
        }
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct DailyRunSummary {
    pub sent: usize,
    pub skipped: usize,
    pub errors: usize,
}

pub struct DailyReportScheduler {
    pool: DbPool,
    config: ScheduleConfig,
    sink: Box<dyn ReportSink>,
    running: AtomicBool,
    last_fired: Mutex<Option<NaiveDate>>,
}

impl DailyReportScheduler {
    pub fn new(pool: DbPool, config: ScheduleConfig, sink: Box<dyn ReportSink>) -> Self {
        DailyReportScheduler {
            pool,
            config,
            sink,
            running: AtomicBool::new(false),
            last_fired: Mutex::new(None),
        }
    }

    pub fn with_logging_sink(pool: DbPool, config: ScheduleConfig) -> Self {
        Self::new(pool, config, Box::new(LoggingReportSink))
    }

    /// Generate and deliver yesterday's report for every onboarded tenant.
    /// Mirrors `send_daily_reports_to_all_users`'s sent/skipped/error tally.
    pub async fn run_once(&self) -> crate::error::Result<DailyRunSummary> {
        let registry = TenantRegistry::new(self.pool.clone());
        let tenants = registry.list_onboarded().await?;
        info!(count = tenants.len(), "generating daily movement reports");

        let now_local = Utc::now().with_timezone(&REPORT_TIMEZONE);
        let yesterday = now_local.date_naive() - ChronoDuration::days(1);

        let mut summary = DailyRunSummary::default();
        let mut first = true;
        for tenant in &tenants {
            // Mirrors `send_daily_reports_to_all_users`'s `asyncio.sleep(0.5)`
            // between tenants, spacing out notifier calls.
            if !first {
                tokio::time::sleep(Duration::from_millis(500)).await;
            }
            first = false;

            match generate_daily_report(&self.pool, tenant, yesterday).await {
                Ok(report) => {
                    self.sink.deliver(tenant.user_id, &tenant.business_name, &report);
                    summary.sent += 1;
                }
                Err(e) => {
                    warn!(tenant_user_id = tenant.user_id, error = %e, "failed to generate daily report");
                    summary.errors += 1;
                }
            }
        }
        Ok(summary)
    }

    /// True if `now` is at or after today's fire time but still within the
    /// misfire grace window, matching `misfire_grace_time=3600`.
    fn within_fire_window(&self, now: chrono::DateTime<chrono_tz::Tz>) -> bool {
        let fire_time = NaiveTime::from_hms_opt(self.config.fire_hour, self.config.fire_minute, 0).unwrap();
        let today_fire = REPORT_TIMEZONE
            .from_local_datetime(&now.date_naive().and_time(fire_time))
            .single();
        let Some(today_fire) = today_fire else {
            return false;
        };
        let grace_end = today_fire + ChronoDuration::minutes(self.config.grace_minutes);
        now >= today_fire && now <= grace_end
    }

    /// One iteration of the scheduling loop: fire at most once per calendar
    /// day, and never while a previous run is still in flight
    /// (`max_instances=1`).
    async fn maybe_fire(self: &Arc<Self>) {
        let now = Utc::now().with_timezone(&REPORT_TIMEZONE);
        if !self.within_fire_window(now) {
            return;
        }

        {
            let mut last_fired = self.last_fired.lock().await;
            if *last_fired == Some(now.date_naive()) {
                return;
            }
            *last_fired = Some(now.date_naive());
        }

        if self
            .running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            warn!("daily report run already in flight, skipping this tick");
            return;
        }

        let this = Arc::clone(self);
        tokio::spawn(async move {
            match this.run_once().await {
                Ok(summary) => info!(?summary, "daily report run completed"),
                Err(e) => warn!(error = %e, "daily report run failed"),
            }
            this.running.store(false, Ordering::SeqCst);
        });
    }

    /// Drive the scheduling loop forever, waking once a minute. Intended to
    /// run as a background task for the lifetime of the process.
    pub async fn run_forever(self: Arc<Self>) -> ! {
        let mut ticker = interval(Duration::from_secs(60));
        loop {
            ticker.tick().await;
            self.maybe_fire().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono_tz::Tz;

    fn scheduler_at(config: ScheduleConfig) -> DailyReportScheduler {
        // An in-memory pool is never touched by `within_fire_window`.
        let pool = wine_db::DbPool::connect_lazy("sqlite::memory:").unwrap();
        DailyReportScheduler::with_logging_sink(pool, config)
    }

    fn rome_time(hour: u32, minute: u32) -> chrono::DateTime<Tz> {
        REPORT_TIMEZONE
            .with_ymd_and_hms(2026, 7, 28, hour, minute, 0)
            .unwrap()
    }

    #[test]
    fn fires_exactly_at_scheduled_time() {
        let s = scheduler_at(ScheduleConfig::default());
        assert!(s.within_fire_window(rome_time(10, 0)));
    }

    #[test]
    fn fires_within_grace_window_after_a_missed_tick() {
        let s = scheduler_at(ScheduleConfig::default());
        assert!(s.within_fire_window(rome_time(10, 45)));
    }

    #[test]
    fn does_not_fire_before_scheduled_time() {
        let s = scheduler_at(ScheduleConfig::default());
        assert!(!s.within_fire_window(rome_time(9, 59)));
    }

    #[test]
    fn does_not_fire_past_the_grace_window() {
        let s = scheduler_at(ScheduleConfig::default());
        assert!(!s.within_fire_window(rome_time(11, 1)));
    }
}
