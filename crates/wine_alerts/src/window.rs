//! Rolling time-window bucketing, the same aggregation unit
//! `core/alerting.py::_get_time_window` builds as a `"YYYY-MM-DD-HH-MM"`
//! string. A window is identified by the calendar date plus the
//! minute-of-day floored to the window size, which sorts and hashes the
//! same way the Python string key did without the formatting step.

use chrono::{DateTime, Datelike, NaiveDate, Timelike, Utc};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WindowKey {
    pub date: NaiveDate,
    pub bucket_minute: u32,
}

impl WindowKey {
    /// The window containing `now`, sized to `window_minutes`.
    pub fn for_instant(now: DateTime<Utc>, window_minutes: i64) -> Self {
        let window_minutes = window_minutes.max(1) as u32;
        let minute_of_day = now.hour() * 60 + now.minute();
        let bucket_minute = (minute_of_day / window_minutes) * window_minutes;
        WindowKey {
            date: now.date_naive(),
            bucket_minute,
        }
    }
}

/// Evict every key in `keys` older than `now - max_age_minutes`, the
/// counterpart of `_cleanup_old_windows`.
pub fn is_stale(key: &WindowKey, now: DateTime<Utc>, max_age_minutes: i64) -> bool {
    let cutoff = now - chrono::Duration::minutes(max_age_minutes);
    let cutoff_key = WindowKey::for_instant(cutoff, 1);
    *key < cutoff_key
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn buckets_to_the_window_floor() {
        let now = Utc.with_ymd_and_hms(2026, 7, 28, 10, 47, 0).unwrap();
        let key = WindowKey::for_instant(now, 60);
        assert_eq!(key.bucket_minute, 10 * 60);
    }

    #[test]
    fn distinct_windows_sort_chronologically() {
        let a = WindowKey::for_instant(Utc.with_ymd_and_hms(2026, 7, 28, 9, 0, 0).unwrap(), 60);
        let b = WindowKey::for_instant(Utc.with_ymd_and_hms(2026, 7, 28, 10, 0, 0).unwrap(), 60);
        assert!(a < b);
    }

    #[test]
    fn old_windows_are_stale_after_max_age() {
        let now = Utc.with_ymd_and_hms(2026, 7, 28, 12, 0, 0).unwrap();
        let old = WindowKey::for_instant(Utc.with_ymd_and_hms(2026, 7, 28, 9, 0, 0).unwrap(), 60);
        assert!(is_stale(&old, now, 120));
        let recent = WindowKey::for_instant(Utc.with_ymd_and_hms(2026, 7, 28, 11, 0, 0).unwrap(), 60);
        assert!(!is_stale(&recent, now, 120));
    }
}
