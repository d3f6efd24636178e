//! IANA timezone helpers, used by the scheduler to work in Europe/Rome.

/// The zone the daily report scheduler fires in.
pub const REPORT_TIMEZONE: chrono_tz::Tz = chrono_tz::Europe::Rome;

/// True if `tz` parses as a known IANA timezone name.
pub fn is_valid_timezone(tz: &str) -> bool {
    if tz.eq_ignore_ascii_case("utc") {
        return true;
    }
    tz.parse::<chrono_tz::Tz>().is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recognises_rome() {
        assert!(is_valid_timezone("Europe/Rome"));
    }

    #[test]
    fn rejects_garbage() {
        assert!(!is_valid_timezone("Not/AZone"));
    }
}
