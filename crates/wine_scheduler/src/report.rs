//! Daily movements report, ported from
//! `core/scheduler.py::generate_daily_movements_report`: aggregate one
//! tenant's prior-day movements and render them as text.

use std::collections::HashMap;

use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use chrono_tz::Tz;
use sqlx::Row;

use wine_db::DbPool;
use wine_protocol::{Tenant, TenantTableKind, REPORT_TIMEZONE};

use crate::error::Result;

struct Movement {
    wine_name: String,
    movement_type: String,
    quantity_change: i64,
}

#[derive(Default)]
struct WineStats {
    consumi: i64,
    rifornimenti: i64,
}

/// UTC bounds of `report_date`'s calendar day in `tz`.
fn day_bounds_utc(report_date: NaiveDate, tz: Tz) -> (DateTime<Utc>, DateTime<Utc>) {
    let start_local = tz
        .from_local_datetime(&report_date.and_hms_opt(0, 0, 0).unwrap())
        .single()
        .expect("midnight is never ambiguous under DST");
    let end_local = tz
        .from_local_datetime(&report_date.and_hms_opt(23, 59, 59).unwrap())
        .single()
        .expect("23:59:59 is never ambiguous under DST");
    (start_local.with_timezone(&Utc), end_local.with_timezone(&Utc))
}

/// Render the textual report for one tenant's movements on `report_date`
/// (interpreted in the scheduler's timezone, `Europe/Rome`).
pub async fn generate_daily_report(
    pool: &DbPool,
    tenant: &Tenant,
    report_date: NaiveDate,
) -> Result<String> {
    let table = tenant.table_name(TenantTableKind::MovementsLog);
    let (start_utc, end_utc) = day_bounds_utc(report_date, REPORT_TIMEZONE);

    let rows = sqlx::query(&format!(
        r#"
        SELECT wine_name, movement_type, quantity_change
        FROM "{table}"
        WHERE occurred_at >= ? AND occurred_at <= ?
        ORDER BY occurred_at ASC
        "#
    ))
    .bind(start_utc)
    .bind(end_utc)
    .fetch_all(pool)
    .await?;

    let movements: Vec<Movement> = rows
        .into_iter()
        .map(|row| Movement {
            wine_name: row.get("wine_name"),
            movement_type: row.get("movement_type"),
            quantity_change: row.get("quantity_change"),
        })
        .collect();

    Ok(render_report(tenant, report_date, &movements))
}

fn render_report(tenant: &Tenant, report_date: NaiveDate, movements: &[Movement]) -> String {
    let date_str = report_date.format("%d/%m/%Y").to_string();

    if movements.is_empty() {
        return format!(
            "Movements report - {date_str}\n\
             Business: {}\n\n\
             No movements (consumption or restocking) were recorded for this day.",
            tenant.business_name
        );
    }

    let total_consumi: i64 = movements
        .iter()
        .filter(|m| m.movement_type == "consumo")
        .map(|m| m.quantity_change.abs())
        .sum();
    let total_rifornimenti: i64 = movements
        .iter()
        .filter(|m| m.movement_type == "rifornimento")
        .map(|m| m.quantity_change)
        .sum();
    let net_change = total_rifornimenti - total_consumi;

    let mut by_wine: HashMap<&str, WineStats> = HashMap::new();
    for m in movements {
        let entry = by_wine.entry(m.wine_name.as_str()).or_default();
        if m.movement_type == "consumo" {
            entry.consumi += m.quantity_change.abs();
        } else {
            entry.rifornimenti += m.quantity_change;
        }
    }

    let mut sorted_wines: Vec<(&str, &WineStats)> = by_wine.iter().map(|(k, v)| (*k, v)).collect();
    sorted_wines.sort_by(|a, b| {
        let total_a = a.1.consumi + a.1.rifornimenti;
        let total_b = b.1.consumi + b.1.rifornimenti;
        total_b.cmp(&total_a)
    });
    sorted_wines.truncate(10);

    let mut report = format!(
        "Movements report - {date_str}\n\
         Business: {}\n\n\
         General statistics\n\
         - Consumed: {total_consumi} bottles\n\
         - Restocked: {total_rifornimenti} bottles\n\
         - Net change: {net_change:+} bottles\n\
         - Total movements: {}\n\n\
         Per-wine detail\n",
        tenant.business_name,
        movements.len()
    );

    for (wine_name, stats) in sorted_wines {
        report.push_str(&format!("\n{wine_name}\n"));
        if stats.consumi > 0 {
            report.push_str(&format!("  Consumed: {} bottles\n", stats.consumi));
        }
        if stats.rifornimenti > 0 {
            report.push_str(&format!("  Restocked: {} bottles\n", stats.rifornimenti));
        }
    }

    report
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_day_produces_informative_message() {
        let tenant = Tenant::new(1, "Trattoria");
        let report = render_report(&tenant, NaiveDate::from_ymd_opt(2026, 7, 27).unwrap(), &[]);
        assert!(report.contains("No movements"));
    }

    #[test]
    fn aggregates_consumi_and_rifornimenti() {
        let tenant = Tenant::new(1, "Trattoria");
        let movements = vec![
            Movement {
                wine_name: "Barolo".to_string(),
                movement_type: "consumo".to_string(),
                quantity_change: -3,
            },
            Movement {
                wine_name: "Barolo".to_string(),
                movement_type: "rifornimento".to_string(),
                quantity_change: 12,
            },
            Movement {
                wine_name: "Chianti".to_string(),
                movement_type: "consumo".to_string(),
                quantity_change: -1,
            },
        ];
        let report = render_report(&tenant, NaiveDate::from_ymd_opt(2026, 7, 27).unwrap(), &movements);
        assert!(report.contains("Consumed: 4 bottles"));
        assert!(report.contains("Restocked: 12 bottles"));
        assert!(report.contains("Net change: +8 bottles"));
        assert!(report.contains("Barolo"));
    }

    #[test]
    fn day_bounds_span_the_full_local_calendar_day() {
        let (start, end) = day_bounds_utc(NaiveDate::from_ymd_opt(2026, 7, 27).unwrap(), REPORT_TIMEZONE);
        assert!(start < end);
        assert_eq!((end - start).num_seconds(), 24 * 3600 - 1);
    }
}
