use chrono::{Months, NaiveDate};
use serde::Serialize;
use sqlx::SqlitePool;
use utoipa::ToSchema;

use crate::core::breaks;
use crate::error::{ServiceError, ServiceResult};
use crate::model::attendance::AttendanceRecord;

/// Derived per request from the month's attendance rows; never persisted or
/// cached beyond the request.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct MonthlySummary {
    #[schema(example = 1000)]
    pub user_id: i64,
    #[schema(example = 2026)]
    pub year: i32,
    #[schema(example = 1)]
    pub month: u32,
    #[schema(example = 20)]
    pub working_days: u32,
    #[schema(example = 115.25)]
    pub total_net_hours: f64,
}

/// Read-side projection over the ledger. Each day's net hours are rounded to
/// the nearest quarter hour before entering the monthly total.
#[derive(Clone)]
pub struct MonthlyAggregator {
    pool: SqlitePool,
    break_cap_minutes: i64,
}

fn round_quarter_hours(net_minutes: i64) -> f64 {
    (net_minutes as f64 / 15.0).round() * 0.25
}

impl MonthlyAggregator {
    pub fn new(pool: SqlitePool, break_cap_minutes: i64) -> Self {
        Self { pool, break_cap_minutes }
    }

    pub async fn compute_month(
        &self,
        user_id: i64,
        year: i32,
        month: u32,
    ) -> ServiceResult<(MonthlySummary, Vec<AttendanceRecord>)> {
        let first = NaiveDate::from_ymd_opt(year, month, 1)
            .ok_or_else(|| ServiceError::Validation(format!("invalid month {year}-{month}")))?;
        let last = first
            .checked_add_months(Months::new(1))
            .and_then(|d| d.pred_opt())
            .ok_or_else(|| ServiceError::Validation(format!("invalid month {year}-{month}")))?;

        let records = sqlx::query_as::<_, AttendanceRecord>(
            "SELECT id, user_id, date, role, service_type, clock_in, clock_out, \
             break_start, break_end, status \
             FROM attendance WHERE user_id = ? AND date >= ? AND date <= ? ORDER BY date",
        )
        .bind(user_id)
        .bind(first)
        .bind(last)
        .fetch_all(&self.pool)
        .await?;

        let mut working_days = 0u32;
        let mut total_net_hours = 0.0f64;
        for rec in &records {
            if rec.clock_in.is_some() {
                working_days += 1;
            }
            total_net_hours += self.day_net_hours(rec).await?;
        }

        Ok((
            MonthlySummary { user_id, year, month, working_days, total_net_hours },
            records,
        ))
    }

    /// A day missing either clock contributes zero hours. Closed staff/admin
    /// windows subtract the fixed cap; worker breaks subtract their recorded
    /// duration.
    async fn day_net_hours(&self, rec: &AttendanceRecord) -> ServiceResult<f64> {
        let (Some(clock_in), Some(clock_out)) = (rec.clock_in, rec.clock_out) else {
            return Ok(0.0);
        };
        let gross_minutes = (clock_out - clock_in).num_minutes().max(0);
        let net_minutes = (gross_minutes - self.break_minutes(rec).await?).max(0);
        Ok(round_quarter_hours(net_minutes))
    }

    async fn break_minutes(&self, rec: &AttendanceRecord) -> ServiceResult<i64> {
        if rec.role.is_worker() {
            if let Some(br) = breaks::fetch_break(&self.pool, rec.id).await? {
                return Ok(br.duration_minutes.unwrap_or(0));
            }
            // corrected worker breaks land in the embedded window
            if let (Some(start), Some(end)) = (rec.break_start, rec.break_end) {
                return Ok((end - start).num_minutes().clamp(0, self.break_cap_minutes));
            }
            Ok(0)
        } else {
            match (rec.break_start, rec.break_end) {
                (Some(_), Some(_)) => Ok(self.break_cap_minutes),
                _ => Ok(0),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::breaks::BreakLifecycle;
    use crate::core::ledger::AttendanceLedger;
    use crate::core::locks::KeyedLocks;
    use crate::core::schedule::FixedStart;
    use crate::db::test_pool;
    use crate::model::role::{Role, ServiceType};
    use chrono::NaiveTime;
    use std::sync::Arc;
    use std::time::Duration;

    fn t(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 1, d).unwrap()
    }

    async fn setup() -> (AttendanceLedger, BreakLifecycle, MonthlyAggregator) {
        let pool = test_pool().await;
        let locks = KeyedLocks::new(Duration::from_secs(5));
        let ledger = AttendanceLedger::new(
            pool.clone(),
            locks.clone(),
            Arc::new(FixedStart::new(None)),
            60,
        );
        let breaks = BreakLifecycle::new(pool.clone(), locks, 60);
        let aggregator = MonthlyAggregator::new(pool, 60);
        (ledger, breaks, aggregator)
    }

    #[test]
    fn quarter_rounding() {
        assert_eq!(round_quarter_hours(345), 5.75);
        assert_eq!(round_quarter_hours(360), 6.0);
        assert_eq!(round_quarter_hours(0), 0.0);
        assert_eq!(round_quarter_hours(7), 0.0);
        assert_eq!(round_quarter_hours(8), 0.25);
        assert_eq!(round_quarter_hours(22), 0.25);
        assert_eq!(round_quarter_hours(23), 0.5);
    }

    #[tokio::test]
    async fn empty_month_is_all_zero() {
        let (_, _, aggregator) = setup().await;
        let (summary, records) = aggregator.compute_month(1, 2026, 1).await.unwrap();
        assert_eq!(summary.working_days, 0);
        assert_eq!(summary.total_net_hours, 0.0);
        assert!(records.is_empty());
    }

    #[tokio::test]
    async fn invalid_month_is_a_validation_error() {
        let (_, _, aggregator) = setup().await;
        match aggregator.compute_month(1, 2026, 13).await {
            Err(ServiceError::Validation(_)) => {}
            other => panic!("expected Validation, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn full_worker_day_scenario() {
        // clock in 08:50 -> 09:00, break 13:00 auto-closed at 14:00,
        // clock out 15:35 -> 15:45, net = 6h45m - 1h = 5.75h
        let (ledger, breaks, aggregator) = setup().await;
        ledger
            .clock_in(1, day(5), t(8, 50), Role::User, Some(ServiceType::Home))
            .await
            .unwrap();
        breaks.start_break(1, day(5), t(13, 0)).await.unwrap();
        assert_eq!(breaks.sweep_expired(day(5), t(14, 0)).await.unwrap(), 1);
        ledger.clock_out(1, day(5), t(15, 35), false).await.unwrap();

        let (summary, records) = aggregator.compute_month(1, 2026, 1).await.unwrap();
        assert_eq!(summary.working_days, 1);
        assert_eq!(summary.total_net_hours, 5.75);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].clock_in, Some(t(9, 0)));
        assert_eq!(records[0].clock_out, Some(t(15, 45)));
    }

    #[tokio::test]
    async fn open_day_counts_as_working_but_contributes_no_hours() {
        let (ledger, _, aggregator) = setup().await;
        ledger
            .clock_in(1, day(5), t(9, 0), Role::User, Some(ServiceType::Home))
            .await
            .unwrap();
        ledger
            .clock_in(1, day(6), t(9, 0), Role::User, Some(ServiceType::Home))
            .await
            .unwrap();
        ledger.clock_out(1, day(6), t(15, 0), false).await.unwrap();

        let (summary, _) = aggregator.compute_month(1, 2026, 1).await.unwrap();
        assert_eq!(summary.working_days, 2);
        assert_eq!(summary.total_net_hours, 6.0);
    }

    #[tokio::test]
    async fn staff_closed_window_subtracts_the_fixed_cap() {
        let (ledger, breaks, aggregator) = setup().await;
        ledger.clock_in(7, day(5), t(9, 0), Role::Staff, None).await.unwrap();
        breaks.start_break(7, day(5), t(12, 0)).await.unwrap();
        breaks.end_break(7, day(5), t(12, 30), false).await.unwrap();
        ledger.clock_out(7, day(5), t(17, 0), false).await.unwrap();

        // 8h gross minus the fixed 60, not the actual 30
        let (summary, _) = aggregator.compute_month(7, 2026, 1).await.unwrap();
        assert_eq!(summary.total_net_hours, 7.0);
    }

    #[tokio::test]
    async fn monthly_total_sums_per_day_rounded_values() {
        let (ledger, _, aggregator) = setup().await;
        for d in [5u32, 6, 7] {
            ledger
                .clock_in(1, day(d), t(9, 0), Role::User, Some(ServiceType::Home))
                .await
                .unwrap();
            ledger.clock_out(1, day(d), t(15, 35), false).await.unwrap();
        }
        let (summary, _) = aggregator.compute_month(1, 2026, 1).await.unwrap();
        assert_eq!(summary.working_days, 3);
        assert_eq!(summary.total_net_hours, 3.0 * 6.75);
    }
}
