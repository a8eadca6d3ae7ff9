use std::sync::Arc;

use chrono::{NaiveDate, NaiveTime};
use sqlx::SqlitePool;
use tracing::info;

use crate::core::{breaks, normalize};
use crate::core::locks::KeyedLocks;
use crate::core::schedule::SchedulePolicy;
use crate::error::{ServiceError, ServiceResult};
use crate::model::attendance::{AttendanceRecord, AttendanceStatus, WorkState};
use crate::model::break_record::BreakView;
use crate::model::role::{Role, ServiceType};

const RECORD_COLUMNS: &str =
    "id, user_id, date, role, service_type, clock_in, clock_out, break_start, break_end, status";

pub(crate) async fn fetch_by_key(
    pool: &SqlitePool,
    user_id: i64,
    date: NaiveDate,
) -> ServiceResult<Option<AttendanceRecord>> {
    let sql = format!("SELECT {RECORD_COLUMNS} FROM attendance WHERE user_id = ? AND date = ?");
    let rec = sqlx::query_as::<_, AttendanceRecord>(&sql)
        .bind(user_id)
        .bind(date)
        .fetch_optional(pool)
        .await?;
    Ok(rec)
}

pub(crate) async fn fetch_by_id(
    pool: &SqlitePool,
    id: i64,
) -> ServiceResult<Option<AttendanceRecord>> {
    let sql = format!("SELECT {RECORD_COLUMNS} FROM attendance WHERE id = ?");
    let rec = sqlx::query_as::<_, AttendanceRecord>(&sql)
        .bind(id)
        .fetch_optional(pool)
        .await?;
    Ok(rec)
}

async fn require_by_id(pool: &SqlitePool, id: i64) -> ServiceResult<AttendanceRecord> {
    fetch_by_id(pool, id)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("attendance record {id} not found")))
}

/// Owns the per-(user, date) attendance record lifecycle. All clock events
/// go through here; historical edits go through the correction trail.
#[derive(Clone)]
pub struct AttendanceLedger {
    pool: SqlitePool,
    locks: KeyedLocks,
    schedule: Arc<dyn SchedulePolicy>,
    break_cap_minutes: i64,
}

impl AttendanceLedger {
    pub fn new(
        pool: SqlitePool,
        locks: KeyedLocks,
        schedule: Arc<dyn SchedulePolicy>,
        break_cap_minutes: i64,
    ) -> Self {
        Self { pool, locks, schedule, break_cap_minutes }
    }

    /// First clock event of the day creates the record. A row already
    /// carrying a clock-in rejects; a row created ahead of time by an
    /// administrator correction is filled in instead.
    pub async fn clock_in(
        &self,
        user_id: i64,
        date: NaiveDate,
        raw: NaiveTime,
        role: Role,
        service_type: Option<ServiceType>,
    ) -> ServiceResult<AttendanceRecord> {
        if role.is_worker() && service_type.is_none() {
            return Err(ServiceError::Validation(
                "service_type is required for worker clock-in".into(),
            ));
        }
        let _guard = self.locks.acquire(user_id, date).await?;

        let existing = fetch_by_key(&self.pool, user_id, date).await?;
        if let Some(rec) = &existing {
            if rec.clock_in.is_some() {
                return Err(ServiceError::AlreadyExists(format!(
                    "user {user_id} already clocked in on {date}"
                )));
            }
        }

        let normalized = normalize::normalize_clock_in(raw, role);
        let late = self
            .schedule
            .scheduled_start(user_id, date)
            .is_some_and(|start| normalized > start);
        let derived =
            if late { AttendanceStatus::Late } else { AttendanceStatus::Normal };

        let record = match existing {
            Some(rec) => {
                // leave admin-set day statuses alone
                let status = match rec.status {
                    AttendanceStatus::Absence | AttendanceStatus::PaidLeave => rec.status,
                    _ => derived,
                };
                sqlx::query(
                    "UPDATE attendance SET clock_in = ?, role = ?, service_type = ?, status = ? \
                     WHERE id = ?",
                )
                .bind(normalized)
                .bind(role)
                .bind(service_type)
                .bind(status)
                .bind(rec.id)
                .execute(&self.pool)
                .await?;
                require_by_id(&self.pool, rec.id).await?
            }
            None => {
                let id = sqlx::query(
                    "INSERT INTO attendance (user_id, date, role, service_type, clock_in, status) \
                     VALUES (?, ?, ?, ?, ?, ?)",
                )
                .bind(user_id)
                .bind(date)
                .bind(role)
                .bind(service_type)
                .bind(normalized)
                .bind(derived)
                .execute(&self.pool)
                .await?
                .last_insert_rowid();
                require_by_id(&self.pool, id).await?
            }
        };

        info!(user_id, %date, clock_in = %normalized, status = %record.status, "clock-in recorded");
        Ok(record)
    }

    /// Closes the day. An open break blocks the transition unless the caller
    /// explicitly asked to force-close it; the core never decides that alone.
    pub async fn clock_out(
        &self,
        user_id: i64,
        date: NaiveDate,
        raw: NaiveTime,
        force_close_break: bool,
    ) -> ServiceResult<AttendanceRecord> {
        let _guard = self.locks.acquire(user_id, date).await?;

        let rec = fetch_by_key(&self.pool, user_id, date).await?.ok_or_else(|| {
            ServiceError::InvalidState(format!("user {user_id} has not clocked in on {date}"))
        })?;
        let open = breaks::find_open(&self.pool, &rec).await?;
        match rec.work_state(open.is_some()) {
            WorkState::NotClockedIn => {
                return Err(ServiceError::InvalidState(format!(
                    "user {user_id} has not clocked in on {date}"
                )));
            }
            WorkState::ClockedOut => {
                return Err(ServiceError::InvalidState(format!(
                    "user {user_id} already clocked out on {date}"
                )));
            }
            WorkState::OnBreak if !force_close_break => {
                return Err(ServiceError::InvalidState(
                    "a break is still open; end it first or set force_close_break".into(),
                ));
            }
            WorkState::OnBreak => {
                if let Some(open) = open {
                    breaks::close_open(&self.pool, &rec, &open, raw, false, self.break_cap_minutes)
                        .await?;
                }
            }
            WorkState::Working => {}
        }

        let normalized = normalize::normalize_clock_out(raw, rec.role, rec.service_type);
        sqlx::query("UPDATE attendance SET clock_out = ? WHERE id = ?")
            .bind(normalized)
            .bind(rec.id)
            .execute(&self.pool)
            .await?;

        let record = require_by_id(&self.pool, rec.id).await?;
        info!(user_id, %date, clock_out = %normalized, "clock-out recorded");
        Ok(record)
    }

    pub async fn find(
        &self,
        user_id: i64,
        date: NaiveDate,
    ) -> ServiceResult<Option<AttendanceRecord>> {
        fetch_by_key(&self.pool, user_id, date).await
    }

    /// Day listing for the staff dashboard; break status is resolved through
    /// the same per-record lookup the break endpoints use.
    pub async fn search_day(
        &self,
        date: NaiveDate,
        role: Option<Role>,
        user_id: Option<i64>,
    ) -> ServiceResult<Vec<(AttendanceRecord, BreakView)>> {
        let mut sql =
            format!("SELECT {RECORD_COLUMNS} FROM attendance WHERE date = ?");
        if role.is_some() {
            sql.push_str(" AND role = ?");
        }
        if user_id.is_some() {
            sql.push_str(" AND user_id = ?");
        }
        sql.push_str(" ORDER BY user_id");

        let mut query = sqlx::query_as::<_, AttendanceRecord>(&sql).bind(date);
        if let Some(role) = role {
            query = query.bind(role);
        }
        if let Some(user_id) = user_id {
            query = query.bind(user_id);
        }
        let records = query.fetch_all(&self.pool).await?;

        let mut out = Vec::with_capacity(records.len());
        for rec in records {
            let view = breaks::view_for(&self.pool, &rec).await?;
            out.push((rec, view));
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::schedule::FixedStart;
    use crate::db::test_pool;
    use std::time::Duration;

    fn t(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 1, 5).unwrap()
    }

    async fn ledger(scheduled_start: Option<NaiveTime>) -> AttendanceLedger {
        AttendanceLedger::new(
            test_pool().await,
            KeyedLocks::new(Duration::from_secs(5)),
            Arc::new(FixedStart::new(scheduled_start)),
            60,
        )
    }

    #[tokio::test]
    async fn clock_in_creates_a_normalized_record() {
        let ledger = ledger(None).await;
        let rec = ledger
            .clock_in(1, date(), t(8, 50), Role::User, Some(ServiceType::Home))
            .await
            .unwrap();
        assert_eq!(rec.clock_in, Some(t(9, 0)));
        assert_eq!(rec.status, AttendanceStatus::Normal);
        assert_eq!(rec.work_state(false), crate::model::attendance::WorkState::Working);
    }

    #[tokio::test]
    async fn duplicate_clock_in_is_rejected() {
        let ledger = ledger(None).await;
        ledger
            .clock_in(1, date(), t(9, 0), Role::User, Some(ServiceType::Home))
            .await
            .unwrap();
        match ledger
            .clock_in(1, date(), t(9, 30), Role::User, Some(ServiceType::Home))
            .await
        {
            Err(ServiceError::AlreadyExists(_)) => {}
            other => panic!("expected AlreadyExists, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn worker_clock_in_requires_a_service_type() {
        let ledger = ledger(None).await;
        match ledger.clock_in(1, date(), t(9, 0), Role::User, None).await {
            Err(ServiceError::Validation(_)) => {}
            other => panic!("expected Validation, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn late_status_follows_the_configured_schedule() {
        let ledger = ledger(Some(t(10, 0))).await;
        let on_time = ledger
            .clock_in(1, date(), t(9, 55), Role::User, Some(ServiceType::Home))
            .await
            .unwrap();
        assert_eq!(on_time.clock_in, Some(t(10, 0)));
        assert_eq!(on_time.status, AttendanceStatus::Normal);

        let late = ledger
            .clock_in(2, date(), t(10, 16), Role::User, Some(ServiceType::Home))
            .await
            .unwrap();
        assert_eq!(late.clock_in, Some(t(10, 30)));
        assert_eq!(late.status, AttendanceStatus::Late);
    }

    #[tokio::test]
    async fn clock_out_without_clock_in_is_invalid() {
        let ledger = ledger(None).await;
        match ledger.clock_out(1, date(), t(15, 0), false).await {
            Err(ServiceError::InvalidState(_)) => {}
            other => panic!("expected InvalidState, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn clock_out_normalizes_and_terminates_the_day() {
        let ledger = ledger(None).await;
        ledger
            .clock_in(1, date(), t(8, 50), Role::User, Some(ServiceType::Home))
            .await
            .unwrap();
        let rec = ledger.clock_out(1, date(), t(15, 35), false).await.unwrap();
        assert_eq!(rec.clock_out, Some(t(15, 45)));
        assert_eq!(rec.work_state(false), crate::model::attendance::WorkState::ClockedOut);

        match ledger.clock_out(1, date(), t(16, 0), false).await {
            Err(ServiceError::InvalidState(_)) => {}
            other => panic!("expected InvalidState, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn commute_clock_out_in_lunch_window_bills_until_window_start() {
        let ledger = ledger(None).await;
        ledger
            .clock_in(1, date(), t(9, 0), Role::User, Some(ServiceType::Commute))
            .await
            .unwrap();
        let rec = ledger.clock_out(1, date(), t(12, 0), false).await.unwrap();
        assert_eq!(rec.clock_out, Some(t(11, 30)));
    }

    #[tokio::test]
    async fn staff_clock_events_are_stored_unrounded() {
        let ledger = ledger(None).await;
        let rec = ledger.clock_in(7, date(), t(8, 52), Role::Staff, None).await.unwrap();
        assert_eq!(rec.clock_in, Some(t(8, 52)));
        let rec = ledger.clock_out(7, date(), t(17, 3), false).await.unwrap();
        assert_eq!(rec.clock_out, Some(t(17, 3)));
    }

    #[tokio::test]
    async fn search_day_filters_by_role_and_user() {
        let ledger = ledger(None).await;
        ledger
            .clock_in(1, date(), t(9, 0), Role::User, Some(ServiceType::Home))
            .await
            .unwrap();
        ledger.clock_in(2, date(), t(8, 45), Role::Staff, None).await.unwrap();

        let all = ledger.search_day(date(), None, None).await.unwrap();
        assert_eq!(all.len(), 2);

        let staff_only = ledger.search_day(date(), Some(Role::Staff), None).await.unwrap();
        assert_eq!(staff_only.len(), 1);
        assert_eq!(staff_only[0].0.user_id, 2);

        let one = ledger.search_day(date(), None, Some(1)).await.unwrap();
        assert_eq!(one.len(), 1);
        assert_eq!(one[0].0.user_id, 1);
    }
}
