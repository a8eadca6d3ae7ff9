use chrono::{NaiveDate, NaiveTime, Timelike};
use sqlx::SqlitePool;
use tracing::{info, warn};

use crate::core::ledger;
use crate::core::locks::KeyedLocks;
use crate::core::normalize::truncate_to_minute;
use crate::error::{ServiceError, ServiceResult};
use crate::model::attendance::{AttendanceRecord, WorkState};
use crate::model::break_record::{BreakRecord, BreakView};

const BREAK_COLUMNS: &str =
    "id, attendance_id, start_time, end_time, duration_minutes, auto_closed, deadline";

/// An open break in either representation: a worker `break_records` row or a
/// staff/admin window embedded in the attendance row.
pub(crate) enum OpenBreak {
    Worker(BreakRecord),
    Embedded(NaiveTime),
}

pub(crate) async fn fetch_break(
    pool: &SqlitePool,
    attendance_id: i64,
) -> ServiceResult<Option<BreakRecord>> {
    let sql = format!("SELECT {BREAK_COLUMNS} FROM break_records WHERE attendance_id = ? LIMIT 1");
    let rec = sqlx::query_as::<_, BreakRecord>(&sql)
        .bind(attendance_id)
        .fetch_optional(pool)
        .await?;
    Ok(rec)
}

pub(crate) async fn find_open(
    pool: &SqlitePool,
    record: &AttendanceRecord,
) -> ServiceResult<Option<OpenBreak>> {
    if let Some(br) = fetch_break(pool, record.id).await? {
        if br.end_time.is_none() {
            return Ok(Some(OpenBreak::Worker(br)));
        }
    }
    if let (Some(start), None) = (record.break_start, record.break_end) {
        return Ok(Some(OpenBreak::Embedded(start)));
    }
    Ok(None)
}

/// Break status for one record, same lookup for every caller: the worker
/// break row when one exists, the embedded window otherwise.
pub(crate) async fn view_for(
    pool: &SqlitePool,
    record: &AttendanceRecord,
) -> ServiceResult<BreakView> {
    if let Some(br) = fetch_break(pool, record.id).await? {
        return Ok(BreakView::from_record(&br));
    }
    Ok(BreakView::from_window(record.break_start, record.break_end))
}

fn deadline_for(start: NaiveTime, cap_minutes: i64) -> NaiveTime {
    let m = ((start.hour() * 60 + start.minute()) as i64 + cap_minutes).min(23 * 60 + 59) as u32;
    NaiveTime::from_hms_opt(m / 60, m % 60, 0).expect("minute count within a day")
}

fn duration_capped(start: NaiveTime, end: NaiveTime, cap_minutes: i64) -> i64 {
    (end - start).num_minutes().clamp(0, cap_minutes)
}

/// Closes an open break. Guarded updates (`... IS NULL`) keep the close
/// idempotent when a manual end races the sweep.
pub(crate) async fn close_open(
    pool: &SqlitePool,
    record: &AttendanceRecord,
    open: &OpenBreak,
    at: NaiveTime,
    auto_closed: bool,
    cap_minutes: i64,
) -> ServiceResult<BreakView> {
    match open {
        OpenBreak::Worker(br) => {
            let end = if auto_closed { br.deadline } else { truncate_to_minute(at) };
            let duration = duration_capped(br.start_time, end, cap_minutes);
            sqlx::query(
                "UPDATE break_records SET end_time = ?, duration_minutes = ?, auto_closed = ? \
                 WHERE id = ? AND end_time IS NULL",
            )
            .bind(end)
            .bind(duration)
            .bind(auto_closed)
            .bind(br.id)
            .execute(pool)
            .await?;
            let closed = fetch_break(pool, record.id)
                .await?
                .ok_or_else(|| ServiceError::NotFound("break record not found".into()))?;
            Ok(BreakView::from_record(&closed))
        }
        OpenBreak::Embedded(start) => {
            let end =
                if auto_closed { deadline_for(*start, cap_minutes) } else { truncate_to_minute(at) };
            sqlx::query("UPDATE attendance SET break_end = ? WHERE id = ? AND break_end IS NULL")
                .bind(end)
                .bind(record.id)
                .execute(pool)
                .await?;
            Ok(BreakView::from_window(Some(*start), Some(end)))
        }
    }
}

/// One rest break per attendance record per day, capped at the configured
/// minutes. Open breaks carry a persisted deadline swept by a background
/// task; nothing depends on an in-process timer surviving.
#[derive(Clone)]
pub struct BreakLifecycle {
    pool: SqlitePool,
    locks: KeyedLocks,
    cap_minutes: i64,
}

impl BreakLifecycle {
    pub fn new(pool: SqlitePool, locks: KeyedLocks, cap_minutes: i64) -> Self {
        Self { pool, locks, cap_minutes }
    }

    pub async fn start_break(
        &self,
        user_id: i64,
        date: NaiveDate,
        at: NaiveTime,
    ) -> ServiceResult<BreakView> {
        let _guard = self.locks.acquire(user_id, date).await?;

        let rec = ledger::fetch_by_key(&self.pool, user_id, date).await?.ok_or_else(|| {
            ServiceError::InvalidState(format!("user {user_id} has not clocked in on {date}"))
        })?;
        let prior = fetch_break(&self.pool, rec.id).await?;
        let worker_open = prior.as_ref().is_some_and(|b| b.end_time.is_none());
        match rec.work_state(worker_open) {
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
            WorkState::OnBreak => {
                return Err(ServiceError::InvalidState("a break is already open".into()));
            }
            WorkState::Working => {}
        }
        // one break per day, across both representations
        if prior.is_some() || rec.break_start.is_some() {
            return Err(ServiceError::BreakAlreadyTaken);
        }

        let start = truncate_to_minute(at);
        let view = if rec.role.is_worker() {
            let deadline = deadline_for(start, self.cap_minutes);
            sqlx::query(
                "INSERT INTO break_records (attendance_id, start_time, auto_closed, deadline) \
                 VALUES (?, ?, 0, ?)",
            )
            .bind(rec.id)
            .bind(start)
            .bind(deadline)
            .execute(&self.pool)
            .await?;
            let br = fetch_break(&self.pool, rec.id)
                .await?
                .ok_or_else(|| ServiceError::NotFound("break record not found".into()))?;
            BreakView::from_record(&br)
        } else {
            sqlx::query("UPDATE attendance SET break_start = ? WHERE id = ?")
                .bind(start)
                .bind(rec.id)
                .execute(&self.pool)
                .await?;
            BreakView::from_window(Some(start), None)
        };

        info!(user_id, %date, start_time = %start, "break started");
        Ok(view)
    }

    /// `auto_closed` ends at the persisted deadline rather than `at`. A
    /// manual end arriving after the sweep already closed the break observes
    /// the closed break and no-ops; a manual end with no break at all is an
    /// invalid state.
    pub async fn end_break(
        &self,
        user_id: i64,
        date: NaiveDate,
        at: NaiveTime,
        auto_closed: bool,
    ) -> ServiceResult<BreakView> {
        let _guard = self.locks.acquire(user_id, date).await?;

        let rec = ledger::fetch_by_key(&self.pool, user_id, date)
            .await?
            .ok_or_else(|| ServiceError::InvalidState("no break is open".into()))?;

        match find_open(&self.pool, &rec).await? {
            Some(open) => {
                let view =
                    close_open(&self.pool, &rec, &open, at, auto_closed, self.cap_minutes).await?;
                info!(user_id, %date, auto_closed, "break ended");
                Ok(view)
            }
            None => {
                if let Some(closed) = fetch_break(&self.pool, rec.id).await? {
                    if closed.auto_closed || auto_closed {
                        return Ok(BreakView::from_record(&closed));
                    }
                }
                if auto_closed && rec.break_start.is_some() && rec.break_end.is_some() {
                    return Ok(BreakView::from_window(rec.break_start, rec.break_end));
                }
                Err(ServiceError::InvalidState("no break is open".into()))
            }
        }
    }

    /// Closes every open break whose persisted deadline has passed, at its
    /// deadline. Runs from the background task; also safe to call directly
    /// and to run redundantly.
    pub async fn sweep_expired(&self, today: NaiveDate, now: NaiveTime) -> anyhow::Result<u64> {
        let mut closed = 0u64;

        let worker_rows = sqlx::query_as::<_, (i64, NaiveDate)>(
            "SELECT a.user_id, a.date FROM break_records br \
             JOIN attendance a ON a.id = br.attendance_id \
             WHERE br.end_time IS NULL AND (a.date < ? OR (a.date = ? AND br.deadline <= ?))",
        )
        .bind(today)
        .bind(today)
        .bind(now)
        .fetch_all(&self.pool)
        .await?;

        let embedded_rows = sqlx::query_as::<_, (i64, NaiveDate, NaiveTime)>(
            "SELECT user_id, date, break_start FROM attendance \
             WHERE break_start IS NOT NULL AND break_end IS NULL",
        )
        .fetch_all(&self.pool)
        .await?;
        let embedded_rows: Vec<(i64, NaiveDate)> = embedded_rows
            .into_iter()
            .filter(|(_, date, start)| {
                *date < today || deadline_for(*start, self.cap_minutes) <= now
            })
            .map(|(user_id, date, _)| (user_id, date))
            .collect();

        for (user_id, date) in worker_rows.into_iter().chain(embedded_rows) {
            match self.end_break(user_id, date, now, true).await {
                Ok(_) => closed += 1,
                // contended keys are picked up by the next sweep pass
                Err(ServiceError::Concurrency) => {
                    warn!(user_id, %date, "break sweep skipped a locked record");
                }
                Err(e) => {
                    warn!(user_id, %date, error = %e, "break sweep failed to close a break");
                }
            }
        }
        Ok(closed)
    }
}
