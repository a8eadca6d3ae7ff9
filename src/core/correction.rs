use chrono::{NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Deserializer};
use sqlx::SqlitePool;
use tracing::info;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::core::ledger;
use crate::core::locks::KeyedLocks;
use crate::error::{ServiceError, ServiceResult};
use crate::model::attendance::{AttendanceRecord, AttendanceStatus};
use crate::model::audit_log::{ACTION_CORRECTION, ACTION_DELETION, TARGET_ATTENDANCE};
use crate::model::role::Role;

/// Which record a correction targets: an existing row, or a (user, date)
/// key that may not have a row yet (manual entry for a missed day).
#[derive(Debug, Copy, Clone)]
pub enum RecordSelector {
    Id(i64),
    Key { user_id: i64, date: NaiveDate },
}

// "field": null clears, absent leaves untouched
fn double_option<'de, T, D>(de: D) -> Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Deserialize::deserialize(de).map(Some)
}

/// Any subset of the correctable fields. Time fields distinguish "not
/// provided" from an explicit null that clears the stored value.
#[derive(Debug, Default, Clone, Deserialize, ToSchema)]
pub struct RecordChanges {
    #[serde(default, deserialize_with = "double_option")]
    #[schema(example = "09:00:00", format = "time", value_type = Option<String>)]
    pub clock_in: Option<Option<NaiveTime>>,
    #[serde(default, deserialize_with = "double_option")]
    #[schema(example = "17:00:00", format = "time", value_type = Option<String>)]
    pub clock_out: Option<Option<NaiveTime>>,
    #[serde(default, deserialize_with = "double_option")]
    #[schema(example = "13:00:00", format = "time", value_type = Option<String>)]
    pub break_start: Option<Option<NaiveTime>>,
    #[serde(default, deserialize_with = "double_option")]
    #[schema(example = "14:00:00", format = "time", value_type = Option<String>)]
    pub break_end: Option<Option<NaiveTime>>,
    #[serde(default)]
    pub status: Option<AttendanceStatus>,
}

impl RecordChanges {
    pub fn is_empty(&self) -> bool {
        self.clock_in.is_none()
            && self.clock_out.is_none()
            && self.break_start.is_none()
            && self.break_end.is_none()
            && self.status.is_none()
    }
}

/// Privileged write path for administrators. Every mutation pairs with an
/// append-only audit entry in the same transaction; if either write fails,
/// neither lands.
#[derive(Clone)]
pub struct CorrectionAuditTrail {
    pool: SqlitePool,
    locks: KeyedLocks,
}

impl CorrectionAuditTrail {
    pub fn new(pool: SqlitePool, locks: KeyedLocks) -> Self {
        Self { pool, locks }
    }

    pub async fn correct(
        &self,
        admin_id: i64,
        selector: RecordSelector,
        changes: RecordChanges,
        reason: &str,
        ip_address: Option<String>,
    ) -> ServiceResult<AttendanceRecord> {
        let reason = reason.trim();
        if reason.is_empty() {
            return Err(ServiceError::Validation("reason is required".into()));
        }
        if changes.is_empty() {
            return Err(ServiceError::Validation("no fields provided for correction".into()));
        }

        // resolve the key before locking, so id-based corrections serialize
        // with clock events on the same record
        let (user_id, date) = match selector {
            RecordSelector::Id(id) => {
                let rec = ledger::fetch_by_id(&self.pool, id).await?.ok_or_else(|| {
                    ServiceError::NotFound(format!("attendance record {id} not found"))
                })?;
                (rec.user_id, rec.date)
            }
            RecordSelector::Key { user_id, date } => (user_id, date),
        };
        let _guard = self.locks.acquire(user_id, date).await?;

        let mut tx = self.pool.begin().await?;

        let old = sqlx::query_as::<_, AttendanceRecord>(
            "SELECT id, user_id, date, role, service_type, clock_in, clock_out, \
             break_start, break_end, status \
             FROM attendance WHERE user_id = ? AND date = ?",
        )
        .bind(user_id)
        .bind(date)
        .fetch_optional(&mut *tx)
        .await?;
        if old.is_none() {
            if let RecordSelector::Id(id) = selector {
                // deleted between resolution and lock acquisition
                return Err(ServiceError::NotFound(format!("attendance record {id} not found")));
            }
        }

        let base = match old.clone() {
            Some(rec) => rec,
            None => {
                let id = sqlx::query(
                    "INSERT INTO attendance (user_id, date, role, status) VALUES (?, ?, ?, ?)",
                )
                .bind(user_id)
                .bind(date)
                .bind(Role::User)
                .bind(AttendanceStatus::Normal)
                .execute(&mut *tx)
                .await?
                .last_insert_rowid();
                sqlx::query_as::<_, AttendanceRecord>(
                    "SELECT id, user_id, date, role, service_type, clock_in, clock_out, \
                     break_start, break_end, status FROM attendance WHERE id = ?",
                )
                .bind(id)
                .fetch_one(&mut *tx)
                .await?
            }
        };

        let clock_in = changes.clock_in.unwrap_or(base.clock_in);
        let clock_out = changes.clock_out.unwrap_or(base.clock_out);
        let break_start = changes.break_start.unwrap_or(base.break_start);
        let break_end = changes.break_end.unwrap_or(base.break_end);
        let status = changes.status.unwrap_or(base.status);

        // the correction path bypasses clock-event rules but must still
        // leave a structurally valid record behind
        if clock_out.is_some() && clock_in.is_none() {
            return Err(ServiceError::Validation("clock_out requires a clock_in".into()));
        }
        if break_end.is_some() && break_start.is_none() {
            return Err(ServiceError::Validation("break_end requires a break_start".into()));
        }

        sqlx::query(
            "UPDATE attendance SET clock_in = ?, clock_out = ?, break_start = ?, \
             break_end = ?, status = ? WHERE id = ?",
        )
        .bind(clock_in)
        .bind(clock_out)
        .bind(break_start)
        .bind(break_end)
        .bind(status)
        .bind(base.id)
        .execute(&mut *tx)
        .await?;

        let new = sqlx::query_as::<_, AttendanceRecord>(
            "SELECT id, user_id, date, role, service_type, clock_in, clock_out, \
             break_start, break_end, status FROM attendance WHERE id = ?",
        )
        .bind(base.id)
        .fetch_one(&mut *tx)
        .await?;

        let old_value = old
            .as_ref()
            .map(|r| serde_json::to_value(r).expect("attendance record serializes to json"));
        let new_value = serde_json::to_value(&new).expect("attendance record serializes to json");

        sqlx::query(
            "INSERT INTO audit_log \
             (id, admin_id, action_type, target_type, target_id, old_value, new_value, \
              reason, ip_address, created_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(Uuid::new_v4().to_string())
        .bind(admin_id)
        .bind(ACTION_CORRECTION)
        .bind(TARGET_ATTENDANCE)
        .bind(new.id.to_string())
        .bind(old_value)
        .bind(Some(new_value))
        .bind(reason)
        .bind(ip_address)
        .bind(Utc::now())
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        info!(admin_id, record_id = new.id, user_id, %date, "attendance correction applied");
        Ok(new)
    }

    /// Deletes a record with its break rows. Linked daily reports and staff
    /// comments are left in place and reported back as orphan warnings.
    pub async fn delete(
        &self,
        admin_id: i64,
        record_id: i64,
        reason: &str,
        ip_address: Option<String>,
    ) -> ServiceResult<Vec<String>> {
        let reason = reason.trim();
        if reason.is_empty() {
            return Err(ServiceError::Validation("reason is required".into()));
        }

        let rec = ledger::fetch_by_id(&self.pool, record_id).await?.ok_or_else(|| {
            ServiceError::NotFound(format!("attendance record {record_id} not found"))
        })?;
        let _guard = self.locks.acquire(rec.user_id, rec.date).await?;

        let mut tx = self.pool.begin().await?;

        let rec = sqlx::query_as::<_, AttendanceRecord>(
            "SELECT id, user_id, date, role, service_type, clock_in, clock_out, \
             break_start, break_end, status FROM attendance WHERE id = ?",
        )
        .bind(record_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| {
            ServiceError::NotFound(format!("attendance record {record_id} not found"))
        })?;

        let mut warnings = Vec::new();
        let reports: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM daily_reports WHERE attendance_id = ?")
                .bind(record_id)
                .fetch_one(&mut *tx)
                .await?;
        if reports > 0 {
            warnings.push(format!(
                "{reports} daily report(s) still reference the deleted attendance record"
            ));
        }
        let comments: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM staff_comments WHERE attendance_id = ?")
                .bind(record_id)
                .fetch_one(&mut *tx)
                .await?;
        if comments > 0 {
            warnings.push(format!(
                "{comments} staff comment(s) still reference the deleted attendance record"
            ));
        }

        sqlx::query("DELETE FROM break_records WHERE attendance_id = ?")
            .bind(record_id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM attendance WHERE id = ?")
            .bind(record_id)
            .execute(&mut *tx)
            .await?;

        let old_value =
            serde_json::to_value(&rec).expect("attendance record serializes to json");
        sqlx::query(
            "INSERT INTO audit_log \
             (id, admin_id, action_type, target_type, target_id, old_value, new_value, \
              reason, ip_address, created_at) \
             VALUES (?, ?, ?, ?, ?, ?, NULL, ?, ?, ?)",
        )
        .bind(Uuid::new_v4().to_string())
        .bind(admin_id)
        .bind(ACTION_DELETION)
        .bind(TARGET_ATTENDANCE)
        .bind(record_id.to_string())
        .bind(Some(old_value))
        .bind(reason)
        .bind(ip_address)
        .bind(Utc::now())
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        info!(admin_id, record_id, user_id = rec.user_id, "attendance record deleted");
        Ok(warnings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::ledger::AttendanceLedger;
    use crate::core::schedule::FixedStart;
    use crate::db::test_pool;
    use crate::model::audit_log::AuditEntry;
    use crate::model::role::ServiceType;
    use std::sync::Arc;
    use std::time::Duration;

    fn t(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 1, 5).unwrap()
    }

    async fn setup() -> (SqlitePool, AttendanceLedger, CorrectionAuditTrail) {
        let pool = test_pool().await;
        let locks = KeyedLocks::new(Duration::from_secs(5));
        let ledger = AttendanceLedger::new(
            pool.clone(),
            locks.clone(),
            Arc::new(FixedStart::new(None)),
            60,
        );
        let trail = CorrectionAuditTrail::new(pool.clone(), locks);
        (pool, ledger, trail)
    }

    async fn audit_entries(pool: &SqlitePool) -> Vec<AuditEntry> {
        sqlx::query_as::<_, AuditEntry>(
            "SELECT id, admin_id, action_type, target_type, target_id, old_value, new_value, \
             reason, ip_address, created_at FROM audit_log ORDER BY created_at",
        )
        .fetch_all(pool)
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn empty_reason_is_rejected() {
        let (_, _, trail) = setup().await;
        let changes = RecordChanges { status: Some(AttendanceStatus::Absence), ..Default::default() };
        match trail
            .correct(9, RecordSelector::Key { user_id: 1, date: date() }, changes, "  ", None)
            .await
        {
            Err(ServiceError::Validation(_)) => {}
            other => panic!("expected Validation, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn correcting_an_existing_record_writes_one_audit_entry() {
        let (pool, ledger, trail) = setup().await;
        let rec = ledger
            .clock_in(1, date(), t(9, 0), Role::User, Some(ServiceType::Home))
            .await
            .unwrap();

        let changes = RecordChanges {
            clock_out: Some(Some(t(15, 45))),
            status: Some(AttendanceStatus::Early),
            ..Default::default()
        };
        let updated = trail
            .correct(9, RecordSelector::Id(rec.id), changes, "forgot to clock out", None)
            .await
            .unwrap();
        assert_eq!(updated.clock_out, Some(t(15, 45)));
        assert_eq!(updated.status, AttendanceStatus::Early);

        let entries = audit_entries(&pool).await;
        assert_eq!(entries.len(), 1);
        let entry = &entries[0];
        assert_eq!(entry.admin_id, 9);
        assert_eq!(entry.action_type, ACTION_CORRECTION);
        assert_eq!(entry.target_id, rec.id.to_string());
        assert_eq!(entry.reason, "forgot to clock out");
        let old = entry.old_value.as_ref().unwrap();
        assert!(old["clock_out"].is_null());
        let new = entry.new_value.as_ref().unwrap();
        assert_eq!(new["clock_out"], "15:45:00");
    }

    #[tokio::test]
    async fn manual_entry_creates_the_record_with_a_null_old_snapshot() {
        let (pool, _, trail) = setup().await;
        let changes = RecordChanges {
            clock_in: Some(Some(t(9, 0))),
            clock_out: Some(Some(t(17, 0))),
            status: Some(AttendanceStatus::PaidLeave),
            ..Default::default()
        };
        let rec = trail
            .correct(
                9,
                RecordSelector::Key { user_id: 3, date: date() },
                changes,
                "manual entry",
                Some("192.0.2.10".into()),
            )
            .await
            .unwrap();
        assert_eq!(rec.user_id, 3);
        assert_eq!(rec.clock_in, Some(t(9, 0)));
        assert_eq!(rec.clock_out, Some(t(17, 0)));
        assert_eq!(rec.status, AttendanceStatus::PaidLeave);

        let entries = audit_entries(&pool).await;
        assert_eq!(entries.len(), 1);
        assert!(entries[0].old_value.is_none());
        assert_eq!(entries[0].ip_address.as_deref(), Some("192.0.2.10"));
    }

    #[tokio::test]
    async fn explicit_null_clears_a_field() {
        let (_, ledger, trail) = setup().await;
        let rec = ledger
            .clock_in(1, date(), t(9, 0), Role::User, Some(ServiceType::Home))
            .await
            .unwrap();
        ledger.clock_out(1, date(), t(15, 0), false).await.unwrap();

        let changes: RecordChanges =
            serde_json::from_value(serde_json::json!({ "clock_out": null })).unwrap();
        let updated = trail
            .correct(9, RecordSelector::Id(rec.id), changes, "clocked out by mistake", None)
            .await
            .unwrap();
        assert_eq!(updated.clock_out, None);
    }

    #[tokio::test]
    async fn structurally_invalid_corrections_are_rejected() {
        let (_, _, trail) = setup().await;
        let changes = RecordChanges { clock_out: Some(Some(t(17, 0))), ..Default::default() };
        match trail
            .correct(9, RecordSelector::Key { user_id: 4, date: date() }, changes, "x", None)
            .await
        {
            Err(ServiceError::Validation(_)) => {}
            other => panic!("expected Validation, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn correcting_a_missing_id_is_not_found() {
        let (_, _, trail) = setup().await;
        let changes = RecordChanges { status: Some(AttendanceStatus::Absence), ..Default::default() };
        match trail.correct(9, RecordSelector::Id(999), changes, "x", None).await {
            Err(ServiceError::NotFound(_)) => {}
            other => panic!("expected NotFound, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn failed_audit_write_rolls_back_the_record_mutation() {
        let (pool, ledger, trail) = setup().await;
        let rec = ledger
            .clock_in(1, date(), t(9, 0), Role::User, Some(ServiceType::Home))
            .await
            .unwrap();

        sqlx::query("DROP TABLE audit_log").execute(&pool).await.unwrap();
        let changes = RecordChanges {
            status: Some(AttendanceStatus::Absence),
            ..Default::default()
        };
        assert!(trail
            .correct(9, RecordSelector::Id(rec.id), changes, "should roll back", None)
            .await
            .is_err());

        let unchanged = ledger::fetch_by_id(&pool, rec.id).await.unwrap().unwrap();
        assert_eq!(unchanged.status, AttendanceStatus::Normal);
    }

    #[tokio::test]
    async fn delete_removes_the_record_and_reports_orphans() {
        let (pool, ledger, trail) = setup().await;
        let rec = ledger
            .clock_in(1, date(), t(9, 0), Role::User, Some(ServiceType::Home))
            .await
            .unwrap();
        sqlx::query("INSERT INTO daily_reports (attendance_id, body) VALUES (?, 'worked well')")
            .bind(rec.id)
            .execute(&pool)
            .await
            .unwrap();

        let warnings = trail.delete(9, rec.id, "entered for the wrong day", None).await.unwrap();
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].contains("daily report"));

        assert!(ledger::fetch_by_id(&pool, rec.id).await.unwrap().is_none());

        let entries = audit_entries(&pool).await;
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].action_type, ACTION_DELETION);
        assert!(entries[0].old_value.is_some());
        assert!(entries[0].new_value.is_none());

        match trail.delete(9, rec.id, "again", None).await {
            Err(ServiceError::NotFound(_)) => {}
            other => panic!("expected NotFound, got {other:?}"),
        }
    }
}
