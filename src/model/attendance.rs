use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use utoipa::ToSchema;

use crate::model::role::{Role, ServiceType};

/// Day status of a record. `late` is derived at clock-in against the
/// configured schedule; `absence` and `paid_leave` only ever come from an
/// administrator correction.
#[derive(
    Debug, Copy, Clone, Eq, PartialEq, Serialize, Deserialize, Display, EnumString, sqlx::Type, ToSchema,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum AttendanceStatus {
    Normal,
    Late,
    Early,
    Absence,
    PaidLeave,
}

/// One attendance record per (user, date). `clock_out` stays null while the
/// day is open; staff/admin breaks are embedded as `break_start`/`break_end`,
/// worker breaks live in `break_records`.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
pub struct AttendanceRecord {
    #[schema(example = 1)]
    pub id: i64,
    #[schema(example = 1000)]
    pub user_id: i64,
    #[schema(example = "2026-01-05", format = "date", value_type = String)]
    pub date: NaiveDate,
    pub role: Role,
    pub service_type: Option<ServiceType>,
    #[schema(example = "09:00:00", format = "time", value_type = Option<String>)]
    pub clock_in: Option<NaiveTime>,
    #[schema(example = "15:45:00", format = "time", value_type = Option<String>)]
    pub clock_out: Option<NaiveTime>,
    #[schema(example = "13:00:00", format = "time", value_type = Option<String>)]
    pub break_start: Option<NaiveTime>,
    #[schema(example = "14:00:00", format = "time", value_type = Option<String>)]
    pub break_end: Option<NaiveTime>,
    pub status: AttendanceStatus,
}

/// Explicit day state machine. Terminal once clocked out; after that only
/// the correction path may touch the record.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Serialize, Display, ToSchema)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum WorkState {
    NotClockedIn,
    Working,
    OnBreak,
    ClockedOut,
}

impl AttendanceRecord {
    /// Derives the state for this record. `open_worker_break` reports whether
    /// an open `break_records` row exists (worker role only).
    pub fn work_state(&self, open_worker_break: bool) -> WorkState {
        if self.clock_in.is_none() {
            return WorkState::NotClockedIn;
        }
        if self.clock_out.is_some() {
            return WorkState::ClockedOut;
        }
        let embedded_open = self.break_start.is_some() && self.break_end.is_none();
        if embedded_open || open_worker_break {
            WorkState::OnBreak
        } else {
            WorkState::Working
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(
        clock_in: Option<&str>,
        clock_out: Option<&str>,
        break_start: Option<&str>,
        break_end: Option<&str>,
    ) -> AttendanceRecord {
        let t = |s: &str| NaiveTime::parse_from_str(s, "%H:%M").unwrap();
        AttendanceRecord {
            id: 1,
            user_id: 1,
            date: NaiveDate::from_ymd_opt(2026, 1, 5).unwrap(),
            role: Role::User,
            service_type: Some(ServiceType::Home),
            clock_in: clock_in.map(t),
            clock_out: clock_out.map(t),
            break_start: break_start.map(t),
            break_end: break_end.map(t),
            status: AttendanceStatus::Normal,
        }
    }

    #[test]
    fn state_follows_record_fields() {
        assert_eq!(record(None, None, None, None).work_state(false), WorkState::NotClockedIn);
        assert_eq!(record(Some("09:00"), None, None, None).work_state(false), WorkState::Working);
        assert_eq!(record(Some("09:00"), None, None, None).work_state(true), WorkState::OnBreak);
        assert_eq!(
            record(Some("09:00"), None, Some("13:00"), None).work_state(false),
            WorkState::OnBreak
        );
        assert_eq!(
            record(Some("09:00"), None, Some("13:00"), Some("13:30")).work_state(false),
            WorkState::Working
        );
        assert_eq!(
            record(Some("09:00"), Some("15:45"), None, None).work_state(false),
            WorkState::ClockedOut
        );
    }
}
