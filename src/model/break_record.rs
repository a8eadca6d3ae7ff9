use chrono::NaiveTime;
use serde::{Deserialize, Serialize};
use strum::Display;
use utoipa::ToSchema;

/// Worker rest break. The auto-close deadline is persisted at start so the
/// background sweep never depends on in-process timers.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
pub struct BreakRecord {
    #[schema(example = 1)]
    pub id: i64,
    #[schema(example = 1)]
    pub attendance_id: i64,
    #[schema(example = "13:00:00", format = "time", value_type = String)]
    pub start_time: NaiveTime,
    #[schema(example = "14:00:00", format = "time", value_type = Option<String>)]
    pub end_time: Option<NaiveTime>,
    #[schema(example = 60)]
    pub duration_minutes: Option<i64>,
    pub auto_closed: bool,
    #[schema(example = "14:00:00", format = "time", value_type = String)]
    pub deadline: NaiveTime,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, Serialize, Display, ToSchema)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum BreakState {
    None,
    Open,
    Closed,
}

/// Break summary attached to search and break-endpoint responses, one per
/// attendance record regardless of which representation holds the break.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct BreakView {
    pub state: BreakState,
    #[schema(example = "13:00:00", format = "time", value_type = Option<String>)]
    pub start_time: Option<NaiveTime>,
    #[schema(example = "14:00:00", format = "time", value_type = Option<String>)]
    pub end_time: Option<NaiveTime>,
    #[schema(example = 60)]
    pub duration_minutes: Option<i64>,
    pub auto_closed: bool,
}

impl BreakView {
    pub fn none() -> Self {
        Self {
            state: BreakState::None,
            start_time: None,
            end_time: None,
            duration_minutes: None,
            auto_closed: false,
        }
    }

    pub fn from_record(rec: &BreakRecord) -> Self {
        Self {
            state: if rec.end_time.is_some() { BreakState::Closed } else { BreakState::Open },
            start_time: Some(rec.start_time),
            end_time: rec.end_time,
            duration_minutes: rec.duration_minutes,
            auto_closed: rec.auto_closed,
        }
    }

    /// Staff/admin breaks embedded in the attendance row.
    pub fn from_window(start: Option<NaiveTime>, end: Option<NaiveTime>) -> Self {
        match (start, end) {
            (None, _) => Self::none(),
            (Some(s), None) => Self {
                state: BreakState::Open,
                start_time: Some(s),
                end_time: None,
                duration_minutes: None,
                auto_closed: false,
            },
            (Some(s), Some(e)) => Self {
                state: BreakState::Closed,
                start_time: Some(s),
                end_time: Some(e),
                duration_minutes: Some((e - s).num_minutes().max(0)),
                auto_closed: false,
            },
        }
    }
}
