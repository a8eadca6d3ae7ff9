use chrono::{NaiveDate, NaiveTime};

/// Where the scheduled workday start comes from is deployment-specific
/// (facility workweek tables, per-user contracts), so lateness detection is
/// a policy the ledger asks, not a hard-coded boundary.
pub trait SchedulePolicy: Send + Sync {
    /// Scheduled start for this user on this date; `None` disables automatic
    /// late detection.
    fn scheduled_start(&self, user_id: i64, date: NaiveDate) -> Option<NaiveTime>;
}

/// Single facility-wide start time read from configuration.
pub struct FixedStart {
    start: Option<NaiveTime>,
}

impl FixedStart {
    pub fn new(start: Option<NaiveTime>) -> Self {
        Self { start }
    }
}

impl SchedulePolicy for FixedStart {
    fn scheduled_start(&self, _user_id: i64, _date: NaiveDate) -> Option<NaiveTime> {
        self.start
    }
}
