//! Billing-boundary normalization of raw clock times.
//!
//! Worker times are snapped to the facility's service billing boundaries;
//! staff and admin times only lose their seconds. All arithmetic is in
//! minutes since midnight and total over 00:00-23:59.

use chrono::{NaiveTime, Timelike};

use crate::model::role::{Role, ServiceType};

const STEP: u32 = 15;
/// Lunch window, inclusive both ends.
const LUNCH_START: u32 = 11 * 60 + 30;
const LUNCH_END: u32 = 12 * 60 + 30;
/// Billable day boundaries for workers.
const DAY_START: u32 = 9 * 60;
const DAY_END: u32 = 15 * 60 + 45;
const LAST_FLOOR: u32 = 15 * 60 + 29;

fn to_minutes(t: NaiveTime) -> u32 {
    t.hour() * 60 + t.minute()
}

fn from_minutes(m: u32) -> NaiveTime {
    let m = m.min(23 * 60 + 59);
    NaiveTime::from_hms_opt(m / 60, m % 60, 0).expect("minute count within a day")
}

fn in_lunch_window(m: u32) -> bool {
    (LUNCH_START..=LUNCH_END).contains(&m)
}

fn ceil_to_step(m: u32) -> u32 {
    (m + STEP - 1) / STEP * STEP
}

fn floor_to_step(m: u32) -> u32 {
    m / STEP * STEP
}

/// Drops seconds; clock events are minute-resolution.
pub fn truncate_to_minute(t: NaiveTime) -> NaiveTime {
    NaiveTime::from_hms_opt(t.hour(), t.minute(), 0).expect("hour/minute taken from a valid time")
}

/// Canonical clock-in time. Arrivals inside the lunch window (or rounding
/// into it) start billing after lunch; early arrivals start at day start;
/// anything else rounds up to the next quarter hour.
pub fn normalize_clock_in(raw: NaiveTime, role: Role) -> NaiveTime {
    if !role.is_worker() {
        return truncate_to_minute(raw);
    }
    let m = to_minutes(raw);
    let normalized = if in_lunch_window(m) {
        LUNCH_END
    } else if m < DAY_START {
        DAY_START
    } else {
        let ceiled = ceil_to_step(m);
        if in_lunch_window(ceiled) { LUNCH_END } else { ceiled }
    };
    from_minutes(normalized)
}

/// Canonical clock-out time. Commute-type departures inside the lunch window
/// bill until the window start; otherwise round down to the previous quarter
/// hour, with everything from 15:30 pinned to the day end.
pub fn normalize_clock_out(raw: NaiveTime, role: Role, service_type: Option<ServiceType>) -> NaiveTime {
    if !role.is_worker() {
        return truncate_to_minute(raw);
    }
    let m = to_minutes(raw);
    let normalized = if service_type == Some(ServiceType::Commute) && in_lunch_window(m) {
        LUNCH_START
    } else if m <= LAST_FLOOR {
        floor_to_step(m)
    } else {
        DAY_END
    };
    from_minutes(normalized)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    #[test]
    fn clock_in_lunch_window_is_pinned_to_window_end() {
        for m in (11 * 60 + 30)..=(12 * 60 + 30) {
            assert_eq!(normalize_clock_in(t(m / 60, m % 60), Role::User), t(12, 30), "at {m}");
        }
    }

    #[test]
    fn clock_in_early_arrivals_start_at_nine() {
        assert_eq!(normalize_clock_in(t(8, 55), Role::User), t(9, 0));
        assert_eq!(normalize_clock_in(t(0, 0), Role::User), t(9, 0));
        assert_eq!(normalize_clock_in(t(8, 59), Role::User), t(9, 0));
    }

    #[test]
    fn clock_in_rounds_up_to_quarter_hour() {
        assert_eq!(normalize_clock_in(t(9, 0), Role::User), t(9, 0));
        assert_eq!(normalize_clock_in(t(9, 1), Role::User), t(9, 15));
        assert_eq!(normalize_clock_in(t(9, 7), Role::User), t(9, 15));
        assert_eq!(normalize_clock_in(t(9, 15), Role::User), t(9, 15));
        assert_eq!(normalize_clock_in(t(12, 31), Role::User), t(12, 45));
        assert_eq!(normalize_clock_in(t(14, 46), Role::User), t(15, 0));
    }

    #[test]
    fn clock_in_rounding_into_the_window_lands_after_lunch() {
        // 11:16-11:29 would ceil to 11:30, which the window swallows
        assert_eq!(normalize_clock_in(t(11, 16), Role::User), t(12, 30));
        assert_eq!(normalize_clock_in(t(11, 29), Role::User), t(12, 30));
        assert_eq!(normalize_clock_in(t(11, 15), Role::User), t(11, 15));
    }

    #[test]
    fn clock_in_is_idempotent_over_the_whole_day() {
        for m in 0..(24 * 60) {
            let once = normalize_clock_in(t(m / 60, m % 60), Role::User);
            assert_eq!(normalize_clock_in(once, Role::User), once, "at minute {m}");
        }
    }

    #[test]
    fn clock_out_commute_lunch_window_bills_until_window_start() {
        assert_eq!(
            normalize_clock_out(t(12, 0), Role::User, Some(ServiceType::Commute)),
            t(11, 30)
        );
        assert_eq!(
            normalize_clock_out(t(12, 30), Role::User, Some(ServiceType::Commute)),
            t(11, 30)
        );
        // home-type ignores the window rule and floors instead
        assert_eq!(normalize_clock_out(t(12, 0), Role::User, Some(ServiceType::Home)), t(12, 0));
        assert_eq!(normalize_clock_out(t(12, 10), Role::User, Some(ServiceType::Home)), t(12, 0));
    }

    #[test]
    fn clock_out_floors_until_late_afternoon_cap() {
        assert_eq!(normalize_clock_out(t(15, 10), Role::User, Some(ServiceType::Home)), t(15, 0));
        assert_eq!(normalize_clock_out(t(15, 29), Role::User, Some(ServiceType::Home)), t(15, 15));
        assert_eq!(normalize_clock_out(t(15, 30), Role::User, Some(ServiceType::Home)), t(15, 45));
        assert_eq!(normalize_clock_out(t(15, 40), Role::User, Some(ServiceType::Home)), t(15, 45));
        assert_eq!(normalize_clock_out(t(23, 59), Role::User, Some(ServiceType::Home)), t(15, 45));
    }

    #[test]
    fn clock_out_is_idempotent_over_the_whole_day() {
        for st in [Some(ServiceType::Commute), Some(ServiceType::Home), None] {
            for m in 0..(24 * 60) {
                let once = normalize_clock_out(t(m / 60, m % 60), Role::User, st);
                assert_eq!(normalize_clock_out(once, Role::User, st), once, "at minute {m}");
            }
        }
    }

    #[test]
    fn staff_and_admin_times_pass_through_unrounded() {
        let raw = NaiveTime::from_hms_opt(8, 52, 31).unwrap();
        assert_eq!(normalize_clock_in(raw, Role::Staff), t(8, 52));
        assert_eq!(normalize_clock_in(raw, Role::Admin), t(8, 52));
        assert_eq!(normalize_clock_out(raw, Role::Staff, None), t(8, 52));
    }
}
