//! Day-offset arithmetic used to move bookings between date windows.
//!
//! Everything here works on naive local timestamps. No timezone conversion
//! happens; source and target are assumed to share one local representation.

use chrono::{Days, NaiveDate, NaiveDateTime};

use crate::models::ReplicationMode;

/// Whole days from `source_start` to the date part of `original`.
/// Negative when `original` precedes the window.
pub fn offset_days(original: &NaiveDateTime, source_start: &NaiveDate) -> i64 {
    (original.date() - *source_start).num_days()
}

/// Re-anchors `original` so its day offset from `target_start` equals its
/// day offset from `source_start`. Time of day is copied verbatim.
pub fn recalculate(
    original: &NaiveDateTime,
    source_start: &NaiveDate,
    target_start: &NaiveDate,
) -> NaiveDateTime {
    let offset = offset_days(original, source_start);
    shift_date(target_start, offset).and_time(original.time())
}

fn shift_date(date: &NaiveDate, days: i64) -> NaiveDate {
    let magnitude = Days::new(days.unsigned_abs());
    let shifted = if days >= 0 {
        date.checked_add_days(magnitude)
    } else {
        date.checked_sub_days(magnitude)
    };
    // Only out of chrono's representable range (~262,000 years) does this
    // fall back to the unshifted date.
    shifted.unwrap_or(*date)
}

/// Week starts to replicate into: one for every mode but `recurring`, which
/// yields `recurring_weeks` consecutive weekly starts.
pub fn target_week_starts(
    mode: ReplicationMode,
    target_start: &NaiveDate,
    recurring_weeks: u32,
) -> Vec<NaiveDate> {
    match mode {
        ReplicationMode::Recurring => (0..recurring_weeks as i64)
            .map(|week| shift_date(target_start, week * 7))
            .collect(),
        ReplicationMode::Single | ReplicationMode::ThisWeek | ReplicationMode::Custom => {
            vec![*target_start]
        }
    }
}
