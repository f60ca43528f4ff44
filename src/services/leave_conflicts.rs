//! Read-side checks of candidate booking dates against approved leave.
//!
//! Nothing here touches storage. Callers load the approved leave they care
//! about and block the assignment when a report has conflicts.

use chrono::NaiveDate;
use serde::Serialize;

use crate::models::ApprovedLeave;

/// The approved leave period covering `date` for `staff_id`, if any.
pub fn leave_covering<'a>(
    leaves: &'a [ApprovedLeave],
    staff_id: &str,
    date: NaiveDate,
) -> Option<&'a ApprovedLeave> {
    leaves
        .iter()
        .find(|leave| leave.staff_id == staff_id && leave.covers(date))
}

pub fn format_long_date(date: NaiveDate) -> String {
    date.format("%A, %-d %B %Y").to_string()
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct StaffConflictReport {
    pub date: NaiveDate,
    pub conflicting_staff_ids: Vec<String>,
    pub conflicts: Vec<ApprovedLeave>,
    pub message: String,
}

impl StaffConflictReport {
    pub fn has_conflicts(&self) -> bool {
        !self.conflicting_staff_ids.is_empty()
    }
}

/// Which of `staff_ids` are on approved leave on `date`.
pub fn check_staff_conflicts(
    leaves: &[ApprovedLeave],
    staff_ids: &[String],
    date: NaiveDate,
) -> StaffConflictReport {
    let mut conflicting_staff_ids: Vec<String> = Vec::new();
    let mut conflicts = Vec::new();

    for staff_id in staff_ids {
        if conflicting_staff_ids.contains(staff_id) {
            continue;
        }
        if let Some(leave) = leave_covering(leaves, staff_id, date) {
            conflicting_staff_ids.push(staff_id.clone());
            conflicts.push(leave.clone());
        }
    }

    let message = match conflicts.as_slice() {
        [] => String::new(),
        [only] => format!(
            "{} is on approved leave on {}",
            only.staff_name.as_deref().unwrap_or(&only.staff_id),
            format_long_date(date)
        ),
        many => format!(
            "{} staff members are on approved leave on {}",
            many.len(),
            format_long_date(date)
        ),
    };

    StaffConflictReport {
        date,
        conflicting_staff_ids,
        conflicts,
        message,
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct DateConflict {
    pub date: NaiveDate,
    pub day_name: String,
    pub formatted_date: String,
    pub leave: ApprovedLeave,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct RecurringConflictReport {
    pub staff_id: String,
    pub staff_name: String,
    pub available_dates: Vec<NaiveDate>,
    pub conflicts: Vec<DateConflict>,
    pub message: String,
}

impl RecurringConflictReport {
    pub fn has_conflicts(&self) -> bool {
        !self.conflicts.is_empty()
    }
}

/// Splits the candidate dates of a recurring booking into those the staff
/// member can take and those blocked by approved leave. Input order is kept.
pub fn check_recurring_conflicts(
    leaves: &[ApprovedLeave],
    staff_id: &str,
    staff_name: &str,
    dates: &[NaiveDate],
) -> RecurringConflictReport {
    let mut available_dates = Vec::new();
    let mut conflicts = Vec::new();

    for &date in dates {
        match leave_covering(leaves, staff_id, date) {
            Some(leave) => conflicts.push(DateConflict {
                date,
                day_name: date.format("%A").to_string(),
                formatted_date: format_long_date(date),
                leave: leave.clone(),
            }),
            None => available_dates.push(date),
        }
    }

    let message = match conflicts.as_slice() {
        [] => String::new(),
        [only] => format!(
            "{staff_name} is on approved leave on {}",
            only.formatted_date
        ),
        many => format!(
            "{staff_name} is on approved leave for {} of {} selected dates",
            many.len(),
            dates.len()
        ),
    };

    RecurringConflictReport {
        staff_id: staff_id.to_string(),
        staff_name: staff_name.to_string(),
        available_dates,
        conflicts,
        message,
    }
}
