use chrono::Utc;
use rusqlite::Connection;
use serde::Serialize;

use crate::db::queries;
use crate::errors::AppError;
use crate::models::{Booking, LeaveRequest, LeaveStatus, NewLeaveRequest};

pub fn request_leave(conn: &Connection, new: &NewLeaveRequest) -> Result<LeaveRequest, AppError> {
    if new.end_date < new.start_date {
        return Err(AppError::Validation(
            "end_date must not precede start_date".to_string(),
        ));
    }
    if queries::get_staff(conn, &new.staff_id)?.is_none() {
        return Err(AppError::NotFound(format!("staff {}", new.staff_id)));
    }

    let leave = LeaveRequest {
        id: uuid::Uuid::new_v4().to_string(),
        staff_id: new.staff_id.clone(),
        leave_type: new.leave_type,
        start_date: new.start_date,
        end_date: new.end_date,
        status: LeaveStatus::Pending,
        reason: new.reason.clone(),
        created_at: Utc::now().naive_utc(),
    };
    queries::create_leave_request(conn, &leave)?;
    tracing::info!(leave_id = %leave.id, staff_id = %leave.staff_id, "leave requested");
    Ok(leave)
}

#[derive(Debug, Clone, Serialize)]
pub struct LeaveDecision {
    pub leave: LeaveRequest,
    /// Live bookings already assigned to the staff member inside the period.
    pub affected_bookings: Vec<Booking>,
}

/// Approves or rejects a pending request.
pub fn decide_leave(
    conn: &Connection,
    id: &str,
    status: LeaveStatus,
) -> Result<LeaveDecision, AppError> {
    let leave = queries::get_leave_request(conn, id)?
        .ok_or_else(|| AppError::NotFound(format!("leave request {id}")))?;

    if leave.status != LeaveStatus::Pending {
        return Err(AppError::Conflict(format!(
            "leave request is already {}",
            leave.status.as_str()
        )));
    }

    queries::set_leave_status(conn, id, &status)?;

    let affected_bookings = if status == LeaveStatus::Approved {
        queries::get_staff_bookings_between(conn, &leave.staff_id, &leave.start_date, &leave.end_date)?
    } else {
        vec![]
    };

    if !affected_bookings.is_empty() {
        tracing::warn!(
            leave_id = id,
            staff_id = %leave.staff_id,
            bookings = affected_bookings.len(),
            "approved leave overlaps assigned bookings"
        );
    }

    Ok(LeaveDecision {
        leave: LeaveRequest { status, ..leave },
        affected_bookings,
    })
}
