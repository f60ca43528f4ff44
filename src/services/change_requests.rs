use chrono::{NaiveDateTime, Utc};
use rusqlite::Connection;
use serde::Deserialize;

use crate::db::queries;
use crate::errors::AppError;
use crate::models::{Booking, BookingStatus, ChangeKind, ChangeRequest, ChangeRequestStatus};
use crate::services::bookings;

#[derive(Debug, Clone, Deserialize)]
pub struct NewChangeRequest {
    pub kind: ChangeKind,
    pub new_start_time: Option<NaiveDateTime>,
    pub new_end_time: Option<NaiveDateTime>,
    pub reason: Option<String>,
    pub requested_by: String,
}

pub fn submit(
    conn: &Connection,
    booking_id: &str,
    new: &NewChangeRequest,
) -> Result<ChangeRequest, AppError> {
    if new.requested_by.trim().is_empty() {
        return Err(AppError::Validation("requested_by is required".to_string()));
    }

    let booking = bookings::get_booking(conn, booking_id)?;
    if matches!(booking.status, BookingStatus::Done | BookingStatus::Cancelled) {
        return Err(AppError::Conflict(format!(
            "booking is already {}",
            booking.status.as_str()
        )));
    }

    if new.kind == ChangeKind::Reschedule {
        match (new.new_start_time, new.new_end_time) {
            (Some(start), Some(end)) if end > start => {}
            (Some(_), Some(_)) => {
                return Err(AppError::Validation(
                    "new_end_time must be after new_start_time".to_string(),
                ))
            }
            _ => {
                return Err(AppError::Validation(
                    "reschedule requires new_start_time and new_end_time".to_string(),
                ))
            }
        }
    }

    let request = ChangeRequest {
        id: uuid::Uuid::new_v4().to_string(),
        booking_id: booking_id.to_string(),
        kind: new.kind,
        new_start_time: new.new_start_time,
        new_end_time: new.new_end_time,
        reason: new.reason.clone(),
        requested_by: new.requested_by.clone(),
        status: ChangeRequestStatus::Pending,
        created_at: Utc::now().naive_utc(),
        resolved_at: None,
    };
    queries::create_change_request(conn, &request)?;
    tracing::info!(request_id = %request.id, booking_id, kind = request.kind.as_str(), "change request submitted");
    Ok(request)
}

fn load_pending(conn: &Connection, id: &str) -> Result<ChangeRequest, AppError> {
    let request = queries::get_change_request(conn, id)?
        .ok_or_else(|| AppError::NotFound(format!("change request {id}")))?;
    if request.status != ChangeRequestStatus::Pending {
        return Err(AppError::Conflict(format!(
            "change request is already {}",
            request.status.as_str()
        )));
    }
    Ok(request)
}

/// Applies the requested change to its booking and marks the request
/// approved, atomically. Reschedules are checked against approved leave of
/// the assigned staff member.
pub fn approve(conn: &Connection, id: &str) -> Result<Booking, AppError> {
    let request = load_pending(conn, id)?;
    let booking = bookings::get_booking(conn, &request.booking_id)?;

    let tx = conn.unchecked_transaction()?;
    match request.kind {
        ChangeKind::Cancel => {
            if !booking.status.can_transition_to(BookingStatus::Cancelled) {
                return Err(AppError::Conflict(format!(
                    "booking is already {}",
                    booking.status.as_str()
                )));
            }
            queries::update_booking_status(&tx, &booking.id, &BookingStatus::Cancelled)?;
        }
        ChangeKind::Reschedule => {
            let (Some(start), Some(end)) = (request.new_start_time, request.new_end_time) else {
                return Err(AppError::Validation(
                    "reschedule request has no new times".to_string(),
                ));
            };
            if booking.status != BookingStatus::Scheduled {
                return Err(AppError::Conflict(format!(
                    "only scheduled bookings can be rescheduled, booking is {}",
                    booking.status.as_str()
                )));
            }
            if let Some(staff_id) = booking.staff_id.as_deref() {
                bookings::ensure_staff_available(&tx, staff_id, start.date())?;
            }
            queries::update_booking_times(&tx, &booking.id, &start, &end)?;
        }
    }
    queries::resolve_change_request(&tx, id, &ChangeRequestStatus::Approved)?;
    tx.commit()?;

    tracing::info!(request_id = id, booking_id = %booking.id, kind = request.kind.as_str(), "change request approved");
    bookings::get_booking(conn, &booking.id)
}

pub fn reject(conn: &Connection, id: &str) -> Result<ChangeRequest, AppError> {
    load_pending(conn, id)?;
    queries::resolve_change_request(conn, id, &ChangeRequestStatus::Rejected)?;
    tracing::info!(request_id = id, "change request rejected");
    queries::get_change_request(conn, id)?
        .ok_or_else(|| AppError::NotFound(format!("change request {id}")))
}
