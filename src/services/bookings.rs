use std::sync::Mutex;

use chrono::{Duration, NaiveDate, NaiveTime, Utc};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};

use crate::cache::BookingCache;
use crate::db::queries;
use crate::errors::AppError;
use crate::models::{Booking, BookingStatus, NewBooking};
use crate::services::leave_conflicts::{self, DateConflict};

pub fn validate_new_booking(new: &NewBooking) -> Result<(), AppError> {
    if new.branch_id.trim().is_empty() {
        return Err(AppError::Validation("branch_id is required".to_string()));
    }
    if new.client_id.trim().is_empty() {
        return Err(AppError::Validation("client_id is required".to_string()));
    }
    if new.end_time <= new.start_time {
        return Err(AppError::Validation(
            "end_time must be after start_time".to_string(),
        ));
    }
    Ok(())
}

/// Rejects the assignment when `staff_id` is on approved leave on `date`.
pub fn ensure_staff_available(
    conn: &Connection,
    staff_id: &str,
    date: NaiveDate,
) -> Result<(), AppError> {
    let staff_ids = [staff_id.to_string()];
    let leaves = queries::get_approved_leave(conn, &staff_ids)?;
    let report = leave_conflicts::check_staff_conflicts(&leaves, &staff_ids, date);
    if report.has_conflicts() {
        tracing::info!(staff_id, %date, "assignment blocked by approved leave");
        return Err(AppError::Conflict(report.message));
    }
    Ok(())
}

pub fn create_booking(conn: &Connection, new: &NewBooking) -> Result<Booking, AppError> {
    validate_new_booking(new)?;

    if let Some(staff_id) = new.staff_id.as_deref() {
        ensure_staff_available(conn, staff_id, new.start_time.date())?;
    }

    let now = Utc::now().naive_utc();
    let booking = Booking {
        id: uuid::Uuid::new_v4().to_string(),
        branch_id: new.branch_id.clone(),
        client_id: new.client_id.clone(),
        staff_id: new.staff_id.clone(),
        service_id: new.service_ids.first().cloned(),
        start_time: new.start_time,
        end_time: new.end_time,
        status: BookingStatus::Scheduled,
        notes: new.notes.clone(),
        revenue_cents: new.revenue_cents,
        payment_terms: new.payment_terms.clone(),
        created_at: now,
        updated_at: now,
    };

    let tx = conn.unchecked_transaction()?;
    queries::insert_booking(&tx, &booking)?;
    if new.service_ids.len() > 1 {
        queries::insert_booking_services(&tx, &booking.id, &new.service_ids)?;
    }
    tx.commit()?;

    tracing::info!(booking_id = %booking.id, branch_id = %booking.branch_id, "booking created");
    get_booking(conn, &booking.id)
}

#[derive(Debug, Clone, Deserialize)]
pub struct RecurringBookingRequest {
    pub branch_id: String,
    pub client_id: String,
    pub staff_id: Option<String>,
    #[serde(default)]
    pub service_ids: Vec<String>,
    pub dates: Vec<NaiveDate>,
    pub start_time: NaiveTime,
    pub duration_minutes: i64,
    pub notes: Option<String>,
    pub revenue_cents: Option<i64>,
    pub payment_terms: Option<String>,
    /// Create the non-conflicting dates instead of rejecting the whole series.
    #[serde(default)]
    pub skip_conflicting: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct RecurringBookingResult {
    pub created_booking_ids: Vec<String>,
    pub skipped: Vec<DateConflict>,
}

pub fn create_recurring_bookings(
    conn: &Connection,
    req: &RecurringBookingRequest,
) -> Result<RecurringBookingResult, AppError> {
    if req.dates.is_empty() {
        return Err(AppError::Validation("at least one date is required".to_string()));
    }
    if req.duration_minutes <= 0 {
        return Err(AppError::Validation(
            "duration_minutes must be positive".to_string(),
        ));
    }

    let (dates, skipped) = match req.staff_id.as_deref() {
        Some(staff_id) => {
            let staff_name = queries::get_staff(conn, staff_id)?
                .map(|s| s.display_name())
                .unwrap_or_else(|| staff_id.to_string());
            let leaves = queries::get_approved_leave(conn, &[staff_id.to_string()])?;
            let report =
                leave_conflicts::check_recurring_conflicts(&leaves, staff_id, &staff_name, &req.dates);
            if report.has_conflicts() && !req.skip_conflicting {
                return Err(AppError::Conflict(report.message));
            }
            (report.available_dates, report.conflicts)
        }
        None => (req.dates.clone(), vec![]),
    };

    let duration = Duration::minutes(req.duration_minutes);
    let tx = conn.unchecked_transaction()?;
    let mut created_booking_ids = Vec::with_capacity(dates.len());
    for date in dates {
        let new = NewBooking {
            branch_id: req.branch_id.clone(),
            client_id: req.client_id.clone(),
            staff_id: req.staff_id.clone(),
            service_ids: req.service_ids.clone(),
            start_time: date.and_time(req.start_time),
            end_time: date.and_time(req.start_time) + duration,
            notes: req.notes.clone(),
            revenue_cents: req.revenue_cents,
            payment_terms: req.payment_terms.clone(),
        };
        validate_new_booking(&new)?;

        let now = Utc::now().naive_utc();
        let booking = Booking {
            id: uuid::Uuid::new_v4().to_string(),
            branch_id: new.branch_id,
            client_id: new.client_id,
            staff_id: new.staff_id,
            service_id: new.service_ids.first().cloned(),
            start_time: new.start_time,
            end_time: new.end_time,
            status: BookingStatus::Scheduled,
            notes: new.notes,
            revenue_cents: new.revenue_cents,
            payment_terms: new.payment_terms,
            created_at: now,
            updated_at: now,
        };
        queries::insert_booking(&tx, &booking)?;
        if new.service_ids.len() > 1 {
            queries::insert_booking_services(&tx, &booking.id, &new.service_ids)?;
        }
        created_booking_ids.push(booking.id);
    }
    tx.commit()?;

    tracing::info!(
        branch_id = %req.branch_id,
        created = created_booking_ids.len(),
        skipped = skipped.len(),
        "recurring bookings created"
    );

    Ok(RecurringBookingResult {
        created_booking_ids,
        skipped,
    })
}

pub fn get_booking(conn: &Connection, id: &str) -> Result<Booking, AppError> {
    queries::get_booking_by_id(conn, id)?
        .ok_or_else(|| AppError::NotFound(format!("booking {id}")))
}

pub fn change_status(
    conn: &Connection,
    id: &str,
    status: BookingStatus,
) -> Result<Booking, AppError> {
    let booking = get_booking(conn, id)?;
    if !booking.status.can_transition_to(status) {
        return Err(AppError::Conflict(format!(
            "cannot move booking from {} to {}",
            booking.status.as_str(),
            status.as_str()
        )));
    }

    queries::update_booking_status(conn, id, &status)?;
    tracing::info!(booking_id = id, from = booking.status.as_str(), to = status.as_str(), "booking status changed");
    get_booking(conn, id)
}

/// Sets or clears the staff member on a live booking.
pub fn assign_staff(
    conn: &Connection,
    id: &str,
    staff_id: Option<&str>,
) -> Result<Booking, AppError> {
    let booking = get_booking(conn, id)?;
    if matches!(booking.status, BookingStatus::Done | BookingStatus::Cancelled) {
        return Err(AppError::Conflict(format!(
            "booking is already {}",
            booking.status.as_str()
        )));
    }

    if let Some(staff_id) = staff_id {
        ensure_staff_available(conn, staff_id, booking.start_time.date())?;
    }

    queries::update_booking_staff(conn, id, staff_id)?;
    get_booking(conn, id)
}

/// Branch bookings served from the read cache, loading the branch on a miss.
pub fn list_branch_bookings(
    db: &Mutex<Connection>,
    cache: &BookingCache,
    branch_id: &str,
) -> anyhow::Result<Vec<Booking>> {
    if let Some(bookings) = cache.get_branch(branch_id) {
        return Ok(bookings);
    }

    let generation = cache.generation(branch_id);
    let bookings = {
        let conn = db.lock().unwrap();
        queries::get_bookings_for_branch(&conn, branch_id)?
    };
    if cache.replace_branch(branch_id, bookings.clone(), generation) {
        tracing::debug!(branch_id, count = bookings.len(), "loaded branch into booking cache");
    }
    Ok(bookings)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;
    use crate::models::{LeaveRequest, LeaveStatus, LeaveType, Staff};
    use chrono::NaiveDateTime;

    fn dt(s: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M").unwrap()
    }

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn setup_db() -> Connection {
        let conn = db::init_db(":memory:").unwrap();
        queries::create_staff(
            &conn,
            &Staff {
                id: "staff-1".to_string(),
                branch_id: "north".to_string(),
                first_name: "Ada".to_string(),
                last_name: "Byron".to_string(),
            },
        )
        .unwrap();
        conn
    }

    fn add_leave(conn: &Connection, status: LeaveStatus, start: &str, end: &str) {
        queries::create_leave_request(
            conn,
            &LeaveRequest {
                id: uuid::Uuid::new_v4().to_string(),
                staff_id: "staff-1".to_string(),
                leave_type: LeaveType::Annual,
                start_date: date(start),
                end_date: date(end),
                status,
                reason: None,
                created_at: Utc::now().naive_utc(),
            },
        )
        .unwrap();
    }

    fn new_booking(start: &str, staff: Option<&str>) -> NewBooking {
        NewBooking {
            branch_id: "north".to_string(),
            client_id: "client-1".to_string(),
            staff_id: staff.map(str::to_string),
            service_ids: vec![],
            start_time: dt(start),
            end_time: dt(start) + Duration::hours(1),
            notes: None,
            revenue_cents: None,
            payment_terms: None,
        }
    }

    #[test]
    fn test_create_booking_blocked_by_approved_leave() {
        let conn = setup_db();
        add_leave(&conn, LeaveStatus::Approved, "2024-01-10", "2024-01-15");

        let result = create_booking(&conn, &new_booking("2024-01-15 09:00", Some("staff-1")));
        match result {
            Err(AppError::Conflict(msg)) => assert!(msg.contains("Ada Byron")),
            other => panic!("expected conflict, got {other:?}"),
        }
    }

    #[test]
    fn test_pending_leave_does_not_block() {
        let conn = setup_db();
        add_leave(&conn, LeaveStatus::Pending, "2024-01-10", "2024-01-15");

        let booking =
            create_booking(&conn, &new_booking("2024-01-12 09:00", Some("staff-1"))).unwrap();
        assert_eq!(booking.status, BookingStatus::Scheduled);
    }

    #[test]
    fn test_create_booking_rejects_inverted_times() {
        let conn = setup_db();
        let mut new = new_booking("2024-01-12 09:00", None);
        new.end_time = new.start_time;
        assert!(matches!(
            create_booking(&conn, &new),
            Err(AppError::Validation(_))
        ));
    }

    #[test]
    fn test_created_booking_matches_what_was_stored() {
        let conn = setup_db();
        let mut new = new_booking("2024-01-12 09:00", None);
        new.start_time += Duration::milliseconds(500);

        let created = create_booking(&conn, &new).unwrap();
        assert_eq!(created.start_time, new.start_time);
        assert_eq!(get_booking(&conn, &created.id).unwrap(), created);
    }

    #[test]
    fn test_multi_service_booking_writes_join_rows() {
        let conn = setup_db();
        let mut new = new_booking("2024-01-12 09:00", None);
        new.service_ids = vec!["personal-care".to_string(), "meal-prep".to_string()];

        let booking = create_booking(&conn, &new).unwrap();
        assert_eq!(booking.service_id.as_deref(), Some("personal-care"));
        let services = queries::get_services_for_bookings(&conn, &[booking.id.clone()]).unwrap();
        assert_eq!(services[&booking.id].len(), 2);
    }

    #[test]
    fn test_status_workflow() {
        let conn = setup_db();
        let booking = create_booking(&conn, &new_booking("2024-01-12 09:00", None)).unwrap();

        let checked_in = change_status(&conn, &booking.id, BookingStatus::InProgress).unwrap();
        assert_eq!(checked_in.status, BookingStatus::InProgress);
        let done = change_status(&conn, &booking.id, BookingStatus::Done).unwrap();
        assert_eq!(done.status, BookingStatus::Done);

        assert!(matches!(
            change_status(&conn, &booking.id, BookingStatus::Cancelled),
            Err(AppError::Conflict(_))
        ));
    }

    #[test]
    fn test_assign_staff_checks_leave() {
        let conn = setup_db();
        add_leave(&conn, LeaveStatus::Approved, "2024-01-12", "2024-01-12");
        let booking = create_booking(&conn, &new_booking("2024-01-12 09:00", None)).unwrap();

        assert!(matches!(
            assign_staff(&conn, &booking.id, Some("staff-1")),
            Err(AppError::Conflict(_))
        ));

        let unassigned = assign_staff(&conn, &booking.id, None).unwrap();
        assert!(unassigned.staff_id.is_none());
    }

    fn recurring(skip_conflicting: bool) -> RecurringBookingRequest {
        RecurringBookingRequest {
            branch_id: "north".to_string(),
            client_id: "client-1".to_string(),
            staff_id: Some("staff-1".to_string()),
            service_ids: vec![],
            dates: vec![
                date("2024-01-09"),
                date("2024-01-10"),
                date("2024-01-15"),
                date("2024-01-16"),
            ],
            start_time: NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
            duration_minutes: 45,
            notes: None,
            revenue_cents: None,
            payment_terms: None,
            skip_conflicting,
        }
    }

    #[test]
    fn test_recurring_rejected_on_conflict() {
        let conn = setup_db();
        add_leave(&conn, LeaveStatus::Approved, "2024-01-10", "2024-01-15");

        let result = create_recurring_bookings(&conn, &recurring(false));
        assert!(matches!(result, Err(AppError::Conflict(_))));
        assert_eq!(queries::count_bookings_for_branch(&conn, "north").unwrap(), 0);
    }

    #[test]
    fn test_recurring_skips_conflicting_dates() {
        let conn = setup_db();
        add_leave(&conn, LeaveStatus::Approved, "2024-01-10", "2024-01-15");

        let result = create_recurring_bookings(&conn, &recurring(true)).unwrap();
        assert_eq!(result.created_booking_ids.len(), 2);
        assert_eq!(result.skipped.len(), 2);

        let first = get_booking(&conn, &result.created_booking_ids[0]).unwrap();
        assert_eq!(first.start_time, dt("2024-01-09 09:00"));
        assert_eq!(first.end_time, dt("2024-01-09 09:45"));
    }

    #[test]
    fn test_list_branch_bookings_fills_cache() {
        let conn = setup_db();
        create_booking(&conn, &new_booking("2024-01-12 09:00", None)).unwrap();
        let db = Mutex::new(conn);
        let cache = BookingCache::new();

        let listed = list_branch_bookings(&db, &cache, "north").unwrap();
        assert_eq!(listed.len(), 1);
        assert!(cache.is_loaded("north"));
    }
}
