use std::collections::{HashMap, HashSet};

use anyhow::Context;
use chrono::{NaiveDate, NaiveDateTime, Utc};
use rusqlite::{params, params_from_iter, Connection};

use crate::models::{
    ApprovedLeave, Booking, BookingStatus, ChangeKind, ChangeRequest, ChangeRequestStatus,
    LeaveRequest, LeaveStatus, LeaveType, Staff,
};

pub const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.f";
pub const DATE_FORMAT: &str = "%Y-%m-%d";

const BOOKING_COLUMNS: &str = "id, branch_id, client_id, staff_id, service_id, start_time, end_time, \
     status, notes, revenue_cents, payment_terms, created_at, updated_at";

fn fmt_datetime(dt: &NaiveDateTime) -> String {
    dt.format(DATETIME_FORMAT).to_string()
}

fn fmt_date(d: &NaiveDate) -> String {
    d.format(DATE_FORMAT).to_string()
}

fn parse_datetime(s: &str) -> anyhow::Result<NaiveDateTime> {
    NaiveDateTime::parse_from_str(s, DATETIME_FORMAT)
        .with_context(|| format!("invalid timestamp in database: {s}"))
}

fn parse_date(s: &str) -> anyhow::Result<NaiveDate> {
    NaiveDate::parse_from_str(s, DATE_FORMAT)
        .with_context(|| format!("invalid date in database: {s}"))
}

fn placeholders(n: usize) -> String {
    (1..=n).map(|i| format!("?{i}")).collect::<Vec<_>>().join(", ")
}

// ── Staff ──

pub fn create_staff(conn: &Connection, staff: &Staff) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO staff (id, branch_id, first_name, last_name) VALUES (?1, ?2, ?3, ?4)",
        params![staff.id, staff.branch_id, staff.first_name, staff.last_name],
    )?;
    Ok(())
}

pub fn get_staff(conn: &Connection, id: &str) -> anyhow::Result<Option<Staff>> {
    let result = conn.query_row(
        "SELECT id, branch_id, first_name, last_name FROM staff WHERE id = ?1",
        params![id],
        |row| {
            Ok(Staff {
                id: row.get(0)?,
                branch_id: row.get(1)?,
                first_name: row.get(2)?,
                last_name: row.get(3)?,
            })
        },
    );

    match result {
        Ok(staff) => Ok(Some(staff)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

pub fn list_staff_for_branch(conn: &Connection, branch_id: &str) -> anyhow::Result<Vec<Staff>> {
    let mut stmt = conn.prepare(
        "SELECT id, branch_id, first_name, last_name FROM staff
         WHERE branch_id = ?1 ORDER BY last_name ASC, first_name ASC",
    )?;

    let rows = stmt.query_map(params![branch_id], |row| {
        Ok(Staff {
            id: row.get(0)?,
            branch_id: row.get(1)?,
            first_name: row.get(2)?,
            last_name: row.get(3)?,
        })
    })?;

    let mut staff = vec![];
    for row in rows {
        staff.push(row?);
    }
    Ok(staff)
}

// ── Bookings ──

pub fn insert_booking(conn: &Connection, booking: &Booking) -> anyhow::Result<usize> {
    let count = conn.execute(
        "INSERT INTO bookings (id, branch_id, client_id, staff_id, service_id, start_time, end_time, status, notes, revenue_cents, payment_terms, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
        params![
            booking.id,
            booking.branch_id,
            booking.client_id,
            booking.staff_id,
            booking.service_id,
            fmt_datetime(&booking.start_time),
            fmt_datetime(&booking.end_time),
            booking.status.as_str(),
            booking.notes,
            booking.revenue_cents,
            booking.payment_terms,
            fmt_datetime(&booking.created_at),
            fmt_datetime(&booking.updated_at),
        ],
    )?;
    Ok(count)
}

pub fn insert_booking_services(
    conn: &Connection,
    booking_id: &str,
    service_ids: &[String],
) -> anyhow::Result<usize> {
    let mut stmt = conn.prepare(
        "INSERT OR IGNORE INTO booking_services (booking_id, service_id) VALUES (?1, ?2)",
    )?;
    let mut inserted = 0;
    for service_id in service_ids {
        inserted += stmt.execute(params![booking_id, service_id])?;
    }
    Ok(inserted)
}

/// Service ids per booking, for the bookings that have any join rows.
pub fn get_services_for_bookings(
    conn: &Connection,
    booking_ids: &[String],
) -> anyhow::Result<HashMap<String, Vec<String>>> {
    let mut services: HashMap<String, Vec<String>> = HashMap::new();
    if booking_ids.is_empty() {
        return Ok(services);
    }

    let sql = format!(
        "SELECT booking_id, service_id FROM booking_services
         WHERE booking_id IN ({}) ORDER BY booking_id, service_id",
        placeholders(booking_ids.len())
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params_from_iter(booking_ids.iter()), |row| {
        Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
    })?;

    for row in rows {
        let (booking_id, service_id) = row?;
        services.entry(booking_id).or_default().push(service_id);
    }
    Ok(services)
}

pub fn get_booking_by_id(conn: &Connection, id: &str) -> anyhow::Result<Option<Booking>> {
    let sql = format!("SELECT {BOOKING_COLUMNS} FROM bookings WHERE id = ?1");
    let result = conn.query_row(&sql, params![id], |row| Ok(parse_booking_row(row)));

    match result {
        Ok(booking) => Ok(Some(booking?)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Bookings of a branch starting in `[start, end)`.
pub fn get_bookings_in_window(
    conn: &Connection,
    branch_id: &str,
    start: &NaiveDate,
    end: &NaiveDate,
    include_cancelled: bool,
) -> anyhow::Result<Vec<Booking>> {
    let start_str = format!("{} 00:00:00", fmt_date(start));
    let end_str = format!("{} 00:00:00", fmt_date(end));

    let sql = format!(
        "SELECT {BOOKING_COLUMNS} FROM bookings
         WHERE branch_id = ?1 AND start_time >= ?2 AND start_time < ?3
           AND (?4 OR status != 'cancelled')
         ORDER BY start_time ASC, id ASC"
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(
        params![branch_id, start_str, end_str, include_cancelled],
        |row| Ok(parse_booking_row(row)),
    )?;

    let mut bookings = vec![];
    for row in rows {
        bookings.push(row??);
    }
    Ok(bookings)
}

/// Live bookings for one staff member starting between two dates, inclusive.
pub fn get_staff_bookings_between(
    conn: &Connection,
    staff_id: &str,
    first: &NaiveDate,
    last: &NaiveDate,
) -> anyhow::Result<Vec<Booking>> {
    let range_start = format!("{} 00:00:00", fmt_date(first));
    // Sorts after every stored time on `last`, fractional seconds included
    let range_end = format!("{} 24:00:00", fmt_date(last));

    let sql = format!(
        "SELECT {BOOKING_COLUMNS} FROM bookings
         WHERE staff_id = ?1 AND start_time >= ?2 AND start_time < ?3
           AND status IN ('scheduled', 'in_progress')
         ORDER BY start_time ASC"
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params![staff_id, range_start, range_end], |row| {
        Ok(parse_booking_row(row))
    })?;

    let mut bookings = vec![];
    for row in rows {
        bookings.push(row??);
    }
    Ok(bookings)
}

pub fn get_bookings_for_branch(conn: &Connection, branch_id: &str) -> anyhow::Result<Vec<Booking>> {
    let sql = format!(
        "SELECT {BOOKING_COLUMNS} FROM bookings WHERE branch_id = ?1 ORDER BY start_time ASC, id ASC"
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params![branch_id], |row| Ok(parse_booking_row(row)))?;

    let mut bookings = vec![];
    for row in rows {
        bookings.push(row??);
    }
    Ok(bookings)
}

pub fn count_bookings_for_branch(conn: &Connection, branch_id: &str) -> anyhow::Result<i64> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM bookings WHERE branch_id = ?1",
        params![branch_id],
        |row| row.get(0),
    )?;
    Ok(count)
}

/// The subset of `ids` stored under `branch_id`.
pub fn get_existing_booking_ids(
    conn: &Connection,
    branch_id: &str,
    ids: &[String],
) -> anyhow::Result<HashSet<String>> {
    let mut found = HashSet::new();
    if ids.is_empty() {
        return Ok(found);
    }

    // ?1 is the branch, ids start at ?2
    let id_params = (2..ids.len() + 2)
        .map(|i| format!("?{i}"))
        .collect::<Vec<_>>()
        .join(", ");
    let sql = format!("SELECT id FROM bookings WHERE branch_id = ?1 AND id IN ({id_params})");
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(
        params_from_iter(std::iter::once(branch_id).chain(ids.iter().map(String::as_str))),
        |row| row.get::<_, String>(0),
    )?;
    for row in rows {
        found.insert(row?);
    }
    Ok(found)
}

pub fn update_booking_status(
    conn: &Connection,
    id: &str,
    status: &BookingStatus,
) -> anyhow::Result<bool> {
    let now = fmt_datetime(&Utc::now().naive_utc());
    let count = conn.execute(
        "UPDATE bookings SET status = ?1, updated_at = ?2 WHERE id = ?3",
        params![status.as_str(), now, id],
    )?;
    Ok(count > 0)
}

pub fn update_booking_staff(
    conn: &Connection,
    id: &str,
    staff_id: Option<&str>,
) -> anyhow::Result<bool> {
    let now = fmt_datetime(&Utc::now().naive_utc());
    let count = conn.execute(
        "UPDATE bookings SET staff_id = ?1, updated_at = ?2 WHERE id = ?3",
        params![staff_id, now, id],
    )?;
    Ok(count > 0)
}

pub fn update_booking_times(
    conn: &Connection,
    id: &str,
    start: &NaiveDateTime,
    end: &NaiveDateTime,
) -> anyhow::Result<bool> {
    let now = fmt_datetime(&Utc::now().naive_utc());
    let count = conn.execute(
        "UPDATE bookings SET start_time = ?1, end_time = ?2, updated_at = ?3 WHERE id = ?4",
        params![fmt_datetime(start), fmt_datetime(end), now, id],
    )?;
    Ok(count > 0)
}

fn parse_booking_row(row: &rusqlite::Row) -> anyhow::Result<Booking> {
    let start_time_str: String = row.get(5)?;
    let end_time_str: String = row.get(6)?;
    let status_str: String = row.get(7)?;
    let created_at_str: String = row.get(11)?;
    let updated_at_str: String = row.get(12)?;

    Ok(Booking {
        id: row.get(0)?,
        branch_id: row.get(1)?,
        client_id: row.get(2)?,
        staff_id: row.get(3)?,
        service_id: row.get(4)?,
        start_time: parse_datetime(&start_time_str)?,
        end_time: parse_datetime(&end_time_str)?,
        status: BookingStatus::parse(&status_str),
        notes: row.get(8)?,
        revenue_cents: row.get(9)?,
        payment_terms: row.get(10)?,
        created_at: parse_datetime(&created_at_str)?,
        updated_at: parse_datetime(&updated_at_str)?,
    })
}

// ── Leave Requests ──

pub fn create_leave_request(conn: &Connection, leave: &LeaveRequest) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO staff_leave_requests (id, staff_id, leave_type, start_date, end_date, status, reason, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            leave.id,
            leave.staff_id,
            leave.leave_type.as_str(),
            fmt_date(&leave.start_date),
            fmt_date(&leave.end_date),
            leave.status.as_str(),
            leave.reason,
            fmt_datetime(&leave.created_at),
        ],
    )?;
    Ok(())
}

pub fn get_leave_request(conn: &Connection, id: &str) -> anyhow::Result<Option<LeaveRequest>> {
    let result = conn.query_row(
        "SELECT id, staff_id, leave_type, start_date, end_date, status, reason, created_at
         FROM staff_leave_requests WHERE id = ?1",
        params![id],
        |row| Ok(parse_leave_row(row)),
    );

    match result {
        Ok(leave) => Ok(Some(leave?)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

pub fn list_leave_for_staff(conn: &Connection, staff_id: &str) -> anyhow::Result<Vec<LeaveRequest>> {
    let mut stmt = conn.prepare(
        "SELECT id, staff_id, leave_type, start_date, end_date, status, reason, created_at
         FROM staff_leave_requests WHERE staff_id = ?1 ORDER BY start_date ASC",
    )?;
    let rows = stmt.query_map(params![staff_id], |row| Ok(parse_leave_row(row)))?;

    let mut leave = vec![];
    for row in rows {
        leave.push(row??);
    }
    Ok(leave)
}

pub fn set_leave_status(conn: &Connection, id: &str, status: &LeaveStatus) -> anyhow::Result<bool> {
    let count = conn.execute(
        "UPDATE staff_leave_requests SET status = ?1 WHERE id = ?2",
        params![status.as_str(), id],
    )?;
    Ok(count > 0)
}

/// Approved leave for the given staff members, with display names joined in.
pub fn get_approved_leave(conn: &Connection, staff_ids: &[String]) -> anyhow::Result<Vec<ApprovedLeave>> {
    if staff_ids.is_empty() {
        return Ok(vec![]);
    }

    let sql = format!(
        "SELECT l.id, l.staff_id, s.first_name, s.last_name, l.leave_type, l.start_date, l.end_date
         FROM staff_leave_requests l
         LEFT JOIN staff s ON s.id = l.staff_id
         WHERE l.status = 'approved' AND l.staff_id IN ({})
         ORDER BY l.start_date ASC",
        placeholders(staff_ids.len())
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params_from_iter(staff_ids.iter()), |row| {
        Ok(parse_approved_leave_row(row))
    })?;

    let mut leave = vec![];
    for row in rows {
        leave.push(row??);
    }
    Ok(leave)
}

fn parse_leave_row(row: &rusqlite::Row) -> anyhow::Result<LeaveRequest> {
    let leave_type_str: String = row.get(2)?;
    let start_str: String = row.get(3)?;
    let end_str: String = row.get(4)?;
    let status_str: String = row.get(5)?;
    let created_at_str: String = row.get(7)?;

    Ok(LeaveRequest {
        id: row.get(0)?,
        staff_id: row.get(1)?,
        leave_type: LeaveType::parse(&leave_type_str),
        start_date: parse_date(&start_str)?,
        end_date: parse_date(&end_str)?,
        status: LeaveStatus::parse(&status_str),
        reason: row.get(6)?,
        created_at: parse_datetime(&created_at_str)?,
    })
}

fn parse_approved_leave_row(row: &rusqlite::Row) -> anyhow::Result<ApprovedLeave> {
    let first_name: Option<String> = row.get(2)?;
    let last_name: Option<String> = row.get(3)?;
    let leave_type_str: String = row.get(4)?;
    let start_str: String = row.get(5)?;
    let end_str: String = row.get(6)?;

    let staff_name = match (first_name, last_name) {
        (None, None) => None,
        (first, last) => Some(
            format!("{} {}", first.unwrap_or_default(), last.unwrap_or_default())
                .trim()
                .to_string(),
        ),
    };

    Ok(ApprovedLeave {
        leave_id: row.get(0)?,
        staff_id: row.get(1)?,
        staff_name,
        leave_type: LeaveType::parse(&leave_type_str),
        start_date: parse_date(&start_str)?,
        end_date: parse_date(&end_str)?,
    })
}

// ── Change Requests ──

pub fn create_change_request(conn: &Connection, request: &ChangeRequest) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO booking_change_requests (id, booking_id, kind, new_start_time, new_end_time, reason, requested_by, status, created_at, resolved_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
        params![
            request.id,
            request.booking_id,
            request.kind.as_str(),
            request.new_start_time.as_ref().map(fmt_datetime),
            request.new_end_time.as_ref().map(fmt_datetime),
            request.reason,
            request.requested_by,
            request.status.as_str(),
            fmt_datetime(&request.created_at),
            request.resolved_at.as_ref().map(fmt_datetime),
        ],
    )?;
    Ok(())
}

pub fn get_change_request(conn: &Connection, id: &str) -> anyhow::Result<Option<ChangeRequest>> {
    let result = conn.query_row(
        "SELECT id, booking_id, kind, new_start_time, new_end_time, reason, requested_by, status, created_at, resolved_at
         FROM booking_change_requests WHERE id = ?1",
        params![id],
        |row| Ok(parse_change_request_row(row)),
    );

    match result {
        Ok(request) => Ok(Some(request?)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

pub fn list_change_requests(
    conn: &Connection,
    status_filter: Option<&str>,
    limit: i64,
) -> anyhow::Result<Vec<ChangeRequest>> {
    let (sql, params_vec): (String, Vec<Box<dyn rusqlite::types::ToSql>>) = match status_filter {
        Some(status) => (
            "SELECT id, booking_id, kind, new_start_time, new_end_time, reason, requested_by, status, created_at, resolved_at \
             FROM booking_change_requests WHERE status = ?1 ORDER BY created_at DESC LIMIT ?2"
                .to_string(),
            vec![
                Box::new(status.to_string()) as Box<dyn rusqlite::types::ToSql>,
                Box::new(limit),
            ],
        ),
        None => (
            "SELECT id, booking_id, kind, new_start_time, new_end_time, reason, requested_by, status, created_at, resolved_at \
             FROM booking_change_requests ORDER BY created_at DESC LIMIT ?1"
                .to_string(),
            vec![Box::new(limit) as Box<dyn rusqlite::types::ToSql>],
        ),
    };

    let mut stmt = conn.prepare(&sql)?;
    let params_refs: Vec<&dyn rusqlite::types::ToSql> = params_vec.iter().map(|p| p.as_ref()).collect();
    let rows = stmt.query_map(params_refs.as_slice(), |row| Ok(parse_change_request_row(row)))?;

    let mut requests = vec![];
    for row in rows {
        requests.push(row??);
    }
    Ok(requests)
}

/// Moves a pending request to `status`. Returns false if it was not pending.
pub fn resolve_change_request(
    conn: &Connection,
    id: &str,
    status: &ChangeRequestStatus,
) -> anyhow::Result<bool> {
    let now = fmt_datetime(&Utc::now().naive_utc());
    let count = conn.execute(
        "UPDATE booking_change_requests SET status = ?1, resolved_at = ?2
         WHERE id = ?3 AND status = 'pending'",
        params![status.as_str(), now, id],
    )?;
    Ok(count > 0)
}

fn parse_change_request_row(row: &rusqlite::Row) -> anyhow::Result<ChangeRequest> {
    let kind_str: String = row.get(2)?;
    let new_start: Option<String> = row.get(3)?;
    let new_end: Option<String> = row.get(4)?;
    let status_str: String = row.get(7)?;
    let created_at_str: String = row.get(8)?;
    let resolved_at: Option<String> = row.get(9)?;

    Ok(ChangeRequest {
        id: row.get(0)?,
        booking_id: row.get(1)?,
        kind: ChangeKind::parse(&kind_str),
        new_start_time: new_start.as_deref().map(parse_datetime).transpose()?,
        new_end_time: new_end.as_deref().map(parse_datetime).transpose()?,
        reason: row.get(5)?,
        requested_by: row.get(6)?,
        status: ChangeRequestStatus::parse(&status_str),
        created_at: parse_datetime(&created_at_str)?,
        resolved_at: resolved_at.as_deref().map(parse_datetime).transpose()?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;

    fn dt(s: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M").unwrap()
    }

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn booking(id: &str, start: &str, status: BookingStatus) -> Booking {
        let now = Utc::now().naive_utc();
        let start_time = dt(start);
        Booking {
            id: id.to_string(),
            branch_id: "north".to_string(),
            client_id: "client-1".to_string(),
            staff_id: Some("staff-1".to_string()),
            service_id: None,
            start_time,
            end_time: start_time + chrono::Duration::hours(1),
            status,
            notes: None,
            revenue_cents: Some(4500),
            payment_terms: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_window_is_half_open_and_skips_cancelled() {
        let conn = db::init_db(":memory:").unwrap();
        insert_booking(&conn, &booking("b1", "2024-01-08 09:00", BookingStatus::Scheduled)).unwrap();
        insert_booking(&conn, &booking("b2", "2024-01-14 23:30", BookingStatus::Done)).unwrap();
        insert_booking(&conn, &booking("b3", "2024-01-15 00:00", BookingStatus::Scheduled)).unwrap();
        insert_booking(&conn, &booking("b4", "2024-01-10 12:00", BookingStatus::Cancelled)).unwrap();

        let found =
            get_bookings_in_window(&conn, "north", &date("2024-01-08"), &date("2024-01-15"), false)
                .unwrap();
        let ids: Vec<_> = found.iter().map(|b| b.id.as_str()).collect();
        assert_eq!(ids, vec!["b1", "b2"]);

        let with_cancelled =
            get_bookings_in_window(&conn, "north", &date("2024-01-08"), &date("2024-01-15"), true)
                .unwrap();
        assert_eq!(with_cancelled.len(), 3);
    }

    #[test]
    fn test_booking_round_trip_preserves_fields() {
        let conn = db::init_db(":memory:").unwrap();
        let original = booking("b1", "2024-01-08 09:15", BookingStatus::InProgress);
        insert_booking(&conn, &original).unwrap();

        let loaded = get_booking_by_id(&conn, "b1").unwrap().unwrap();
        assert_eq!(loaded.start_time, original.start_time);
        assert_eq!(loaded.status, BookingStatus::InProgress);
        assert_eq!(loaded.revenue_cents, Some(4500));
        assert!(get_booking_by_id(&conn, "missing").unwrap().is_none());
    }

    #[test]
    fn test_existing_ids_and_counts() {
        let conn = db::init_db(":memory:").unwrap();
        insert_booking(&conn, &booking("b1", "2024-01-08 09:00", BookingStatus::Scheduled)).unwrap();
        insert_booking(&conn, &booking("b2", "2024-01-09 09:00", BookingStatus::Scheduled)).unwrap();

        insert_booking(
            &conn,
            &Booking {
                branch_id: "south".to_string(),
                ..booking("b3", "2024-01-09 10:00", BookingStatus::Scheduled)
            },
        )
        .unwrap();

        let ids = ["b1", "b2", "b3", "nope"].map(String::from);
        let found = get_existing_booking_ids(&conn, "north", &ids).unwrap();
        assert_eq!(found.len(), 2);
        assert!(!found.contains("nope"));
        assert!(!found.contains("b3"));
        assert_eq!(
            get_existing_booking_ids(&conn, "south", &ids).unwrap(),
            HashSet::from(["b3".to_string()])
        );
        assert_eq!(count_bookings_for_branch(&conn, "north").unwrap(), 2);
        assert_eq!(count_bookings_for_branch(&conn, "south").unwrap(), 0);
    }

    #[test]
    fn test_timestamps_keep_milliseconds() {
        let conn = db::init_db(":memory:").unwrap();
        let start = NaiveDateTime::parse_from_str("2024-01-10 09:00:00.500", "%Y-%m-%d %H:%M:%S%.f")
            .unwrap();
        let stored = Booking {
            start_time: start,
            end_time: start + chrono::Duration::milliseconds(3_600_250),
            ..booking("b1", "2024-01-10 09:00", BookingStatus::Scheduled)
        };
        insert_booking(&conn, &stored).unwrap();

        let loaded = get_booking_by_id(&conn, "b1").unwrap().unwrap();
        assert_eq!(loaded.start_time, stored.start_time);
        assert_eq!(loaded.end_time.format("%H:%M:%S%.3f").to_string(), "10:00:00.750");

        // Whole-second rows written before still parse
        conn.execute(
            "UPDATE bookings SET start_time = '2024-01-10 09:00:00' WHERE id = 'b1'",
            [],
        )
        .unwrap();
        let loaded = get_booking_by_id(&conn, "b1").unwrap().unwrap();
        assert_eq!(loaded.start_time.format("%H:%M:%S").to_string(), "09:00:00");
    }

    #[test]
    fn test_staff_bookings_include_last_second_of_range() {
        let conn = db::init_db(":memory:").unwrap();
        let late = NaiveDateTime::parse_from_str("2024-01-15 23:59:59.900", "%Y-%m-%d %H:%M:%S%.f")
            .unwrap();
        insert_booking(
            &conn,
            &Booking {
                start_time: late,
                end_time: late + chrono::Duration::minutes(30),
                ..booking("late", "2024-01-15 09:00", BookingStatus::Scheduled)
            },
        )
        .unwrap();

        let found =
            get_staff_bookings_between(&conn, "staff-1", &date("2024-01-10"), &date("2024-01-15"))
                .unwrap();
        assert_eq!(found.len(), 1);
    }

    #[test]
    fn test_only_approved_leave_is_returned() {
        let conn = db::init_db(":memory:").unwrap();
        create_staff(
            &conn,
            &Staff {
                id: "staff-1".to_string(),
                branch_id: "north".to_string(),
                first_name: "Ada".to_string(),
                last_name: "Byron".to_string(),
            },
        )
        .unwrap();

        let now = Utc::now().naive_utc();
        for (id, status) in [("l1", LeaveStatus::Approved), ("l2", LeaveStatus::Pending)] {
            create_leave_request(
                &conn,
                &LeaveRequest {
                    id: id.to_string(),
                    staff_id: "staff-1".to_string(),
                    leave_type: LeaveType::Annual,
                    start_date: date("2024-01-10"),
                    end_date: date("2024-01-15"),
                    status,
                    reason: None,
                    created_at: now,
                },
            )
            .unwrap();
        }

        let leave = get_approved_leave(&conn, &["staff-1".to_string()]).unwrap();
        assert_eq!(leave.len(), 1);
        assert_eq!(leave[0].leave_id, "l1");
        assert_eq!(leave[0].staff_name.as_deref(), Some("Ada Byron"));
    }
}
