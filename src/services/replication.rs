use std::collections::HashMap;

use chrono::Utc;
use rusqlite::Connection;

use crate::db::queries;
use crate::errors::AppError;
use crate::models::{Booking, BookingStatus, ReplicationJob, ReplicationMode, ReplicationResult};
use crate::services::date_window;

pub const MAX_RECURRING_WEEKS: u32 = 52;

pub fn validate_job(job: &ReplicationJob) -> Result<(), AppError> {
    if job.branch_id.trim().is_empty() {
        return Err(AppError::Validation("branch_id is required".to_string()));
    }

    if job.mode == ReplicationMode::Single
        && job.booking_id.as_deref().map_or(true, |id| id.trim().is_empty())
    {
        return Err(AppError::Validation(
            "booking_id is required for single replication".to_string(),
        ));
    }

    if job.source_end <= job.source_start {
        return Err(AppError::Validation(
            "source_end must be after source_start".to_string(),
        ));
    }

    match job.mode {
        ReplicationMode::Recurring
            if job.recurring_weeks == 0 || job.recurring_weeks > MAX_RECURRING_WEEKS =>
        {
            Err(AppError::Validation(format!(
                "recurring_weeks must be between 1 and {MAX_RECURRING_WEEKS}"
            )))
        }
        ReplicationMode::ThisWeek if (job.source_end - job.source_start).num_days() > 7 => Err(
            AppError::Validation("this-week source window spans more than 7 days".to_string()),
        ),
        _ => Ok(()),
    }
}

fn load_source_bookings(conn: &Connection, job: &ReplicationJob) -> Result<Vec<Booking>, AppError> {
    match (job.mode, job.booking_id.as_deref()) {
        (ReplicationMode::Single, Some(booking_id)) => {
            let booking = queries::get_booking_by_id(conn, booking_id)?
                .filter(|b| b.branch_id == job.branch_id)
                .ok_or_else(|| AppError::NotFound(format!("booking {booking_id}")))?;

            if booking.status == BookingStatus::Cancelled && !job.include_cancelled {
                return Ok(vec![]);
            }
            Ok(vec![booking])
        }
        _ => Ok(queries::get_bookings_in_window(
            conn,
            &job.branch_id,
            &job.source_start,
            &job.source_end,
            job.include_cancelled,
        )?),
    }
}

/// Copies the job's source bookings into each target week.
///
/// New bookings and their service rows are written in one transaction, so a
/// failure leaves nothing behind. Service rows are matched to copies through
/// the source id recorded for each copy, not through insert order.
pub fn replicate_bookings(
    conn: &Connection,
    job: &ReplicationJob,
) -> Result<ReplicationResult, AppError> {
    validate_job(job)?;

    let sources = load_source_bookings(conn, job)?;
    if sources.is_empty() {
        tracing::info!(
            branch_id = %job.branch_id,
            mode = job.mode.as_str(),
            "no source bookings to replicate"
        );
        return Ok(ReplicationResult::default());
    }

    let source_ids: Vec<String> = sources.iter().map(|b| b.id.clone()).collect();
    let services: HashMap<String, Vec<String>> = queries::get_services_for_bookings(conn, &source_ids)?
        .into_iter()
        .filter(|(_, ids)| ids.len() > 1)
        .collect();

    let week_starts =
        date_window::target_week_starts(job.mode, &job.target_start, job.recurring_weeks);
    let now = Utc::now().naive_utc();

    // (copy, id of the booking it was copied from)
    let mut copies: Vec<(Booking, &str)> = Vec::with_capacity(week_starts.len() * sources.len());
    for week_start in &week_starts {
        for source in &sources {
            let offset = date_window::offset_days(&source.start_time, &job.source_start);
            if offset < 0 {
                tracing::warn!(
                    booking_id = %source.id,
                    offset,
                    "source booking precedes the source window, copy shifts backward"
                );
            }

            let copy = Booking {
                id: uuid::Uuid::new_v4().to_string(),
                branch_id: source.branch_id.clone(),
                client_id: source.client_id.clone(),
                staff_id: if job.include_staff {
                    source.staff_id.clone()
                } else {
                    None
                },
                service_id: source.service_id.clone(),
                start_time: date_window::recalculate(
                    &source.start_time,
                    &job.source_start,
                    week_start,
                ),
                end_time: date_window::recalculate(&source.end_time, &job.source_start, week_start),
                status: BookingStatus::Scheduled,
                notes: source.notes.clone(),
                revenue_cents: source.revenue_cents,
                payment_terms: source.payment_terms.clone(),
                created_at: now,
                updated_at: now,
            };
            copies.push((copy, source.id.as_str()));
        }
    }

    let attempted = copies.len();
    let tx = conn.unchecked_transaction()?;
    let mut created_booking_ids = Vec::with_capacity(attempted);
    for (copy, source_id) in &copies {
        if queries::insert_booking(&tx, copy)? == 0 {
            continue;
        }
        if let Some(service_ids) = services.get(*source_id) {
            queries::insert_booking_services(&tx, &copy.id, service_ids)?;
        }
        created_booking_ids.push(copy.id.clone());
    }
    tx.commit()?;

    let result = ReplicationResult {
        success_count: created_booking_ids.len(),
        failed_count: attempted - created_booking_ids.len(),
        created_booking_ids,
    };

    tracing::info!(
        branch_id = %job.branch_id,
        mode = job.mode.as_str(),
        weeks = week_starts.len(),
        sources = sources.len(),
        created = result.success_count,
        failed = result.failed_count,
        "bookings replicated"
    );

    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;
    use chrono::{NaiveDate, NaiveDateTime};

    fn dt(s: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M").unwrap()
    }

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn seed(conn: &Connection, id: &str, start: &str, minutes: i64, status: BookingStatus) {
        let now = Utc::now().naive_utc();
        queries::insert_booking(
            conn,
            &Booking {
                id: id.to_string(),
                branch_id: "north".to_string(),
                client_id: format!("client-{id}"),
                staff_id: Some("staff-1".to_string()),
                service_id: Some("personal-care".to_string()),
                start_time: dt(start),
                end_time: dt(start) + chrono::Duration::minutes(minutes),
                status,
                notes: Some("ring bell twice".to_string()),
                revenue_cents: Some(3200),
                payment_terms: Some("monthly".to_string()),
                created_at: now,
                updated_at: now,
            },
        )
        .unwrap();
    }

    fn job(mode: ReplicationMode) -> ReplicationJob {
        ReplicationJob {
            mode,
            branch_id: "north".to_string(),
            booking_id: None,
            source_start: date("2024-01-08"),
            source_end: date("2024-01-15"),
            target_start: date("2024-01-22"),
            recurring_weeks: 1,
            include_staff: true,
            include_cancelled: false,
        }
    }

    fn seeded() -> Connection {
        let conn = db::init_db(":memory:").unwrap();
        seed(&conn, "mon", "2024-01-08 09:00", 60, BookingStatus::Done);
        seed(&conn, "wed", "2024-01-10 14:30", 45, BookingStatus::Scheduled);
        seed(&conn, "sun", "2024-01-14 23:00", 120, BookingStatus::InProgress);
        seed(&conn, "cxl", "2024-01-11 10:00", 30, BookingStatus::Cancelled);
        seed(&conn, "out", "2024-01-15 09:00", 60, BookingStatus::Scheduled);
        conn
    }

    #[test]
    fn test_zero_sources_returns_empty_result() {
        let conn = db::init_db(":memory:").unwrap();
        let result = replicate_bookings(&conn, &job(ReplicationMode::Custom)).unwrap();
        assert_eq!(result, ReplicationResult::default());
        assert_eq!(queries::count_bookings_for_branch(&conn, "north").unwrap(), 0);
    }

    #[test]
    fn test_custom_copies_window_with_offsets_and_durations() {
        let conn = seeded();
        let result = replicate_bookings(&conn, &job(ReplicationMode::Custom)).unwrap();
        assert_eq!(result.success_count, 3);
        assert_eq!(result.failed_count, 0);

        let copies = queries::get_bookings_in_window(
            &conn,
            "north",
            &date("2024-01-22"),
            &date("2024-01-29"),
            true,
        )
        .unwrap();
        let starts: Vec<_> = copies.iter().map(|b| b.start_time).collect();
        assert_eq!(
            starts,
            vec![
                dt("2024-01-22 09:00"),
                dt("2024-01-24 14:30"),
                dt("2024-01-28 23:00"),
            ]
        );
        // Crosses midnight and keeps its two hours
        assert_eq!(copies[2].end_time, dt("2024-01-29 01:00"));
        assert!(copies.iter().all(|b| b.status == BookingStatus::Scheduled));
        assert!(copies.iter().all(|b| b.staff_id.as_deref() == Some("staff-1")));
        assert_eq!(copies[1].notes.as_deref(), Some("ring bell twice"));
        assert_eq!(copies[1].revenue_cents, Some(3200));
        assert_eq!(copies[1].payment_terms.as_deref(), Some("monthly"));
    }

    #[test]
    fn test_recurring_three_weeks_triples_the_window() {
        let conn = seeded();
        let mut recurring = job(ReplicationMode::Recurring);
        recurring.recurring_weeks = 3;

        let result = replicate_bookings(&conn, &recurring).unwrap();
        assert_eq!(result.success_count, 9);
        assert_eq!(result.created_booking_ids.len(), 9);

        for week_start in ["2024-01-22", "2024-01-29", "2024-02-05"] {
            let start = date(week_start);
            let copies = queries::get_bookings_in_window(
                &conn,
                "north",
                &start,
                &(start + chrono::Duration::days(1)),
                false,
            )
            .unwrap();
            assert_eq!(copies.len(), 1, "week starting {week_start}");
            assert_eq!(copies[0].start_time.time(), dt("2024-01-08 09:00").time());
        }
    }

    #[test]
    fn test_include_staff_false_clears_assignment() {
        let conn = seeded();
        let mut no_staff = job(ReplicationMode::Custom);
        no_staff.include_staff = false;

        let result = replicate_bookings(&conn, &no_staff).unwrap();
        for id in &result.created_booking_ids {
            let copy = queries::get_booking_by_id(&conn, id).unwrap().unwrap();
            assert!(copy.staff_id.is_none());
        }
    }

    #[test]
    fn test_include_cancelled_copies_as_scheduled() {
        let conn = seeded();
        let mut with_cancelled = job(ReplicationMode::Custom);
        with_cancelled.include_cancelled = true;

        let result = replicate_bookings(&conn, &with_cancelled).unwrap();
        assert_eq!(result.success_count, 4);
        for id in &result.created_booking_ids {
            let copy = queries::get_booking_by_id(&conn, id).unwrap().unwrap();
            assert_eq!(copy.status, BookingStatus::Scheduled);
        }
    }

    #[test]
    fn test_single_mode_copies_one_booking() {
        let conn = seeded();
        let mut single = job(ReplicationMode::Single);
        single.booking_id = Some("wed".to_string());

        let result = replicate_bookings(&conn, &single).unwrap();
        assert_eq!(result.success_count, 1);
        let copy = queries::get_booking_by_id(&conn, &result.created_booking_ids[0])
            .unwrap()
            .unwrap();
        assert_eq!(copy.start_time, dt("2024-01-24 14:30"));
        assert_eq!(copy.client_id, "client-wed");
    }

    #[test]
    fn test_single_mode_skips_cancelled_unless_included() {
        let conn = seeded();
        let mut single = job(ReplicationMode::Single);
        single.booking_id = Some("cxl".to_string());

        let result = replicate_bookings(&conn, &single).unwrap();
        assert_eq!(result.success_count, 0);
    }

    #[test]
    fn test_single_mode_requires_booking_id() {
        let conn = seeded();
        let result = replicate_bookings(&conn, &job(ReplicationMode::Single));
        assert!(matches!(result, Err(AppError::Validation(_))));
    }

    #[test]
    fn test_single_mode_other_branch_is_not_found() {
        let conn = seeded();
        let mut single = job(ReplicationMode::Single);
        single.branch_id = "south".to_string();
        single.booking_id = Some("wed".to_string());
        assert!(matches!(
            replicate_bookings(&conn, &single),
            Err(AppError::NotFound(_))
        ));
    }

    #[test]
    fn test_invalid_recurring_weeks_rejected() {
        let mut recurring = job(ReplicationMode::Recurring);
        recurring.recurring_weeks = 0;
        assert!(validate_job(&recurring).is_err());
        recurring.recurring_weeks = MAX_RECURRING_WEEKS + 1;
        assert!(validate_job(&recurring).is_err());
    }

    #[test]
    fn test_this_week_window_limited_to_seven_days() {
        let mut this_week = job(ReplicationMode::ThisWeek);
        assert!(validate_job(&this_week).is_ok());
        this_week.source_end = date("2024-01-16");
        assert!(validate_job(&this_week).is_err());
    }

    #[test]
    fn test_multi_service_rows_follow_their_copies() {
        let conn = seeded();
        queries::insert_booking_services(
            &conn,
            "wed",
            &["personal-care".to_string(), "meal-prep".to_string()],
        )
        .unwrap();
        queries::insert_booking_services(&conn, "mon", &["personal-care".to_string()]).unwrap();

        let mut recurring = job(ReplicationMode::Recurring);
        recurring.recurring_weeks = 2;
        let result = replicate_bookings(&conn, &recurring).unwrap();

        let services =
            queries::get_services_for_bookings(&conn, &result.created_booking_ids).unwrap();
        assert_eq!(services.len(), 2);
        for (booking_id, service_ids) in &services {
            let copy = queries::get_booking_by_id(&conn, booking_id).unwrap().unwrap();
            assert_eq!(copy.client_id, "client-wed");
            assert_eq!(service_ids, &vec!["meal-prep".to_string(), "personal-care".to_string()]);
        }
    }

    #[test]
    fn test_failed_insert_rolls_back_whole_job() {
        let conn = seeded();
        // Inserts into the second target week fail
        conn.execute_batch(
            "CREATE TRIGGER reject_second_week BEFORE INSERT ON bookings
             WHEN NEW.start_time >= '2024-01-29'
             BEGIN SELECT RAISE(ABORT, 'simulated failure'); END;",
        )
        .unwrap();

        let mut recurring = job(ReplicationMode::Recurring);
        recurring.recurring_weeks = 2;
        assert!(replicate_bookings(&conn, &recurring).is_err());

        assert_eq!(queries::count_bookings_for_branch(&conn, "north").unwrap(), 5);
    }
}
