use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::HeaderMap;
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::errors::AppError;
use crate::handlers::check_auth;
use crate::models::{Booking, BookingStatus, NewBooking, ReplicationJob, ReplicationResult};
use crate::services::bookings::{self, RecurringBookingRequest, RecurringBookingResult};
use crate::services::changes::{publish, ChangeEvent};
use crate::services::replication;
use crate::services::verification::{CountCheck, VerificationOutcome};
use crate::state::AppState;

// POST /api/bookings
pub async fn create_booking(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(body): Json<NewBooking>,
) -> Result<Json<Booking>, AppError> {
    check_auth(&headers, &state.config.admin_token)?;

    let booking = {
        let db = state.db.lock().unwrap();
        bookings::create_booking(&db, &body)?
    };

    publish(
        &state.changes_tx,
        ChangeEvent::BookingsCreated {
            branch_id: booking.branch_id.clone(),
            booking_ids: vec![booking.id.clone()],
        },
    );

    Ok(Json(booking))
}

// POST /api/bookings/recurring
pub async fn create_recurring(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(body): Json<RecurringBookingRequest>,
) -> Result<Json<RecurringBookingResult>, AppError> {
    check_auth(&headers, &state.config.admin_token)?;

    let result = {
        let db = state.db.lock().unwrap();
        bookings::create_recurring_bookings(&db, &body)?
    };

    if !result.created_booking_ids.is_empty() {
        publish(
            &state.changes_tx,
            ChangeEvent::BookingsCreated {
                branch_id: body.branch_id.clone(),
                booking_ids: result.created_booking_ids.clone(),
            },
        );
    }

    Ok(Json(result))
}

// GET /api/bookings/:id
pub async fn get_booking(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<Booking>, AppError> {
    check_auth(&headers, &state.config.admin_token)?;

    let booking = {
        let db = state.db.lock().unwrap();
        bookings::get_booking(&db, &id)?
    };

    Ok(Json(booking))
}

// GET /api/branches/:branch_id/bookings
pub async fn list_branch_bookings(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(branch_id): Path<String>,
) -> Result<Json<Vec<Booking>>, AppError> {
    check_auth(&headers, &state.config.admin_token)?;

    let bookings = bookings::list_branch_bookings(&state.db, &state.cache, &branch_id)?;
    Ok(Json(bookings))
}

// POST /api/bookings/:id/status
#[derive(Deserialize)]
pub struct StatusRequest {
    pub status: BookingStatus,
}

pub async fn update_status(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(body): Json<StatusRequest>,
) -> Result<Json<Booking>, AppError> {
    check_auth(&headers, &state.config.admin_token)?;

    let booking = {
        let db = state.db.lock().unwrap();
        bookings::change_status(&db, &id, body.status)?
    };

    publish(
        &state.changes_tx,
        ChangeEvent::BookingUpdated {
            branch_id: booking.branch_id.clone(),
            booking_id: booking.id.clone(),
        },
    );

    Ok(Json(booking))
}

// POST /api/bookings/:id/staff
#[derive(Deserialize)]
pub struct AssignStaffRequest {
    pub staff_id: Option<String>,
}

pub async fn assign_staff(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(body): Json<AssignStaffRequest>,
) -> Result<Json<Booking>, AppError> {
    check_auth(&headers, &state.config.admin_token)?;

    let booking = {
        let db = state.db.lock().unwrap();
        bookings::assign_staff(&db, &id, body.staff_id.as_deref())?
    };

    publish(
        &state.changes_tx,
        ChangeEvent::BookingUpdated {
            branch_id: booking.branch_id.clone(),
            booking_id: booking.id.clone(),
        },
    );

    Ok(Json(booking))
}

// POST /api/bookings/replicate
#[derive(Deserialize)]
pub struct ReplicateRequest {
    #[serde(flatten)]
    pub job: ReplicationJob,
    /// Wait for the copies to show up in the read cache before answering.
    #[serde(default)]
    pub verify: bool,
}

#[derive(Serialize)]
pub struct ReplicateResponse {
    #[serde(flatten)]
    pub result: ReplicationResult,
    pub verification: Option<VerificationOutcome>,
}

pub async fn replicate(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(body): Json<ReplicateRequest>,
) -> Result<Json<ReplicateResponse>, AppError> {
    check_auth(&headers, &state.config.admin_token)?;

    let result = {
        let db = state.db.lock().unwrap();
        replication::replicate_bookings(&db, &body.job)?
    };

    if result.created_booking_ids.is_empty() {
        return Ok(Json(ReplicateResponse {
            result,
            verification: None,
        }));
    }

    publish(
        &state.changes_tx,
        ChangeEvent::BookingsCreated {
            branch_id: body.job.branch_id.clone(),
            booking_ids: result.created_booking_ids.clone(),
        },
    );

    let verification = if body.verify {
        Some(
            state
                .verifier
                .verify_created(&body.job.branch_id, &result.created_booking_ids)
                .await,
        )
    } else {
        None
    };

    Ok(Json(ReplicateResponse {
        result,
        verification,
    }))
}

// POST /api/bookings/verify
#[derive(Deserialize)]
pub struct VerifyRequest {
    pub branch_id: String,
    pub booking_ids: Vec<String>,
}

pub async fn verify(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(body): Json<VerifyRequest>,
) -> Result<Json<VerificationOutcome>, AppError> {
    check_auth(&headers, &state.config.admin_token)?;

    if body.branch_id.trim().is_empty() {
        return Err(AppError::Validation("branch_id is required".to_string()));
    }

    let outcome = state
        .verifier
        .verify_created(&body.branch_id, &body.booking_ids)
        .await;
    Ok(Json(outcome))
}

// POST /api/branches/:branch_id/cache/check
pub async fn check_cache(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(branch_id): Path<String>,
) -> Result<Json<CountCheck>, AppError> {
    check_auth(&headers, &state.config.admin_token)?;

    let check = state.verifier.check_count_consistency(&branch_id).await?;
    Ok(Json(check))
}

// POST /api/branches/:branch_id/cache/refresh
pub async fn refresh_cache(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(branch_id): Path<String>,
) -> Result<Json<serde_json::Value>, AppError> {
    check_auth(&headers, &state.config.admin_token)?;

    let count = state.verifier.force_refresh(&branch_id).await?;
    Ok(Json(serde_json::json!({ "ok": true, "count": count })))
}
