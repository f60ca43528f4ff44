use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::HeaderMap;
use axum::Json;
use serde::Deserialize;

use crate::db::queries;
use crate::errors::AppError;
use crate::handlers::check_auth;
use crate::models::{Booking, ChangeRequest};
use crate::services::change_requests::{self, NewChangeRequest};
use crate::services::changes::{publish, ChangeEvent};
use crate::state::AppState;

// POST /api/bookings/:id/change-requests
pub async fn submit(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(booking_id): Path<String>,
    Json(body): Json<NewChangeRequest>,
) -> Result<Json<ChangeRequest>, AppError> {
    check_auth(&headers, &state.config.admin_token)?;

    let request = {
        let db = state.db.lock().unwrap();
        change_requests::submit(&db, &booking_id, &body)?
    };

    Ok(Json(request))
}

// GET /api/change-requests
#[derive(Deserialize)]
pub struct ChangeRequestsQuery {
    pub status: Option<String>,
    pub limit: Option<i64>,
}

pub async fn list(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(query): Query<ChangeRequestsQuery>,
) -> Result<Json<Vec<ChangeRequest>>, AppError> {
    check_auth(&headers, &state.config.admin_token)?;

    let limit = query.limit.unwrap_or(50).clamp(1, 500);
    let requests = {
        let db = state.db.lock().unwrap();
        queries::list_change_requests(&db, query.status.as_deref(), limit)?
    };

    Ok(Json(requests))
}

// POST /api/change-requests/:id/approve
pub async fn approve(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<Booking>, AppError> {
    check_auth(&headers, &state.config.admin_token)?;

    let booking = {
        let db = state.db.lock().unwrap();
        change_requests::approve(&db, &id)?
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

// POST /api/change-requests/:id/reject
pub async fn reject(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<ChangeRequest>, AppError> {
    check_auth(&headers, &state.config.admin_token)?;

    let request = {
        let db = state.db.lock().unwrap();
        change_requests::reject(&db, &id)?
    };

    Ok(Json(request))
}
