use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::HeaderMap;
use axum::Json;
use chrono::NaiveDate;
use serde::Deserialize;

use crate::db::queries;
use crate::errors::AppError;
use crate::handlers::check_auth;
use crate::models::{LeaveRequest, LeaveStatus, NewLeaveRequest};
use crate::services::changes::{publish, ChangeEvent};
use crate::services::leave::{self, LeaveDecision};
use crate::services::leave_conflicts::{self, RecurringConflictReport, StaffConflictReport};
use crate::state::AppState;

// POST /api/leave
pub async fn request_leave(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(body): Json<NewLeaveRequest>,
) -> Result<Json<LeaveRequest>, AppError> {
    check_auth(&headers, &state.config.admin_token)?;

    let leave = {
        let db = state.db.lock().unwrap();
        leave::request_leave(&db, &body)?
    };

    Ok(Json(leave))
}

// GET /api/staff/:staff_id/leave
pub async fn list_for_staff(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(staff_id): Path<String>,
) -> Result<Json<Vec<LeaveRequest>>, AppError> {
    check_auth(&headers, &state.config.admin_token)?;

    let leave = {
        let db = state.db.lock().unwrap();
        queries::list_leave_for_staff(&db, &staff_id)?
    };

    Ok(Json(leave))
}

async fn decide(
    state: Arc<AppState>,
    headers: HeaderMap,
    id: String,
    status: LeaveStatus,
) -> Result<Json<LeaveDecision>, AppError> {
    check_auth(&headers, &state.config.admin_token)?;

    let decision = {
        let db = state.db.lock().unwrap();
        leave::decide_leave(&db, &id, status)?
    };

    publish(
        &state.changes_tx,
        ChangeEvent::LeaveUpdated {
            staff_id: decision.leave.staff_id.clone(),
        },
    );

    Ok(Json(decision))
}

// POST /api/leave/:id/approve
pub async fn approve(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<LeaveDecision>, AppError> {
    decide(state, headers, id, LeaveStatus::Approved).await
}

// POST /api/leave/:id/reject
pub async fn reject(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<LeaveDecision>, AppError> {
    decide(state, headers, id, LeaveStatus::Rejected).await
}

// POST /api/leave/conflicts
#[derive(Deserialize)]
pub struct ConflictQuery {
    pub staff_ids: Vec<String>,
    pub date: NaiveDate,
}

pub async fn check_conflicts(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(body): Json<ConflictQuery>,
) -> Result<Json<StaffConflictReport>, AppError> {
    check_auth(&headers, &state.config.admin_token)?;

    let leaves = {
        let db = state.db.lock().unwrap();
        queries::get_approved_leave(&db, &body.staff_ids)?
    };

    Ok(Json(leave_conflicts::check_staff_conflicts(
        &leaves,
        &body.staff_ids,
        body.date,
    )))
}

// POST /api/leave/conflicts/recurring
#[derive(Deserialize)]
pub struct RecurringConflictQuery {
    pub staff_id: String,
    pub staff_name: Option<String>,
    pub dates: Vec<NaiveDate>,
}

pub async fn check_recurring_conflicts(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(body): Json<RecurringConflictQuery>,
) -> Result<Json<RecurringConflictReport>, AppError> {
    check_auth(&headers, &state.config.admin_token)?;

    if body.staff_id.trim().is_empty() {
        return Err(AppError::Validation("staff_id is required".to_string()));
    }

    let (leaves, staff_name) = {
        let db = state.db.lock().unwrap();
        let leaves = queries::get_approved_leave(&db, &[body.staff_id.clone()])?;
        let staff_name = match body.staff_name {
            Some(name) => name,
            None => queries::get_staff(&db, &body.staff_id)?
                .map(|s| s.display_name())
                .unwrap_or_else(|| body.staff_id.clone()),
        };
        (leaves, staff_name)
    };

    Ok(Json(leave_conflicts::check_recurring_conflicts(
        &leaves,
        &body.staff_id,
        &staff_name,
        &body.dates,
    )))
}
