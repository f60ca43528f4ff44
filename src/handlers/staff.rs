use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::HeaderMap;
use axum::Json;
use serde::Deserialize;

use crate::db::queries;
use crate::errors::AppError;
use crate::handlers::check_auth;
use crate::models::Staff;
use crate::state::AppState;

// POST /api/staff
#[derive(Deserialize)]
pub struct CreateStaffRequest {
    pub branch_id: String,
    pub first_name: String,
    pub last_name: String,
}

pub async fn create_staff(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(body): Json<CreateStaffRequest>,
) -> Result<Json<Staff>, AppError> {
    check_auth(&headers, &state.config.admin_token)?;

    if body.branch_id.trim().is_empty() || body.first_name.trim().is_empty() {
        return Err(AppError::Validation(
            "branch_id and first_name are required".to_string(),
        ));
    }

    let staff = Staff {
        id: uuid::Uuid::new_v4().to_string(),
        branch_id: body.branch_id,
        first_name: body.first_name.trim().to_string(),
        last_name: body.last_name.trim().to_string(),
    };

    {
        let db = state.db.lock().unwrap();
        queries::create_staff(&db, &staff)?;
    }

    Ok(Json(staff))
}

// GET /api/branches/:branch_id/staff
pub async fn list_staff(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(branch_id): Path<String>,
) -> Result<Json<Vec<Staff>>, AppError> {
    check_auth(&headers, &state.config.admin_token)?;

    let staff = {
        let db = state.db.lock().unwrap();
        queries::list_staff_for_branch(&db, &branch_id)?
    };

    Ok(Json(staff))
}
