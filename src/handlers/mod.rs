pub mod bookings;
pub mod change_requests;
pub mod events;
pub mod health;
pub mod leave;
pub mod staff;

use std::sync::Arc;

use axum::http::HeaderMap;
use axum::routing::{get, post};
use axum::Router;
use tower_http::trace::TraceLayer;

use crate::errors::AppError;
use crate::state::AppState;

pub(crate) fn check_auth(headers: &HeaderMap, expected_token: &str) -> Result<(), AppError> {
    let auth = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");

    let token = auth.strip_prefix("Bearer ").unwrap_or("");
    if token != expected_token {
        return Err(AppError::Unauthorized);
    }
    Ok(())
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health::health))
        .route("/api/staff", post(staff::create_staff))
        .route("/api/branches/:branch_id/staff", get(staff::list_staff))
        .route("/api/bookings", post(bookings::create_booking))
        .route("/api/bookings/recurring", post(bookings::create_recurring))
        .route("/api/bookings/replicate", post(bookings::replicate))
        .route("/api/bookings/verify", post(bookings::verify))
        .route("/api/bookings/:id", get(bookings::get_booking))
        .route("/api/bookings/:id/status", post(bookings::update_status))
        .route("/api/bookings/:id/staff", post(bookings::assign_staff))
        .route(
            "/api/bookings/:id/change-requests",
            post(change_requests::submit),
        )
        .route(
            "/api/branches/:branch_id/bookings",
            get(bookings::list_branch_bookings),
        )
        .route(
            "/api/branches/:branch_id/cache/check",
            post(bookings::check_cache),
        )
        .route(
            "/api/branches/:branch_id/cache/refresh",
            post(bookings::refresh_cache),
        )
        .route("/api/leave", post(leave::request_leave))
        .route("/api/leave/conflicts", post(leave::check_conflicts))
        .route(
            "/api/leave/conflicts/recurring",
            post(leave::check_recurring_conflicts),
        )
        .route("/api/leave/:id/approve", post(leave::approve))
        .route("/api/leave/:id/reject", post(leave::reject))
        .route("/api/staff/:staff_id/leave", get(leave::list_for_staff))
        .route("/api/change-requests", get(change_requests::list))
        .route(
            "/api/change-requests/:id/approve",
            post(change_requests::approve),
        )
        .route(
            "/api/change-requests/:id/reject",
            post(change_requests::reject),
        )
        .route("/api/events", get(events::events_stream))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
