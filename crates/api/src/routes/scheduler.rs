//! Scheduler status and manual check routes.

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Serialize;
use serde_json::json;

use beacon_common::error::AppError;
use beacon_engine::SchedulerState;

use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/status", get(status))
        .route("/api/check", post(trigger_check))
}

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub state: SchedulerState,
    pub running: bool,
    pub poll_interval_secs: u64,
}

/// GET /api/status: Scheduler lifecycle state.
async fn status(State(state): State<AppState>) -> Json<StatusResponse> {
    let scheduler_state = state.scheduler.state();
    Json(StatusResponse {
        state: scheduler_state,
        running: scheduler_state == SchedulerState::Running,
        poll_interval_secs: state.scheduler.config().poll_interval_secs,
    })
}

/// POST /api/check: Poll every source now, outside the timer.
async fn trigger_check(
    State(state): State<AppState>,
) -> Result<(StatusCode, Json<serde_json::Value>), AppError> {
    match state.scheduler.trigger_check() {
        Some(_) => Ok((StatusCode::ACCEPTED, Json(json!({"triggered": true})))),
        None => Err(AppError::Conflict("scheduler is not running".to_string())),
    }
}
