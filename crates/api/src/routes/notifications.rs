use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};

use beacon_common::types::Notification;

use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/api/notifications", get(list_notifications))
}

/// GET /api/notifications: Recent notifications, most recent first.
async fn list_notifications(State(state): State<AppState>) -> Json<Vec<Notification>> {
    Json(state.scheduler.recent_notifications())
}
