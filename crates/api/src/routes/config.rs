//! Runtime configuration updates.

use axum::extract::State;
use axum::routing::put;
use axum::{Json, Router};

use beacon_common::config::{AppConfig, ConfigUpdate};
use beacon_common::error::AppError;

use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/api/config", put(update_config))
}

/// PUT /api/config: Merge a partial update, rebuild the monitors and return
/// the resulting configuration with tokens redacted.
async fn update_config(
    State(state): State<AppState>,
    Json(update): Json<ConfigUpdate>,
) -> Result<Json<AppConfig>, AppError> {
    let next = state
        .scheduler
        .apply_update(&update)
        .map_err(|e| AppError::Validation(e.to_string()))?;

    Ok(Json(next.redacted()))
}
