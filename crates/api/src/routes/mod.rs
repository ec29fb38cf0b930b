pub mod config;
pub mod health;
pub mod notifications;
pub mod scheduler;

use axum::Router;

use crate::state::AppState;

/// Build the complete API router with all routes.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .merge(health::router())
        .merge(scheduler::router())
        .merge(notifications::router())
        .merge(config::router())
        .with_state(state)
}
