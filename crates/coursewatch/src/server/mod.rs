use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;

use crate::server::endpoints::{courses, status, subscribe};
use crate::types::AppState;

mod endpoints;
mod types;

/// Creates a router that can be used by `axum`.
///
/// # Parameters
/// - `app_state`: The app server state.
///
/// # Returns
/// The router.
pub fn create_router(app_state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(status::get_health))
        .route("/api/courses", get(courses::get_courses))
        .route("/api/subscribe", post(subscribe::post_subscribe))
        .route("/api/subscriptions", get(subscribe::get_subscriptions))
        .with_state(app_state)
}
