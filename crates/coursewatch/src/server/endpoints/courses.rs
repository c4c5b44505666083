use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use std::sync::Arc;
use tracing::{error, info};

use crate::server::types::ApiErrorType;
use crate::types::AppState;

/// GET /api/courses
/// Returns the full course catalog, served from cache (fresh or stale).
///
/// Only a completely cold cache makes this endpoint wait on a scrape, and
/// only then can a scrape failure surface to the caller.
pub async fn get_courses(State(s): State<Arc<AppState>>) -> Response {
    info!("GET /api/courses");

    match s.catalog.catalog().await {
        Ok(offerings) => (StatusCode::OK, Json(&*offerings)).into_response(),
        Err(e) => {
            error!(error = %e, "failed to fetch course catalog");
            ApiErrorType::from((
                StatusCode::BAD_GATEWAY,
                "Failed to fetch course data",
                Some(e.to_string()),
            ))
            .into_response()
        }
    }
}
