use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use std::sync::Arc;
use tracing::{error, info};

use crate::server::types::ApiErrorType;
use crate::types::AppState;
use crate::watcher::SubscriptionRequest;

/// POST /api/subscribe
/// Creates or replaces a seat-opening subscription for (userId, courseId).
pub async fn post_subscribe(
    State(s): State<Arc<AppState>>,
    Json(request): Json<SubscriptionRequest>,
) -> Response {
    info!(
        user_id = %request.user_id,
        course_id = %request.course_id,
        "POST /api/subscribe"
    );

    match s.registry.upsert(&request) {
        Ok(subscription) => (
            StatusCode::OK,
            Json(json!({
                "message": format!(
                    "Subscribed to notifications for {}",
                    subscription.course_name
                )
            })),
        )
            .into_response(),
        Err(e) => {
            error!(error = %e, "failed to persist subscription");
            ApiErrorType::from((
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to save subscription",
                Some(e.to_string()),
            ))
            .into_response()
        }
    }
}

/// GET /api/subscriptions
/// Lists every active subscription.
pub async fn get_subscriptions(State(s): State<Arc<AppState>>) -> Response {
    match s.registry.list_all() {
        Ok(subscriptions) => (StatusCode::OK, Json(subscriptions)).into_response(),
        Err(e) => {
            error!(error = %e, "failed to list subscriptions");
            ApiErrorType::from((
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to list subscriptions",
                Some(e.to_string()),
            ))
            .into_response()
        }
    }
}
