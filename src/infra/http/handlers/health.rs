use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

use crate::infra::http::error::codes;
use crate::infra::http::extract::ApiSuccess;
use crate::infra::http::state::AppState;

/// 200 while the database answers, 503 otherwise. Memory pressure only
/// degrades the reported status.
pub async fn health(State(state): State<AppState>) -> Response {
    let report = state.health.report().await;

    if report.is_available() {
        return ApiSuccess::ok(report).into_response();
    }

    (
        StatusCode::SERVICE_UNAVAILABLE,
        axum::Json(json!({
            "success": false,
            "error": {
                "code": codes::SERVICE_UNAVAILABLE,
                "message": "service is unhealthy",
                "details": report,
            },
        })),
    )
        .into_response()
}
