use axum::extract::{Extension, State};
use axum::http::{HeaderMap, header};
use uuid::Uuid;

use crate::application::auth::AuthUser;
use crate::application::views::{DEFAULT_STATS_DAYS, MenuStats, ViewContext};
use crate::infra::http::error::ApiError;
use crate::infra::http::extract::{ApiPath, ApiQuery, ApiSuccess};
use crate::infra::http::middleware::request_client_ip;
use crate::infra::http::models::{StatsQuery, TrackedResponse};
use crate::infra::http::state::AppState;

/// Record one scan of a published menu. No body; everything comes from headers.
pub async fn track_view(
    State(state): State<AppState>,
    ApiPath(menu_id): ApiPath<Uuid>,
    headers: HeaderMap,
) -> Result<ApiSuccess<TrackedResponse>, ApiError> {
    let context = ViewContext {
        user_agent: headers
            .get(header::USER_AGENT)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string),
        ip_address: request_client_ip(&headers),
    };

    let view = state.views.track(menu_id, context).await?;
    Ok(ApiSuccess::created(TrackedResponse {
        tracked: true,
        view_id: view.id,
    }))
}

pub async fn menu_stats(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    ApiPath(menu_id): ApiPath<Uuid>,
    ApiQuery(query): ApiQuery<StatsQuery>,
) -> Result<ApiSuccess<MenuStats>, ApiError> {
    let access = state.menus.authorize(&user, menu_id).await?;
    let stats = state
        .views
        .stats(access, query.days.unwrap_or(DEFAULT_STATS_DAYS))
        .await?;
    Ok(ApiSuccess::ok(stats))
}
