use axum::extract::State;

use crate::domain::entities::PublicMenu;
use crate::infra::http::error::ApiError;
use crate::infra::http::extract::{ApiPath, ApiSuccess};
use crate::infra::http::state::AppState;

pub async fn public_menu(
    State(state): State<AppState>,
    ApiPath(slug): ApiPath<String>,
) -> Result<ApiSuccess<PublicMenu>, ApiError> {
    let menu = state.public_menus.get(slug.trim()).await?;
    Ok(ApiSuccess::ok(menu))
}
