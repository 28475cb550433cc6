use axum::extract::{Extension, State};
use uuid::Uuid;

use crate::application::auth::AuthUser;
use crate::domain::entities::PromotionRecord;
use crate::infra::http::error::ApiError;
use crate::infra::http::extract::{ApiPath, ApiSuccess, JsonBody};
use crate::infra::http::models::{DeletedResponse, PromotionRequest};
use crate::infra::http::state::AppState;

pub async fn list_promotions(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    ApiPath(menu_id): ApiPath<Uuid>,
) -> Result<ApiSuccess<Vec<PromotionRecord>>, ApiError> {
    let access = state.menus.authorize(&user, menu_id).await?;
    let promotions = state.promotions.list(access).await?;
    Ok(ApiSuccess::ok(promotions))
}

pub async fn create_promotion(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    ApiPath(menu_id): ApiPath<Uuid>,
    body: JsonBody<PromotionRequest>,
) -> Result<ApiSuccess<PromotionRecord>, ApiError> {
    let access = state.menus.authorize(&user, menu_id).await?;
    let request = body.validated()?;
    let promotion = state.promotions.create(access, request.into()).await?;
    Ok(ApiSuccess::created(promotion))
}

pub async fn delete_promotion(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    ApiPath((menu_id, promotion_id)): ApiPath<(Uuid, Uuid)>,
) -> Result<ApiSuccess<DeletedResponse>, ApiError> {
    let access = state.menus.authorize(&user, menu_id).await?;
    state.promotions.delete(access, promotion_id).await?;
    Ok(ApiSuccess::ok(DeletedResponse { deleted: true }))
}
