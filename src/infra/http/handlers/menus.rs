use axum::extract::{Extension, State};
use uuid::Uuid;

use crate::application::auth::AuthUser;
use crate::application::pagination::{Page, PageRequest};
use crate::domain::entities::{MenuDetail, MenuRecord};
use crate::infra::http::error::ApiError;
use crate::infra::http::extract::{ApiPath, ApiQuery, ApiSuccess, JsonBody};
use crate::infra::http::models::{
    CreateMenuRequest, DeletedResponse, PageQuery, PublishRequest, UpdateMenuRequest,
};
use crate::infra::http::state::AppState;

pub async fn create_menu(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    body: JsonBody<CreateMenuRequest>,
) -> Result<ApiSuccess<MenuRecord>, ApiError> {
    let request = body.validated()?;
    let menu = state.menus.create_menu(&user, request.into()).await?;
    Ok(ApiSuccess::created(menu))
}

pub async fn list_menus(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    ApiQuery(query): ApiQuery<PageQuery>,
) -> Result<ApiSuccess<Page<MenuRecord>>, ApiError> {
    let page = PageRequest::new(query.page, query.limit);
    let menus = state.menus.list_menus(&user, page).await?;
    Ok(ApiSuccess::ok(menus))
}

pub async fn get_menu(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    ApiPath(menu_id): ApiPath<Uuid>,
) -> Result<ApiSuccess<MenuDetail>, ApiError> {
    let access = state.menus.authorize(&user, menu_id).await?;
    let detail = state.menus.menu_detail(access).await?;
    Ok(ApiSuccess::ok(detail))
}

pub async fn update_menu(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    ApiPath(menu_id): ApiPath<Uuid>,
    body: JsonBody<UpdateMenuRequest>,
) -> Result<ApiSuccess<MenuRecord>, ApiError> {
    let access = state.menus.authorize(&user, menu_id).await?;
    let request = body.validated()?;
    let menu = state.menus.update_menu(access, request.into()).await?;
    Ok(ApiSuccess::ok(menu))
}

pub async fn delete_menu(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    ApiPath(menu_id): ApiPath<Uuid>,
) -> Result<ApiSuccess<DeletedResponse>, ApiError> {
    let access = state.menus.authorize(&user, menu_id).await?;
    state.menus.delete_menu(access).await?;
    Ok(ApiSuccess::ok(DeletedResponse { deleted: true }))
}

pub async fn publish_menu(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    ApiPath(menu_id): ApiPath<Uuid>,
    body: JsonBody<PublishRequest>,
) -> Result<ApiSuccess<MenuDetail>, ApiError> {
    let access = state.menus.authorize(&user, menu_id).await?;
    let request = body.validated()?;
    let detail = state.menus.set_published(access, request.publish).await?;
    Ok(ApiSuccess::ok(detail))
}
