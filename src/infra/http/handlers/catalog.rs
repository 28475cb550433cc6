use axum::extract::{Extension, State};
use uuid::Uuid;

use crate::application::auth::AuthUser;
use crate::domain::entities::{CategoryRecord, ProductRecord, VariationRecord};
use crate::infra::http::error::ApiError;
use crate::infra::http::extract::{ApiPath, ApiSuccess, JsonBody};
use crate::infra::http::models::{
    CategoryPatchRequest, CategoryRequest, DeletedResponse, ProductPatchRequest, ProductRequest,
    ReorderCategoriesRequest, ReorderProductsRequest, ReorderVariationsRequest, VariationRequest,
};
use crate::infra::http::state::AppState;

pub async fn list_categories(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    ApiPath(menu_id): ApiPath<Uuid>,
) -> Result<ApiSuccess<Vec<CategoryRecord>>, ApiError> {
    let access = state.menus.authorize(&user, menu_id).await?;
    let categories = state.catalog.list_categories(access).await?;
    Ok(ApiSuccess::ok(categories))
}

pub async fn create_category(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    ApiPath(menu_id): ApiPath<Uuid>,
    body: JsonBody<CategoryRequest>,
) -> Result<ApiSuccess<CategoryRecord>, ApiError> {
    let access = state.menus.authorize(&user, menu_id).await?;
    let request = body.validated()?;
    let category = state.catalog.create_category(access, request.into()).await?;
    Ok(ApiSuccess::created(category))
}

pub async fn update_category(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    ApiPath((menu_id, category_id)): ApiPath<(Uuid, Uuid)>,
    body: JsonBody<CategoryPatchRequest>,
) -> Result<ApiSuccess<CategoryRecord>, ApiError> {
    let access = state.menus.authorize(&user, menu_id).await?;
    let request = body.validated()?;
    let category = state
        .catalog
        .update_category(access, category_id, request.into())
        .await?;
    Ok(ApiSuccess::ok(category))
}

pub async fn delete_category(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    ApiPath((menu_id, category_id)): ApiPath<(Uuid, Uuid)>,
) -> Result<ApiSuccess<DeletedResponse>, ApiError> {
    let access = state.menus.authorize(&user, menu_id).await?;
    state.catalog.delete_category(access, category_id).await?;
    Ok(ApiSuccess::ok(DeletedResponse { deleted: true }))
}

pub async fn reorder_categories(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    ApiPath(menu_id): ApiPath<Uuid>,
    body: JsonBody<ReorderCategoriesRequest>,
) -> Result<ApiSuccess<Vec<CategoryRecord>>, ApiError> {
    let access = state.menus.authorize(&user, menu_id).await?;
    let request = body.validated()?;
    let categories = state
        .catalog
        .reorder_categories(access, request.into_updates())
        .await?;
    Ok(ApiSuccess::ok(categories))
}

pub async fn list_products(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    ApiPath(menu_id): ApiPath<Uuid>,
) -> Result<ApiSuccess<Vec<ProductRecord>>, ApiError> {
    let access = state.menus.authorize(&user, menu_id).await?;
    let products = state.catalog.list_products(access).await?;
    Ok(ApiSuccess::ok(products))
}

pub async fn create_product(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    ApiPath((menu_id, category_id)): ApiPath<(Uuid, Uuid)>,
    body: JsonBody<ProductRequest>,
) -> Result<ApiSuccess<ProductRecord>, ApiError> {
    let access = state.menus.authorize(&user, menu_id).await?;
    let request = body.validated()?;
    let product = state
        .catalog
        .create_product(access, category_id, request.into())
        .await?;
    Ok(ApiSuccess::created(product))
}

pub async fn update_product(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    ApiPath((menu_id, product_id)): ApiPath<(Uuid, Uuid)>,
    body: JsonBody<ProductPatchRequest>,
) -> Result<ApiSuccess<ProductRecord>, ApiError> {
    let access = state.menus.authorize(&user, menu_id).await?;
    let request = body.validated()?;
    let product = state
        .catalog
        .update_product(access, product_id, request.into())
        .await?;
    Ok(ApiSuccess::ok(product))
}

pub async fn delete_product(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    ApiPath((menu_id, product_id)): ApiPath<(Uuid, Uuid)>,
) -> Result<ApiSuccess<DeletedResponse>, ApiError> {
    let access = state.menus.authorize(&user, menu_id).await?;
    state.catalog.delete_product(access, product_id).await?;
    Ok(ApiSuccess::ok(DeletedResponse { deleted: true }))
}

pub async fn reorder_products(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    ApiPath(menu_id): ApiPath<Uuid>,
    body: JsonBody<ReorderProductsRequest>,
) -> Result<ApiSuccess<Vec<ProductRecord>>, ApiError> {
    let access = state.menus.authorize(&user, menu_id).await?;
    let request = body.validated()?;
    let products = state
        .catalog
        .reorder_products(access, request.into_updates())
        .await?;
    Ok(ApiSuccess::ok(products))
}

pub async fn list_variations(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    ApiPath((menu_id, product_id)): ApiPath<(Uuid, Uuid)>,
) -> Result<ApiSuccess<Vec<VariationRecord>>, ApiError> {
    let access = state.menus.authorize(&user, menu_id).await?;
    let variations = state.catalog.list_variations(access, product_id).await?;
    Ok(ApiSuccess::ok(variations))
}

pub async fn create_variation(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    ApiPath((menu_id, product_id)): ApiPath<(Uuid, Uuid)>,
    body: JsonBody<VariationRequest>,
) -> Result<ApiSuccess<VariationRecord>, ApiError> {
    let access = state.menus.authorize(&user, menu_id).await?;
    let request = body.validated()?;
    let variation = state
        .catalog
        .create_variation(access, product_id, request.into())
        .await?;
    Ok(ApiSuccess::created(variation))
}

pub async fn delete_variation(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    ApiPath((menu_id, product_id, variation_id)): ApiPath<(Uuid, Uuid, Uuid)>,
) -> Result<ApiSuccess<DeletedResponse>, ApiError> {
    let access = state.menus.authorize(&user, menu_id).await?;
    state
        .catalog
        .delete_variation(access, product_id, variation_id)
        .await?;
    Ok(ApiSuccess::ok(DeletedResponse { deleted: true }))
}

pub async fn reorder_variations(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    ApiPath((menu_id, product_id)): ApiPath<(Uuid, Uuid)>,
    body: JsonBody<ReorderVariationsRequest>,
) -> Result<ApiSuccess<Vec<VariationRecord>>, ApiError> {
    let access = state.menus.authorize(&user, menu_id).await?;
    let request = body.validated()?;
    let variations = state
        .catalog
        .reorder_variations(access, product_id, request.into_updates())
        .await?;
    Ok(ApiSuccess::ok(variations))
}
