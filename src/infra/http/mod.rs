//! HTTP surface: JSON API routes, extractors and middleware.

pub mod error;
pub mod extract;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod rate_limit;
pub mod state;

pub use error::ApiError;
pub use rate_limit::RateLimiter;
pub use state::AppState;

use axum::{
    Router,
    extract::DefaultBodyLimit,
    http::StatusCode,
    middleware as axum_middleware,
    routing::{delete, get, patch, post},
};

use self::error::codes;

/// Assemble the full API router.
///
/// Unauthenticated diner-facing routes are throttled per client; everything
/// under an owner account goes through bearer authentication.
pub fn build_router(state: AppState) -> Router {
    let upload_body_limit = state.uploads.max_bytes();

    let throttled = Router::new()
        .route("/api/auth/register", post(handlers::register))
        .route("/api/auth/login", post(handlers::login))
        .route("/api/menus/public/{slug}", get(handlers::public_menu))
        .route("/api/menus/{menu_id}/views", post(handlers::track_view))
        .route_layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::rate_limit,
        ));

    let open = Router::new().route("/api/health", get(handlers::health));

    let protected = Router::new()
        .route("/api/auth/me", get(handlers::current_user))
        .route(
            "/api/menus",
            get(handlers::list_menus).post(handlers::create_menu),
        )
        .route(
            "/api/menus/{menu_id}",
            get(handlers::get_menu)
                .patch(handlers::update_menu)
                .delete(handlers::delete_menu),
        )
        .route(
            "/api/menus/{menu_id}/publish",
            post(handlers::publish_menu),
        )
        .route(
            "/api/menus/{menu_id}/categories",
            get(handlers::list_categories).post(handlers::create_category),
        )
        .route(
            "/api/menus/{menu_id}/categories/reorder",
            post(handlers::reorder_categories),
        )
        .route(
            "/api/menus/{menu_id}/categories/{category_id}",
            patch(handlers::update_category).delete(handlers::delete_category),
        )
        .route(
            "/api/menus/{menu_id}/categories/{category_id}/products",
            post(handlers::create_product),
        )
        .route(
            "/api/menus/{menu_id}/products",
            get(handlers::list_products),
        )
        .route(
            "/api/menus/{menu_id}/products/reorder",
            post(handlers::reorder_products),
        )
        .route(
            "/api/menus/{menu_id}/products/{product_id}",
            patch(handlers::update_product).delete(handlers::delete_product),
        )
        .route(
            "/api/menus/{menu_id}/products/{product_id}/variations",
            get(handlers::list_variations).post(handlers::create_variation),
        )
        .route(
            "/api/menus/{menu_id}/products/{product_id}/variations/reorder",
            post(handlers::reorder_variations),
        )
        .route(
            "/api/menus/{menu_id}/products/{product_id}/variations/{variation_id}",
            delete(handlers::delete_variation),
        )
        .route(
            "/api/menus/{menu_id}/promotions",
            get(handlers::list_promotions).post(handlers::create_promotion),
        )
        .route(
            "/api/menus/{menu_id}/promotions/{promotion_id}",
            delete(handlers::delete_promotion),
        )
        .route(
            "/api/menus/{menu_id}/analytics",
            get(handlers::menu_stats),
        )
        .route("/api/qr/{menu_id}", get(handlers::menu_qr))
        .route(
            "/api/upload",
            post(handlers::upload_image).layer(DefaultBodyLimit::max(upload_body_limit)),
        )
        .route_layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::require_auth,
        ));

    Router::new()
        .merge(throttled)
        .merge(open)
        .merge(protected)
        .fallback(route_not_found)
        .with_state(state)
        .layer(axum_middleware::from_fn(middleware::log_responses))
        .layer(axum_middleware::from_fn(middleware::set_request_context))
}

async fn route_not_found() -> ApiError {
    ApiError::new(StatusCode::NOT_FOUND, codes::NOT_FOUND, "route not found")
}
