use std::str::FromStr;

use axum::extract::{Extension, State};
use axum::http::{HeaderValue, header};
use axum::response::{IntoResponse, Response};
use serde_json::json;
use uuid::Uuid;

use crate::application::auth::AuthUser;
use crate::domain::types::{QrFormat, QrSize};
use crate::infra::http::error::ApiError;
use crate::infra::http::extract::{ApiPath, ApiQuery};
use crate::infra::http::models::QrQuery;
use crate::infra::http::state::AppState;

/// Render the QR code that points at a menu's public page.
pub async fn menu_qr(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    ApiPath(menu_id): ApiPath<Uuid>,
    ApiQuery(query): ApiQuery<QrQuery>,
) -> Result<Response, ApiError> {
    let access = state.menus.authorize(&user, menu_id).await?;
    let format = parse_option::<QrFormat>("format", query.format.as_deref())?;
    let size = parse_option::<QrSize>("size", query.size.as_deref())?;

    let menu = state.menus.find_menu(access).await?;
    let image = state
        .qr
        .render(&menu.slug, format, size)
        .await
        .map_err(|err| ApiError::internal(err.to_string()))?;

    let content_type = image.content_type();
    let disposition = query
        .download
        .unwrap_or(false)
        .then(|| format!("attachment; filename=\"{}\"", image.file_name(&menu.slug)));

    let mut response = image.bytes.into_response();
    let headers = response.headers_mut();
    headers.insert(header::CONTENT_TYPE, HeaderValue::from_static(content_type));
    if let Some(disposition) = disposition {
        let value = HeaderValue::from_str(&disposition)
            .map_err(|err| ApiError::internal(err.to_string()))?;
        headers.insert(header::CONTENT_DISPOSITION, value);
    }

    Ok(response)
}

fn parse_option<T>(field: &'static str, raw: Option<&str>) -> Result<T, ApiError>
where
    T: FromStr<Err = String> + Default,
{
    match raw {
        None => Ok(T::default()),
        Some(value) => T::from_str(value).map_err(|reason| {
            ApiError::validation(format!("{field}: {reason}"))
                .with_details(json!({ field: [reason] }))
        }),
    }
}
